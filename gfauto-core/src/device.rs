// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Target device descriptors.
//!
//! `DeviceKind` is a plain Rust enum over the device backends gfauto can
//! drive; `serde`'s externally-tagged representation keeps each variant's
//! fields under its own key on the wire.

use serde::{Deserialize, Serialize};

use crate::binary::Binary;

/// The kind of device a test is executed on, and the data needed to run it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// A dummy device that only gates real-device execution on a successful
    /// host-side tool conversion.
    Preprocess,
    /// Run Amber directly on the host.
    Host,
    /// Run Amber on the host against the SwiftShader software ICD.
    SwiftShader,
    /// Run Amber on an Android device over a device-specific shell invocation.
    Android {
        /// The `adb` device serial.
        serial: String,
    },
}

/// A named, taggable target in the device roster.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// The device's unique name, used as a results-directory path component.
    pub name: String,
    /// Whether this device is currently selected for fuzzing runs.
    pub active: bool,
    /// What kind of device this is and how to reach it.
    pub kind: DeviceKind,
    /// Binaries (e.g. a specific SwiftShader ICD version) pinned for this device.
    #[serde(default)]
    pub binaries: Vec<Binary>,
}

impl Device {
    pub fn is_preprocess(&self) -> bool {
        matches!(self.kind, DeviceKind::Preprocess)
    }
}

/// The device roster, as read from the on-disk device list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeviceList {
    pub devices: Vec<Device>,
}

impl DeviceList {
    /// Returns the devices with `active == true`, in roster order. The
    /// orchestrator runs devices serially, in this order.
    pub fn active_devices(&self) -> Vec<&Device> {
        self.devices.iter().filter(|d| d.active).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_devices_preserves_order() {
        let list = DeviceList {
            devices: vec![
                Device {
                    name: "a".into(),
                    active: true,
                    kind: DeviceKind::Preprocess,
                    binaries: vec![],
                },
                Device {
                    name: "b".into(),
                    active: false,
                    kind: DeviceKind::Host,
                    binaries: vec![],
                },
                Device {
                    name: "c".into(),
                    active: true,
                    kind: DeviceKind::SwiftShader,
                    binaries: vec![],
                },
            ],
        };
        let names: Vec<_> = list.active_devices().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn device_json_round_trips() {
        let device = Device {
            name: "pixel".into(),
            active: true,
            kind: DeviceKind::Android {
                serial: "abc123".into(),
            },
            binaries: vec![],
        };
        let json = serde_json::to_string(&device).unwrap();
        let back: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(device, back);
    }
}
