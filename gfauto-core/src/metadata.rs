// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test metadata store.
//!
//! A record `(kind, device?, binaries[], crash_signature)` stored next to a
//! test's `source/` directory, serialized to `test.json`.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::binary::Binary;
use crate::device::Device;
use crate::error::{GfautoError, Result};

/// Per-kind payload. Today only `glsl` exists.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Glsl(TestGlsl),
}

/// The `glsl` test kind's payload: optimizer args and tool version hashes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TestGlsl {
    #[serde(default)]
    pub glslang_version_hash: String,
    #[serde(default)]
    pub spirv_opt_version_hash: String,
    #[serde(default)]
    pub spirv_opt_args: Vec<String>,
}

/// `(kind, device?, binaries[], crash_signature)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    pub kind: TestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default)]
    pub binaries: Vec<Binary>,
    /// Set post-triage; empty string until then.
    #[serde(default)]
    pub crash_signature: String,
}

impl TestMetadata {
    pub fn glsl(spirv_opt_args: Option<Vec<String>>) -> Self {
        TestMetadata {
            kind: TestKind::Glsl(TestGlsl {
                glslang_version_hash: String::new(),
                spirv_opt_version_hash: String::new(),
                spirv_opt_args: spirv_opt_args.unwrap_or_default(),
            }),
            device: None,
            binaries: Vec::new(),
            crash_signature: String::new(),
        }
    }

    /// Reads and parses `test.json` from a test directory's `source/`.
    pub fn read_from_test_dir(test_dir: &Utf8Path) -> Result<TestMetadata> {
        Self::read_from_path(&crate::paths::metadata_path(test_dir))
    }

    pub fn read_from_path(path: &Utf8Path) -> Result<TestMetadata> {
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::fs_err(path, e))?;
        serde_json::from_str(&text).map_err(|e| GfautoError::MetadataParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes `test.json` into a test directory's `source/`. Idempotent:
    /// reading then writing unchanged metadata leaves bytes identical.
    pub fn write_to_test_dir(&self, test_dir: &Utf8Path) -> Result<()> {
        self.write_to_path(&crate::paths::metadata_path(test_dir))
    }

    pub fn write_to_path(&self, path: &Utf8Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).expect("TestMetadata is always serializable");
        crate::paths::write_text(path, &text)
    }

    pub fn binaries_for_resolution(&self) -> Vec<Binary> {
        let mut result = Vec::new();
        if let Some(device) = &self.device {
            result.extend(device.binaries.iter().cloned());
        }
        result.extend(self.binaries.iter().cloned());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;

    #[test]
    fn round_trip_serialize_deserialize_is_identity() {
        let metadata = TestMetadata::glsl(Some(vec!["-O".into()]));
        let json = serde_json::to_string(&metadata).unwrap();
        let back: TestMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(metadata, back);
    }

    #[test]
    fn write_then_read_round_trip_is_identity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.json");
        let metadata = TestMetadata::glsl(None);
        metadata.write_to_path(&path).unwrap();
        let read_back = TestMetadata::read_from_path(&path).unwrap();
        assert_eq!(metadata, read_back);
    }

    #[test]
    fn rewriting_unchanged_metadata_is_byte_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.json");
        let metadata = TestMetadata::glsl(Some(vec!["-Os".into()]));
        metadata.write_to_path(&path).unwrap();
        let first_bytes = std::fs::read(&path).unwrap();

        let read = TestMetadata::read_from_path(&path).unwrap();
        read.write_to_path(&path).unwrap();
        let second_bytes = std::fs::read(&path).unwrap();

        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn binaries_for_resolution_includes_device_then_test_binaries() {
        let mut metadata = TestMetadata::glsl(None);
        metadata.binaries.push(Binary::new("spirv-opt", "v1", vec![]));
        metadata.device = Some(Device {
            name: "pixel".into(),
            active: true,
            kind: crate::device::DeviceKind::Host,
            binaries: vec![Binary::new("swift_shader_icd", "v2", vec![])],
        });
        let binaries = metadata.binaries_for_resolution();
        assert_eq!(binaries[0].name, "swift_shader_icd");
        assert_eq!(binaries[1].name, "spirv-opt");
    }
}
