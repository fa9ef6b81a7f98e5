// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed alphabet of `STATUS` file contents.

use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;

/// A single-line status recorded in a result directory's `STATUS` file.
///
/// Readers default missing files to [`Status::UnexpectedError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Status {
    /// The test ran to completion without incident.
    Success,
    /// The device reported a crash while running the test.
    Crash,
    /// The host-side tool chain crashed before the test could reach a device.
    HostCrash,
    /// Something went wrong that the orchestrator didn't expect or the status file is missing.
    UnexpectedError,
    /// The subprocess exceeded its wall-clock timeout.
    Timeout,
}

impl Status {
    /// The literal written to `STATUS` files.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Crash => "CRASH",
            Status::HostCrash => "HOST_CRASH",
            Status::UnexpectedError => "UNEXPECTED_ERROR",
            Status::Timeout => "TIMEOUT",
        }
    }

    /// Writes this status to `<dir>/STATUS`, creating parent directories as needed.
    pub fn write(self, result_dir: &Utf8Path) -> crate::error::Result<()> {
        crate::paths::write_text(&result_dir.join("STATUS"), self.as_str())
    }

    /// Reads the status from `<dir>/STATUS`, defaulting to
    /// [`Status::UnexpectedError`] if the file is missing.
    pub fn read(result_dir: &Utf8Path) -> Status {
        match std::fs::read_to_string(result_dir.join("STATUS")) {
            Ok(text) => text.trim().parse().unwrap_or(Status::UnexpectedError),
            Err(_) => Status::UnexpectedError,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized status string: {0}")]
pub struct StatusParseError(String);

impl FromStr for Status {
    type Err = StatusParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Status::Success),
            "CRASH" => Ok(Status::Crash),
            "HOST_CRASH" => Ok(Status::HostCrash),
            "UNEXPECTED_ERROR" => Ok(Status::UnexpectedError),
            "TIMEOUT" => Ok(Status::Timeout),
            other => Err(StatusParseError(other.to_owned())),
        }
    }
}

/// The two report bucket names.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportBucket {
    /// `reports/crashes/...`
    Crashes,
    /// `reports/host_crashes/...`
    HostCrashes,
}

impl ReportBucket {
    /// The directory name under `reports/`.
    pub fn dir_name(self) -> &'static str {
        match self {
            ReportBucket::Crashes => "crashes",
            ReportBucket::HostCrashes => "host_crashes",
        }
    }

    /// Maps a status to the bucket it belongs in, if any.
    pub fn for_status(status: Status) -> Option<ReportBucket> {
        match status {
            Status::Crash => Some(ReportBucket::Crashes),
            Status::HostCrash => Some(ReportBucket::HostCrashes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;

    #[test]
    fn round_trips_through_text() {
        for status in [
            Status::Success,
            Status::Crash,
            Status::HostCrash,
            Status::UnexpectedError,
            Status::Timeout,
        ] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn missing_status_file_defaults_to_unexpected_error() {
        let dir = tempdir().unwrap();
        assert_eq!(Status::read(dir.path()), Status::UnexpectedError);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        Status::Crash.write(dir.path()).unwrap();
        assert_eq!(Status::read(dir.path()), Status::Crash);
    }

    #[test]
    fn bucket_for_status() {
        assert_eq!(
            ReportBucket::for_status(Status::Crash).map(ReportBucket::dir_name),
            Some("crashes")
        );
        assert_eq!(
            ReportBucket::for_status(Status::HostCrash).map(ReportBucket::dir_name),
            Some("host_crashes")
        );
        assert_eq!(ReportBucket::for_status(Status::Success), None);
    }
}
