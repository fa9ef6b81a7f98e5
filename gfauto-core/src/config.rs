// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fuzzing-session configuration.
//!
//! Loaded from an optional TOML file, layered under CLI-flag overrides that
//! the `gfauto-cli` crate applies after [`GfautoConfig::load`] runs.

use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fuzz_loop::SkipPolicy;

fn default_master_seed() -> u64 {
    0
}

fn default_reports_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("reports")
}

fn default_temp_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("temp")
}

fn default_donors_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("donors")
}

fn default_devices_path() -> Utf8PathBuf {
    Utf8PathBuf::from("devices.json")
}

fn default_tool_timeout() -> Duration {
    crate::execution::AMBER_RUN_TIME_LIMIT
}

fn default_fatal_on_incomplete_reduction() -> bool {
    true
}

/// Whether `skip_policy` as loaded from TOML/CLI should stop at the first
/// report or run every preset; serialized as a lowercase string
/// (`"stop_at_first_report"` / `"run_all_presets"`).
fn default_skip_policy() -> SkipPolicy {
    SkipPolicy::StopAtFirstReport
}

/// Process-wide configuration for one fuzzing session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GfautoConfig {
    /// Seeds the `StdRng` driving every random decision in one session:
    /// donor selection, variant seed, and `opt_rand*` flag selection all
    /// derive from this single value.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Where triaged bug reports are published.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: Utf8PathBuf,
    /// Scratch space for in-flight test directories, cleaned up independently
    /// of `reports_dir`.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: Utf8PathBuf,
    /// Root of the donor shader-job corpus.
    #[serde(default = "default_donors_dir")]
    pub donors_dir: Utf8PathBuf,
    /// Path to the serialized device roster.
    #[serde(default = "default_devices_path")]
    pub devices_path: Utf8PathBuf,
    /// Wall-clock timeout applied to each external tool invocation.
    #[serde(default = "default_tool_timeout", with = "humantime_serde")]
    pub tool_timeout: Duration,
    /// Whether a reduction that never produces `shader_reduced_final.json`
    /// aborts the run (`true`) or is logged as a warning (`false`).
    #[serde(default = "default_fatal_on_incomplete_reduction")]
    pub fatal_on_incomplete_reduction: bool,
    /// Whether to keep trying optimizer presets after the first report for
    /// a variant.
    #[serde(default = "default_skip_policy")]
    pub skip_policy: SkipPolicy,
}

impl Default for GfautoConfig {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            reports_dir: default_reports_dir(),
            temp_dir: default_temp_dir(),
            donors_dir: default_donors_dir(),
            devices_path: default_devices_path(),
            tool_timeout: default_tool_timeout(),
            fatal_on_incomplete_reduction: default_fatal_on_incomplete_reduction(),
            skip_policy: default_skip_policy(),
        }
    }
}

impl GfautoConfig {
    /// Loads configuration from an optional TOML file at `config_path`,
    /// falling back to built-in defaults for anything unset. Environment
    /// variables prefixed `GFAUTO_` (e.g. `GFAUTO_MASTER_SEED`) override
    /// file values; CLI flags are applied on top by the caller.
    pub fn load(config_path: Option<&camino::Utf8Path>) -> Result<GfautoConfig> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(config::File::with_name(path.as_str()));
            }
        }

        let loaded = builder
            .add_source(
                config::Environment::with_prefix("GFAUTO")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(loaded.try_deserialize()?)
    }
}

impl serde::Serialize for SkipPolicy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let value = match self {
            SkipPolicy::StopAtFirstReport => "stop_at_first_report",
            SkipPolicy::RunAllPresets => "run_all_presets",
        };
        serializer.serialize_str(value)
    }
}

impl<'de> serde::Deserialize<'de> for SkipPolicy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "stop_at_first_report" => Ok(SkipPolicy::StopAtFirstReport),
            "run_all_presets" => Ok(SkipPolicy::RunAllPresets),
            other => Err(serde::de::Error::custom(format!(
                "unrecognized skip_policy `{other}`; expected `stop_at_first_report` or `run_all_presets`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;

    #[test]
    fn defaults_with_no_config_file() {
        let config = GfautoConfig::load(None).unwrap();
        assert_eq!(config.master_seed, 0);
        assert_eq!(config.reports_dir, Utf8PathBuf::from("reports"));
        assert_eq!(config.skip_policy, SkipPolicy::StopAtFirstReport);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("gfauto.toml");
        crate::paths::write_text(
            &config_path,
            "master_seed = 42\nreports_dir = \"my_reports\"\nskip_policy = \"run_all_presets\"\n",
        )
        .unwrap();

        let config = GfautoConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.master_seed, 42);
        assert_eq!(config.reports_dir, Utf8PathBuf::from("my_reports"));
        assert_eq!(config.skip_policy, SkipPolicy::RunAllPresets);
        // Unspecified fields still fall back to defaults.
        assert_eq!(config.temp_dir, Utf8PathBuf::from("temp"));
    }

    #[test]
    fn missing_config_file_path_is_not_an_error() {
        let config = GfautoConfig::load(Some(camino::Utf8Path::new("/does/not/exist.toml"))).unwrap();
        assert_eq!(config.master_seed, 0);
    }

    #[test]
    fn env_var_overrides_master_seed() {
        std::env::set_var("GFAUTO_MASTER_SEED", "7");
        let config = GfautoConfig::load(None).unwrap();
        std::env::remove_var("GFAUTO_MASTER_SEED");
        assert_eq!(config.master_seed, 7);
    }
}
