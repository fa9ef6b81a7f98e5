// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Reducer Driver.
//!
//! Given a test directory with a populated `crash_signature` and a device
//! name, invokes the external reducer tool to produce a reduced shader job
//! under a specified subdirectory.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{GfautoError, Result};
use crate::metadata::TestMetadata;
use crate::shader_job::ShaderJob;

/// `part_1_preserve_semantics` reduction pass name.
pub const PART_1_PRESERVE_SEMANTICS: &str = "part_1_preserve_semantics";
/// `part_2_change_semantics` reduction pass name.
pub const PART_2_CHANGE_SEMANTICS: &str = "part_2_change_semantics";
/// Name of the `best` symlink.
pub const BEST: &str = "best";

/// The `glsl-reduce` external tool, abstracted so the two-pass policy can be
/// tested without shelling out.
pub trait ShaderReducer: Send + Sync {
    /// Runs `glsl-reduce` against `input_shader_job`, calling back into
    /// `gfauto_interestingness_test <metadata_path>` to judge interestingness.
    /// Writes its working state under `output_dir` and, on success, a final
    /// `shader_reduced_final.json` inside it.
    fn reduce(
        &self,
        input_shader_job: &Utf8Path,
        metadata_path: &Utf8Path,
        output_dir: &Utf8Path,
        preserve_semantics: bool,
    ) -> Result<()>;
}

/// Drives the two-pass reduction policy.
pub struct ReducerDriver<'a> {
    reducer: &'a dyn ShaderReducer,
    /// Whether a missing final reduced shader job is fatal (`true`) or
    /// recoverable as a per-report warning (`false`).
    fatal_on_incomplete_reduction: bool,
}

impl<'a> ReducerDriver<'a> {
    pub fn new(reducer: &'a dyn ShaderReducer) -> Self {
        Self {
            reducer,
            fatal_on_incomplete_reduction: true,
        }
    }

    /// Configures whether an incomplete reduction is fatal.
    pub fn with_fatal_on_incomplete_reduction(mut self, fatal: bool) -> Self {
        self.fatal_on_incomplete_reduction = fatal;
        self
    }

    /// Runs one reduction pass, returning the reduced test directory. Fails
    /// fast on missing `crash_signature`/`device`.
    pub fn run_reduction(
        &self,
        test_dir_reduction_output: &Utf8Path,
        test_dir_to_reduce: &Utf8Path,
        preserve_semantics: bool,
        reduction_name: &str,
        device_name: Option<&str>,
    ) -> Result<Utf8PathBuf> {
        let metadata = TestMetadata::read_from_test_dir(test_dir_to_reduce)?;

        let device_name = match device_name.map(str::to_owned).or_else(|| metadata.device.as_ref().map(|d| d.name.clone())) {
            Some(name) => name,
            None => {
                return Err(GfautoError::ReductionPrecondition {
                    test_dir: test_dir_to_reduce.to_path_buf(),
                    reason: "device must be specified, either explicitly or in test metadata",
                });
            }
        };

        if metadata.crash_signature.is_empty() {
            return Err(GfautoError::ReductionPrecondition {
                test_dir: test_dir_to_reduce.to_path_buf(),
                reason: "crash_signature is empty; only crash reductions are supported",
            });
        }

        let reduced_test_dir = crate::paths::reduced_test_dir(
            test_dir_reduction_output,
            &device_name,
            reduction_name,
        );
        let reduction_work_variant_dir = crate::paths::reduction_work_dir(&reduced_test_dir, true);

        let input_shader_job = crate::paths::test_shader_job_path(test_dir_to_reduce, true);
        let metadata_path = crate::paths::metadata_path(test_dir_to_reduce);

        self.reducer.reduce(
            &input_shader_job,
            &metadata_path,
            &reduction_work_variant_dir,
            preserve_semantics,
        )?;

        let final_shader = reduction_work_variant_dir.join("shader_reduced_final.json");
        if !final_shader.exists() {
            let err = GfautoError::ReductionIncomplete {
                test_dir: test_dir_to_reduce.to_path_buf(),
            };
            if self.fatal_on_incomplete_reduction {
                return Err(err);
            }
            tracing::warn!(error = %err, "reduction incomplete; continuing per configuration");
            return Ok(reduced_test_dir);
        }

        metadata.write_to_test_dir(&reduced_test_dir)?;
        ShaderJob::new(final_shader).copy_to(&crate::paths::test_shader_job_path(&reduced_test_dir, true))?;

        Ok(reduced_test_dir)
    }

    /// Runs both reduction passes for one report and links `best` to the
    /// second pass's output.
    pub fn run_two_pass_reduction(&self, test_dir_in_reports: &Utf8Path, device_name: Option<&str>) -> Result<Utf8PathBuf> {
        let part_1 = self.run_reduction(
            test_dir_in_reports,
            test_dir_in_reports,
            true,
            PART_1_PRESERVE_SEMANTICS,
            device_name,
        )?;

        let part_2 = self.run_reduction(
            test_dir_in_reports,
            &part_1,
            false,
            PART_2_CHANGE_SEMANTICS,
            device_name,
        )?;

        let metadata = TestMetadata::read_from_test_dir(test_dir_in_reports)?;
        let resolved_device_name = device_name
            .map(str::to_owned)
            .or_else(|| metadata.device.as_ref().map(|d| d.name.clone()))
            .expect("device name validated by run_reduction above");

        let best = crate::paths::reduced_test_dir(test_dir_in_reports, &resolved_device_name, BEST);
        if let Some(parent) = best.parent() {
            crate::paths::mkdirs_p(parent)?;
        }
        symlink_dir(PART_2_CHANGE_SEMANTICS, &best)?;

        Ok(part_2)
    }
}

#[cfg(unix)]
fn symlink_dir(target: &str, link: &Utf8Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| crate::error::fs_err(link, e))
}

#[cfg(windows)]
fn symlink_dir(target: &str, link: &Utf8Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(target, link).map_err(|e| crate::error::fs_err(link, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceKind};
    use camino_tempfile::tempdir;

    struct FakeReducer {
        produce_final: bool,
    }

    impl ShaderReducer for FakeReducer {
        fn reduce(
            &self,
            _input_shader_job: &Utf8Path,
            _metadata_path: &Utf8Path,
            output_dir: &Utf8Path,
            _preserve_semantics: bool,
        ) -> Result<()> {
            crate::paths::mkdirs_p(output_dir)?;
            if self.produce_final {
                crate::paths::write_text(&output_dir.join("shader_reduced_final.json"), "{}")?;
            }
            Ok(())
        }
    }

    fn report_with_signature(signature: &str) -> camino_tempfile::Utf8TempDir {
        let dir = tempdir().unwrap();
        let mut metadata = TestMetadata::glsl(None);
        metadata.crash_signature = signature.to_owned();
        metadata.device = Some(Device {
            name: "pixel".into(),
            active: true,
            kind: DeviceKind::Host,
            binaries: vec![],
        });
        metadata.write_to_test_dir(dir.path()).unwrap();
        crate::paths::write_text(&crate::paths::test_shader_job_path(dir.path(), true), "{}").unwrap();
        dir
    }

    #[test]
    fn missing_crash_signature_is_a_precondition_failure() {
        let dir = tempdir().unwrap();
        TestMetadata::glsl(None).write_to_test_dir(dir.path()).unwrap();
        let reducer = FakeReducer { produce_final: true };
        let driver = ReducerDriver::new(&reducer);
        let result = driver.run_reduction(dir.path(), dir.path(), true, "r1", Some("pixel"));
        assert!(matches!(result, Err(GfautoError::ReductionPrecondition { .. })));
    }

    #[test]
    fn missing_device_is_a_precondition_failure() {
        let dir = tempdir().unwrap();
        let mut metadata = TestMetadata::glsl(None);
        metadata.crash_signature = "compile_error".into();
        metadata.write_to_test_dir(dir.path()).unwrap();
        let reducer = FakeReducer { produce_final: true };
        let driver = ReducerDriver::new(&reducer);
        let result = driver.run_reduction(dir.path(), dir.path(), true, "r1", None);
        assert!(matches!(result, Err(GfautoError::ReductionPrecondition { .. })));
    }

    #[test]
    fn incomplete_reduction_is_fatal_by_default() {
        let dir = report_with_signature("compile_error");
        let reducer = FakeReducer { produce_final: false };
        let driver = ReducerDriver::new(&reducer);
        let result = driver.run_reduction(dir.path(), dir.path(), true, "r1", None);
        assert!(matches!(result, Err(GfautoError::ReductionIncomplete { .. })));
    }

    #[test]
    fn incomplete_reduction_can_be_downgraded_to_a_warning() {
        let dir = report_with_signature("compile_error");
        let reducer = FakeReducer { produce_final: false };
        let driver = ReducerDriver::new(&reducer).with_fatal_on_incomplete_reduction(false);
        let result = driver.run_reduction(dir.path(), dir.path(), true, "r1", None);
        assert!(result.is_ok());
    }

    #[test]
    fn two_pass_reduction_links_best_to_second_pass() {
        let dir = report_with_signature("compile_error");
        let reducer = FakeReducer { produce_final: true };
        let driver = ReducerDriver::new(&reducer);
        let part_2 = driver.run_two_pass_reduction(dir.path(), None).unwrap();
        assert!(part_2.as_str().ends_with(PART_2_CHANGE_SEMANTICS));

        let best = crate::paths::reduced_test_dir(dir.path(), "pixel", BEST);
        let target = std::fs::read_link(&best).unwrap();
        assert_eq!(target.to_str().unwrap(), PART_2_CHANGE_SEMANTICS);
    }
}
