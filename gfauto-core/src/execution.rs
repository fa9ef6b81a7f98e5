// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Execution Driver.
//!
//! Given a variant shader job, an output directory, per-test optimizer
//! settings, and a device descriptor, produces a result directory containing
//! at minimum `log.txt` and `STATUS`.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use crate::binary::BinaryManager;
use crate::device::{Device, DeviceKind};
use crate::error::Result;
use crate::metadata::TestGlsl;
use crate::shader_job::ShaderJob;
use crate::status::Status;

/// Default Amber run timeout.
pub const AMBER_RUN_TIME_LIMIT: Duration = Duration::from_secs(30);

/// External tool entry points the Execution Driver shells out to.
/// Implementations talk to the real `generate`/Amber/device tooling; this
/// trait exists so the orchestration logic in this crate can be tested
/// without those external collaborators.
pub trait ToolRunner: Send + Sync {
    /// Converts a shader job to an Amber script, honoring the requested
    /// optimizer args. Returns `Err` on subprocess failure.
    fn shader_job_to_amber_script(
        &self,
        shader_job: &ShaderJob,
        out_amber: &Utf8Path,
        workdir: &Utf8Path,
        binaries: &BinaryManager,
        spirv_opt_args: &[String],
    ) -> Result<()>;

    /// Runs Amber locally (host or SwiftShader), dumping an image or buffer.
    fn run_amber_host(
        &self,
        amber_script: &Utf8Path,
        output_dir: &Utf8Path,
        dump_image: bool,
        dump_buffer: bool,
        icd: Option<&Utf8Path>,
    ) -> Result<Status>;

    /// Runs Amber on an Android device with the given serial.
    fn run_amber_android(
        &self,
        amber_script: &Utf8Path,
        output_dir: &Utf8Path,
        dump_image: bool,
        dump_buffer: bool,
        serial: &str,
    ) -> Result<Status>;
}

/// Drives one shader job through conversion and device execution, writing
/// `log.txt` and `STATUS` into `output_dir`.
pub struct ExecutionDriver<'a> {
    tools: &'a dyn ToolRunner,
}

impl<'a> ExecutionDriver<'a> {
    pub fn new(tools: &'a dyn ToolRunner) -> Self {
        Self { tools }
    }

    /// Executes `shader_job` on `device`, writing results into `output_dir`.
    /// Returns the status that was written.
    pub fn run(
        &self,
        shader_job: &ShaderJob,
        output_dir: &Utf8Path,
        test_glsl: &TestGlsl,
        device: &Device,
        binaries: &BinaryManager,
    ) -> Result<Status> {
        let span = tracing::info_span!("run_shader_job", device = %device.name);
        let _guard = span.enter();

        crate::paths::mkdirs_p(output_dir)?;
        let amber_script = output_dir.join("test.amber");

        if let Err(_err) = self.tools.shader_job_to_amber_script(
            shader_job,
            &amber_script,
            output_dir,
            binaries,
            &test_glsl.spirv_opt_args,
        ) {
            tracing::warn!("shader-job-to-amber conversion failed; recording HOST_CRASH");
            Status::HostCrash.write(output_dir)?;
            return Ok(Status::HostCrash);
        }

        let is_compute = shader_job.is_compute();

        let status = match &device.kind {
            DeviceKind::Preprocess => Status::Success,
            DeviceKind::Host | DeviceKind::SwiftShader => self.tools.run_amber_host(
                &amber_script,
                output_dir,
                !is_compute,
                is_compute,
                None,
            )?,
            DeviceKind::Android { serial } => self.tools.run_amber_android(
                &amber_script,
                output_dir,
                !is_compute,
                is_compute,
                serial,
            )?,
        };

        status.write(output_dir)?;
        tracing::info!(%status, "test execution finished");
        Ok(status)
    }
}

/// Canonical result-directory paths for one `(test, device, reference|variant)` run.
pub fn result_output_dir(test_dir: &Utf8Path, device_name: &str, is_variant: bool) -> Utf8PathBuf {
    crate::paths::results_dir(test_dir, device_name, is_variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use std::sync::Mutex;

    struct FakeTools {
        conversion_fails: bool,
        device_status: Mutex<Status>,
    }

    impl ToolRunner for FakeTools {
        fn shader_job_to_amber_script(
            &self,
            _shader_job: &ShaderJob,
            out_amber: &Utf8Path,
            _workdir: &Utf8Path,
            _binaries: &BinaryManager,
            _spirv_opt_args: &[String],
        ) -> Result<()> {
            if self.conversion_fails {
                return Err(crate::error::GfautoError::Subprocess {
                    program: "generate".into(),
                    source: std::io::Error::other("boom"),
                });
            }
            crate::paths::write_text(out_amber, "# amber script")?;
            Ok(())
        }

        fn run_amber_host(
            &self,
            _amber_script: &Utf8Path,
            _output_dir: &Utf8Path,
            _dump_image: bool,
            _dump_buffer: bool,
            _icd: Option<&Utf8Path>,
        ) -> Result<Status> {
            Ok(*self.device_status.lock().unwrap())
        }

        fn run_amber_android(
            &self,
            _amber_script: &Utf8Path,
            _output_dir: &Utf8Path,
            _dump_image: bool,
            _dump_buffer: bool,
            _serial: &str,
        ) -> Result<Status> {
            Ok(*self.device_status.lock().unwrap())
        }
    }

    fn preprocess_device() -> Device {
        Device {
            name: "preprocess".into(),
            active: true,
            kind: DeviceKind::Preprocess,
            binaries: vec![],
        }
    }

    fn host_device() -> Device {
        Device {
            name: "host".into(),
            active: true,
            kind: DeviceKind::Host,
            binaries: vec![],
        }
    }

    #[test]
    fn conversion_failure_is_a_host_crash() {
        let dir = tempdir().unwrap();
        crate::paths::write_text(&dir.path().join("shader.json"), "{}").unwrap();
        let job = ShaderJob::new(dir.path().join("shader.json"));
        let tools = FakeTools {
            conversion_fails: true,
            device_status: Mutex::new(Status::Success),
        };
        let driver = ExecutionDriver::new(&tools);
        let output_dir = dir.path().join("out");
        let artifacts_dir = dir.path().join("artifacts");
        let binaries = BinaryManager::new(vec![], vec![], artifacts_dir);

        let status = driver
            .run(&job, &output_dir, &TestGlsl::default(), &host_device(), &binaries)
            .unwrap();
        assert_eq!(status, Status::HostCrash);
        assert_eq!(Status::read(&output_dir), Status::HostCrash);
    }

    #[test]
    fn preprocess_device_succeeds_without_running_amber() {
        let dir = tempdir().unwrap();
        crate::paths::write_text(&dir.path().join("shader.json"), "{}").unwrap();
        let job = ShaderJob::new(dir.path().join("shader.json"));
        let tools = FakeTools {
            conversion_fails: false,
            device_status: Mutex::new(Status::Crash),
        };
        let driver = ExecutionDriver::new(&tools);
        let output_dir = dir.path().join("out");
        let artifacts_dir = dir.path().join("artifacts");
        let binaries = BinaryManager::new(vec![], vec![], artifacts_dir);

        let status = driver
            .run(&job, &output_dir, &TestGlsl::default(), &preprocess_device(), &binaries)
            .unwrap();
        // Even though the fake device status is CRASH, preprocess devices
        // short-circuit to SUCCESS once conversion has succeeded.
        assert_eq!(status, Status::Success);
    }

    #[test]
    fn host_device_reports_device_status() {
        let dir = tempdir().unwrap();
        crate::paths::write_text(&dir.path().join("shader.json"), "{}").unwrap();
        let job = ShaderJob::new(dir.path().join("shader.json"));
        let tools = FakeTools {
            conversion_fails: false,
            device_status: Mutex::new(Status::Crash),
        };
        let driver = ExecutionDriver::new(&tools);
        let output_dir = dir.path().join("out");
        let artifacts_dir = dir.path().join("artifacts");
        let binaries = BinaryManager::new(vec![], vec![], artifacts_dir);

        let status = driver
            .run(&job, &output_dir, &TestGlsl::default(), &host_device(), &binaries)
            .unwrap();
        assert_eq!(status, Status::Crash);
        assert_eq!(Status::read(&output_dir), Status::Crash);
    }
}
