// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subprocess-backed implementations of the external-collaborator traits
//! `gfauto_core` leaves abstract, grounded in `duct`'s blocking `Expression`
//! API the way `nextest_runner::rustc_cli::RustcCli` shells out to `rustc`.

use std::time::{Duration, Instant};

use camino::Utf8Path;
use gfauto_core::binary::BinaryManager;
use gfauto_core::error::{GfautoError, Result};
use gfauto_core::execution::ToolRunner;
use gfauto_core::fuzz_loop::VariantGenerator;
use gfauto_core::reduction::ShaderReducer;
use gfauto_core::shader_job::ShaderJob;
use gfauto_core::status::Status;
use gfauto_core::toolpath::tool_on_path;

/// The parts of a finished subprocess this module cares about, copied out of
/// `duct`'s borrowed `&std::process::Output` so the timeout-polling loop
/// below doesn't need to hold that borrow across iterations.
struct ToolOutput {
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Runs `expr`, killing it and returning [`GfautoError::Subprocess`] if it
/// does not complete within `timeout`.
fn run_with_timeout(program: &str, expr: duct::Expression, timeout: Duration) -> Result<ToolOutput> {
    let handle = expr
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()
        .map_err(|source| GfautoError::Subprocess { program: program.to_owned(), source })?;

    let started = Instant::now();
    loop {
        match handle.try_wait() {
            Ok(Some(output)) => {
                return Ok(ToolOutput {
                    success: output.status.success(),
                    stdout: output.stdout.clone(),
                    stderr: output.stderr.clone(),
                });
            }
            Ok(None) => {
                if started.elapsed() > timeout {
                    let _ = handle.kill();
                    return Err(GfautoError::Subprocess {
                        program: program.to_owned(),
                        source: std::io::Error::new(std::io::ErrorKind::TimedOut, "tool timed out"),
                    });
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(source) => return Err(GfautoError::Subprocess { program: program.to_owned(), source }),
        }
    }
}

fn write_log(output_dir: &Utf8Path, output: &ToolOutput) -> Result<()> {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    gfauto_core::paths::write_text(&gfauto_core::paths::log_path(output_dir), &text)
}

/// Runs the `generate`, shader-job-to-Amber, and Amber tools as external
/// processes, resolving tool paths through either the [`BinaryManager`] or
/// `PATH` as the spec's command-line contracts dictate.
pub struct DuctTools {
    pub timeout: Duration,
}

impl ToolRunner for DuctTools {
    fn shader_job_to_amber_script(
        &self,
        shader_job: &ShaderJob,
        out_amber: &Utf8Path,
        workdir: &Utf8Path,
        binaries: &BinaryManager,
        spirv_opt_args: &[String],
    ) -> Result<()> {
        gfauto_core::paths::mkdirs_p(workdir)?;
        let tool = tool_on_path("shader_job_to_amber_script")?;

        let (glslang, _) = binaries.resolve_by_name(gfauto_core::catalog::GLSLANG_VALIDATOR_NAME)?;
        let (spirv_opt, _) = binaries.resolve_by_name(gfauto_core::catalog::SPIRV_OPT_NAME)?;

        let mut args = vec![
            shader_job.manifest.to_string(),
            out_amber.to_string(),
            workdir.to_string(),
            "--glslang-validator".to_owned(),
            glslang.to_string(),
            "--spirv-opt".to_owned(),
            spirv_opt.to_string(),
        ];
        if !spirv_opt_args.is_empty() {
            args.push("--spirv-opt-args".to_owned());
            args.extend(spirv_opt_args.iter().cloned());
        }

        let expression = duct::cmd(tool.as_str(), &args);
        let output = run_with_timeout("shader_job_to_amber_script", expression, self.timeout)?;
        write_log(workdir, &output)?;
        if !output.success {
            return Err(GfautoError::Subprocess {
                program: "shader_job_to_amber_script".to_owned(),
                source: std::io::Error::other("nonzero exit converting shader job to Amber script"),
            });
        }
        Ok(())
    }

    fn run_amber_host(
        &self,
        amber_script: &Utf8Path,
        output_dir: &Utf8Path,
        dump_image: bool,
        dump_buffer: bool,
        icd: Option<&Utf8Path>,
    ) -> Result<Status> {
        let amber = tool_on_path("amber")?;
        let mut args = vec![amber_script.to_string()];
        if dump_image {
            args.push("--image".to_owned());
            args.push(output_dir.join("image.png").to_string());
        }
        if dump_buffer {
            args.push("--buffer".to_owned());
            args.push(output_dir.join("buffer.bin").to_string());
        }
        if let Some(icd) = icd {
            args.push("--icd".to_owned());
            args.push(icd.to_string());
        }

        let expression = duct::cmd(amber.as_str(), &args);
        match run_with_timeout("amber", expression, self.timeout) {
            Ok(output) => {
                write_log(output_dir, &output)?;
                Ok(if output.success { Status::Success } else { Status::Crash })
            }
            Err(GfautoError::Subprocess { source, .. }) if source.kind() == std::io::ErrorKind::TimedOut => {
                Ok(Status::Timeout)
            }
            Err(err) => Err(err),
        }
    }

    fn run_amber_android(
        &self,
        amber_script: &Utf8Path,
        output_dir: &Utf8Path,
        dump_image: bool,
        dump_buffer: bool,
        serial: &str,
    ) -> Result<Status> {
        let adb = tool_on_path("adb")?;
        let device_script = "/data/local/tmp/graphicsfuzz/test.amber";
        let push = duct::cmd(adb.as_str(), ["-s", serial, "push", amber_script.as_str(), device_script]);
        run_with_timeout("adb push", push, self.timeout)?;

        let mut remote_args = vec!["shell".to_owned(), "/data/local/tmp/graphicsfuzz/amber_ndk".to_owned(), device_script.to_owned()];
        if dump_image {
            remote_args.push("--image".to_owned());
            remote_args.push("/data/local/tmp/graphicsfuzz/image.png".to_owned());
        }
        if dump_buffer {
            remote_args.push("--buffer".to_owned());
            remote_args.push("/data/local/tmp/graphicsfuzz/buffer.bin".to_owned());
        }
        let mut adb_args = vec!["-s".to_owned(), serial.to_owned()];
        adb_args.extend(remote_args);

        let expression = duct::cmd(adb.as_str(), &adb_args);
        match run_with_timeout("adb shell amber_ndk", expression, self.timeout) {
            Ok(output) => {
                write_log(output_dir, &output)?;
                Ok(if output.success { Status::Success } else { Status::Crash })
            }
            Err(GfautoError::Subprocess { source, .. }) if source.kind() == std::io::ErrorKind::TimedOut => {
                Ok(Status::Timeout)
            }
            Err(err) => Err(err),
        }
    }
}

/// Invokes the `generate` external tool.
pub struct DuctVariantGenerator {
    pub timeout: Duration,
}

impl VariantGenerator for DuctVariantGenerator {
    fn generate(
        &self,
        reference: &ShaderJob,
        donors_dir: &Utf8Path,
        out_shader_json: &Utf8Path,
        seed: i64,
    ) -> Result<()> {
        if let Some(parent) = out_shader_json.parent() {
            gfauto_core::paths::mkdirs_p(parent)?;
        }
        let tool = tool_on_path("generate")?;
        let expression = duct::cmd(
            tool.as_str(),
            [
                reference.manifest.to_string(),
                donors_dir.to_string(),
                out_shader_json.to_string(),
                seed.to_string(),
            ],
        );
        let output = run_with_timeout("generate", expression, self.timeout)?;
        if !output.success {
            return Err(GfautoError::Subprocess {
                program: "generate".to_owned(),
                source: std::io::Error::other("nonzero exit generating a variant"),
            });
        }
        Ok(())
    }
}

/// Invokes `glsl-reduce` with the interestingness-test callback contract.
pub struct DuctShaderReducer {
    pub timeout: Duration,
    pub interestingness_test: camino::Utf8PathBuf,
}

impl ShaderReducer for DuctShaderReducer {
    fn reduce(
        &self,
        input_shader_job: &Utf8Path,
        metadata_path: &Utf8Path,
        output_dir: &Utf8Path,
        preserve_semantics: bool,
    ) -> Result<()> {
        gfauto_core::paths::mkdirs_p(output_dir)?;
        let tool = tool_on_path("glsl-reduce")?;

        let mut args: Vec<String> = Vec::new();
        if preserve_semantics {
            args.push("--preserve-semantics".to_owned());
        }
        args.push(input_shader_job.to_string());
        args.push("--output".to_owned());
        args.push(output_dir.to_string());
        args.push("--".to_owned());
        args.push(self.interestingness_test.to_string());
        args.push(metadata_path.to_string());

        let expression = duct::cmd(tool.as_str(), &args);
        let output = run_with_timeout("glsl-reduce", expression, self.timeout)?;
        write_log(output_dir, &output)?;
        if !output.success {
            tracing::warn!(%output_dir, "glsl-reduce returned nonzero exit");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_is_distinguishable_from_other_subprocess_failures() {
        let expression = duct::cmd("sleep", ["1"]);
        let result = run_with_timeout("sleep", expression, Duration::from_millis(10));
        match result {
            Err(GfautoError::Subprocess { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::TimedOut);
            }
            other => panic!("expected a timeout error, got {other:?}"),
        }
    }
}
