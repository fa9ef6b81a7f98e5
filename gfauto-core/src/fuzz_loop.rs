// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Fuzzing Loop & Test Lifecycle Orchestrator.
//!
//! End-to-end: synthesize a variant → fork optimizer presets → run them on
//! every active device → classify and report crashes → reduce each report.

use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::binary::BinaryManager;
use crate::device::DeviceList;
use crate::error::Result;
use crate::execution::ExecutionDriver;
use crate::metadata::TestMetadata;
use crate::optimizer_args::random_spirv_opt_args;
use crate::reduction::ReducerDriver;
use crate::shader_job::ShaderJob;
use crate::signature::classify;
use crate::status::{ReportBucket, Status};

/// Whether to keep trying optimizer presets after one has already produced a
/// report for this iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipPolicy {
    /// Stop at the first preset that produces a report. The default.
    StopAtFirstReport,
    /// Run every preset regardless of earlier reports, trading coverage
    /// breadth for more duplicate reports of the same underlying bug.
    RunAllPresets,
}

/// One of the six fixed optimizer-argument configurations forked per variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Preset {
    pub suffix: &'static str,
    pub spirv_opt_args: Option<Vec<String>>,
}

fn fixed_presets(rng: &mut StdRng) -> Vec<Preset> {
    vec![
        Preset { suffix: "no_opt", spirv_opt_args: None },
        Preset { suffix: "opt_O", spirv_opt_args: Some(vec!["-O".to_owned()]) },
        Preset { suffix: "opt_Os", spirv_opt_args: Some(vec!["-Os".to_owned()]) },
        Preset { suffix: "opt_rand1", spirv_opt_args: Some(random_spirv_opt_args(rng)) },
        Preset { suffix: "opt_rand2", spirv_opt_args: Some(random_spirv_opt_args(rng)) },
        Preset { suffix: "opt_rand3", spirv_opt_args: Some(random_spirv_opt_args(rng)) },
    ]
}

/// Generates a variant shader job from a reference donor and a random seed.
pub trait VariantGenerator: Send + Sync {
    fn generate(
        &self,
        reference: &ShaderJob,
        donors_dir: &Utf8Path,
        out_shader_json: &Utf8Path,
        seed: i64,
    ) -> Result<()>;
}

/// Static, fixed configuration for one `FuzzLoop` run.
#[derive(Clone, Debug)]
pub struct FuzzLoopConfig {
    pub master_seed: u64,
    pub temp_dir: Utf8PathBuf,
    pub reports_dir: Utf8PathBuf,
    pub donors_dir: Utf8PathBuf,
    pub skip_policy: SkipPolicy,
}

impl Default for FuzzLoopConfig {
    fn default() -> Self {
        Self {
            master_seed: 0,
            temp_dir: Utf8PathBuf::from("temp"),
            reports_dir: Utf8PathBuf::from("reports"),
            donors_dir: Utf8PathBuf::from("donors"),
            skip_policy: SkipPolicy::StopAtFirstReport,
        }
    }
}

/// Returns every `shader.json` under `donors_dir` that has at least one
/// stage sibling.
pub fn find_donor_corpus(donors_dir: &Utf8Path) -> Vec<ShaderJob> {
    let mut donors: Vec<ShaderJob> = walkdir::WalkDir::new(donors_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str() == Some(crate::paths::SHADER_JOB_FILE))
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .map(ShaderJob::new)
        .filter(|job| !job.related_files_with_suffixes(&[".vert", ".frag", ".comp"]).is_empty())
        .collect();
    // Deterministic ordering so a fixed master seed reproduces the same
    // sequence of donor picks regardless of filesystem iteration order.
    donors.sort_by(|a, b| a.manifest.cmp(&b.manifest));
    donors
}

/// 128-bit random identifier, hex-encoded.
fn random_test_name(rng: &mut StdRng) -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().simple().to_string()
}

/// Orchestrates one or more fuzzing iterations.
pub struct FuzzLoop<'a> {
    config: FuzzLoopConfig,
    rng: StdRng,
    devices: DeviceList,
    binaries: BinaryManager,
    generator: &'a dyn VariantGenerator,
    execution: ExecutionDriver<'a>,
    reducer: ReducerDriver<'a>,
}

/// What one iteration did, returned for observability and tests.
#[derive(Debug, Default)]
pub struct IterationOutcome {
    pub test_name: String,
    pub report_dirs: Vec<Utf8PathBuf>,
    pub presets_run: usize,
}

impl<'a> FuzzLoop<'a> {
    pub fn new(
        config: FuzzLoopConfig,
        devices: DeviceList,
        binaries: BinaryManager,
        generator: &'a dyn VariantGenerator,
        execution: ExecutionDriver<'a>,
        reducer: ReducerDriver<'a>,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.master_seed);
        Self {
            config,
            rng,
            devices,
            binaries,
            generator,
            execution,
            reducer,
        }
    }

    /// Runs iterations until `cancel` is set, checked at the top of each
    /// iteration. Never corrupts a partially-written report: each report is
    /// written to a temp name and renamed into place only once fully
    /// populated.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<()> {
        while !cancel.load(Ordering::Relaxed) {
            self.run_iteration()?;
        }
        Ok(())
    }

    /// Runs exactly one fuzzing iteration.
    pub fn run_iteration(&mut self) -> Result<IterationOutcome> {
        let donors = find_donor_corpus(&self.config.donors_dir);
        if donors.is_empty() {
            return Err(crate::error::GfautoError::EmptyDonorCorpus {
                donors_dir: self.config.donors_dir.clone(),
            });
        }
        let reference = donors[self.rng.random_range(0..donors.len())].clone();

        let test_name = random_test_name(&mut self.rng);
        let test_dir = self.config.temp_dir.join(&test_name);
        let base_source_dir = crate::paths::base_source_dir(&test_dir);

        let reference_dest = base_source_dir.join(crate::paths::REFERENCE_DIR).join(crate::paths::SHADER_JOB_FILE);
        reference.copy_to(&reference_dest)?;

        let seed = self.rng.random_range(i64::from(i32::MIN)..=i64::from(i32::MAX));

        let variant_dir = base_source_dir.join(crate::paths::VARIANT_DIR);
        crate::paths::mkdirs_p(&variant_dir)?;
        let variant_manifest = variant_dir.join(crate::paths::SHADER_JOB_FILE);
        self.generator.generate(&reference, &self.config.donors_dir, &variant_manifest, seed)?;

        let presets = fixed_presets(&mut self.rng);
        let mut outcome = IterationOutcome {
            test_name: test_name.clone(),
            report_dirs: Vec::new(),
            presets_run: 0,
        };

        for preset in presets {
            let sibling_dir = self.config.temp_dir.join(format!("{test_name}_{}_test", preset.suffix));
            self.make_subtest(&base_source_dir, &sibling_dir, preset.spirv_opt_args.clone())?;

            let report_dirs = self.handle_test(&sibling_dir, &test_name)?;
            outcome.presets_run += 1;
            let produced_report = !report_dirs.is_empty();
            outcome.report_dirs.extend(report_dirs);

            if produced_report && self.config.skip_policy == SkipPolicy::StopAtFirstReport {
                break;
            }
        }

        Ok(outcome)
    }

    /// Creates one sibling test directory by copying `base_source_dir` into
    /// `source/` and writing fresh metadata.
    fn make_subtest(
        &self,
        base_source_dir: &Utf8Path,
        subtest_dir: &Utf8Path,
        spirv_opt_args: Option<Vec<String>>,
    ) -> Result<()> {
        crate::paths::copy_dir(base_source_dir, &subtest_dir.join(crate::paths::SOURCE_DIR))?;
        TestMetadata::glsl(spirv_opt_args).write_to_test_dir(subtest_dir)
    }

    /// Runs one sibling test on every active device, classifies and reports
    /// crashes, and reduces each report.
    fn handle_test(&self, test_dir: &Utf8Path, test_name: &str) -> Result<Vec<Utf8PathBuf>> {
        let metadata = TestMetadata::read_from_test_dir(test_dir)?;
        let test_glsl = match &metadata.kind {
            crate::metadata::TestKind::Glsl(glsl) => glsl,
        };

        let shader_job = ShaderJob::new(crate::paths::test_shader_job_path(test_dir, true));
        let binaries = self.binaries.child_with_overrides(metadata.binaries_for_resolution());

        // Run on all devices, in roster order.
        for device in self.devices.active_devices() {
            let output_dir = crate::paths::results_dir(test_dir, &device.name, true);
            let status = self.execution.run(&shader_job, &output_dir, test_glsl, device, &binaries)?;

            if device.is_preprocess() && status == Status::HostCrash {
                // No need to run on real devices if the preprocess device failed.
                break;
            }
        }

        let mut report_dirs = Vec::new();

        for device in self.devices.active_devices() {
            let output_dir = crate::paths::results_dir(test_dir, &device.name, true);
            let status = Status::read(&output_dir);

            let Some(bucket) = ReportBucket::for_status(status) else {
                continue;
            };

            let log_contents = crate::paths::read_text_or_else(&crate::paths::log_path(&output_dir), "");
            let signature = classify(&log_contents);

            // The device name is included because the same signature can
            // recur across devices (e.g. "compile_error").
            let report_dir = crate::paths::report_dir(
                &self.config.reports_dir,
                bucket,
                &signature,
                test_name,
                &device.name,
            );
            let partial = self.config.reports_dir.join(format!(".partial-{}", uuid_like_suffix()));
            crate::paths::copy_dir(&output_dir, &partial)?;

            let mut report_metadata = TestMetadata::read_from_test_dir(test_dir)?;
            report_metadata.crash_signature = signature;
            report_metadata.device = Some(device.clone());
            report_metadata.write_to_test_dir(&partial)?;

            crate::paths::publish_dir(&partial, &report_dir)?;
            report_dirs.push(report_dir);
        }

        for report_dir in &report_dirs {
            self.reducer.run_two_pass_reduction(report_dir, None)?;
        }

        Ok(report_dirs)
    }
}

fn uuid_like_suffix() -> String {
    use rand::RngCore;
    let mut rng = rand::rng();
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().simple().to_string()
}
