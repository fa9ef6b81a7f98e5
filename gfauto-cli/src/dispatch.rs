// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand definitions and the glue between parsed CLI flags and
//! `gfauto_core`'s orchestration types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use gfauto_core::binary::{Binary, BinaryManager};
use gfauto_core::config::GfautoConfig;
use gfauto_core::device::DeviceList;
use gfauto_core::error::{GfautoError, Result};
use gfauto_core::execution::ExecutionDriver;
use gfauto_core::fuzz_loop::{FuzzLoop, FuzzLoopConfig};
use gfauto_core::reduction::ReducerDriver;

use crate::tools::{DuctShaderReducer, DuctTools, DuctVariantGenerator};

#[derive(Debug, Parser)]
#[command(name = "gfauto", about = "Automated graphics-driver fuzzing and bug-triage pipeline")]
pub struct GfautoCli {
    /// Path to a TOML configuration file (spec Ambient Stack "Configuration").
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the fuzzing loop until interrupted.
    Fuzz {
        /// Override the configured master seed.
        #[arg(long)]
        master_seed: Option<u64>,
    },
    /// Resolve a single logical tool name to a concrete path and print it.
    ResolveBinary {
        /// The logical tool name, e.g. `spirv-opt`.
        name: String,
    },
    /// Print the crash-signature classification for a log file.
    Classify {
        /// Path to a log file to classify.
        log_file: Utf8PathBuf,
    },
}

impl GfautoCli {
    /// Runs the selected subcommand, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        let config = GfautoConfig::load(self.config.as_deref())?;

        match self.command {
            Command::Fuzz { master_seed } => run_fuzz(config, master_seed),
            Command::ResolveBinary { name } => run_resolve_binary(&config, &name),
            Command::Classify { log_file } => run_classify(&log_file),
        }
    }
}

fn binary_manager(config: &GfautoConfig) -> BinaryManager {
    let overrides: Vec<Binary> = gfauto_core::catalog::default_binaries();
    let catalog = gfauto_core::catalog::built_in_recipes();
    let artifacts_dir = config.temp_dir.join("artifacts");
    BinaryManager::new(overrides, catalog, artifacts_dir)
}

fn load_devices(devices_path: &Utf8Path) -> Result<DeviceList> {
    if !devices_path.exists() {
        tracing::warn!(%devices_path, "device list not found; starting with an empty roster");
        return Ok(DeviceList::default());
    }
    let text = std::fs::read_to_string(devices_path)
        .map_err(|source| GfautoError::Filesystem { path: devices_path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| GfautoError::MetadataParse {
        path: devices_path.to_path_buf(),
        source,
    })
}

fn run_fuzz(mut config: GfautoConfig, master_seed: Option<u64>) -> Result<i32> {
    if let Some(seed) = master_seed {
        config.master_seed = seed;
    }

    let devices = load_devices(&config.devices_path)?;
    let binaries = binary_manager(&config);

    let tools = DuctTools { timeout: config.tool_timeout };
    let generator = DuctVariantGenerator { timeout: config.tool_timeout };
    let reducer_impl = DuctShaderReducer {
        timeout: config.tool_timeout,
        interestingness_test: Utf8PathBuf::from("gfauto_interestingness_test"),
    };

    let execution = ExecutionDriver::new(&tools);
    let reducer = ReducerDriver::new(&reducer_impl)
        .with_fatal_on_incomplete_reduction(config.fatal_on_incomplete_reduction);

    let loop_config = FuzzLoopConfig {
        master_seed: config.master_seed,
        temp_dir: config.temp_dir.clone(),
        reports_dir: config.reports_dir.clone(),
        donors_dir: config.donors_dir.clone(),
        skip_policy: config.skip_policy,
    };

    let mut fuzz_loop = FuzzLoop::new(loop_config, devices, binaries, &generator, execution, reducer);

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_cancel = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        tracing::info!("received interrupt; stopping after the current iteration");
        handler_cancel.store(true, Ordering::Relaxed);
    })
    .expect("signal handler can only be installed once per process");

    fuzz_loop.run(&cancel)?;
    Ok(0)
}

fn run_resolve_binary(config: &GfautoConfig, name: &str) -> Result<i32> {
    let binaries = binary_manager(config);
    let (path, binary) = binaries.resolve_by_name(name)?;
    println!("{path} ({}@{})", binary.name, binary.version);
    Ok(0)
}

fn run_classify(log_file: &Utf8Path) -> Result<i32> {
    let text = std::fs::read_to_string(log_file)
        .map_err(|source| GfautoError::Filesystem { path: log_file.to_path_buf(), source })?;
    println!("{}", gfauto_core::signature::classify(&text));
    Ok(0)
}
