// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core fuzzing-loop, signature-classification, and binary-resolution logic
//! for an automated graphics-driver fuzzing and bug-triage pipeline.

pub mod binary;
pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod execution;
pub mod fuzz_loop;
pub mod metadata;
pub mod optimizer_args;
pub mod paths;
pub mod reduction;
pub mod shader_job;
pub mod signature;
pub mod status;
pub mod toolpath;

pub use error::{GfautoError, Result};
