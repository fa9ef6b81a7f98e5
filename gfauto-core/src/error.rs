// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types produced by gfauto-core.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::binary::Binary;

/// Top-level error type returned by the public API of this crate.
#[derive(Debug, Error)]
pub enum GfautoError {
    /// No descriptor with the requested name exists in the effective override list.
    #[error("no binary named `{name}` in the override list")]
    BinaryNotFound {
        /// The logical tool name that was requested.
        name: String,
    },

    /// A descriptor was found by name, but no catalog entry matched its
    /// `(name, version, tags)` under the active platform.
    #[error("no catalog entry matches binary: {binary:?}")]
    BinaryPathNotFound {
        /// The descriptor that failed to resolve.
        binary: Box<Binary>,
    },

    /// An external tool could not be found on `PATH`.
    #[error("could not find `{tool}` on PATH")]
    ToolNotOnPath {
        /// The tool name that was searched for.
        tool: String,
    },

    /// An external tool invocation failed (nonzero exit, spawn failure, or timeout).
    #[error("subprocess `{program}` failed")]
    Subprocess {
        /// The program that was invoked.
        program: String,
        /// The underlying I/O or exit-status error.
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation failed. Surfaced fatally; no retry.
    #[error("filesystem error at `{path}`")]
    Filesystem {
        /// The path the operation was attempted against.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The reducer did not produce a final reduced shader job.
    #[error("reduction of `{test_dir}` produced no shader_reduced_final.json")]
    ReductionIncomplete {
        /// The test directory that was being reduced.
        test_dir: Utf8PathBuf,
    },

    /// A reduction was requested without a crash signature or device, violating a precondition.
    #[error("cannot reduce `{test_dir}`: {reason}")]
    ReductionPrecondition {
        /// The test directory that was being reduced.
        test_dir: Utf8PathBuf,
        /// Why the precondition failed.
        reason: &'static str,
    },

    /// A test metadata file could not be parsed.
    #[error("failed to parse test metadata at `{path}`")]
    MetadataParse {
        /// The metadata file path.
        path: Utf8PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration could not be loaded.
    #[error("failed to load configuration")]
    Config(#[from] config::ConfigError),

    /// No donor shader jobs were found under the configured donors directory.
    #[error("no donor shader jobs found under `{donors_dir}`")]
    EmptyDonorCorpus {
        /// The directory that was searched.
        donors_dir: Utf8PathBuf,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GfautoError>;

pub(crate) fn fs_err(path: &camino::Utf8Path, source: std::io::Error) -> GfautoError {
    GfautoError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}
