// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `PATH`-based tool lookup for tools not routed through the
//! [`crate::binary::BinaryManager`] (e.g. `glsl-reduce`, `generate`).

use camino::Utf8PathBuf;

use crate::error::{GfautoError, Result};

/// Searches `PATH` for `tool`, returning its resolved path.
pub fn tool_on_path(tool: &str) -> Result<Utf8PathBuf> {
    let path_var = std::env::var_os("PATH").ok_or_else(|| GfautoError::ToolNotOnPath {
        tool: tool.to_owned(),
    })?;

    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Utf8PathBuf::try_from(candidate).map_err(|_| GfautoError::ToolNotOnPath {
                tool: tool.to_owned(),
            });
        }
        #[cfg(windows)]
        {
            let with_exe = dir.join(format!("{tool}.exe"));
            if with_exe.is_file() {
                return Utf8PathBuf::try_from(with_exe).map_err(|_| GfautoError::ToolNotOnPath {
                    tool: tool.to_owned(),
                });
            }
        }
    }

    Err(GfautoError::ToolNotOnPath { tool: tool.to_owned() })
}
