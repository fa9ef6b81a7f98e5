// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shader job abstraction.
//!
//! An on-disk bundle: a JSON manifest `shader.json` plus zero or more sibling
//! stage files with well-known suffixes. The set of sibling files is the
//! transitive closure of the manifest's stem; operations on a shader job act
//! on all siblings atomically.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{fs_err, Result};

/// Well-known shader-stage and derived-artifact suffixes that belong to a
/// shader job's sibling set.
pub const STAGE_SUFFIXES: &[&str] = &[
    ".vert",
    ".frag",
    ".comp",
    ".vert.asm",
    ".frag.asm",
    ".comp.asm",
    ".vert.opt.asm",
    ".frag.opt.asm",
    ".comp.opt.asm",
    ".vert.spv",
    ".frag.spv",
    ".comp.spv",
    ".vert.opt.spv",
    ".frag.opt.spv",
    ".comp.opt.spv",
];

pub const EXT_COMP: &str = ".comp";

/// A shader job located at a `shader.json` manifest path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShaderJob {
    /// Path to the `shader.json` manifest.
    pub manifest: Utf8PathBuf,
}

impl ShaderJob {
    pub fn new(manifest: impl Into<Utf8PathBuf>) -> Self {
        Self { manifest: manifest.into() }
    }

    fn stem_path(&self) -> Utf8PathBuf {
        // "foo/shader.json" -> "foo/shader"
        let file_stem = self.manifest.file_stem().unwrap_or("shader");
        self.manifest
            .parent()
            .map(|p| p.join(file_stem))
            .unwrap_or_else(|| Utf8PathBuf::from(file_stem))
    }

    /// Returns every sibling file that actually exists on disk: the manifest
    /// itself plus any `<stem><suffix>` file for a well-known suffix.
    pub fn related_files(&self) -> Vec<Utf8PathBuf> {
        let mut files = Vec::new();
        if self.manifest.exists() {
            files.push(self.manifest.clone());
        }
        let stem = self.stem_path();
        for suffix in STAGE_SUFFIXES {
            let candidate = Utf8PathBuf::from(format!("{stem}{suffix}"));
            if candidate.exists() {
                files.push(candidate);
            }
        }
        files
    }

    /// Returns related files restricted to the given suffixes, mirroring
    /// `shader_job_get_related_files(shader_job, [EXT_COMP])`'s use in the
    /// original to detect compute shaders.
    pub fn related_files_with_suffixes(&self, suffixes: &[&str]) -> Vec<Utf8PathBuf> {
        let stem = self.stem_path();
        suffixes
            .iter()
            .map(|suffix| Utf8PathBuf::from(format!("{stem}{suffix}")))
            .filter(|p| p.exists())
            .collect()
    }

    /// True iff this shader job has a compute-stage sibling.
    pub fn is_compute(&self) -> bool {
        !self.related_files_with_suffixes(&[EXT_COMP]).is_empty()
    }

    /// Copies this shader job (manifest plus every existing sibling) to
    /// `dest_manifest`, preserving each sibling's suffix. Returns the copied
    /// job, whose sibling set is the same set of suffixes as the source.
    pub fn copy_to(&self, dest_manifest: &Utf8Path) -> Result<ShaderJob> {
        let dest_stem = {
            let file_stem = dest_manifest.file_stem().unwrap_or("shader");
            dest_manifest
                .parent()
                .map(|p| p.join(file_stem))
                .unwrap_or_else(|| Utf8PathBuf::from(file_stem))
        };
        if let Some(parent) = dest_manifest.parent() {
            crate::paths::mkdirs_p(parent)?;
        }
        for src in self.related_files() {
            let suffix = src
                .as_str()
                .strip_prefix(self.stem_path().as_str())
                .unwrap_or("");
            let dst = Utf8PathBuf::from(format!("{dest_stem}{suffix}"));
            std::fs::copy(&src, &dst).map_err(|e| fs_err(&src, e))?;
        }
        Ok(ShaderJob::new(dest_manifest.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;

    #[test]
    fn related_files_includes_only_existing_siblings() {
        let dir = tempdir().unwrap();
        crate::paths::write_text(&dir.path().join("shader.json"), "{}").unwrap();
        crate::paths::write_text(&dir.path().join("shader.frag"), "void main(){}").unwrap();
        let job = ShaderJob::new(dir.path().join("shader.json"));
        let related = job.related_files();
        assert_eq!(related.len(), 2);
        assert!(related.iter().any(|p| p.as_str().ends_with("shader.frag")));
    }

    #[test]
    fn is_compute_detects_comp_sibling() {
        let dir = tempdir().unwrap();
        crate::paths::write_text(&dir.path().join("shader.json"), "{}").unwrap();
        crate::paths::write_text(&dir.path().join("shader.comp"), "void main(){}").unwrap();
        let job = ShaderJob::new(dir.path().join("shader.json"));
        assert!(job.is_compute());
    }

    #[test]
    fn graphics_job_is_not_compute() {
        let dir = tempdir().unwrap();
        crate::paths::write_text(&dir.path().join("shader.json"), "{}").unwrap();
        crate::paths::write_text(&dir.path().join("shader.frag"), "void main(){}").unwrap();
        let job = ShaderJob::new(dir.path().join("shader.json"));
        assert!(!job.is_compute());
    }

    #[test]
    fn copy_preserves_sibling_suffix_set() {
        let src_dir = tempdir().unwrap();
        crate::paths::write_text(&src_dir.path().join("shader.json"), "{}").unwrap();
        crate::paths::write_text(&src_dir.path().join("shader.frag"), "a").unwrap();
        crate::paths::write_text(&src_dir.path().join("shader.vert"), "b").unwrap();
        let job = ShaderJob::new(src_dir.path().join("shader.json"));

        let dst_dir = tempdir().unwrap();
        let copied = job.copy_to(&dst_dir.path().join("shader.json")).unwrap();

        let src_suffixes: std::collections::BTreeSet<_> = job
            .related_files()
            .iter()
            .map(|p| p.extension().unwrap_or("").to_owned())
            .collect();
        let dst_suffixes: std::collections::BTreeSet<_> = copied
            .related_files()
            .iter()
            .map(|p| p.extension().unwrap_or("").to_owned())
            .collect();
        assert_eq!(src_suffixes, dst_suffixes);
    }
}
