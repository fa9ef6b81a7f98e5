// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The canonical on-disk layout and small filesystem helpers.

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{fs_err, Result};

pub const REFERENCE_DIR: &str = "reference";
pub const VARIANT_DIR: &str = "variant";
pub const SHADER_JOB_FILE: &str = "shader.json";
pub const BASE_SOURCE_DIR: &str = "base_source";
pub const SOURCE_DIR: &str = "source";
pub const RESULTS_DIR: &str = "results";
pub const REDUCTIONS_DIR: &str = "reductions";
pub const REDUCTION_WORK_DIR: &str = "reduction_work";
pub const BEST_REDUCTION_NAME: &str = "best";

/// `<temp>/<test-name>/base_source`
pub fn base_source_dir(test_dir: &Utf8Path) -> Utf8PathBuf {
    test_dir.join(BASE_SOURCE_DIR)
}

/// `<test-dir>/source/<reference|variant>/shader.json`
pub fn test_shader_job_path(test_dir: &Utf8Path, is_variant: bool) -> Utf8PathBuf {
    test_dir
        .join(SOURCE_DIR)
        .join(if is_variant { VARIANT_DIR } else { REFERENCE_DIR })
        .join(SHADER_JOB_FILE)
}

/// `<test-dir>/results/<device-name>`
pub fn device_dir(test_dir: &Utf8Path, device_name: &str) -> Utf8PathBuf {
    test_dir.join(RESULTS_DIR).join(device_name)
}

/// `<test-dir>/results/<device-name>/<reference|variant>`
pub fn results_dir(test_dir: &Utf8Path, device_name: &str, is_variant: bool) -> Utf8PathBuf {
    device_dir(test_dir, device_name).join(if is_variant { VARIANT_DIR } else { REFERENCE_DIR })
}

/// `<test-dir>/results/<device-name>/reductions/<reduction-name>`
pub fn reduced_test_dir(test_dir: &Utf8Path, device_name: &str, reduction_name: &str) -> Utf8PathBuf {
    device_dir(test_dir, device_name)
        .join(REDUCTIONS_DIR)
        .join(reduction_name)
}

/// `<reduced-test-dir>/reduction_work/<reference|variant>`
pub fn reduction_work_dir(reduced_test_dir: &Utf8Path, is_variant: bool) -> Utf8PathBuf {
    reduced_test_dir
        .join(REDUCTION_WORK_DIR)
        .join(if is_variant { VARIANT_DIR } else { REFERENCE_DIR })
}

/// `<result-dir>/STATUS`
pub fn status_path(result_dir: &Utf8Path) -> Utf8PathBuf {
    result_dir.join("STATUS")
}

/// `<result-dir>/log.txt`
pub fn log_path(result_dir: &Utf8Path) -> Utf8PathBuf {
    result_dir.join("log.txt")
}

/// `<result-dir>/amber_log.txt`
pub fn amber_log_path(result_dir: &Utf8Path) -> Utf8PathBuf {
    result_dir.join("amber_log.txt")
}

/// `<test-dir>/test.json`, the serialized [`crate::metadata::TestMetadata`].
pub fn metadata_path(test_dir: &Utf8Path) -> Utf8PathBuf {
    test_dir.join(SOURCE_DIR).join("test.json")
}

/// `reports/<bucket>/<signature>/<test-name>_<device-name>`
pub fn report_dir(
    reports_dir: &Utf8Path,
    bucket: crate::status::ReportBucket,
    signature: &str,
    test_name: &str,
    device_name: &str,
) -> Utf8PathBuf {
    reports_dir
        .join(bucket.dir_name())
        .join(signature)
        .join(format!("{test_name}_{device_name}"))
}

pub fn mkdirs_p(path: &Utf8Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| fs_err(path, e))
}

fn mkdirs_parent(file: &Utf8Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        mkdirs_p(parent)?;
    }
    Ok(())
}

pub fn write_text(file: &Utf8Path, text: &str) -> Result<()> {
    mkdirs_parent(file)?;
    std::fs::write(file, text).map_err(|e| fs_err(file, e))
}

pub fn read_text_or_else(file: &Utf8Path, default: &str) -> String {
    std::fs::read_to_string(file).unwrap_or_else(|_| default.to_owned())
}

/// Recursively copies `src` into `dst`, creating `dst` if needed. Mirrors the
/// original's `copy_dir`, used to populate `source/` from `base_source/` and
/// to copy a result directory into the reports tree.
pub fn copy_dir(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    mkdirs_p(dst)?;
    for entry in std::fs::read_dir(src).map_err(|e| fs_err(src, e))? {
        let entry = entry.map_err(|e| fs_err(src, e))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let src_child = src.join(file_name.as_ref());
        let dst_child = dst.join(file_name.as_ref());
        let file_type = entry.file_type().map_err(|e| fs_err(&src_child, e))?;
        if file_type.is_dir() {
            copy_dir(&src_child, &dst_child)?;
        } else {
            mkdirs_parent(&dst_child)?;
            std::fs::copy(&src_child, &dst_child).map_err(|e| fs_err(&src_child, e))?;
        }
    }
    Ok(())
}

/// Moves `src` to `dst` via rename, falling back to copy-then-remove across
/// filesystem boundaries (temp dirs and report dirs may live on different
/// mounts in CI).
pub fn move_dir(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    mkdirs_parent(dst)?;
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_dir(src, dst)?;
    std::fs::remove_dir_all(src).map_err(|e| fs_err(src, e))
}

/// Renames a fully-populated temp directory into its final report path,
/// atomically with respect to readers of `dst`'s parent.
pub fn publish_dir(partial: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    mkdirs_parent(dst)?;
    std::fs::rename(partial, dst).map_err(|e| fs_err(partial, e))
}
