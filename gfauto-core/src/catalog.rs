// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The built-in binary catalog.
//!
//! This is catalog *data*: concrete archive-set recipes for the tools gfauto
//! depends on, tagged by platform/arch/configuration.

use camino::Utf8PathBuf;

use crate::binary::{Archive, ArchiveSet, Binary, CatalogEntry};

pub const GLSLANG_VALIDATOR_NAME: &str = "glslangValidator";
pub const SPIRV_OPT_NAME: &str = "spirv-opt";
pub const SPIRV_VAL_NAME: &str = "spirv-val";
pub const SPIRV_DIS_NAME: &str = "spirv-dis";
pub const SPIRV_AS_NAME: &str = "spirv-as";
pub const SWIFT_SHADER_NAME: &str = "swift_shader_icd";

pub const SPIRV_OPT_NO_VALIDATE_AFTER_ALL_TAG: &str = "no-validate-after-all";

const PLATFORM_SUFFIXES_DEBUG: &[&str] = &["Linux_x64_Debug", "Windows_x64_Debug", "Mac_x64_Debug"];
const PLATFORM_SUFFIXES_RELEASE: &[&str] =
    &["Linux_x64_Release", "Windows_x64_Release", "Mac_x64_Release"];

/// Guesses the platform tag (`Linux`/`Mac`/`Windows`) embedded in a
/// `<os>_<arch>_<config>` platform suffix.
pub fn platform_from_suffix(platform_suffix: &str) -> Option<&'static str> {
    for platform in ["Linux", "Mac", "Windows"] {
        if platform_suffix.contains(platform) {
            return Some(platform);
        }
    }
    None
}

/// Appends the platform tag plus any configuration tags (`Release`, `Debug`,
/// `RelWithDebInfo`, `x64`) found in a platform suffix.
pub fn common_tags_from_suffix(platform_suffix: &str) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(platform) = platform_from_suffix(platform_suffix) {
        tags.push(platform.to_owned());
    }
    for tag in ["Release", "Debug", "RelWithDebInfo", "x64"] {
        if platform_suffix.contains(tag) {
            tags.push(tag.to_owned());
        }
    }
    tags
}

struct ToolSpec {
    name: &'static str,
    subpath: &'static str,
}

fn recipe_from_build_github_repo(
    project_name: &str,
    version_hash: &str,
    build_version_hash: &str,
    platform_suffixes: &[&str],
    tools: &[ToolSpec],
) -> Vec<CatalogEntry> {
    platform_suffixes
        .iter()
        .map(|platform_suffix| {
            let tags = common_tags_from_suffix(platform_suffix);
            let is_windows = tags.iter().any(|t| t == "Windows");
            let binaries = tools
                .iter()
                .map(|tool| {
                    let subpath = if is_windows {
                        format!("{}.exe", tool.subpath)
                    } else {
                        tool.subpath.to_owned()
                    };
                    Binary {
                        name: tool.name.to_owned(),
                        version: version_hash.to_owned(),
                        tags: tags.clone(),
                        path: Some(Utf8PathBuf::from(format!("{project_name}/{subpath}"))),
                    }
                })
                .collect();
            CatalogEntry {
                artifact_path: format!("//binaries/{project_name}_{version_hash}_{platform_suffix}"),
                archive_set: ArchiveSet {
                    archives: vec![Archive {
                        url: format!(
                            "https://github.com/paulthomson/build-{project_name}/releases/download/github/paulthomson/build-{project_name}/{build_version_hash}/build-{project_name}-{build_version_hash}-{platform_suffix}.zip"
                        ),
                        output_file: format!("{project_name}.zip"),
                        output_directory: project_name.to_owned(),
                    }],
                    binaries,
                },
            }
        })
        .collect()
}

fn spirv_tools_recipe(version_hash: &str, build_version_hash: &str) -> Vec<CatalogEntry> {
    let suffixes: Vec<&str> = PLATFORM_SUFFIXES_RELEASE
        .iter()
        .chain(PLATFORM_SUFFIXES_DEBUG)
        .copied()
        .collect();
    recipe_from_build_github_repo(
        "SPIRV-Tools",
        version_hash,
        build_version_hash,
        &suffixes,
        &[
            ToolSpec { name: SPIRV_AS_NAME, subpath: "bin/spirv-as" },
            ToolSpec { name: SPIRV_DIS_NAME, subpath: "bin/spirv-dis" },
            ToolSpec { name: SPIRV_OPT_NAME, subpath: "bin/spirv-opt" },
            ToolSpec { name: SPIRV_VAL_NAME, subpath: "bin/spirv-val" },
        ],
    )
}

fn glslang_recipe(version_hash: &str, build_version_hash: &str) -> Vec<CatalogEntry> {
    let suffixes: Vec<&str> = PLATFORM_SUFFIXES_RELEASE
        .iter()
        .chain(PLATFORM_SUFFIXES_DEBUG)
        .copied()
        .collect();
    recipe_from_build_github_repo(
        "glslang",
        version_hash,
        build_version_hash,
        &suffixes,
        &[ToolSpec { name: GLSLANG_VALIDATOR_NAME, subpath: "bin/glslangValidator" }],
    )
}

fn swift_shader_recipe(version_hash: &str, build_version_hash: &str) -> Vec<CatalogEntry> {
    let suffixes: Vec<&str> = PLATFORM_SUFFIXES_RELEASE
        .iter()
        .chain(PLATFORM_SUFFIXES_DEBUG)
        .copied()
        .collect();
    recipe_from_build_github_repo(
        "swiftshader",
        version_hash,
        build_version_hash,
        &suffixes,
        &[ToolSpec { name: SWIFT_SHADER_NAME, subpath: "lib/vk_swiftshader_icd.json" }],
    )
}

/// The default binary set new fuzzing sessions use absent any overrides.
pub fn default_binaries() -> Vec<Binary> {
    vec![
        Binary::new(GLSLANG_VALIDATOR_NAME, "9866ad9195cec8f266f16191fb4ec2ce4896e5c0", vec!["Debug".into()]),
        Binary::new(SPIRV_OPT_NAME, "4a00a80c40484a6f6f72f48c9d34943cf8f180d4", vec!["Debug".into()]),
        Binary::new(SPIRV_DIS_NAME, "4a00a80c40484a6f6f72f48c9d34943cf8f180d4", vec!["Debug".into()]),
        Binary::new(SPIRV_VAL_NAME, "4a00a80c40484a6f6f72f48c9d34943cf8f180d4", vec!["Debug".into()]),
        Binary::new(SWIFT_SHADER_NAME, "a0b3a02601da8c48012a4259d335be04d00818da", vec!["Debug".into()]),
    ]
}

/// All built-in archive-set recipes.
pub fn built_in_recipes() -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    entries.extend(spirv_tools_recipe(
        "4a00a80c40484a6f6f72f48c9d34943cf8f180d4",
        "422f2fe0f0f32494fa687a12ba343d24863b330a",
    ));
    entries.extend(glslang_recipe(
        "9866ad9195cec8f266f16191fb4ec2ce4896e5c0",
        "1586e566f4949b1957e7c32454cbf27e501ed632",
    ));
    entries.extend(swift_shader_recipe(
        "a0b3a02601da8c48012a4259d335be04d00818da",
        "08fb8d429272ef8eedb4d610943b9fe59d336dc6",
    ));
    entries.extend(spirv_tools_recipe(
        "1c1e749f0b51603032ed573acb5ee4cd6fee8d01",
        "7663d620a7fbdccb330d2baec138d0e3e096457c",
    ));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_guess_matches_suffix() {
        assert_eq!(platform_from_suffix("Linux_x64_Release"), Some("Linux"));
        assert_eq!(platform_from_suffix("Windows_x64_Debug"), Some("Windows"));
        assert_eq!(platform_from_suffix("Mac_x64_RelWithDebInfo"), Some("Mac"));
        assert_eq!(platform_from_suffix("bogus"), None);
    }

    #[test]
    fn common_tags_picks_up_config_and_arch() {
        let tags = common_tags_from_suffix("Linux_x64_Release");
        assert!(tags.contains(&"Linux".to_owned()));
        assert!(tags.contains(&"Release".to_owned()));
        assert!(tags.contains(&"x64".to_owned()));
    }

    #[test]
    fn built_in_recipes_cover_every_default_binary() {
        let recipes = built_in_recipes();
        for binary in default_binaries() {
            let found = recipes.iter().any(|entry| {
                entry
                    .archive_set
                    .binaries
                    .iter()
                    .any(|b| b.name == binary.name && b.version == binary.version)
            });
            assert!(found, "no recipe found for default binary {binary:?}");
        }
    }

    #[test]
    fn windows_binaries_get_exe_suffix() {
        let recipes = spirv_tools_recipe("V", "B");
        let windows_entry = recipes
            .iter()
            .find(|e| e.artifact_path.contains("Windows"))
            .unwrap();
        assert!(windows_entry
            .archive_set
            .binaries
            .iter()
            .all(|b| b.path.as_ref().unwrap().as_str().ends_with(".exe")));
    }
}
