// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Crash-Signature Classifier.
//!
//! A deterministic pattern cascade that collapses a free-form execution log
//! into a single canonical signature used for bucketing and deduplication.

use std::sync::LazyLock;

use regex::Regex;

const MAX_SPIRV_OPT_SIGNATURE_LEN: usize = 20;
const MAX_CATCHSEGV_SIGNATURE_LEN: usize = 50;

// E.g. error: line 0: Module contains unreachable blocks during merge return.
static SPIRV_OPT_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^error: line \d+: ([\w .'\-"]+)"#).unwrap());

// E.g. /data/local/tmp/graphicsfuzz/test.amber: 256: probe ssbo format does not match buffer format
static AMBER_ERROR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w: \d+: ([\w ]+)$").unwrap());

// E.g. ERROR: .../variant/shader.frag:549: 'variable indexing ...' : not supported ...
static GLSLANG_ERROR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+:\d+: '([\w ]+)'").unwrap());

// E.g. ... ((anonymous namespace)::Foo::Bar(int)+456)
//                               ::Bar(  <-- match, group 1 = Bar
static CPP_FUNCTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"::(\w+)\(").unwrap());

// E.g. /lib.so (myFunction+372)  or  /lib.so (myFunction(...)+372)
static C_FUNCTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\((\w+)(\+\d+\)|\()").unwrap());

// E.g. Backtrace:\n/path/spirv-opt(_ZN8spvtools3opt21StructuredCFGAnalysis...+0x369)[0x5bd6d9]
static CATCHSEGV_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Backtrace:\n.*/([^/(]*\([^)+]+)\+").unwrap());

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w]").unwrap());

fn strip_digits_and_normalize(raw: &str) -> String {
    let no_digits = DIGITS.replace_all(raw, "");
    NON_WORD.replace_all(&no_digits, "_").into_owned()
}

/// Classifies a free-form execution log into a canonical, filesystem-safe
/// signature string. Total, deterministic, pure: no I/O, no clock, no
/// randomness.
pub fn classify(log_text: &str) -> String {
    if log_text.contains("Shader compilation failed") {
        return "compile_error".to_owned();
    }

    if log_text.contains("Failed to link shaders") {
        return "link_error".to_owned();
    }

    if log_text.contains("Calling vkCreateGraphicsPipelines Fail") {
        return "pipeline_failure".to_owned();
    }

    if log_text.contains("Resource deadlock would occur") {
        return "Resource_deadlock_would_occur".to_owned();
    }

    if log_text.contains("error: line ") {
        for line in log_text.lines() {
            if let Some(captures) = SPIRV_OPT_ERROR.captures(line) {
                let group = strip_digits_and_normalize(&captures[1]);
                return group.chars().take(MAX_SPIRV_OPT_SIGNATURE_LEN).collect();
            }
        }
    }

    if log_text.contains("0 pass, 1 fail") {
        for line in log_text.lines() {
            if let Some(captures) = AMBER_ERROR.captures(line) {
                return strip_digits_and_normalize(&captures[1]);
            }
        }
    }

    if log_text.contains("SPIR-V is not generated for failed compile or link") {
        for line in log_text.lines() {
            if let Some(captures) = GLSLANG_ERROR.captures(line) {
                return strip_digits_and_normalize(&captures[1]);
            }
        }
    }

    if log_text.contains("#00 pc") {
        for line in log_text.lines() {
            let Some(pc_pos) = line.find("#00 pc") else {
                continue;
            };
            let line = &line[pc_pos..];

            if line.contains("/amber_ndk") {
                return "amber_ndk".to_owned();
            }

            if let Some(captures) = CPP_FUNCTION.captures(line) {
                return captures[1].to_owned();
            }

            if let Some(captures) = C_FUNCTION.captures(line) {
                return captures[1].to_owned();
            }

            break;
        }
    }

    if log_text.contains("Backtrace:") {
        if let Some(captures) = CATCHSEGV_FRAME.captures(log_text) {
            let group = NON_WORD.replace_all(&captures[1], "_");
            return group.chars().take(MAX_CATCHSEGV_SIGNATURE_LEN).collect();
        }
    }

    "no_signature".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex as TestRegex;

    static SIGNATURE_SHAPE: LazyLock<TestRegex> =
        LazyLock::new(|| TestRegex::new(r"^[A-Za-z0-9_]{1,50}$").unwrap());

    #[test]
    fn empty_log_has_no_signature() {
        assert_eq!(classify(""), "no_signature");
    }

    #[test]
    fn compile_error_wins_over_link_error_when_earlier() {
        let log = "Shader compilation failed\nFailed to link shaders";
        assert_eq!(classify(log), "compile_error");
    }

    #[test]
    fn link_error_detected_alone() {
        assert_eq!(classify("blah\nFailed to link shaders\nblah"), "link_error");
    }

    #[test]
    fn pipeline_failure_detected() {
        assert_eq!(
            classify("Calling vkCreateGraphicsPipelines Fail at foo.cc:123"),
            "pipeline_failure"
        );
    }

    #[test]
    fn resource_deadlock_detected() {
        assert_eq!(
            classify("fatal error: Resource deadlock would occur"),
            "Resource_deadlock_would_occur"
        );
    }

    #[test]
    fn spirv_opt_error_strips_digits_and_truncates() {
        let log = "error: line 0: Module contains unreachable blocks during merge return.  Run dead branch elimination before merge return.";
        assert_eq!(classify(log), "Module_contains_unre");
    }

    #[test]
    fn amber_probe_error_strips_digits() {
        let log = "0 pass, 1 fail\n/data/local/tmp/graphicsfuzz/test.amber: 256: probe ssbo format does not match buffer format";
        assert_eq!(classify(log), "probe_ssbo_format_does_not_match_buffer_format");
    }

    #[test]
    fn glslang_diagnostic_extracted() {
        let log = "SPIR-V is not generated for failed compile or link\nERROR: temp/x/variant/shader.frag:549: 'variable indexing fragment shader output array' : not supported with this profile: es";
        assert_eq!(classify(log), "variable_indexing_fragment_shader_output_array");
    }

    #[test]
    fn android_backtrace_cpp_function() {
        let log = "#00 pc 0000x /lib.so ((anonymous namespace)::Foo::Bar(int)+12)";
        assert_eq!(classify(log), "Bar");
    }

    #[test]
    fn android_backtrace_amber_ndk() {
        let log = "#00 pc 0000x /data/local/tmp/amber_ndk (main+20)";
        assert_eq!(classify(log), "amber_ndk");
    }

    #[test]
    fn android_backtrace_c_function() {
        let log = "#00 pc 0000x /lib.so (myFunction+372)";
        assert_eq!(classify(log), "myFunction");
    }

    #[test]
    fn catchsegv_backtrace_truncated_and_normalized() {
        let log = "Backtrace:\n/path/spirv-opt(_ZN8spvtools3opt21StructuredCFGAnalysisXYZ+0x5)";
        let sig = classify(log);
        assert_eq!(sig, "spirv_opt__ZN8spvtools3opt21StructuredCFGAnalysisX");
        assert!(sig.len() <= 50);
    }

    #[test]
    fn unrecognized_log_falls_back_to_no_signature() {
        assert_eq!(classify("some unrelated chatter"), "no_signature");
    }

    #[test]
    fn classify_is_deterministic() {
        let log = "error: line 7: Unreachable block 123 found!!";
        assert_eq!(classify(log), classify(log));
    }

    #[test]
    fn all_scenarios_match_filesystem_safe_shape() {
        let logs = [
            "",
            "Shader compilation failed",
            "Failed to link shaders",
            "Calling vkCreateGraphicsPipelines Fail",
            "Resource deadlock would occur",
            "error: line 0: Module contains unreachable blocks during merge return.",
            "0 pass, 1 fail\nfoo: 1: some weird message here",
            "SPIR-V is not generated for failed compile or link\nfoo:1: 'some diagnostic'",
            "#00 pc 0000x /lib.so ((anonymous namespace)::Foo::Bar(int)+12)",
            "Backtrace:\n/path/spirv-opt(_ZN8spvtools3opt21StructuredCFGAnalysisXYZ+0x5)",
            "nonsense",
        ];
        for log in logs {
            let sig = classify(log);
            assert!(
                SIGNATURE_SHAPE.is_match(&sig),
                "signature {sig:?} for log {log:?} does not match expected shape"
            );
        }
    }
}
