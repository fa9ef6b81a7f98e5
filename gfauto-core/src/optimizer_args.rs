// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random `spirv-opt` argument generation for the `opt_rand{1,2,3}` presets.
//! Produces a `Vec<String>` of `spirv-opt` flags usable as-is on its command
//! line.

use rand::Rng;
use rand::seq::SliceRandom;

/// A representative sample of `spirv-opt`'s individual transformation passes.
/// Real gfauto draws from the tool's full `--help` pass list; this crate
/// carries a representative subset sufficient to exercise the optimizer in
/// varied combinations without depending on having `spirv-opt --help` output
/// available at build time.
const SINGLE_PASS_FLAGS: &[&str] = &[
    "--ccp",
    "--cfg-cleanup",
    "--combine-access-chains",
    "--convert-local-access-chains",
    "--dead-branch-elim",
    "--dead-insert-elim",
    "--eliminate-dead-code-aggressive",
    "--eliminate-dead-const",
    "--eliminate-dead-functions",
    "--eliminate-local-multi-store",
    "--eliminate-local-single-block",
    "--eliminate-local-single-store",
    "--flatten-decorations",
    "--fold-spec-const-op-composite",
    "--freeze-spec-const",
    "--if-conversion",
    "--inline-entry-points-exhaustive",
    "--local-redundancy-elimination",
    "--loop-invariant-code-motion",
    "--loop-unroll",
    "--merge-blocks",
    "--merge-return",
    "--private-to-local",
    "--reduce-load-size",
    "--redundancy-elimination",
    "--scalar-replacement",
    "--simplify-instructions",
    "--strength-reduction",
    "--vector-dce",
    "--workaround-1209",
];

/// Draws a random-length (1 to 8 flag) sequence of distinct `spirv-opt`
/// single-pass flags, in random order.
pub fn random_spirv_opt_args<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    let count = rng.random_range(1..=8).min(SINGLE_PASS_FLAGS.len());
    let mut pool = SINGLE_PASS_FLAGS.to_vec();
    pool.shuffle(rng);
    pool.into_iter().take(count).map(str::to_owned).collect()
}
