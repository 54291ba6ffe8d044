//! rule-enhancer - flavor dispatch, synthetic node injection and macro
//! expansion for build-target graphs
//!
//! This crate expands declarative JVM library and Robolectric test targets
//! into the concrete rule nodes that build them.

pub mod core;
pub mod enhance;
pub mod ops;
pub mod util;

/// Test utilities and mocks for unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides fake toolchains and universe builders.
#[cfg(test)]
pub mod test_support;

pub use core::{
    args::RuleArgs, dep_set::DepSet, flavor::Flavor, rule::RuleNode, target::BuildTarget,
};

pub use enhance::{EnhanceError, EnhancedGraph, Enhancer};
