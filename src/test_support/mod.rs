//! Test utilities and mocks for rule-enhancer unit tests.
//!
//! Provides stand-ins for the collaborators the pipeline talks to: a
//! toolchain that records what it was asked to compile, one that always
//! fails, and builders for universes and argument bundles.
//!
//! # Example
//!
//! ```rust,ignore
//! use rule_enhancer::test_support::{t, FixtureUniverse, RecordingToolchain};
//!
//! #[test]
//! fn test_example() {
//!     let universe = FixtureUniverse::new().android_resource("//res:strings").build();
//!     let toolchain = Arc::new(RecordingToolchain::default());
//!     // Build an Enhancer around them...
//! }
//! ```

pub mod fixtures;

use std::sync::Mutex;

use anyhow::anyhow;

use crate::core::args::{LibraryArgs, RuleArgs, TestArgs};
use crate::core::target::BuildTarget;
use crate::enhance::toolchain::{
    CompileRequest, CompiledArtifactRef, ToolchainError, ToolchainInvoker,
};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Parse a target label, panicking on malformed input.
pub fn t(label: &str) -> BuildTarget {
    BuildTarget::parse(label).unwrap_or_else(|e| panic!("bad test label {label}: {e}"))
}

/// An `android_library` bundle with the given declared deps.
pub fn library(label: &str, deps: &[&str]) -> RuleArgs {
    RuleArgs::AndroidLibrary(LibraryArgs::new(t(label)).with_deps(deps.iter().map(|d| t(d))))
}

/// A `robolectric_test` bundle with one source and the given deps.
pub fn robolectric_test(label: &str, deps: &[&str]) -> TestArgs {
    TestArgs::new(
        LibraryArgs::new(t(label))
            .with_srcs(["src/test/ExampleTest.java"])
            .with_deps(deps.iter().map(|d| t(d))),
    )
}

/// Toolchain that plans jars and records every request.
#[derive(Debug, Default)]
pub struct RecordingToolchain {
    requests: Mutex<Vec<(BuildTarget, Vec<BuildTarget>)>>,
}

impl RecordingToolchain {
    /// Recorded `(target, classpath)` pairs in call order.
    pub fn requests(&self) -> Vec<(BuildTarget, Vec<BuildTarget>)> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of compiles requested for `target`.
    pub fn compiles_of(&self, target: &BuildTarget) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == target)
            .count()
    }
}

impl ToolchainInvoker for RecordingToolchain {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledArtifactRef, ToolchainError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.target, request.classpath.clone()));
        Ok(CompiledArtifactRef::jar_for(request.target))
    }
}

/// Toolchain that rejects every compile.
#[derive(Debug, Clone)]
pub struct FailingToolchain {
    message: String,
}

impl FailingToolchain {
    pub fn new(message: impl Into<String>) -> Self {
        FailingToolchain {
            message: message.into(),
        }
    }
}

impl ToolchainInvoker for FailingToolchain {
    fn compile(&self, _request: &CompileRequest<'_>) -> Result<CompiledArtifactRef, ToolchainError> {
        Err(anyhow!("{}", self.message).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::enhance::compiler::{CompilerInvocation, CompilerOptions};

    #[test]
    fn test_recording_toolchain() {
        let toolchain = RecordingToolchain::default();
        let srcs = BTreeSet::new();
        let invocation = CompilerInvocation::Javac {
            options: CompilerOptions::default(),
        };
        let request = CompileRequest {
            target: t("//a:a"),
            srcs: &srcs,
            classpath: vec![t("//b:b")],
            invocation: &invocation,
        };

        toolchain.compile(&request).unwrap();
        assert_eq!(toolchain.requests(), vec![(t("//a:a"), vec![t("//b:b")])]);
        assert_eq!(toolchain.compiles_of(&t("//a:a")), 1);

        let err = FailingToolchain::new("boom").compile(&request).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
