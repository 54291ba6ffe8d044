//! Collaborator seams: compiling libraries and locating their outputs.
//!
//! The enhancement pipeline never runs a compiler and never touches the
//! filesystem. It hands resolved, immutable inputs to a `ToolchainInvoker`
//! and asks an `OutputPathProvider` where artifacts will live.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::target::BuildTarget;
use crate::enhance::compiler::CompilerInvocation;

/// Opaque failure reported by a toolchain. Passed through unmodified.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ToolchainError(#[from] anyhow::Error);

/// Reference to the artifact a compile produces, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompiledArtifactRef {
    target: BuildTarget,
    relative_path: PathBuf,
}

impl CompiledArtifactRef {
    pub fn new(target: BuildTarget, relative_path: impl Into<PathBuf>) -> Self {
        CompiledArtifactRef {
            target,
            relative_path: relative_path.into(),
        }
    }

    /// The conventional jar location for a compiled JVM target:
    /// `<package>/lib__<name>__output/<name>.jar`, flavors included in `<name>`.
    pub fn jar_for(target: BuildTarget) -> Self {
        let name = flavored_name(&target);
        let relative_path = Path::new(target.package())
            .join(format!("lib__{}__output", name))
            .join(format!("{}.jar", name));
        CompiledArtifactRef::new(target, relative_path)
    }

    pub fn target(&self) -> BuildTarget {
        self.target
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}

/// `name#flavor,...` without the package part.
pub(crate) fn flavored_name(target: &BuildTarget) -> String {
    let full = target.to_string();
    match full.rsplit_once(':') {
        Some((_, name)) => name.to_string(),
        None => full,
    }
}

/// A request to compile one library.
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub target: BuildTarget,
    pub srcs: &'a BTreeSet<String>,
    /// Classpath entries, declared deps first
    pub classpath: Vec<BuildTarget>,
    pub invocation: &'a CompilerInvocation,
}

/// Compiles a library (or plans its compilation).
pub trait ToolchainInvoker: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledArtifactRef, ToolchainError>;
}

/// Supplies the materialized output path of an artifact.
pub trait OutputPathProvider: Send + Sync {
    fn output_path(&self, artifact: &CompiledArtifactRef) -> PathBuf;

    /// Scratch directory owned by `target` for generated files.
    fn gen_dir(&self, target: &BuildTarget) -> PathBuf;
}

/// Toolchain that only works out where each jar will be written.
///
/// Used when the graph is planned ahead of execution (and by the CLI).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannedToolchain;

impl ToolchainInvoker for PlannedToolchain {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledArtifactRef, ToolchainError> {
        tracing::trace!(
            "planning compile of {} ({} sources, {} classpath entries)",
            request.target,
            request.srcs.len(),
            request.classpath.len()
        );
        Ok(CompiledArtifactRef::jar_for(request.target))
    }
}

/// `buck-out` style layout: `<root>/gen/<relative path>`.
#[derive(Debug, Clone)]
pub struct BuckOutPaths {
    root: PathBuf,
}

impl BuckOutPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BuckOutPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputPathProvider for BuckOutPaths {
    fn output_path(&self, artifact: &CompiledArtifactRef) -> PathBuf {
        self.root.join("gen").join(artifact.relative_path())
    }

    fn gen_dir(&self, target: &BuildTarget) -> PathBuf {
        self.root
            .join("gen")
            .join(target.package())
            .join(format!("__{}__", flavored_name(target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flavor::Flavor;

    #[test]
    fn test_jar_location_includes_flavors() {
        let target = BuildTarget::parse("//app/tests:unit")
            .unwrap()
            .with_flavor(Flavor::CompiledTests);
        let artifact = CompiledArtifactRef::jar_for(target);

        assert_eq!(
            artifact.relative_path(),
            Path::new("app/tests/lib__unit#compiled-tests__output/unit#compiled-tests.jar")
        );
    }

    #[test]
    fn test_buck_out_paths() {
        let paths = BuckOutPaths::new("/repo/buck-out");
        let target = BuildTarget::parse("//lib:core").unwrap();

        assert_eq!(
            paths.output_path(&CompiledArtifactRef::jar_for(target)),
            PathBuf::from("/repo/buck-out/gen/lib/lib__core__output/core.jar")
        );
        assert_eq!(
            paths.gen_dir(&target.with_flavor(Flavor::NativeLibs)),
            PathBuf::from("/repo/buck-out/gen/lib/__core#native-libs__")
        );
    }
}
