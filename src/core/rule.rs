//! Rule nodes - the concrete, buildable output of enhancement.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::args::{ForkMode, LogLevel};
use crate::core::dep_set::DepSet;
use crate::core::target::BuildTarget;
use crate::enhance::compiler::CompilerInvocation;
use crate::enhance::macros::MacroString;
use crate::enhance::toolchain::CompiledArtifactRef;
use crate::util::hash::Fingerprint;

/// Kind of a rule node, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Library,
    ClassAbi,
    DummyRDotJava,
    NativeLibs,
    RobolectricTest,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Library => "library",
            RuleKind::ClassAbi => "class_abi",
            RuleKind::DummyRDotJava => "dummy_r_dot_java",
            RuleKind::NativeLibs => "native_libs",
            RuleKind::RobolectricTest => "robolectric_test",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled JVM library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryPayload {
    pub srcs: BTreeSet<String>,
    pub resources: BTreeSet<String>,
    pub provided_deps: DepSet,
    pub compiler: CompilerInvocation,
    pub track_class_usage: bool,
    pub generated_source_folder: Option<String>,
}

/// ABI-only view of a library. Records nothing but where the full
/// library's output lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbiPayload {
    pub library: BuildTarget,
    pub library_output: Option<PathBuf>,
}

/// Placeholder `R` class generation over the resource dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcesPayload {
    pub resource_deps: DepSet,
    pub force_final_resource_ids: bool,
    pub use_old_styleable_format: bool,
    pub resource_union_package: Option<String>,
    pub final_r_name: Option<String>,
}

/// Bridge that collects native libraries into one link root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeLibsPayload {
    pub libraries: DepSet,
    pub link_root: PathBuf,
    pub search_path_env: String,
}

/// The runnable Robolectric test wrapping a compiled-tests library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestPayload {
    pub library: BuildTarget,
    pub labels: BTreeSet<String>,
    pub contacts: BTreeSet<String>,
    pub vm_args: Vec<String>,
    /// User environment, macros unexpanded
    pub env: BTreeMap<String, MacroString>,
    /// Environment contributed by injected capabilities
    pub native_env: BTreeMap<String, String>,
    pub dummy_r_dot_java: Option<BuildTarget>,
    pub test_rule_timeout_ms: Option<u64>,
    pub test_case_timeout_ms: Option<u64>,
    pub run_test_separately: bool,
    pub fork_mode: ForkMode,
    pub std_out_log_level: Option<LogLevel>,
    pub std_err_log_level: Option<LogLevel>,
    pub robolectric_runtime_dependency: Option<String>,
    pub robolectric_manifest: Option<String>,
}

/// Construction payload of a rule node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RulePayload {
    Library(LibraryPayload),
    ClassAbi(AbiPayload),
    Resources(ResourcesPayload),
    NativeLibs(NativeLibsPayload),
    Test(TestPayload),
}

/// A concrete rule in the enhanced graph.
///
/// Nodes are immutable once built and shared through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleNode {
    pub target: BuildTarget,
    pub declared_deps: DepSet,
    pub extra_deps: DepSet,
    pub output: Option<CompiledArtifactRef>,
    pub payload: RulePayload,
}

impl RuleNode {
    pub fn kind(&self) -> RuleKind {
        match &self.payload {
            RulePayload::Library(_) => RuleKind::Library,
            RulePayload::ClassAbi(_) => RuleKind::ClassAbi,
            RulePayload::Resources(_) => RuleKind::DummyRDotJava,
            RulePayload::NativeLibs(_) => RuleKind::NativeLibs,
            RulePayload::Test(_) => RuleKind::RobolectricTest,
        }
    }

    /// Declared deps followed by extra deps not already declared.
    pub fn deps(&self) -> Vec<BuildTarget> {
        let mut deps = self.declared_deps.to_vec();
        deps.extend(self.extra_deps.difference(&self.declared_deps).iter().copied());
        deps
    }

    pub fn test_payload(&self) -> Option<&TestPayload> {
        match &self.payload {
            RulePayload::Test(payload) => Some(payload),
            _ => None,
        }
    }

    /// Content fingerprint over everything that identifies the node.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let declared: Vec<String> = self.declared_deps.iter().map(ToString::to_string).collect();
        let extra: Vec<String> = self.extra_deps.iter().map(ToString::to_string).collect();
        let output = self
            .output
            .as_ref()
            .map(|o| o.relative_path().display().to_string());

        let mut fp = Fingerprint::new();
        fp.update_str(&self.target.to_string())
            .update_str(self.kind().as_str())
            .update_strs(declared.iter().map(String::as_str))
            .update_strs(extra.iter().map(String::as_str))
            .update_opt(output.as_deref())
            .update_json(&self.payload)?;
        Ok(fp.finish())
    }
}
