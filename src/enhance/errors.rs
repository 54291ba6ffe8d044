//! Enhancement error types and diagnostics.
//!
//! Every error aborts the pass for the target being enhanced. None of them
//! are retried here.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::flavor::Flavor;
use crate::core::target::BuildTarget;
use crate::enhance::toolchain::ToolchainError;
use crate::util::diagnostic::Diagnostic;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    FlavorDispatcher,
    GraphEnhancer,
    NativeInjector,
    Assembler,
    MacroExpander,
    RuleGraph,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::FlavorDispatcher => "flavor dispatcher",
            Component::GraphEnhancer => "graph enhancer",
            Component::NativeInjector => "native library injector",
            Component::Assembler => "library/test assembler",
            Component::MacroExpander => "macro expander",
            Component::RuleGraph => "rule graph",
        };
        f.write_str(name)
    }
}

/// Error raised while enhancing a target.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum EnhanceError {
    #[error("`{target}`: flavor `{flavor}` cannot be combined with `{conflicting}`")]
    #[diagnostic(code(enhance::flavor_conflict))]
    FlavorConflict {
        target: BuildTarget,
        flavor: Flavor,
        conflicting: Flavor,
    },

    #[error("`{requester}` depends on `{missing}`, which is not a known target")]
    #[diagnostic(code(enhance::missing_dependency))]
    MissingDependency {
        requester: BuildTarget,
        missing: BuildTarget,
        component: Component,
    },

    #[error("`{target}`: {reason} in `{raw}` at offset {position}")]
    #[diagnostic(code(enhance::macro_syntax))]
    MacroSyntax {
        target: BuildTarget,
        raw: String,
        position: usize,
        reason: String,
    },

    #[error("`{requester}`: `{target}` has no output to substitute")]
    #[diagnostic(
        code(enhance::missing_artifact),
        help("only targets that produce an artifact can appear in a location macro")
    )]
    MissingArtifact {
        requester: BuildTarget,
        target: BuildTarget,
    },

    #[error("toolchain failed for `{target}`")]
    #[diagnostic(code(enhance::toolchain))]
    Toolchain {
        target: BuildTarget,
        #[source]
        source: ToolchainError,
    },

    #[error("cycle detected between rule nodes")]
    #[diagnostic(code(enhance::cycle))]
    Cycle { targets: Vec<BuildTarget> },
}

impl EnhanceError {
    /// The pipeline stage that raised this error.
    pub fn component(&self) -> Component {
        match self {
            EnhanceError::FlavorConflict { .. } => Component::FlavorDispatcher,
            EnhanceError::MissingDependency { component, .. } => *component,
            EnhanceError::MacroSyntax { .. } | EnhanceError::MissingArtifact { .. } => {
                Component::MacroExpander
            }
            EnhanceError::Toolchain { .. } => Component::Assembler,
            EnhanceError::Cycle { .. } => Component::RuleGraph,
        }
    }

    /// The target whose enhancement failed.
    pub fn target(&self) -> Option<BuildTarget> {
        match self {
            EnhanceError::FlavorConflict { target, .. }
            | EnhanceError::MacroSyntax { target, .. }
            | EnhanceError::Toolchain { target, .. } => Some(*target),
            EnhanceError::MissingDependency { requester, .. }
            | EnhanceError::MissingArtifact { requester, .. } => Some(*requester),
            EnhanceError::Cycle { targets } => targets.first().copied(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string())
            .with_context(format!("raised by the {}", self.component()));

        match self {
            EnhanceError::FlavorConflict {
                flavor,
                conflicting,
                ..
            } => diag
                .with_context(format!("`{}` is derived from the main library output", flavor))
                .with_suggestion(format!("Request the target without `#{}`", conflicting)),

            EnhanceError::MissingDependency { missing, .. } => diag
                .with_suggestion(format!("Check that `{}` is spelled correctly", missing))
                .with_suggestion(format!(
                    "Declare `{}` in the target file before depending on it",
                    missing
                )),

            EnhanceError::MacroSyntax { .. } => diag
                .with_suggestion("Macros take the form `$(location //package:name)`")
                .with_suggestion("Escape a literal dollar sign as `\\$`"),

            EnhanceError::MissingArtifact { target, .. } => diag.with_suggestion(format!(
                "Make sure `{}` is a library or test that produces an output",
                target
            )),

            EnhanceError::Toolchain { source, .. } => {
                diag.with_context(format!("toolchain said: {}", source))
            }

            EnhanceError::Cycle { targets } => {
                let cycle: Vec<String> = targets.iter().map(ToString::to_string).collect();
                diag.with_context(format!("cycle: {}", cycle.join(" -> ")))
                    .with_suggestion("Break the cycle by removing one of the dependencies")
            }
        }
    }
}
