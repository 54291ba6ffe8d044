//! The rule-enhancement pipeline.
//!
//! Turns one rule argument bundle into the rule nodes that build it:
//! - flavor dispatch (`dispatch`)
//! - generated-resources synthesis (`resources`)
//! - native-library bridging (`native`)
//! - library and test assembly (`assemble`)
//! - macro expansion in string arguments (`macros`)
//!
//! `pipeline::Enhancer` runs the stages in order.

pub mod assemble;
pub mod compiler;
pub mod dispatch;
pub mod errors;
pub mod graph;
pub mod macros;
pub mod native;
pub mod pipeline;
pub mod registry;
pub mod resources;
pub mod toolchain;

pub use errors::{Component, EnhanceError};
pub use graph::{EnhancedGraph, RuleGraph};
pub use macros::{ArtifactResolver, MacroRegistry, MacroString};
pub use native::NativePlatform;
pub use pipeline::{Enhancer, EnhancerBuilder, ProcessDefaults};
pub use registry::NodeRegistry;
pub use toolchain::{
    BuckOutPaths, CompiledArtifactRef, OutputPathProvider, PlannedToolchain, ToolchainError,
    ToolchainInvoker,
};
