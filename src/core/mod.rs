//! Core data structures.
//!
//! This module contains the foundational types the pipeline works on:
//! - Target identifiers and flavors
//! - Rule argument bundles and params
//! - Rule nodes
//! - The target universe

pub mod args;
pub mod dep_set;
pub mod flavor;
pub mod params;
pub mod rule;
pub mod target;
pub mod universe;

pub use args::{LibraryArgs, RuleArgs, TestArgs};
pub use dep_set::DepSet;
pub use flavor::Flavor;
pub use params::RuleParams;
pub use rule::{RuleKind, RuleNode, RulePayload};
pub use target::{BuildTarget, TargetParseError};
pub use universe::{DependencyKind, InMemoryUniverse, TargetEntry, TargetUniverse};
