//! High-level operations.
//!
//! This module contains the implementation of the `enhance` commands.

pub mod enhance_graph;
pub mod target_file;

pub use enhance_graph::{
    render, render_env, render_json, render_text, DepsReport, GraphFormat, Session, SessionOptions,
};
pub use target_file::{find_target_file, TargetDecl, TargetSet, TARGET_FILE_NAME};
