//! Command implementations

pub mod deps;
pub mod env;
pub mod graph;

use anyhow::{Context, Result};

use crate::cli::GlobalArgs;
use rule_enhancer::ops::{Session, SessionOptions};

/// Open a session rooted at the current directory.
pub fn open_session(global: &GlobalArgs) -> Result<Session> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;

    Session::open(&SessionOptions {
        project_root: cwd,
        target_file: Some(global.file.clone()),
        output_root: global.out.clone(),
        config: None,
    })
}
