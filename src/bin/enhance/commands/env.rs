//! `enhance env` command

use anyhow::Result;

use super::open_session;
use crate::cli::{EnvArgs, GlobalArgs};
use rule_enhancer::ops::render_env;

pub fn execute(global: &GlobalArgs, args: EnvArgs) -> Result<()> {
    let session = open_session(global)?;
    let env = session.env(&args.target)?;

    if env.is_empty() {
        tracing::info!("{} has an empty environment", args.target);
    }
    print!("{}", render_env(&env));
    Ok(())
}
