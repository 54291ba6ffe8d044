//! `enhance deps` command

use anyhow::Result;

use super::open_session;
use crate::cli::{DepsArgs, GlobalArgs};

pub fn execute(global: &GlobalArgs, args: DepsArgs) -> Result<()> {
    let session = open_session(global)?;
    let report = session.deps(&args.target)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
