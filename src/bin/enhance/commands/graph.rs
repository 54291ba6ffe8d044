//! `enhance graph` command

use anyhow::{bail, Result};

use super::open_session;
use crate::cli::{GlobalArgs, GraphArgs};
use rule_enhancer::ops::render;

pub fn execute(global: &GlobalArgs, args: GraphArgs) -> Result<()> {
    if args.targets.is_empty() && !args.all {
        bail!(
            "no targets given\n\
             help: Name targets to enhance, or pass `--all`"
        );
    }

    let session = open_session(global)?;
    let graphs = session.enhance(&args.targets)?;

    print!("{}", render(&graphs, args.format.into())?);
    Ok(())
}
