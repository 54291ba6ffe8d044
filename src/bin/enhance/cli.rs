//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use rule_enhancer::ops::GraphFormat;

/// enhance - expand JVM library and Robolectric test targets into rule graphs
#[derive(Parser)]
#[command(name = "enhance")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// Target file to read
    #[arg(short, long, global = true, default_value = "targets.toml")]
    pub file: PathBuf,

    /// Output root (overrides `[output] root` from config)
    #[arg(long, global = true, env = "RULE_ENHANCER_OUT")]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enhance targets and print the resulting rule graphs
    Graph(GraphArgs),

    /// Show the dependencies of an enhanced target
    Deps(DepsArgs),

    /// Print the runtime environment of a test target
    Env(EnvArgs),
}

#[derive(Args)]
pub struct GraphArgs {
    /// Targets to enhance (e.g. //app:lib, //app:lib#class-abi)
    pub targets: Vec<String>,

    /// Enhance every rule in the target file
    #[arg(long, conflicts_with = "targets")]
    pub all: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: Format,
}

#[derive(Args)]
pub struct DepsArgs {
    /// Target to inspect
    pub target: String,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct EnvArgs {
    /// Test target
    pub target: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

impl From<Format> for GraphFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => GraphFormat::Text,
            Format::Json => GraphFormat::Json,
        }
    }
}
