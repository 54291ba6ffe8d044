//! enhance CLI - expand build targets into their concrete rule graphs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use rule_enhancer::util::diagnostic::{emit, suggestions};
use rule_enhancer::EnhanceError;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        match e.downcast_ref::<EnhanceError>() {
            Some(err) => emit(
                &err.to_diagnostic().with_suggestion(suggestions::ENHANCE_FAILED),
                color,
            ),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("rule_enhancer=debug")
    } else {
        EnvFilter::new("rule_enhancer=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let global = cli.global;

    // Execute command
    match cli.command {
        Commands::Graph(args) => commands::graph::execute(&global, args),
        Commands::Deps(args) => commands::deps::execute(&global, args),
        Commands::Env(args) => commands::env::execute(&global, args),
    }
}
