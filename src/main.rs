//! cprdec CLI - Cubase project decoder
//!
//! Command-line interface for the cprdec decoding core.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use cprdec::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    info!("cprdec v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("cprdec v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Inspect { path } => {
            commands::inspect(&path).context("inspect failed")
        }
        Commands::Export { path, output } => {
            commands::export(&path, output.as_deref()).context("export failed")
        }
        Commands::Scan { path } => commands::scan(&path).context("scan failed"),
    }
}
