//! CLI Module
//!
//! Thin command-line collaborator over the decoding core: it calls the
//! parsing entry point and reads the resulting model.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cprdec - Cubase project decoder
#[derive(Parser, Debug)]
#[command(name = "cprdec")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a human-readable project summary
    #[command(name = "inspect")]
    Inspect {
        /// Path to the .cpr file
        path: PathBuf,
    },

    /// Export the decoded project model as JSON
    #[command(name = "export")]
    Export {
        /// Path to the .cpr file
        path: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode every .cpr file under a directory tree
    #[command(name = "scan")]
    Scan {
        /// Root directory to walk
        path: PathBuf,
    },
}
