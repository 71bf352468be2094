//! # Axiom CLI Module
//!
//! A driver for the core: every command builds a fresh in-memory store.
//!
//! ## Available Commands
//!
//! - `demo` - Seed the reference scenario and walk through it
//! - `run` - Replay an operation script
//! - `coord` - Parse and describe a coordinate
//! - `ledger` - Replay a script and show the audit tail

mod commands;

use crate::config::AxiomConfig;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Axiom - Semantic Coordinate Graph
///
/// Concepts live at hierarchical coordinates; relationships are derived
/// from position, and every mutation is chained into an audit ledger.
#[derive(Parser, Debug)]
#[command(name = "axiom")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file (falls back to AXIOM_CONFIG)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Seed the reference scenario and walk through it
    Demo,

    /// Replay a JSON operation script against a fresh store
    Run {
        /// Path to the script (a JSON array of operations)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Parse a coordinate and describe it
    Coord {
        /// Coordinate code (MM-TT-SS-IIII)
        code: String,

        /// Second coordinate to compare against
        #[arg(short, long)]
        other: Option<String>,
    },

    /// Replay a script and show the tail of its audit ledger
    Ledger {
        /// Path to the script (a JSON array of operations)
        #[arg(short, long)]
        file: PathBuf,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        last: usize,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), AppError> {
    let json_mode = cli.json_mode;
    let config = AxiomConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Demo) | None => cmd_demo(&config, json_mode),
        Some(Commands::Run { file }) => cmd_run(&config, json_mode, &file),
        Some(Commands::Coord { code, other }) => cmd_coord(json_mode, &code, other.as_deref()),
        Some(Commands::Ledger { file, last }) => cmd_ledger(&config, json_mode, &file, last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["axiom", "coord", "01-02-03-0004", "--json-mode", "-q"])
            .expect("parse");
        assert!(cli.json_mode);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Some(Commands::Coord { ref code, other: None }) if code == "01-02-03-0004"
        ));
    }

    #[test]
    fn ledger_defaults_to_ten_entries() {
        let cli = Cli::try_parse_from(["axiom", "ledger", "-f", "ops.json"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Ledger { last: 10, .. })));
    }

    #[test]
    fn no_subcommand_is_accepted() {
        let cli = Cli::try_parse_from(["axiom"]).expect("parse");
        assert!(cli.command.is_none());
    }
}
