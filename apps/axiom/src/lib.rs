//! # Axiom Driver
//!
//! Everything the `axiom` binary does besides argument parsing and
//! logging setup: config loading, script replay and the CLI commands.
//! Integration tests drive these modules directly.

pub mod cli;
pub mod config;
pub mod error;
pub mod script;
