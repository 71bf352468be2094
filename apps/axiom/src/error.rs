//! # App Errors
//!
//! Everything the binary can fail with: core errors plus the file,
//! configuration and script concerns the core never sees.

use axiom_core::AxiomError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// An operation rejected by the core.
    #[error(transparent)]
    Core(#[from] AxiomError),

    /// The configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// A file could not be read.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The operation script is malformed.
    #[error("Script error: {0}")]
    ScriptError(String),
}
