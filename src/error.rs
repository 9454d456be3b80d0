//! Error taxonomy for the tree data model
//!
//! Structural and precondition errors are contract violations by the caller
//! and propagate immediately. Data-quality problems found during best-effort
//! operations (text reconciliation) are not errors: they are reported through
//! `tracing` and counted in the operation's report.

use thiserror::Error;

/// Errors raised by core operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Cycle, cross-tree link, non-contiguous multiword token, wrong number
    /// of syntactic roots, or a reference to a node that no longer exists.
    #[error("Structural integrity error: {0}")]
    StructuralIntegrity(String),

    /// Missing required input (no raw text, zone not found, ...)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Invalid parameter or policy name
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Error::StructuralIntegrity(message.into())
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse a boolean parameter the way scenario strings spell them
pub(crate) fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" | "True" | "yes" => Ok(true),
        "0" | "false" | "False" | "no" | "" => Ok(false),
        other => Err(Error::configuration(format!(
            "parameter {key}: expected a boolean, found {other:?}"
        ))),
    }
}
