//! Unified error handling for the arena
//!
//! Per-concern errors (config, ledger, validation, providers, generation)
//! roll up into `ArenaError` so callers get one context-rich type instead
//! of `Box<dyn Error>`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::providers::{GenerationError, ProviderError};
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unknown participant, malformed schedule and the like; aborts match
    /// construction before the countdown ever starts.
    #[error("Invalid match setup: {0}")]
    MatchSetup(String),

    #[error("Trade rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Decision provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("News generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Report export failed: {0}")]
    Export(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArenaError {
    /// Error category for logging/metrics.
    pub fn category(&self) -> &'static str {
        match self {
            ArenaError::Config(_) | ArenaError::MatchSetup(_) => "config",
            ArenaError::Validation(_) => "validation",
            ArenaError::Ledger(_) => "ledger",
            ArenaError::Provider(_) => "provider",
            ArenaError::Generation(_) => "generation",
            ArenaError::Export(_) => "export",
            ArenaError::Internal(_) => "internal",
        }
    }

    /// Whether the match can continue after this error. Only setup and
    /// configuration problems are fatal to a match.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArenaError::Config(_) | ArenaError::MatchSetup(_))
    }
}

impl From<serde_json::Error> for ArenaError {
    fn from(err: serde_json::Error) -> Self {
        ArenaError::Export(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ArenaError {
    fn from(err: std::io::Error) -> Self {
        ArenaError::Export(format!("IO error: {}", err))
    }
}

/// Result type alias using ArenaError.
pub type ArenaResult<T> = Result<T, ArenaError>;
