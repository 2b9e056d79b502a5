//! Error types for the SBN weight and sensitivity crates

use thiserror::Error;

/// Error type shared by all `sbn-*` crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// A systematic knob name that the universe registry does not know.
    ///
    /// This is a configuration error, never a per-event data condition.
    #[error("Unknown systematic: {0}")]
    UnknownSystematic(String),

    /// A correlated-family knob name that does not decode.
    #[error("Malformed knob name: {0}")]
    MalformedKnob(String),

    /// A sensitivity finalize stage ran out of order or failed.
    #[error("Stage error: {0}")]
    Stage(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
