//! Error types for the intro sequencer.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value storage errors.
///
/// These never reach the intro controller; the preference layer logs them
/// and falls back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Errors surfaced by the phase sequencer handle.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Intro sequence is no longer mounted")]
    Unmounted,

    #[error("Intro cannot be skipped during {0}")]
    SkipUnavailable(crate::intro::Phase),

    #[error("Unknown intro preference: {0}")]
    UnknownPreference(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
