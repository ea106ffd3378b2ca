//! Error types for pagebridge
//!
//! Provides standardized error handling across the bridge.

use thiserror::Error;

/// Errors that can occur in the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No route matches the URL; the caller should try the next resolver.
    #[error("No route for '{url}'")]
    NoRoute { url: String },

    /// A route with the same anchored pattern is already registered
    #[error("Route pattern already registered: {pattern}")]
    DuplicateRoute { pattern: String },

    /// The pattern does not compile
    #[error("Invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A script passed an unusable argument
    #[error("Argument error: {0}")]
    Argument(String),

    #[error("Extension '{0}' not found")]
    ExtensionNotFound(String),

    /// A session worker thread could not be started
    #[error("Failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
