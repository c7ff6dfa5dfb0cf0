//! Demo error types.

use std::path::PathBuf;

use keyward_core::{ConfigError, ProviderError};
use thiserror::Error;

/// Errors that can occur while running the demo.
#[derive(Debug, Error)]
pub enum DemoError {
    /// Client file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Client file is not a JSON array of client configurations.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A client configuration was rejected.
    #[error("client #{index}: {source}")]
    Config {
        /// Position of the client in the configured list.
        index: usize,
        /// Underlying error.
        source: ConfigError,
    },

    /// Login or logout requested for a client that was not configured.
    #[error("unknown client {0}")]
    UnknownClient(String),

    /// Login or logout failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Nothing to run.
    #[error("no clients configured")]
    NoClients,

    /// An action could not complete because the frame loop ran dry.
    #[error("{0} did not complete")]
    Stalled(String),
}
