//! Session error types.

use thiserror::Error;

use crate::config::ClientId;

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required field is absent or blank.
    #[error("missing required configuration field `{field}`")]
    MissingField {
        /// Name of the field, as spelled in the configuration.
        field: &'static str,
    },
}

/// Failure reported by the external identity library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identity provider error: {reason}")]
pub struct ProviderError {
    /// What the library reported.
    pub reason: String,
}

impl ProviderError {
    /// Create a provider error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// The handshake of one session handle rejected.
///
/// Cloneable so every holder of the same pending result sees it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handshake failed for client {client_id}: {reason}")]
pub struct HandshakeError {
    /// Handle whose handshake failed.
    pub client_id: ClientId,
    /// What the provider reported.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConfigError::MissingField { field: "url" };
        assert_eq!(err.to_string(), "missing required configuration field `url`");

        let err = HandshakeError { client_id: ClientId::new("app"), reason: "timeout".to_string() };
        assert_eq!(err.to_string(), "handshake failed for client app: timeout");
    }
}
