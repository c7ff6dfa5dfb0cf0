//! Operations for model-based testing.
//!
//! Operations represent every action an application can take against a
//! registry. They are generated randomly by proptest and applied to both the
//! model and the real implementation.

use arbitrary::Arbitrary;
use keyward_core::{ClientConfig, ProviderError};

use crate::sim_env::slot_id;

/// Client slot (mapped to client id `client-{slot}`).
pub type Slot = u8;

/// Required configuration field an operation can leave out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum RequiredField {
    /// `clientId`
    ClientId,
    /// `url`
    Url,
    /// `realm`
    Realm,
}

impl RequiredField {
    /// Name reported in `ConfigError::MissingField`.
    pub fn name(self) -> &'static str {
        match self {
            Self::ClientId => "clientId",
            Self::Url => "url",
            Self::Realm => "realm",
        }
    }
}

/// How a pending handshake settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ScriptedOutcome {
    /// Provider reports an authenticated session.
    Authenticated,
    /// Provider reports no session.
    Anonymous,
    /// Provider rejects the handshake.
    Failed,
}

impl ScriptedOutcome {
    /// What the provider's `init` resolves to.
    pub fn to_provider_result(self) -> Result<bool, ProviderError> {
        match self {
            Self::Authenticated => Ok(true),
            Self::Anonymous => Ok(false),
            Self::Failed => Err(ProviderError::new("scripted failure")),
        }
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Register a client, optionally with a required field missing.
    Register {
        /// Client slot.
        slot: Slot,
        /// Field to leave out of the configuration.
        omit: Option<RequiredField>,
    },

    /// Start (or reuse) a client's handshake.
    Init {
        /// Client slot.
        slot: Slot,
    },

    /// Resolve a client's pending handshake.
    Settle {
        /// Client slot.
        slot: Slot,
        /// Outcome to deliver.
        outcome: ScriptedOutcome,
    },

    /// Client starts a login redirect.
    Login {
        /// Client slot.
        slot: Slot,
    },

    /// Client starts a logout redirect.
    Logout {
        /// Client slot.
        slot: Slot,
    },

    /// Add a bus observer.
    Subscribe,

    /// Remove a bus observer.
    Unsubscribe {
        /// Observer index, in subscription order.
        observer: u8,
    },

    /// Run one frame of the frame loop.
    ///
    /// Delivers every event published before the frame started.
    RunFrame,
}

impl Operation {
    /// Client configuration for a `Register` operation.
    pub fn client_config(slot: Slot, omit: Option<RequiredField>) -> ClientConfig {
        let mut config = ClientConfig::new(slot_id(slot).as_str(), "https://sso.test/auth", "main");
        match omit {
            Some(RequiredField::ClientId) => config.client_id = None,
            Some(RequiredField::Url) => config.url = None,
            Some(RequiredField::Realm) => config.realm = None,
            None => {},
        }
        config
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Configuration rejected for a missing field.
    MissingField(&'static str),

    /// Slot was never registered.
    UnknownClient,

    /// No handshake is waiting to be settled.
    NothingPending,

    /// Observer index does not name an active observer.
    UnknownObserver,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}
