//! Model session handle.
//!
//! Tracks the handshake phase, the provider's authentication state and the
//! peer events the handle has observed. No futures, just the transitions.

use keyward_core::{ClientId, InitPhase, SessionEvent};

use super::operation::{OperationError, ScriptedOutcome, Slot};
use crate::sim_env::slot_id;

/// Model client state.
#[derive(Debug, Clone)]
pub struct ModelClient {
    slot: Slot,
    id: ClientId,
    phase: InitPhase,
    authenticated: bool,
    init_calls: u32,
    peer_events: u64,
}

impl ModelClient {
    /// Create an uninitialized client.
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            id: slot_id(slot),
            phase: InitPhase::Uninitialized,
            authenticated: false,
            init_calls: 0,
            peer_events: 0,
        }
    }

    /// Model slot.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Client id.
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Handshake phase.
    pub fn phase(&self) -> InitPhase {
        self.phase
    }

    /// Provider's authentication state.
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    /// Times the provider's handshake was started.
    pub fn init_calls(&self) -> u32 {
        self.init_calls
    }

    /// Events from other clients this client has observed.
    pub fn peer_events(&self) -> u64 {
        self.peer_events
    }

    /// Start the handshake unless one is in flight or has succeeded.
    pub fn init(&mut self) {
        if self.phase == InitPhase::Uninitialized {
            self.phase = InitPhase::Initializing;
            self.init_calls += 1;
        }
    }

    /// Settle the in-flight handshake.
    ///
    /// Returns the event to publish, if any.
    pub fn settle(
        &mut self,
        outcome: ScriptedOutcome,
    ) -> Result<Option<SessionEvent>, OperationError> {
        if self.phase != InitPhase::Initializing {
            return Err(OperationError::NothingPending);
        }

        match outcome.to_provider_result() {
            Ok(authenticated) => {
                self.phase = InitPhase::Initialized { authenticated };
                self.authenticated = authenticated;
                Ok(Some(SessionEvent::Initialized { authenticated, requester: self.id.clone() }))
            },
            Err(_) => {
                self.phase = InitPhase::Uninitialized;
                Ok(None)
            },
        }
    }

    /// Login redirect. Returns the event to publish.
    pub fn login(&mut self) -> SessionEvent {
        self.authenticated = true;
        SessionEvent::Login { requester: self.id.clone() }
    }

    /// Logout redirect. Returns the event to publish.
    pub fn logout(&mut self) -> SessionEvent {
        self.authenticated = false;
        SessionEvent::Logout { requester: self.id.clone() }
    }

    /// Observe a delivered event. Own events are ignored.
    pub fn observe(&mut self, event: &SessionEvent) {
        if !event.is_from(&self.id) {
            self.peer_events += 1;
        }
    }
}
