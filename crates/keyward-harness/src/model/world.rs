//! Model world - the registry, its bus and its observers.
//!
//! The world is the oracle against which the real registry is verified.

use std::collections::BTreeMap;

use keyward_core::{ClientId, InitPhase, SessionEvent};

use super::{
    client::ModelClient,
    operation::{Operation, OperationError, OperationResult, RequiredField, Slot},
};

/// Observable state of one registered client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    /// Client id.
    pub id: ClientId,
    /// Handshake phase.
    pub phase: InitPhase,
    /// Provider's authentication state.
    pub authenticated: bool,
    /// Times the provider's handshake was started.
    pub init_calls: u32,
    /// Events from other clients the handle observed.
    pub peer_events: u64,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Registered clients, sorted by id.
    pub clients: Vec<ClientSnapshot>,
    /// Per-observer delivered events, in subscription order.
    pub observer_logs: Vec<Vec<SessionEvent>>,
    /// Events published but not yet delivered.
    pub queued_events: usize,
}

#[derive(Debug, Clone, Default)]
struct ModelObserver {
    active: bool,
    log: Vec<SessionEvent>,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone, Default)]
pub struct ModelWorld {
    clients: BTreeMap<Slot, ModelClient>,
    queued: Vec<SessionEvent>,
    observers: Vec<ModelObserver>,
}

impl ModelWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by slot.
    pub fn client(&self, slot: Slot) -> Option<&ModelClient> {
        self.clients.get(&slot)
    }

    /// Number of registered clients.
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Events published but not yet delivered.
    pub fn queued_events(&self) -> &[SessionEvent] {
        &self.queued
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real implementation's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Register { slot, omit } => self.apply_register(*slot, *omit),
            Operation::Init { slot } => self.with_client(*slot, |c| {
                c.init();
                Ok(None)
            }),
            Operation::Settle { slot, outcome } => self.with_client(*slot, |c| c.settle(*outcome)),
            Operation::Login { slot } => self.with_client(*slot, |c| Ok(Some(c.login()))),
            Operation::Logout { slot } => self.with_client(*slot, |c| Ok(Some(c.logout()))),
            Operation::Subscribe => {
                self.observers.push(ModelObserver { active: true, log: Vec::new() });
                OperationResult::Ok
            },
            Operation::Unsubscribe { observer } => self.apply_unsubscribe(*observer),
            Operation::RunFrame => {
                self.deliver();
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let mut clients: Vec<_> = self
            .clients
            .values()
            .map(|c| ClientSnapshot {
                id: c.id().clone(),
                phase: c.phase(),
                authenticated: c.authenticated(),
                init_calls: c.init_calls(),
                peer_events: c.peer_events(),
            })
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));

        ObservableState {
            clients,
            observer_logs: self.observers.iter().map(|o| o.log.clone()).collect(),
            queued_events: self.queued.len(),
        }
    }

    fn apply_register(&mut self, slot: Slot, omit: Option<RequiredField>) -> OperationResult {
        if let Some(field) = omit {
            return OperationResult::Error(OperationError::MissingField(field.name()));
        }
        self.clients.entry(slot).or_insert_with(|| ModelClient::new(slot));
        OperationResult::Ok
    }

    fn with_client(
        &mut self,
        slot: Slot,
        f: impl FnOnce(&mut ModelClient) -> Result<Option<SessionEvent>, OperationError>,
    ) -> OperationResult {
        let Some(client) = self.clients.get_mut(&slot) else {
            return OperationResult::Error(OperationError::UnknownClient);
        };

        match f(client) {
            Ok(event) => {
                self.queued.extend(event);
                OperationResult::Ok
            },
            Err(e) => OperationResult::Error(e),
        }
    }

    fn apply_unsubscribe(&mut self, observer: u8) -> OperationResult {
        match self.observers.get_mut(usize::from(observer)) {
            Some(o) if o.active => {
                o.active = false;
                OperationResult::Ok
            },
            _ => OperationResult::Error(OperationError::UnknownObserver),
        }
    }

    /// Deliver every queued event to whoever is subscribed now.
    fn deliver(&mut self) {
        for event in std::mem::take(&mut self.queued) {
            for client in self.clients.values_mut() {
                client.observe(&event);
            }
            for observer in self.observers.iter_mut().filter(|o| o.active) {
                observer.log.push(event.clone());
            }
        }
    }
}
