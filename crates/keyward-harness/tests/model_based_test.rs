//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! registry behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    RealWorld      Compare
//!      (reference)   (SimEnv)       Observable state
//! ```

#![allow(clippy::unwrap_used)]

use std::{cell::RefCell, rc::Rc};

use futures::FutureExt;
use keyward_core::{ConfigError, FrameLoop, Registry, SessionEvent, SessionHandle, SubscriptionId};
use keyward_harness::{
    ClientSnapshot, ModelWorld, ObservableState, Operation, OperationError, OperationResult,
    RequiredField, ScriptedOutcome, SimEnv, Slot, slot_id,
};
use proptest::prelude::*;

const SLOTS: u8 = 4;

struct RealObserver {
    id: SubscriptionId,
    active: bool,
    log: Rc<RefCell<Vec<SessionEvent>>>,
}

/// Real system wrapper that mirrors ModelWorld's interface.
struct RealWorld {
    frames: FrameLoop,
    env: SimEnv,
    registry: Registry<SimEnv>,
    observers: Vec<RealObserver>,
}

impl RealWorld {
    fn new() -> Self {
        let frames = FrameLoop::new();
        let env = SimEnv::new(frames.handle());
        let registry = Registry::new(env.clone());

        Self { frames, env, registry, observers: Vec::new() }
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match op {
            Operation::Register { slot, omit } => self.apply_register(*slot, *omit),
            Operation::Init { slot } => self.with_handle(*slot, |h| {
                let _ = h.init();
                OperationResult::Ok
            }),
            Operation::Settle { slot, outcome } => self.apply_settle(*slot, *outcome),
            Operation::Login { slot } => self.with_handle(*slot, |h| {
                h.login().now_or_never().unwrap().unwrap();
                OperationResult::Ok
            }),
            Operation::Logout { slot } => self.with_handle(*slot, |h| {
                h.logout().now_or_never().unwrap().unwrap();
                OperationResult::Ok
            }),
            Operation::Subscribe => {
                let log = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&log);
                let id = self.registry.subscribe(move |e| sink.borrow_mut().push(e.clone()));
                self.observers.push(RealObserver { id, active: true, log });
                OperationResult::Ok
            },
            Operation::Unsubscribe { observer } => self.apply_unsubscribe(*observer),
            Operation::RunFrame => {
                self.frames.run_frame();
                OperationResult::Ok
            },
        };

        // Let spawned handshakes reach their next suspension point.
        self.frames.poll_tasks();
        result
    }

    fn apply_register(&mut self, slot: Slot, omit: Option<RequiredField>) -> OperationResult {
        match self.registry.get_or_create(&Operation::client_config(slot, omit)) {
            Ok(_) => OperationResult::Ok,
            Err(ConfigError::MissingField { field }) => {
                OperationResult::Error(OperationError::MissingField(field))
            },
        }
    }

    fn apply_settle(&self, slot: Slot, outcome: ScriptedOutcome) -> OperationResult {
        let env = self.env.clone();
        self.with_handle(slot, move |h| {
            if env.settle(h.client_id().as_str(), outcome.to_provider_result()) {
                OperationResult::Ok
            } else {
                OperationResult::Error(OperationError::NothingPending)
            }
        })
    }

    fn apply_unsubscribe(&mut self, observer: u8) -> OperationResult {
        match self.observers.get_mut(usize::from(observer)) {
            Some(o) if o.active => {
                assert!(self.registry.unsubscribe(o.id));
                o.active = false;
                OperationResult::Ok
            },
            _ => OperationResult::Error(OperationError::UnknownObserver),
        }
    }

    fn with_handle(
        &self,
        slot: Slot,
        f: impl FnOnce(&SessionHandle) -> OperationResult,
    ) -> OperationResult {
        match self.registry.get(slot_id(slot).as_str()) {
            Some(handle) => f(&handle),
            None => OperationResult::Error(OperationError::UnknownClient),
        }
    }

    fn observable_state(&self) -> ObservableState {
        let clients = self
            .registry
            .client_ids()
            .into_iter()
            .map(|id| {
                let handle = self.registry.get(id.as_str()).unwrap();
                let provider = self.env.provider(id.as_str()).unwrap();
                ClientSnapshot {
                    phase: handle.init_state(),
                    authenticated: handle.authenticated(),
                    init_calls: provider.init_calls(),
                    peer_events: handle.peer_events_seen(),
                    id,
                }
            })
            .collect();

        ObservableState {
            clients,
            observer_logs: self.observers.iter().map(|o| o.log.borrow().clone()).collect(),
            queued_events: self.frames.pending_callbacks(),
        }
    }
}

/// Strategy for generating operations over a small set of slots.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let slot = 0..SLOTS;
    let omit = prop_oneof![
        6 => Just(None),
        1 => Just(Some(RequiredField::ClientId)),
        1 => Just(Some(RequiredField::Url)),
        1 => Just(Some(RequiredField::Realm)),
    ];
    let outcome = prop_oneof![
        Just(ScriptedOutcome::Authenticated),
        Just(ScriptedOutcome::Anonymous),
        Just(ScriptedOutcome::Failed),
    ];

    prop_oneof![
        3 => (slot.clone(), omit).prop_map(|(slot, omit)| Operation::Register { slot, omit }),
        3 => slot.clone().prop_map(|slot| Operation::Init { slot }),
        3 => (slot.clone(), outcome).prop_map(|(slot, outcome)| Operation::Settle { slot, outcome }),
        2 => slot.clone().prop_map(|slot| Operation::Login { slot }),
        2 => slot.prop_map(|slot| Operation::Logout { slot }),
        1 => Just(Operation::Subscribe),
        1 => (0..4u8).prop_map(|observer| Operation::Unsubscribe { observer }),
        3 => Just(Operation::RunFrame),
    ]
}

/// Clamp slots of arbitrary-generated operations into the tested range.
fn clamp_slot(op: Operation) -> Operation {
    match op {
        Operation::Register { slot, omit } => Operation::Register { slot: slot % SLOTS, omit },
        Operation::Init { slot } => Operation::Init { slot: slot % SLOTS },
        Operation::Settle { slot, outcome } => Operation::Settle { slot: slot % SLOTS, outcome },
        Operation::Login { slot } => Operation::Login { slot: slot % SLOTS },
        Operation::Logout { slot } => Operation::Logout { slot: slot % SLOTS },
        other => other,
    }
}

proptest! {
    /// Operation results and observable state match after every step.
    #[test]
    fn prop_model_matches_real(ops in prop::collection::vec(operation_strategy(), 0..60)) {
        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                &model_result,
                &real_result,
                "Divergence at operation {}: {:?}",
                i,
                op
            );
            prop_assert_eq!(model.observable_state(), real.observable_state(), "after {:?}", op);
        }
    }

    /// Every published event is delivered exactly once per active observer.
    #[test]
    fn prop_no_duplicate_delivery(ops in prop::collection::vec(operation_strategy(), 0..80)) {
        let mut real = RealWorld::new();
        real.apply(&Operation::Subscribe);

        let mut published = 0usize;
        for op in &ops {
            if matches!(op, Operation::Unsubscribe { observer: 0 }) {
                continue;
            }
            let result = real.apply(op);
            if result.is_ok() && matches!(op, Operation::Login { .. } | Operation::Logout { .. }) {
                published += 1;
            }
        }
        real.frames.run_until_idle();

        let redirects = real.observers[0]
            .log
            .borrow()
            .iter()
            .filter(|e| !matches!(e, SessionEvent::Initialized { .. }))
            .count();
        prop_assert_eq!(redirects, published);
    }
}

/// Byte-driven sequences through `Arbitrary`, as a fuzzer would produce them.
#[test]
fn arbitrary_sequences_agree() {
    use arbitrary::{Arbitrary, Unstructured};

    for seed in 0u8..32 {
        let bytes: Vec<u8> =
            (0..512u32).map(|i| seed.wrapping_mul(31).wrapping_add((i * 7) as u8)).collect();
        let mut u = Unstructured::new(&bytes);

        let mut model = ModelWorld::new();
        let mut real = RealWorld::new();
        while let Ok(op) = Operation::arbitrary(&mut u) {
            let op = clamp_slot(op);
            assert_eq!(model.apply(&op), real.apply(&op), "seed {seed}: {op:?}");
            if u.is_empty() {
                break;
            }
        }
        assert_eq!(model.observable_state(), real.observable_state(), "seed {seed}");
    }
}
