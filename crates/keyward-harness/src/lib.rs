//! Deterministic simulation harness for keyward.
//!
//! [`SimEnv`] implements the core `Environment` trait with a scripted
//! identity provider whose handshakes settle when a test (or a seeded RNG)
//! says so. Nothing here touches the network or a clock.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the registry,
//! its handles and the bus. Operations are applied to both the model and the
//! real registry, and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod sim_provider;

pub use model::{
    ClientSnapshot, ModelClient, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, RequiredField, ScriptedOutcome, Slot,
};
pub use sim_env::{SimEnv, slot_id};
pub use sim_provider::{Script, ScriptedProvider};
