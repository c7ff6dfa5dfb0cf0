//! Reference model for model-based testing.
//!
//! The model is a plain, obviously correct rendition of the registry, its
//! handles and the bus: no futures, no shared pointers, no frame loop. Bus
//! deliveries are a queue that drains when the operation sequence says a
//! frame ran.
//!
//! # Design Principles
//!
//! - Simplicity: the model should be obviously correct
//! - Captures WHAT is observable, not HOW it is scheduled
//! - Deterministic: same inputs produce same outputs

mod client;
pub mod operation;
mod world;

pub use client::ModelClient;
pub use operation::{
    Operation, OperationError, OperationResult, RequiredField, ScriptedOutcome, Slot,
};
pub use world::{ClientSnapshot, ModelWorld, ObservableState};
