//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples registry logic from the two things it
//! cannot do itself: scheduling (the frame loop) and constructing the
//! external identity provider. This enables:
//!
//! - Simulation: a scripted provider whose handshakes settle exactly when a
//!   test says so, on a frame loop the test steps by hand.
//!
//! - Applications: a provider adapter over the real identity library,
//!   without changes to the registry or the handles.
//!
//! # Invariants
//!
//! - Single thread: everything scheduled through `frames()` runs on the
//!   thread that owns the frame loop
//! - Isolation: implementations must not share global state between
//!   registries

use std::rc::Rc;

use crate::{config::ProviderConfig, frame::FrameHandle, provider::IdentityProvider};

/// Scheduling and provider construction for a [`Registry`](crate::Registry).
pub trait Environment: Clone + 'static {
    /// Frame loop the registry schedules on.
    fn frames(&self) -> &FrameHandle;

    /// Construct the provider session object for a validated configuration.
    ///
    /// Called once per client id, the first time it is registered.
    fn connect(&self, config: &ProviderConfig) -> Rc<dyn IdentityProvider>;
}
