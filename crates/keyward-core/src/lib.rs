//! Keyward core
//!
//! Session registry and notification bus for single-page applications that
//! talk to one or more OpenID Connect clients. The identity library itself is
//! an external collaborator behind [`IdentityProvider`]; this crate only
//! decides which session objects exist and who hears about their lifecycle.
//!
//! # Architecture
//!
//! ```text
//! Registry<E>
//!   ├─ Bus                 (deferred publish/subscribe, one per registry)
//!   └─ ClientId → SessionHandle
//!                   ├─ Rc<dyn IdentityProvider>   (external library)
//!                   └─ InitState                  (memoized handshake)
//!
//! Environment
//!   ├─ FrameHandle         (spawn local futures, post next-frame callbacks)
//!   └─ connect(config)     (construct the external provider)
//! ```
//!
//! Everything here is single-threaded: shared state is `Rc`/`RefCell` and
//! the [`FrameLoop`] plays the role of the browser event loop. Bus delivery
//! always happens in a later frame than the publish call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bus;
mod config;
mod env;
mod error;
mod event;
mod frame;
mod handle;
mod provider;
mod registry;
mod widget;

#[cfg(test)]
mod test_support;

pub use bus::{Bus, SubscriptionId};
pub use config::{
    ClientConfig, ClientId, Flow, InitOptions, InitOverrides, OnLoad, PkceMethod, ProviderConfig,
    RegistryConfig, ResponseMode,
};
pub use env::Environment;
pub use error::{ConfigError, HandshakeError, ProviderError};
pub use event::{EventKind, SessionEvent};
pub use frame::{FrameHandle, FrameLoop, Task};
pub use handle::{InitPhase, InitResult, SessionHandle};
pub use provider::IdentityProvider;
pub use registry::{Registry, RegistryCell};
pub use widget::{LoginWidget, Rendered, WidgetAction};
