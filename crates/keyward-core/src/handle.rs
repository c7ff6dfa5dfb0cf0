//! Session handle state machine.
//!
//! A `SessionHandle` wraps one external provider session and memoizes its
//! handshake.
//!
//! ```text
//! Uninitialized ──init()──▶ Initializing ──Ok(b)──▶ Initialized(b)
//!       ▲                        │
//!       └─────────Err────────────┘
//! ```
//!
//! # Invariants
//!
//! - While `Initializing` or `Initialized`, `init()` returns the same
//!   [`InitResult`] and never calls the provider again
//! - `Initialized` is published on the bus exactly once per successful
//!   handshake; failures publish nothing
//! - A handle never mutates another handle; it only observes bus events

use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, Shared},
};

use crate::{
    bus::{Bus, SubscriptionId},
    config::{ClientId, InitOptions, InitOverrides, ProviderConfig},
    error::{HandshakeError, ProviderError},
    event::SessionEvent,
    frame::FrameHandle,
    provider::IdentityProvider,
};

type Handshake = Shared<LocalBoxFuture<'static, Result<bool, HandshakeError>>>;

/// Pending or settled outcome of a handle's handshake.
///
/// Every clone resolves to the same value. Awaiting it is optional: the
/// handshake runs on the frame loop either way.
#[derive(Clone)]
#[must_use = "the handshake runs regardless, but its outcome is only visible through this value"]
pub struct InitResult(Handshake);

impl InitResult {
    /// The outcome, if the handshake has settled.
    pub fn peek(&self) -> Option<&Result<bool, HandshakeError>> {
        self.0.peek()
    }

    /// True once the handshake has settled.
    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }

    /// True if both values belong to the same handshake attempt.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Future for InitResult {
    type Output = Result<bool, HandshakeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx)
    }
}

impl std::fmt::Debug for InitResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InitResult").field(&self.peek()).finish()
    }
}

/// Externally visible handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    /// `init()` never called, or the last attempt failed.
    Uninitialized,
    /// Handshake in flight.
    Initializing,
    /// Handshake settled successfully.
    Initialized {
        /// Whether the provider reported an authenticated session.
        authenticated: bool,
    },
}

enum InitState {
    Uninitialized,
    Initializing(InitResult),
    Initialized { authenticated: bool, result: InitResult },
}

impl InitState {
    fn memoized(&self) -> Option<InitResult> {
        match self {
            Self::Uninitialized => None,
            Self::Initializing(result) | Self::Initialized { result, .. } => Some(result.clone()),
        }
    }

    fn phase(&self) -> InitPhase {
        match self {
            Self::Uninitialized => InitPhase::Uninitialized,
            Self::Initializing(_) => InitPhase::Initializing,
            Self::Initialized { authenticated, .. } => {
                InitPhase::Initialized { authenticated: *authenticated }
            },
        }
    }
}

struct HandleInner {
    config: ProviderConfig,
    provider: Rc<dyn IdentityProvider>,
    bus: Bus,
    frames: FrameHandle,
    base_options: InitOptions,
    state: RefCell<InitState>,
    subscription: SubscriptionId,
    peer_events: Rc<Cell<u64>>,
}

impl HandleInner {
    /// Record the handshake outcome. Runs inside the spawned handshake.
    fn settle(&self, outcome: &Result<bool, HandshakeError>) {
        let mut state = self.state.borrow_mut();
        let result = match &*state {
            InitState::Initializing(result) => result.clone(),
            _ => return,
        };

        match outcome {
            Ok(authenticated) => {
                *state = InitState::Initialized { authenticated: *authenticated, result };
                drop(state);

                tracing::info!(
                    client_id = %self.config.client_id,
                    authenticated,
                    "handshake settled"
                );
                self.bus.publish(SessionEvent::Initialized {
                    authenticated: *authenticated,
                    requester: self.config.client_id.clone(),
                });
            },
            Err(e) => {
                *state = InitState::Uninitialized;
                drop(state);

                tracing::warn!(client_id = %self.config.client_id, "{}", e);
            },
        }
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}

/// One configured identity-provider client.
///
/// Cheap to clone; clones share state. Obtain handles through
/// [`Registry::get_or_create`](crate::Registry::get_or_create) so there is
/// at most one per client id.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Rc<HandleInner>,
}

impl SessionHandle {
    /// Build a handle and subscribe it to `bus`.
    pub(crate) fn new(
        config: ProviderConfig,
        provider: Rc<dyn IdentityProvider>,
        bus: Bus,
        frames: FrameHandle,
        base_options: InitOptions,
    ) -> Self {
        let peer_events = Rc::new(Cell::new(0));

        let me = config.client_id.clone();
        let seen = Rc::clone(&peer_events);
        let subscription = bus.subscribe(move |event| {
            if event.is_from(&me) {
                return;
            }
            seen.set(seen.get() + 1);
            tracing::debug!(client_id = %me, "observed {}", event);
        });

        Self {
            inner: Rc::new(HandleInner {
                config,
                provider,
                bus,
                frames,
                base_options,
                state: RefCell::new(InitState::Uninitialized),
                subscription,
                peer_events,
            }),
        }
    }

    /// The handle's identity key.
    pub fn client_id(&self) -> &ClientId {
        &self.inner.config.client_id
    }

    /// Configuration the handle was created with.
    pub fn config(&self) -> &ProviderConfig {
        &self.inner.config
    }

    /// Current handshake phase.
    pub fn init_state(&self) -> InitPhase {
        self.inner.state.borrow().phase()
    }

    /// Start the handshake with the registry's options.
    pub fn init(&self) -> InitResult {
        self.init_with(&InitOverrides::default())
    }

    /// Start the handshake with `overrides` applied to the registry's options.
    ///
    /// If a handshake is in flight or has succeeded, returns its result and
    /// ignores `overrides`.
    pub fn init_with(&self, overrides: &InitOverrides) -> InitResult {
        let existing = self.inner.state.borrow().memoized();
        if let Some(result) = existing {
            tracing::debug!(client_id = %self.client_id(), "init already started, reusing result");
            return result;
        }

        let options = overrides.apply(self.inner.base_options.clone());
        let provider = Rc::clone(&self.inner.provider);
        let client_id = self.client_id().clone();
        let handle = Rc::downgrade(&self.inner);

        let handshake = async move {
            let outcome = provider
                .init(&options)
                .await
                .map_err(|e| HandshakeError { client_id, reason: e.reason });

            if let Some(handle) = handle.upgrade() {
                handle.settle(&outcome);
            }
            outcome
        }
        .boxed_local()
        .shared();

        let result = InitResult(handshake);
        *self.inner.state.borrow_mut() = InitState::Initializing(result.clone());
        self.inner.frames.spawn(result.clone().map(|_| ()).boxed_local());

        tracing::info!(client_id = %self.client_id(), "handshake started");
        result
    }

    /// Announce a login on the bus and start the provider's login redirect.
    ///
    /// Both happen whether or not the returned future is awaited; awaiting
    /// it only observes the provider's outcome.
    pub fn login(&self) -> LocalBoxFuture<'static, Result<(), ProviderError>> {
        self.inner.bus.publish(SessionEvent::Login { requester: self.client_id().clone() });
        let provider = Rc::clone(&self.inner.provider);
        self.redirect("login", async move { provider.login().await })
    }

    /// Announce a logout on the bus and start the provider's logout redirect.
    ///
    /// Like [`login`](Self::login), this does not depend on the returned
    /// future being awaited.
    pub fn logout(&self) -> LocalBoxFuture<'static, Result<(), ProviderError>> {
        self.inner.bus.publish(SessionEvent::Logout { requester: self.client_id().clone() });
        let provider = Rc::clone(&self.inner.provider);
        self.redirect("logout", async move { provider.logout().await })
    }

    fn redirect(
        &self,
        action: &'static str,
        call: impl Future<Output = Result<(), ProviderError>> + 'static,
    ) -> LocalBoxFuture<'static, Result<(), ProviderError>> {
        let call = call.boxed_local().shared();

        let client_id = self.client_id().clone();
        self.inner.frames.spawn(
            call.clone()
                .map(move |outcome| {
                    if let Err(e) = outcome {
                        tracing::warn!(%client_id, action, "{}", e);
                    }
                })
                .boxed_local(),
        );

        call.boxed_local()
    }

    /// Whether the provider reports an authenticated session.
    pub fn authenticated(&self) -> bool {
        self.inner.provider.authenticated()
    }

    /// Raw access token.
    pub fn token(&self) -> Option<String> {
        self.inner.provider.token()
    }

    /// Decoded access token claims.
    pub fn token_parsed(&self) -> Option<serde_json::Value> {
        self.inner.provider.token_parsed()
    }

    /// Login page URL.
    pub fn create_login_url(&self) -> String {
        self.inner.provider.create_login_url()
    }

    /// Logout endpoint URL.
    pub fn create_logout_url(&self) -> String {
        self.inner.provider.create_logout_url()
    }

    /// Number of bus events from other handles this handle has observed.
    pub fn peer_events_seen(&self) -> u64 {
        self.inner.peer_events.get()
    }

    /// True if both values refer to the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("client_id", self.client_id())
            .field("phase", &self.init_state())
            .finish_non_exhaustive()
    }
}
