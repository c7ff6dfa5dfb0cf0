//! Session Registry
//!
//! Memoizes one [`SessionHandle`] per client id and owns the bus the handles
//! publish on.
//!
//! ## Responsibilities
//!
//! - Validation: reject configurations missing a required field before
//!   anything is registered
//! - Memoization: the first configuration for a client id wins, later lookups
//!   return the same handle
//! - Bus ownership: one bus per registry, shared by every handle
//!
//! ## Design
//!
//! - Explicit context object: the application's composition root owns the
//!   registry (or a [`RegistryCell`]) and passes clones to its components
//! - No teardown: handles live as long as the registry

use std::{
    cell::{OnceCell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::{
    bus::{Bus, SubscriptionId},
    config::{ClientConfig, ClientId, InitOptions, RegistryConfig},
    env::Environment,
    error::ConfigError,
    event::SessionEvent,
    frame::FrameHandle,
    handle::SessionHandle,
};

struct RegistryInner<E: Environment> {
    env: E,
    base_options: InitOptions,
    bus: Bus,
    clients: RefCell<HashMap<ClientId, SessionHandle>>,
}

/// Registry of session handles, keyed by client id.
///
/// Cheap to clone; clones refer to the same registry.
pub struct Registry<E: Environment> {
    inner: Rc<RegistryInner<E>>,
}

impl<E: Environment> Registry<E> {
    /// Create a registry with default settings.
    pub fn new(env: E) -> Self {
        Self::with_config(env, RegistryConfig::default())
    }

    /// Create a registry with the given settings.
    pub fn with_config(env: E, config: RegistryConfig) -> Self {
        let bus = Bus::new(env.frames().clone());
        let base_options = config.base_options();

        Self {
            inner: Rc::new(RegistryInner {
                env,
                base_options,
                bus,
                clients: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Return the handle for `config.client_id`, creating it if needed.
    ///
    /// The configuration is validated on every call. For an already
    /// registered client id the rest of the configuration is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if `clientId`, `url` or `realm`
    /// is absent or blank. Nothing is registered in that case.
    pub fn get_or_create(&self, config: &ClientConfig) -> Result<SessionHandle, ConfigError> {
        let validated = config.validate()?;

        if let Some(existing) = self.get(validated.client_id.as_str()) {
            tracing::debug!(client_id = %validated.client_id, "client already registered");
            return Ok(existing);
        }

        let provider = self.inner.env.connect(&validated);
        let handle = SessionHandle::new(
            validated,
            provider,
            self.inner.bus.clone(),
            self.inner.env.frames().clone(),
            self.inner.base_options.clone(),
        );

        self.inner.clients.borrow_mut().insert(handle.client_id().clone(), handle.clone());
        tracing::info!(client_id = %handle.client_id(), "registered client");

        Ok(handle)
    }

    /// The handle registered under `client_id`.
    pub fn get(&self, client_id: &str) -> Option<SessionHandle> {
        self.inner.clients.borrow().get(client_id).cloned()
    }

    /// True if a handle is registered under `client_id`.
    pub fn contains(&self, client_id: &str) -> bool {
        self.inner.clients.borrow().contains_key(client_id)
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.inner.clients.borrow().len()
    }

    /// True if no handle is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered client ids, sorted.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<_> = self.inner.clients.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Subscribe to every event delivered on this registry's bus.
    pub fn subscribe(&self, handler: impl Fn(&SessionEvent) + 'static) -> SubscriptionId {
        self.inner.bus.subscribe(handler)
    }

    /// Remove a subscription. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    /// The registry's bus.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Frame loop handle the registry schedules on.
    pub fn frames(&self) -> &FrameHandle {
        self.inner.env.frames()
    }

    /// True if both values refer to the same registry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E: Environment> Clone for Registry<E> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<E: Environment> std::fmt::Debug for Registry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("clients", &self.client_ids())
            .field("bus", &self.inner.bus)
            .finish_non_exhaustive()
    }
}

/// Lazily constructed registry for a composition root.
///
/// The first [`RegistryCell::instance`] call builds the registry; every later
/// call returns the same one.
pub struct RegistryCell<E: Environment> {
    env: E,
    config: RegistryConfig,
    registry: OnceCell<Registry<E>>,
}

impl<E: Environment> RegistryCell<E> {
    /// Create an empty cell. Nothing is constructed yet.
    pub fn new(env: E, config: RegistryConfig) -> Self {
        Self { env, config, registry: OnceCell::new() }
    }

    /// The registry, constructed on first access.
    pub fn instance(&self) -> Registry<E> {
        self.registry
            .get_or_init(|| {
                tracing::debug!("constructing session registry");
                Registry::with_config(self.env.clone(), self.config.clone())
            })
            .clone()
    }

    /// True once [`RegistryCell::instance`] has been called.
    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }
}

impl<E: Environment> std::fmt::Debug for RegistryCell<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCell").field("initialized", &self.is_initialized()).finish()
    }
}
