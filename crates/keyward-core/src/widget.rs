//! Login/logout button bound to a session handle.
//!
//! The widget owns no rendering surface. [`LoginWidget::render`] describes
//! what to draw and [`LoginWidget::take_dirty`] tells the host when to draw
//! it again.

use std::{cell::Cell, fmt, rc::Rc};

use futures::{FutureExt, future::LocalBoxFuture};

use crate::{
    bus::SubscriptionId,
    config::ClientConfig,
    env::Environment,
    error::{ConfigError, ProviderError},
    handle::SessionHandle,
    registry::Registry,
};

/// What the widget's button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetAction {
    /// Start the login redirect.
    Login,
    /// Start the logout redirect.
    Logout,
}

impl fmt::Display for WidgetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::Logout => "logout",
        })
    }
}

/// Output of [`LoginWidget::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Title line.
    pub heading: String,
    /// Button action.
    pub action: WidgetAction,
    /// Pretty-printed token claims.
    pub token: Option<String>,
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.heading)?;
        write!(f, "[{}]", self.action)?;
        if let Some(token) = &self.token {
            write!(f, "\n{token}")?;
        }
        Ok(())
    }
}

/// Login button for one client.
///
/// Attaches to the registry once `client_id`, `url` and `realm` are all set,
/// starts the handshake, and asks for a re-render when it settles or when
/// any session event is delivered.
pub struct LoginWidget<E: Environment> {
    registry: Registry<E>,
    client_id: Option<String>,
    url: Option<String>,
    realm: Option<String>,
    client: Option<SessionHandle>,
    dirty: Rc<Cell<bool>>,
    subscription: SubscriptionId,
}

impl<E: Environment> LoginWidget<E> {
    /// Create a detached widget.
    pub fn new(registry: Registry<E>) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        let subscription = registry.subscribe(move |_| flag.set(true));

        Self { registry, client_id: None, url: None, realm: None, client: None, dirty, subscription }
    }

    /// Set the client id. Re-attaches when it changes.
    ///
    /// Returns whether the widget is attached afterwards.
    pub fn set_client_id(&mut self, client_id: Option<String>) -> Result<bool, ConfigError> {
        if self.client_id == client_id {
            return Ok(self.client.is_some());
        }
        self.client_id = client_id;
        self.client = None;
        self.attach()
    }

    /// Set the identity provider URL. Attaches if this completes the config.
    pub fn set_url(&mut self, url: Option<String>) -> Result<bool, ConfigError> {
        self.url = url;
        self.attach_if_detached()
    }

    /// Set the realm. Attaches if this completes the config.
    pub fn set_realm(&mut self, realm: Option<String>) -> Result<bool, ConfigError> {
        self.realm = realm;
        self.attach_if_detached()
    }

    /// Handle the widget is bound to.
    pub fn client(&self) -> Option<&SessionHandle> {
        self.client.as_ref()
    }

    /// Describe the current state.
    pub fn render(&self) -> Rendered {
        let heading = format!("ClientId: {}", self.client_id.as_deref().unwrap_or_default());

        let action = match &self.client {
            Some(client) if client.authenticated() => WidgetAction::Logout,
            _ => WidgetAction::Login,
        };

        let token = self
            .client
            .as_ref()
            .and_then(SessionHandle::token_parsed)
            .and_then(|claims| serde_json::to_string_pretty(&claims).ok());

        Rendered { heading, action, token }
    }

    /// Perform the button's action.
    ///
    /// The action starts immediately; the returned future only reports the
    /// provider's outcome. Returns `None` when detached.
    pub fn click(&self) -> Option<LocalBoxFuture<'static, Result<WidgetAction, ProviderError>>> {
        let client = self.client.as_ref()?;
        let action = self.render().action;

        let outcome = match action {
            WidgetAction::Login => client.login(),
            WidgetAction::Logout => client.logout(),
        };
        self.dirty.set(true);

        Some(outcome.map(move |outcome| outcome.map(|()| action)).boxed_local())
    }

    /// True if the widget should be rendered again. Clears the flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    fn attach_if_detached(&mut self) -> Result<bool, ConfigError> {
        if self.client.is_some() {
            return Ok(true);
        }
        self.attach()
    }

    fn attach(&mut self) -> Result<bool, ConfigError> {
        let (Some(client_id), Some(url), Some(realm)) = (&self.client_id, &self.url, &self.realm)
        else {
            return Ok(false);
        };

        let config = ClientConfig::new(client_id.as_str(), url.as_str(), realm.as_str());
        let client = self.registry.get_or_create(&config)?;

        let settled = client.init();
        let dirty = Rc::clone(&self.dirty);
        self.registry.frames().spawn(
            async move {
                let _ = settled.await;
                dirty.set(true);
            }
            .boxed_local(),
        );

        self.client = Some(client);
        self.dirty.set(true);
        Ok(true)
    }
}

impl<E: Environment> Drop for LoginWidget<E> {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.subscription);
    }
}

impl<E: Environment> fmt::Debug for LoginWidget<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginWidget")
            .field("client_id", &self.client_id)
            .field("attached", &self.client.is_some())
            .field("dirty", &self.dirty.get())
            .finish_non_exhaustive()
    }
}
