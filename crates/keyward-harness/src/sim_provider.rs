//! Scripted identity provider.
//!
//! Stands in for the external OIDC library. The handshake outcome comes from
//! a [`Script`]: fixed up front, or held open until [`ScriptedProvider::settle`]
//! is called.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use async_trait::async_trait;
use keyward_core::{IdentityProvider, InitOptions, ProviderConfig, ProviderError};
use serde_json::json;
use tokio::sync::oneshot;

/// How a scripted handshake settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Settle immediately with this authentication state.
    Authenticated(bool),
    /// Reject immediately with this reason.
    Fail(String),
    /// Stay pending until [`ScriptedProvider::settle`].
    Manual,
}

/// Identity provider driven by a [`Script`].
///
/// `login()` and `logout()` stand in for the redirect round trip: they flip
/// the authentication state and resolve immediately.
pub struct ScriptedProvider {
    config: ProviderConfig,
    script: Script,
    authenticated: Cell<bool>,
    init_calls: Cell<u32>,
    login_calls: Cell<u32>,
    logout_calls: Cell<u32>,
    last_options: RefCell<Option<InitOptions>>,
    redirect_error: RefCell<Option<String>>,
    pending: RefCell<VecDeque<oneshot::Sender<Result<bool, ProviderError>>>>,
}

impl ScriptedProvider {
    /// Create a provider for `config` that follows `script`.
    pub fn new(config: ProviderConfig, script: Script) -> Self {
        Self {
            config,
            script,
            authenticated: Cell::new(false),
            init_calls: Cell::new(0),
            login_calls: Cell::new(0),
            logout_calls: Cell::new(0),
            last_options: RefCell::new(None),
            redirect_error: RefCell::new(None),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    /// Configuration the provider was constructed with.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Script the provider follows.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Resolve the oldest pending handshake.
    ///
    /// Returns false if no handshake is pending.
    pub fn settle(&self, outcome: Result<bool, ProviderError>) -> bool {
        let Some(sender) = self.pending.borrow_mut().pop_front() else {
            return false;
        };
        sender.send(outcome).is_ok()
    }

    /// Number of handshakes waiting for [`ScriptedProvider::settle`].
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Make later `login()`/`logout()` calls fail with `reason`.
    pub fn fail_redirects(&self, reason: impl Into<String>) {
        *self.redirect_error.borrow_mut() = Some(reason.into());
    }

    /// Times `init` was called.
    pub fn init_calls(&self) -> u32 {
        self.init_calls.get()
    }

    /// Times `login` was called.
    pub fn login_calls(&self) -> u32 {
        self.login_calls.get()
    }

    /// Times `logout` was called.
    pub fn logout_calls(&self) -> u32 {
        self.logout_calls.get()
    }

    /// Options passed to the most recent `init`.
    pub fn last_options(&self) -> Option<InitOptions> {
        self.last_options.borrow().clone()
    }

    fn redirect(&self, authenticated: bool) -> Result<(), ProviderError> {
        if let Some(reason) = self.redirect_error.borrow().as_ref() {
            return Err(ProviderError::new(reason.as_str()));
        }
        self.authenticated.set(authenticated);
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{path}?client_id={}",
            self.config.url.trim_end_matches('/'),
            self.config.realm,
            self.config.client_id
        )
    }
}

#[async_trait(?Send)]
impl IdentityProvider for ScriptedProvider {
    async fn init(&self, options: &InitOptions) -> Result<bool, ProviderError> {
        self.init_calls.set(self.init_calls.get() + 1);
        *self.last_options.borrow_mut() = Some(options.clone());

        let outcome = match &self.script {
            Script::Authenticated(authenticated) => Ok(*authenticated),
            Script::Fail(reason) => Err(ProviderError::new(reason.as_str())),
            Script::Manual => {
                let (tx, rx) = oneshot::channel();
                self.pending.borrow_mut().push_back(tx);
                rx.await.map_err(|_| ProviderError::new("handshake abandoned"))?
            },
        };

        if let Ok(authenticated) = outcome {
            self.authenticated.set(authenticated);
        }
        tracing::trace!(client_id = %self.config.client_id, ?outcome, "scripted handshake");
        outcome
    }

    async fn login(&self) -> Result<(), ProviderError> {
        self.login_calls.set(self.login_calls.get() + 1);
        self.redirect(true)
    }

    async fn logout(&self) -> Result<(), ProviderError> {
        self.logout_calls.set(self.logout_calls.get() + 1);
        self.redirect(false)
    }

    fn authenticated(&self) -> bool {
        self.authenticated.get()
    }

    fn token(&self) -> Option<String> {
        self.authenticated.get().then(|| format!("sim-token.{}", self.config.client_id))
    }

    fn token_parsed(&self) -> Option<serde_json::Value> {
        self.authenticated.get().then(|| {
            let issuer =
                format!("{}/realms/{}", self.config.url.trim_end_matches('/'), self.config.realm);
            json!({
                "azp": self.config.client_id.as_str(),
                "iss": issuer,
                "preferred_username": "sim-user",
            })
        })
    }

    fn create_login_url(&self) -> String {
        self.endpoint("auth")
    }

    fn create_logout_url(&self) -> String {
        self.endpoint("logout")
    }
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("client_id", &self.config.client_id)
            .field("script", &self.script)
            .field("authenticated", &self.authenticated.get())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::FutureExt;
    use keyward_core::ClientConfig;

    use super::*;

    fn provider(script: Script) -> ScriptedProvider {
        let config = ClientConfig::new("app", "https://sso.test/auth/", "main").validate().unwrap();
        ScriptedProvider::new(config, script)
    }

    #[test]
    fn fixed_script_settles_on_first_poll() {
        let p = provider(Script::Authenticated(true));
        let outcome = p.init(&InitOptions::default()).now_or_never().unwrap();

        assert_eq!(outcome, Ok(true));
        assert!(p.authenticated());
        assert_eq!(p.token().as_deref(), Some("sim-token.app"));
    }

    #[test]
    fn failing_script_leaves_session_anonymous() {
        let p = provider(Script::Fail("boom".to_string()));
        let outcome = p.init(&InitOptions::default()).now_or_never().unwrap();

        assert_eq!(outcome, Err(ProviderError::new("boom")));
        assert!(!p.authenticated());
        assert!(p.token_parsed().is_none());
    }

    #[test]
    fn manual_script_waits_for_settle() {
        let p = provider(Script::Manual);
        let options = InitOptions::default();
        let mut init = p.init(&options);

        assert!(init.as_mut().now_or_never().is_none());
        assert_eq!(p.pending(), 1);

        assert!(p.settle(Ok(false)));
        assert_eq!(init.now_or_never().unwrap(), Ok(false));
        assert!(!p.settle(Ok(true)));
    }

    #[test]
    fn redirects_flip_authentication() {
        let p = provider(Script::Authenticated(false));
        p.login().now_or_never().unwrap().unwrap();
        assert!(p.authenticated());

        p.logout().now_or_never().unwrap().unwrap();
        assert!(!p.authenticated());
        assert_eq!((p.login_calls(), p.logout_calls()), (1, 1));
    }

    #[test]
    fn redirect_failure_is_reported() {
        let p = provider(Script::Authenticated(false));
        p.fail_redirects("offline");

        assert!(p.login().now_or_never().unwrap().is_err());
        assert!(!p.authenticated());
    }

    #[test]
    fn endpoints_follow_realm_layout() {
        let p = provider(Script::Manual);
        assert_eq!(
            p.create_login_url(),
            "https://sso.test/auth/realms/main/protocol/openid-connect/auth?client_id=app"
        );
        assert!(p.create_logout_url().contains("/openid-connect/logout?"));
    }
}
