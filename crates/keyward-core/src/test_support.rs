//! In-crate test doubles.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::{
    ClientId, Environment, FrameHandle, IdentityProvider, InitOptions, ProviderConfig,
    ProviderError,
};

/// Provider whose handshake settles when the test calls [`TestProvider::settle`].
#[derive(Default)]
pub struct TestProvider {
    pub init_calls: Cell<u32>,
    pub login_calls: Cell<u32>,
    pub logout_calls: Cell<u32>,
    pub last_options: RefCell<Option<InitOptions>>,
    pub authenticated: Cell<bool>,
    pending: RefCell<Vec<oneshot::Sender<Result<bool, ProviderError>>>>,
}

impl TestProvider {
    /// Resolve the oldest pending handshake.
    pub fn settle(&self, outcome: Result<bool, ProviderError>) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.is_empty() {
            return false;
        }
        pending.remove(0).send(outcome).is_ok()
    }
}

#[async_trait(?Send)]
impl IdentityProvider for TestProvider {
    async fn init(&self, options: &InitOptions) -> Result<bool, ProviderError> {
        self.init_calls.set(self.init_calls.get() + 1);
        *self.last_options.borrow_mut() = Some(options.clone());

        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push(tx);

        let outcome = rx.await.map_err(|_| ProviderError::new("handshake abandoned"))?;
        if let Ok(authenticated) = outcome {
            self.authenticated.set(authenticated);
        }
        outcome
    }

    async fn login(&self) -> Result<(), ProviderError> {
        self.login_calls.set(self.login_calls.get() + 1);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ProviderError> {
        self.logout_calls.set(self.logout_calls.get() + 1);
        Ok(())
    }

    fn authenticated(&self) -> bool {
        self.authenticated.get()
    }

    fn token(&self) -> Option<String> {
        self.authenticated.get().then(|| "token".to_string())
    }

    fn token_parsed(&self) -> Option<serde_json::Value> {
        self.authenticated.get().then(|| serde_json::json!({ "sub": "user-1" }))
    }

    fn create_login_url(&self) -> String {
        "https://idp.test/login".to_string()
    }

    fn create_logout_url(&self) -> String {
        "https://idp.test/logout".to_string()
    }
}

/// Environment handing out one [`TestProvider`] per client id.
#[derive(Clone)]
pub struct TestEnv {
    frames: FrameHandle,
    providers: Rc<RefCell<HashMap<ClientId, Rc<TestProvider>>>>,
}

impl TestEnv {
    pub fn new(frames: FrameHandle) -> Self {
        Self { frames, providers: Rc::default() }
    }

    pub fn provider(&self, client_id: &str) -> Option<Rc<TestProvider>> {
        self.providers.borrow().get(client_id).cloned()
    }

    pub fn connections(&self) -> usize {
        self.providers.borrow().len()
    }
}

impl Environment for TestEnv {
    fn frames(&self) -> &FrameHandle {
        &self.frames
    }

    fn connect(&self, config: &ProviderConfig) -> Rc<dyn IdentityProvider> {
        let provider = Rc::new(TestProvider::default());
        self.providers.borrow_mut().insert(config.client_id.clone(), Rc::clone(&provider));
        provider
    }
}
