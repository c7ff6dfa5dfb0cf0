//! Simulated environment.
//!
//! Provides the frame loop handle the registry schedules on and constructs a
//! [`ScriptedProvider`] per client id. Scripts are chosen per client, fall
//! back to a default, or are drawn from a seeded RNG so a run can be
//! reproduced from its seed.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use keyward_core::{
    ClientId, Environment, FrameHandle, IdentityProvider, ProviderConfig, ProviderError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::sim_provider::{Script, ScriptedProvider};

/// Client id used for model slot `slot`.
pub fn slot_id(slot: u8) -> ClientId {
    ClientId::new(format!("client-{slot}"))
}

struct SimIdp {
    default_script: Script,
    rng: Option<ChaCha8Rng>,
    scripts: HashMap<ClientId, Script>,
    providers: HashMap<ClientId, Rc<ScriptedProvider>>,
}

impl SimIdp {
    fn script_for(&mut self, client_id: &ClientId) -> Script {
        if let Some(script) = self.scripts.get(client_id) {
            return script.clone();
        }
        match self.rng.as_mut() {
            Some(rng) => match rng.gen_range(0..8u8) {
                0 => Script::Fail("simulated handshake failure".to_string()),
                n => Script::Authenticated(n % 2 == 0),
            },
            None => self.default_script.clone(),
        }
    }
}

/// Simulated environment.
///
/// Clones share the same simulated identity provider.
#[derive(Clone)]
pub struct SimEnv {
    frames: FrameHandle,
    idp: Rc<RefCell<SimIdp>>,
}

impl SimEnv {
    /// Environment whose handshakes wait for [`SimEnv::settle`].
    pub fn new(frames: FrameHandle) -> Self {
        Self::with_script(frames, Script::Manual)
    }

    /// Environment whose clients follow `script` unless overridden.
    pub fn with_script(frames: FrameHandle, script: Script) -> Self {
        Self::build(frames, script, None)
    }

    /// Environment whose handshake outcomes are drawn from `seed`.
    ///
    /// Outcomes depend on the order clients are registered in.
    pub fn with_seed(frames: FrameHandle, seed: u64) -> Self {
        Self::build(frames, Script::Manual, Some(ChaCha8Rng::seed_from_u64(seed)))
    }

    fn build(frames: FrameHandle, default_script: Script, rng: Option<ChaCha8Rng>) -> Self {
        Self {
            frames,
            idp: Rc::new(RefCell::new(SimIdp {
                default_script,
                rng,
                scripts: HashMap::new(),
                providers: HashMap::new(),
            })),
        }
    }

    /// Script for `client_id`. Only affects clients not yet connected.
    pub fn script(&self, client_id: impl Into<ClientId>, script: Script) {
        self.idp.borrow_mut().scripts.insert(client_id.into(), script);
    }

    /// Provider constructed for `client_id`.
    pub fn provider(&self, client_id: &str) -> Option<Rc<ScriptedProvider>> {
        self.idp.borrow().providers.get(client_id).cloned()
    }

    /// Resolve the oldest pending handshake of `client_id`.
    ///
    /// Returns false if the client is unknown or has nothing pending.
    pub fn settle(&self, client_id: &str, outcome: Result<bool, ProviderError>) -> bool {
        self.provider(client_id).is_some_and(|p| p.settle(outcome))
    }

    /// Number of providers constructed so far.
    pub fn connections(&self) -> usize {
        self.idp.borrow().providers.len()
    }
}

impl Environment for SimEnv {
    fn frames(&self) -> &FrameHandle {
        &self.frames
    }

    fn connect(&self, config: &ProviderConfig) -> Rc<dyn IdentityProvider> {
        let mut idp = self.idp.borrow_mut();
        let script = idp.script_for(&config.client_id);
        tracing::debug!(client_id = %config.client_id, ?script, "connecting simulated provider");

        let provider = Rc::new(ScriptedProvider::new(config.clone(), script));
        idp.providers.insert(config.client_id.clone(), Rc::clone(&provider));
        provider
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("connections", &self.connections()).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use keyward_core::{ClientConfig, FrameLoop, InitPhase, Registry};

    use super::*;

    fn config(id: &str) -> ClientConfig {
        ClientConfig::new(id, "https://sso.test/auth", "main")
    }

    #[test]
    fn manual_handshake_settles_on_demand() {
        let mut frames = FrameLoop::new();
        let env = SimEnv::new(frames.handle());
        let registry = Registry::new(env.clone());

        let handle = registry.get_or_create(&config("a")).unwrap();
        let result = handle.init();
        frames.poll_tasks();
        assert!(!result.is_settled());

        assert!(env.settle("a", Ok(true)));
        frames.poll_tasks();

        assert_eq!(result.peek(), Some(&Ok(true)));
        assert_eq!(handle.init_state(), InitPhase::Initialized { authenticated: true });
    }

    #[test]
    fn settle_unknown_client_is_rejected() {
        let frames = FrameLoop::new();
        let env = SimEnv::new(frames.handle());

        assert!(!env.settle("nobody", Ok(true)));
    }

    #[test]
    fn per_client_script_overrides_default() {
        let mut frames = FrameLoop::new();
        let env = SimEnv::with_script(frames.handle(), Script::Authenticated(true));
        env.script("b", Script::Fail("denied".to_string()));
        let registry = Registry::new(env.clone());

        let a = registry.get_or_create(&config("a")).unwrap();
        let b = registry.get_or_create(&config("b")).unwrap();
        let (ra, rb) = (a.init(), b.init());
        frames.run_until_idle();

        assert_eq!(ra.peek(), Some(&Ok(true)));
        assert!(rb.peek().unwrap().is_err());
        assert_eq!(b.init_state(), InitPhase::Uninitialized);
    }

    #[test]
    fn seeded_outcomes_are_reproducible() {
        let outcomes = |seed| {
            let frames = FrameLoop::new();
            let env = SimEnv::with_seed(frames.handle(), seed);
            let registry = Registry::new(env.clone());
            (0..8)
                .map(|slot| {
                    let id = slot_id(slot);
                    registry.get_or_create(&config(id.as_str())).unwrap();
                    env.provider(id.as_str()).unwrap().script().clone()
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(outcomes(7), outcomes(7));
    }
}
