//! Keyward demo driver.
//!
//! Wires a registry, one login widget per configured client and the
//! simulated identity provider together, runs the frame loop until idle,
//! then performs the requested login/logout clicks.
//!
//! ## Architecture
//!
//! ```text
//! keyward-demo
//!   ├─ RegistryCell<SimEnv>   (composition root)
//!   ├─ LoginWidget × N        (one per client)
//!   └─ FrameLoop              (driven to idle between steps)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;

use std::{cell::RefCell, path::Path, rc::Rc};

pub use error::DemoError;
use keyward_core::{
    ClientConfig, FrameLoop, LoginWidget, RegistryCell, RegistryConfig, Rendered, SessionEvent,
    WidgetAction,
};
use keyward_harness::{Script, SimEnv};

/// Identity provider URL used when none is given.
pub const DEFAULT_URL: &str = "http://sso.my-app.traefik.me/auth";

/// Realm used when none is given.
pub const DEFAULT_REALM: &str = "redhat-external";

/// How the simulated provider settles handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every handshake reports this authentication state.
    Scripted(bool),
    /// Outcomes drawn from a seeded RNG, failures included.
    Seeded(u64),
}

impl Default for Outcome {
    fn default() -> Self {
        Self::Scripted(false)
    }
}

/// Demo configuration.
#[derive(Debug, Clone, Default)]
pub struct DemoConfig {
    /// Clients to render a widget for.
    pub clients: Vec<ClientConfig>,
    /// Registry-wide settings.
    pub registry: RegistryConfig,
    /// Handshake outcomes.
    pub outcome: Outcome,
    /// Client ids to log in after the handshakes settle.
    pub login: Vec<String>,
    /// Client ids to log out after the handshakes settle.
    pub logout: Vec<String>,
}

/// What the demo observed.
#[derive(Debug, Clone, Default)]
pub struct DemoReport {
    /// Every event delivered on the bus, in delivery order.
    pub deliveries: Vec<SessionEvent>,
    /// Final render of each widget, in client order.
    pub renders: Vec<Rendered>,
    /// Frame callbacks run.
    pub callbacks: usize,
}

/// Read a JSON array of client configurations.
pub fn load_clients(path: &Path) -> Result<Vec<ClientConfig>, DemoError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| DemoError::Io { path: path.to_path_buf(), source })?;

    serde_json::from_str(&raw)
        .map_err(|source| DemoError::Json { path: path.to_path_buf(), source })
}

/// Run the demo to completion.
pub fn run(config: DemoConfig) -> Result<DemoReport, DemoError> {
    if config.clients.is_empty() {
        return Err(DemoError::NoClients);
    }

    let mut frames = FrameLoop::new();
    let env = match config.outcome {
        Outcome::Scripted(authenticated) => {
            SimEnv::with_script(frames.handle(), Script::Authenticated(authenticated))
        },
        Outcome::Seeded(seed) => SimEnv::with_seed(frames.handle(), seed),
    };
    let registry = RegistryCell::new(env, config.registry).instance();

    let deliveries = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&deliveries);
    registry.subscribe(move |event| {
        tracing::info!(kind = %event.kind(), requester = %event.requester(), "delivered");
        sink.borrow_mut().push(event.clone());
    });

    let mut widgets = Vec::with_capacity(config.clients.len());
    for (index, client) in config.clients.iter().enumerate() {
        // Registering first keeps provider-specific fields; the widget then
        // attaches to the same handle.
        let handle =
            registry.get_or_create(client).map_err(|source| DemoError::Config { index, source })?;
        let provider = handle.config();

        let mut widget = LoginWidget::new(registry.clone());
        let rejected = |source| DemoError::Config { index, source };
        widget.set_url(Some(provider.url.clone())).map_err(rejected)?;
        widget.set_realm(Some(provider.realm.clone())).map_err(rejected)?;
        widget.set_client_id(Some(provider.client_id.to_string())).map_err(rejected)?;

        tracing::debug!(
            client_id = %provider.client_id,
            login_url = %handle.create_login_url(),
            "widget attached"
        );
        widgets.push(widget);
    }

    let mut callbacks = frames.run_until_idle();
    log_renders(&widgets);

    let requested = [(&config.login, WidgetAction::Login), (&config.logout, WidgetAction::Logout)];
    for (ids, action) in requested {
        for id in ids {
            click(&mut frames, &widgets, id, action)?;
            callbacks += frames.run_until_idle();
        }
    }
    log_renders(&widgets);

    let deliveries = deliveries.borrow().clone();
    let renders = widgets.iter().map(LoginWidget::render).collect();
    Ok(DemoReport { deliveries, renders, callbacks })
}

fn click(
    frames: &mut FrameLoop,
    widgets: &[LoginWidget<SimEnv>],
    client_id: &str,
    action: WidgetAction,
) -> Result<(), DemoError> {
    let widget = widgets
        .iter()
        .find(|w| w.client().is_some_and(|h| h.client_id().as_str() == client_id))
        .ok_or_else(|| DemoError::UnknownClient(client_id.to_string()))?;

    if widget.render().action != action {
        tracing::info!(client_id, %action, "skipped, widget shows the other action");
        return Ok(());
    }

    let pending = widget.click().ok_or_else(|| DemoError::UnknownClient(client_id.to_string()))?;
    match frames.block_on(pending) {
        Some(outcome) => {
            outcome?;
            tracing::info!(client_id, %action, "clicked");
            Ok(())
        },
        None => Err(DemoError::Stalled(format!("{action} for {client_id}"))),
    }
}

fn log_renders(widgets: &[LoginWidget<SimEnv>]) {
    for widget in widgets.iter().filter(|w| w.take_dirty()) {
        tracing::info!("render\n{}", widget.render());
    }
}
