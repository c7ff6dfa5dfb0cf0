//! Keyward demo binary.
//!
//! # Usage
//!
//! ```bash
//! # Two clients against the default provider, both anonymous, then log in "app"
//! keyward-demo --client app --client admin --login app
//!
//! # Clients from a file, handshake outcomes drawn from a seed
//! keyward-demo --clients clients.json --seed 42 --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;
use keyward_core::{ClientConfig, RegistryConfig};
use keyward_demo::{DEFAULT_REALM, DEFAULT_URL, DemoConfig, Outcome, load_clients};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keyward session registry demo
#[derive(Parser, Debug)]
#[command(name = "keyward-demo")]
#[command(about = "Render login widgets against a simulated identity provider")]
#[command(version)]
struct Args {
    /// Client id to render a widget for (repeatable)
    #[arg(short, long = "client")]
    clients: Vec<String>,

    /// Identity provider URL for `--client` entries
    #[arg(short, long, default_value = DEFAULT_URL)]
    url: String,

    /// Realm for `--client` entries
    #[arg(short, long, default_value = DEFAULT_REALM)]
    realm: String,

    /// JSON file holding an array of client configurations
    #[arg(long = "clients")]
    clients_file: Option<PathBuf>,

    /// Application URL used for the silent SSO redirect
    #[arg(long)]
    app_url: Option<String>,

    /// Handshakes report an authenticated session
    #[arg(long)]
    authenticated: bool,

    /// Draw handshake outcomes from this seed instead
    #[arg(long, conflicts_with = "authenticated")]
    seed: Option<u64>,

    /// Log in this client after the handshakes settle (repeatable)
    #[arg(long)]
    login: Vec<String>,

    /// Log out this client after the handshakes settle (repeatable)
    #[arg(long)]
    logout: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut clients = match &args.clients_file {
        Some(path) => load_clients(path)?,
        None => Vec::new(),
    };
    clients.extend(
        args.clients.iter().map(|id| ClientConfig::new(id.as_str(), &*args.url, &*args.realm)),
    );

    let outcome = match args.seed {
        Some(seed) => Outcome::Seeded(seed),
        None => Outcome::Scripted(args.authenticated),
    };

    let config = DemoConfig {
        clients,
        registry: RegistryConfig { app_url: args.app_url, ..Default::default() },
        outcome,
        login: args.login,
        logout: args.logout,
    };

    tracing::info!(clients = config.clients.len(), ?outcome, "keyward demo starting");

    let report = keyward_demo::run(config)?;

    tracing::info!(
        deliveries = report.deliveries.len(),
        callbacks = report.callbacks,
        "demo finished"
    );
    for rendered in &report.renders {
        tracing::info!("final\n{rendered}");
    }

    Ok(())
}
