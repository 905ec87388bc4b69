//! Read-only snapshot inspector
//!
//! Usage: `apex-inspect [config.toml]`. Without a file the `APEX_*`
//! environment variables and defaults are used.

use anyhow::Context;
use apex_core::{store::open_store_read_only, Config};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };

    let store = open_store_read_only(&config.store).context("Failed to open store")?;
    let snapshot = store.load().context("Failed to load snapshot")?;

    tracing::info!(
        store = %store.describe(),
        version = snapshot.version,
        accounts = snapshot.accounts.len(),
        resources = snapshot.resources.len(),
        "Snapshot loaded"
    );

    for (owner, account) in &snapshot.accounts {
        tracing::info!(
            owner = %owner,
            rank = %account.rank,
            coins = account.coins,
            tokens = account.tokens,
            port_forwarding = account.port_forwarding,
            "Account"
        );
    }

    for (key, record) in &snapshot.resources {
        tracing::info!(
            server = %key,
            owner = %record.owner,
            capacity = record.capacity.mb(),
            launch = %record.launch_descriptor,
            "Server"
        );
    }

    Ok(())
}
