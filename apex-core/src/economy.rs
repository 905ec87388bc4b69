//! Economy orchestration layer
//!
//! Ties the store, the single-writer actor, the clock and the process
//! launcher into the async API a bot or web front end calls.
//!
//! # Example
//!
//! ```no_run
//! use apex_core::{Config, Economy, OwnerId};
//!
//! #[tokio::main]
//! async fn main() -> apex_core::Result<()> {
//!     let economy = Economy::open(Config::default()).await?;
//!
//!     let alice = OwnerId::new("alice");
//!     economy.register(&alice).await?;
//!     let reward = economy.mine(&alice).await?;
//!     println!("mined {} coins", reward.coins);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_economy_actor, EconomyHandle},
    catalog::{Capacity, ResourceCatalog, ResourceTier, TierSelector},
    clock::{Clock, SystemClock},
    launcher::{DirectoryLauncher, NoopLauncher, ProcessLauncher},
    metrics::Metrics,
    provisioner::ProvisionEvent,
    rewards::{DailyReward, MineReward},
    store::{open_store, AccountStore},
    types::{Account, Asset, OwnerId, Profile, ResourceRecord, Snapshot, Transfer},
    Config, Error, Result,
};
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

/// A committed provisioning change and what the launcher made of it
///
/// The snapshot holds the change whatever `launch` says. A failed launch can
/// be retried with [`Economy::relaunch`].
#[derive(Debug)]
pub struct Provisioned {
    /// Committed change
    pub event: ProvisionEvent,

    /// Launcher outcome
    pub launch: Result<()>,
}

impl Provisioned {
    /// Whether the launcher applied the change
    pub fn is_launched(&self) -> bool {
        self.launch.is_ok()
    }
}

/// Main economy interface
#[derive(Clone)]
pub struct Economy {
    /// Actor handle for all state access
    handle: EconomyHandle,

    /// Materialises committed provisioning changes
    launcher: Arc<dyn ProcessLauncher>,

    /// Time source for cooldowns
    clock: Arc<dyn Clock>,

    catalog: ResourceCatalog,

    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl std::fmt::Debug for Economy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Economy")
            .field("launcher", &self.launcher)
            .field("clock", &self.clock)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl Economy {
    /// Open economy with configuration
    ///
    /// Uses the configured store backend, a [`DirectoryLauncher`] when
    /// `provision.servers_dir` is set and the system clock.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.store)?;
        let economy = Self::with_store(config, store).await?;

        match economy.config.provision.servers_dir.clone() {
            Some(dir) => Ok(economy.with_launcher(Arc::new(DirectoryLauncher::new(dir)?))),
            None => Ok(economy),
        }
    }

    /// Open economy over an existing store
    pub async fn with_store(config: Config, store: Arc<dyn AccountStore>) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            store = %store.describe(),
            "Opening economy"
        );
        let handle = spawn_economy_actor(store, &config, metrics.clone());

        Ok(Self {
            handle,
            launcher: Arc::new(NoopLauncher),
            clock: Arc::new(SystemClock),
            catalog: ResourceCatalog::new(),
            metrics,
            config,
        })
    }

    /// Set process launcher
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Set clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Purchasable server tiers
    pub fn catalog(&self) -> Vec<ResourceTier> {
        self.catalog.tiers()
    }

    /// Create an account with the starting balance
    pub async fn register(&self, owner: &OwnerId) -> Result<Account> {
        self.handle.register(owner.clone()).await
    }

    /// Refresh the cached rank and return the owner's profile
    pub async fn profile(&self, owner: &OwnerId) -> Result<Profile> {
        self.handle.profile(owner.clone()).await
    }

    /// Credit a balance
    pub async fn credit(&self, owner: &OwnerId, kind: Asset, amount: u64) -> Result<u64> {
        self.handle.credit(owner.clone(), kind, amount).await
    }

    /// Debit a balance
    pub async fn debit(&self, owner: &OwnerId, kind: Asset, amount: u64) -> Result<u64> {
        self.handle.debit(owner.clone(), kind, amount).await
    }

    /// Move `amount` of `kind` from one account to another
    pub async fn transfer(&self, from: &OwnerId, to: &OwnerId, kind: Asset, amount: u64) -> Result<()> {
        self.handle
            .transfer(Transfer {
                from: from.clone(),
                to: to.clone(),
                kind,
                amount,
            })
            .await
    }

    /// Buy a server from the catalog
    pub async fn create_server(&self, owner: &OwnerId, selector: TierSelector) -> Result<Provisioned> {
        let event = self.handle.create_server(owner.clone(), selector).await?;
        Ok(self.launch(event))
    }

    /// Move a server to a different capacity tier
    pub async fn upgrade_server(
        &self,
        owner: &OwnerId,
        old_capacity: Capacity,
        new_capacity: Capacity,
    ) -> Result<Provisioned> {
        let event = self
            .handle
            .upgrade_server(owner.clone(), old_capacity, new_capacity)
            .await?;
        Ok(self.launch(event))
    }

    /// Destroy a server; no refund
    pub async fn delete_server(&self, owner: &OwnerId, capacity: Capacity) -> Result<Provisioned> {
        let event = self.handle.delete_server(owner.clone(), capacity).await?;
        Ok(self.launch(event))
    }

    /// Servers owned by `owner`, ordered by capacity
    pub async fn list_servers(&self, owner: &OwnerId) -> Result<Vec<ResourceRecord>> {
        self.handle.list_servers(owner.clone()).await
    }

    /// Mine for coins
    ///
    /// The gate is checked up front so a blocked miner gets an immediate
    /// answer. The synthetic delay runs on the caller's task, and the claim is
    /// re-validated by the actor, so two overlapping calls earn one reward.
    pub async fn mine(&self, owner: &OwnerId) -> Result<MineReward> {
        let request_id = Uuid::now_v7();
        let now = self.clock.now();
        self.handle.check_mine(owner.clone(), now).await?;

        let delay = self.config.rewards.mine_delay_ms;
        if delay > 0 {
            tracing::debug!(%request_id, owner = %owner, delay_ms = delay, "Mining");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let reward = self.handle.mine(owner.clone(), now).await?;
        tracing::debug!(%request_id, owner = %owner, coins = reward.coins, "Mining finished");
        Ok(reward)
    }

    /// Claim the daily reward
    pub async fn claim_daily(&self, owner: &OwnerId) -> Result<DailyReward> {
        self.handle.claim_daily(owner.clone(), self.clock.now()).await
    }

    /// Buy the port forwarding add-on; returns the remaining coins
    pub async fn purchase_port_forwarding(&self, owner: &OwnerId) -> Result<u64> {
        self.handle.purchase_port_forwarding(owner.clone()).await
    }

    /// Read the full persisted snapshot
    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.handle.snapshot().await
    }

    /// Stop the actor; later calls fail with `Concurrency`
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }

    /// Apply a committed event to the launcher again
    pub fn relaunch(&self, event: &ProvisionEvent) -> Result<()> {
        self.launcher.apply(event).map_err(|e| match e {
            Error::Launcher(_) => e,
            other => Error::Launcher(other.to_string()),
        })
    }

    /// Hand a committed event to the launcher
    fn launch(&self, event: ProvisionEvent) -> Provisioned {
        let launch = self.relaunch(&event);
        if let Err(e) = &launch {
            tracing::error!(event = ?event, error = %e, "Launcher failed after commit");
        }
        Provisioned { event, launch }
    }
}
