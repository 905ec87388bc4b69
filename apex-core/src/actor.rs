//! Single-writer actor around the snapshot store
//!
//! Every action is one load → validate → mutate → save unit. Running all of
//! them on one task means two actions never interleave their load and save,
//! so the whole-snapshot write cannot lose a concurrent update.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Economy (Clone)                      │
//! │   clock, mining delay, process launcher              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              EconomyActor (Single Task)              │
//! │   load snapshot → ledger/provisioner/rewards → save  │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//!               AccountStore::save()
//!        (CAS on snapshot version, atomic replace)
//! ```

use crate::catalog::{Capacity, TierSelector};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::provisioner::{ProvisionEvent, Provisioner};
use crate::rewards::{DailyReward, MineReward, RewardService};
use crate::store::AccountStore;
use crate::types::{Account, Asset, OwnerId, Profile, ResourceRecord, Snapshot, Transfer};
use crate::{catalog::ResourceCatalog, ledger, shop, Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Message sent to the economy actor
pub enum EconomyMessage {
    /// Create an account
    Register {
        owner: OwnerId,
        response: Reply<Account>,
    },

    /// Refresh rank and read profile
    Profile {
        owner: OwnerId,
        response: Reply<Profile>,
    },

    /// Credit a balance
    Credit {
        owner: OwnerId,
        kind: Asset,
        amount: u64,
        response: Reply<u64>,
    },

    /// Debit a balance
    Debit {
        owner: OwnerId,
        kind: Asset,
        amount: u64,
        response: Reply<u64>,
    },

    /// Move a balance between accounts
    Transfer {
        transfer: Transfer,
        response: Reply<()>,
    },

    /// Buy a server
    CreateServer {
        owner: OwnerId,
        selector: TierSelector,
        response: Reply<ProvisionEvent>,
    },

    /// Resize a server
    UpgradeServer {
        owner: OwnerId,
        old_capacity: Capacity,
        new_capacity: Capacity,
        response: Reply<ProvisionEvent>,
    },

    /// Delete a server
    DeleteServer {
        owner: OwnerId,
        capacity: Capacity,
        response: Reply<ProvisionEvent>,
    },

    /// List an owner's servers
    ListServers {
        owner: OwnerId,
        response: Reply<Vec<ResourceRecord>>,
    },

    /// Check the mining gate without claiming
    CheckMine {
        owner: OwnerId,
        now: i64,
        response: Reply<()>,
    },

    /// Claim a mining reward
    Mine {
        owner: OwnerId,
        now: i64,
        response: Reply<MineReward>,
    },

    /// Claim the daily reward
    ClaimDaily {
        owner: OwnerId,
        now: i64,
        response: Reply<DailyReward>,
    },

    /// Buy port forwarding
    PurchasePortForwarding {
        owner: OwnerId,
        response: Reply<u64>,
    },

    /// Read the full snapshot
    Snapshot {
        response: Reply<Snapshot>,
    },

    /// Shutdown actor
    Shutdown,
}

impl std::fmt::Debug for EconomyMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EconomyMessage::Register { .. } => "Register",
            EconomyMessage::Profile { .. } => "Profile",
            EconomyMessage::Credit { .. } => "Credit",
            EconomyMessage::Debit { .. } => "Debit",
            EconomyMessage::Transfer { .. } => "Transfer",
            EconomyMessage::CreateServer { .. } => "CreateServer",
            EconomyMessage::UpgradeServer { .. } => "UpgradeServer",
            EconomyMessage::DeleteServer { .. } => "DeleteServer",
            EconomyMessage::ListServers { .. } => "ListServers",
            EconomyMessage::CheckMine { .. } => "CheckMine",
            EconomyMessage::Mine { .. } => "Mine",
            EconomyMessage::ClaimDaily { .. } => "ClaimDaily",
            EconomyMessage::PurchasePortForwarding { .. } => "PurchasePortForwarding",
            EconomyMessage::Snapshot { .. } => "Snapshot",
            EconomyMessage::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Components the actor applies to a loaded snapshot
struct Services {
    provisioner: Provisioner,
    rewards: RewardService,
    rng: StdRng,
    starting_coins: u64,
    port_forwarding_price: u64,
}

/// Actor that processes economy messages
pub struct EconomyActor {
    /// Storage backend
    store: Arc<dyn AccountStore>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<EconomyMessage>,

    services: Services,

    metrics: Metrics,
}

impl std::fmt::Debug for EconomyActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EconomyActor")
            .field("store", &self.store.describe())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl EconomyActor {
    /// Create new actor
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailbox: mpsc::Receiver<EconomyMessage>,
        config: &Config,
        metrics: Metrics,
    ) -> Self {
        let rng = match config.rewards.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            store,
            mailbox,
            services: Services {
                provisioner: Provisioner::new(ResourceCatalog::new(), config.provision.clone()),
                rewards: RewardService::new(config.rewards.clone()),
                rng,
                starting_coins: config.rewards.starting_coins,
                port_forwarding_price: config.provision.port_forwarding_price,
            },
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        tracing::info!(store = %self.store.describe(), "Economy actor started");

        while let Some(msg) = self.mailbox.recv().await {
            if let EconomyMessage::Shutdown = msg {
                break;
            }
            tracing::debug!(message = ?msg, "Handling message");
            self.handle_message(msg);
        }

        tracing::info!("Economy actor stopped");
    }

    /// Load, apply `action`, and save only if it succeeded
    fn transact<T>(
        &mut self,
        name: &'static str,
        action: impl FnOnce(&mut Snapshot, &mut Services) -> Result<T>,
    ) -> Result<T> {
        let result = self.store.load().and_then(|mut snapshot| {
            let value = action(&mut snapshot, &mut self.services)?;
            self.store.save(&snapshot)?;
            self.metrics.set_resources_active(snapshot.resources.len());
            Ok(value)
        });

        self.metrics.record_action(name, result.is_ok());
        match &result {
            Err(e) if e.is_storage() => {
                tracing::error!(action = name, error = %e, "Storage failure, action aborted")
            }
            Err(e) => tracing::warn!(action = name, error = %e, "Action rejected"),
            Ok(_) => {}
        }
        result
    }

    /// Load and run a read-only query
    fn query<T>(&self, query: impl FnOnce(&Snapshot, &Services) -> Result<T>) -> Result<T> {
        let snapshot = self.store.load()?;
        query(&snapshot, &self.services)
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: EconomyMessage) {
        match msg {
            EconomyMessage::Register { owner, response } => {
                let result = self.transact("register", |snapshot, services| {
                    ledger::register(snapshot, &owner, services.starting_coins).cloned()
                });
                let _ = response.send(result);
            }

            EconomyMessage::Profile { owner, response } => {
                let result = self.transact("profile", |snapshot, _| snapshot.profile(&owner));
                let _ = response.send(result);
            }

            EconomyMessage::Credit {
                owner,
                kind,
                amount,
                response,
            } => {
                let result = self.transact("credit", |snapshot, _| {
                    ledger::credit(snapshot, &owner, kind, amount)
                });
                if result.is_ok() && kind == Asset::Coins {
                    self.metrics.record_minted(amount);
                }
                let _ = response.send(result);
            }

            EconomyMessage::Debit {
                owner,
                kind,
                amount,
                response,
            } => {
                let result = self.transact("debit", |snapshot, _| {
                    ledger::debit(snapshot, &owner, kind, amount)
                });
                if result.is_ok() && kind == Asset::Coins {
                    self.metrics.record_burned(amount);
                }
                let _ = response.send(result);
            }

            EconomyMessage::Transfer { transfer, response } => {
                let result = self.transact("transfer", |snapshot, _| {
                    ledger::transfer(snapshot, &transfer)
                });
                if result.is_ok() {
                    tracing::info!(
                        from = %transfer.from,
                        to = %transfer.to,
                        kind = %transfer.kind,
                        amount = transfer.amount,
                        "Transfer committed"
                    );
                }
                let _ = response.send(result);
            }

            EconomyMessage::CreateServer {
                owner,
                selector,
                response,
            } => {
                let result = self.transact("create_server", |snapshot, services| {
                    services.provisioner.create(snapshot, &owner, selector)
                });
                if result.is_ok() {
                    if let Ok(tier) = self.services.provisioner.catalog().lookup(selector) {
                        self.metrics.record_burned(tier.price_coins);
                    }
                }
                let _ = response.send(result);
            }

            EconomyMessage::UpgradeServer {
                owner,
                old_capacity,
                new_capacity,
                response,
            } => {
                let result = self.transact("upgrade_server", |snapshot, services| {
                    services
                        .provisioner
                        .upgrade(snapshot, &owner, old_capacity, new_capacity)
                });
                if result.is_ok() {
                    let cost = self.services.provisioner.upgrade_cost(new_capacity);
                    self.metrics.record_burned(cost);
                }
                let _ = response.send(result);
            }

            EconomyMessage::DeleteServer {
                owner,
                capacity,
                response,
            } => {
                let result = self.transact("delete_server", |snapshot, services| {
                    services.provisioner.delete(snapshot, &owner, capacity)
                });
                let _ = response.send(result);
            }

            EconomyMessage::ListServers { owner, response } => {
                let result = self.query(|snapshot, services| {
                    snapshot.account(&owner)?;
                    Ok(services.provisioner.list_for(snapshot, &owner))
                });
                let _ = response.send(result);
            }

            EconomyMessage::CheckMine {
                owner,
                now,
                response,
            } => {
                let result =
                    self.query(|snapshot, services| services.rewards.check_mine(snapshot, &owner, now));
                let _ = response.send(result);
            }

            EconomyMessage::Mine {
                owner,
                now,
                response,
            } => {
                let result = self.transact("mine", |snapshot, services| {
                    services
                        .rewards
                        .mine(snapshot, &owner, now, &mut services.rng)
                });
                if let Ok(reward) = &result {
                    self.metrics.record_minted(reward.coins);
                }
                let _ = response.send(result);
            }

            EconomyMessage::ClaimDaily {
                owner,
                now,
                response,
            } => {
                let result = self.transact("claim_daily", |snapshot, services| {
                    services.rewards.claim_daily(snapshot, &owner, now)
                });
                if let Ok(reward) = &result {
                    self.metrics.record_minted(reward.coins);
                }
                let _ = response.send(result);
            }

            EconomyMessage::PurchasePortForwarding { owner, response } => {
                let price = self.services.port_forwarding_price;
                let result = self.transact("port_forwarding", |snapshot, _| {
                    shop::purchase_port_forwarding(snapshot, &owner, price)
                });
                if result.is_ok() {
                    self.metrics.record_burned(price);
                }
                let _ = response.send(result);
            }

            EconomyMessage::Snapshot { response } => {
                let _ = response.send(self.store.load());
            }

            EconomyMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct EconomyHandle {
    sender: mpsc::Sender<EconomyMessage>,
}

impl EconomyHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<EconomyMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> EconomyMessage) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create an account
    pub async fn register(&self, owner: OwnerId) -> Result<Account> {
        self.request(|response| EconomyMessage::Register { owner, response })
            .await
    }

    /// Refresh rank and read profile
    pub async fn profile(&self, owner: OwnerId) -> Result<Profile> {
        self.request(|response| EconomyMessage::Profile { owner, response })
            .await
    }

    /// Credit a balance
    pub async fn credit(&self, owner: OwnerId, kind: Asset, amount: u64) -> Result<u64> {
        self.request(|response| EconomyMessage::Credit {
            owner,
            kind,
            amount,
            response,
        })
        .await
    }

    /// Debit a balance
    pub async fn debit(&self, owner: OwnerId, kind: Asset, amount: u64) -> Result<u64> {
        self.request(|response| EconomyMessage::Debit {
            owner,
            kind,
            amount,
            response,
        })
        .await
    }

    /// Move a balance between accounts
    pub async fn transfer(&self, transfer: Transfer) -> Result<()> {
        self.request(|response| EconomyMessage::Transfer { transfer, response })
            .await
    }

    /// Buy a server
    pub async fn create_server(&self, owner: OwnerId, selector: TierSelector) -> Result<ProvisionEvent> {
        self.request(|response| EconomyMessage::CreateServer {
            owner,
            selector,
            response,
        })
        .await
    }

    /// Resize a server
    pub async fn upgrade_server(
        &self,
        owner: OwnerId,
        old_capacity: Capacity,
        new_capacity: Capacity,
    ) -> Result<ProvisionEvent> {
        self.request(|response| EconomyMessage::UpgradeServer {
            owner,
            old_capacity,
            new_capacity,
            response,
        })
        .await
    }

    /// Delete a server
    pub async fn delete_server(&self, owner: OwnerId, capacity: Capacity) -> Result<ProvisionEvent> {
        self.request(|response| EconomyMessage::DeleteServer {
            owner,
            capacity,
            response,
        })
        .await
    }

    /// List an owner's servers
    pub async fn list_servers(&self, owner: OwnerId) -> Result<Vec<ResourceRecord>> {
        self.request(|response| EconomyMessage::ListServers { owner, response })
            .await
    }

    /// Check the mining gate
    pub async fn check_mine(&self, owner: OwnerId, now: i64) -> Result<()> {
        self.request(|response| EconomyMessage::CheckMine {
            owner,
            now,
            response,
        })
        .await
    }

    /// Claim a mining reward
    pub async fn mine(&self, owner: OwnerId, now: i64) -> Result<MineReward> {
        self.request(|response| EconomyMessage::Mine {
            owner,
            now,
            response,
        })
        .await
    }

    /// Claim the daily reward
    pub async fn claim_daily(&self, owner: OwnerId, now: i64) -> Result<DailyReward> {
        self.request(|response| EconomyMessage::ClaimDaily {
            owner,
            now,
            response,
        })
        .await
    }

    /// Buy port forwarding
    pub async fn purchase_port_forwarding(&self, owner: OwnerId) -> Result<u64> {
        self.request(|response| EconomyMessage::PurchasePortForwarding { owner, response })
            .await
    }

    /// Read the full snapshot
    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.request(|response| EconomyMessage::Snapshot { response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(EconomyMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the economy actor
pub fn spawn_economy_actor(store: Arc<dyn AccountStore>, config: &Config, metrics: Metrics) -> EconomyHandle {
    // Bounded channel for backpressure
    let (tx, rx) = mpsc::channel(config.actor.mailbox_capacity.max(1));
    let actor = EconomyActor::new(store, rx, config, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    EconomyHandle::new(tx)
}
