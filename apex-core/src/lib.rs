//! ApexHost Economy Core
//!
//! Virtual-currency ledger and game-server provisioner behind a chat bot or
//! web front end.
//!
//! # Architecture
//!
//! - **Snapshot Store**: Whole state is loaded, mutated in memory and saved atomically
//! - **Single Writer**: One actor task owns every load/save pair
//! - **Optimistic Versioning**: Stores reject saves over a newer snapshot
//! - **Launcher Seam**: Committed provisioning changes are handed to a `ProcessLauncher`
//!
//! # Invariants
//!
//! - Balances never go negative; a rejected action leaves the snapshot untouched
//! - Transfers conserve the total of the moved asset
//! - At most one server per (owner, capacity)
//! - One reward per open cooldown window

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod rank;
pub mod cooldown;
pub mod catalog;
pub mod ledger;
pub mod provisioner;
pub mod rewards;
pub mod shop;
pub mod store;
#[cfg(feature = "rocksdb-store")]
pub mod rocks;
pub mod clock;
pub mod launcher;
pub mod error;
pub mod actor;
pub mod economy;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{Account, Asset, OwnerId, Profile, ResourceKey, ResourceRecord, Snapshot, Transfer};
pub use catalog::{Capacity, ResourceCatalog, ResourceTier, TierSelector};
pub use rank::Rank;
pub use economy::{Economy, Provisioned};
pub use config::Config;
