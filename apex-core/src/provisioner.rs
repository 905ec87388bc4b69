//! Create/upgrade/delete of server resources
//!
//! Resources are keyed by (owner, capacity), so an owner holds at most one
//! server per tier. Creation is priced from the catalog; upgrades are priced
//! at `new_capacity / upgrade_price_divisor` coins regardless of the catalog.
//! Deleting never refunds.
//!
//! Each successful call returns a [`ProvisionEvent`] describing what the
//! external process launcher has to do once the snapshot is committed.

use crate::catalog::{Capacity, ResourceCatalog, TierSelector};
use crate::config::ProvisionConfig;
use crate::ledger;
use crate::types::{Asset, OwnerId, ResourceKey, ResourceRecord, Snapshot};
use crate::{Error, Result};

/// Committed provisioning change, consumed by the process launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    /// New resource
    Created(ResourceRecord),
    /// Resource moved from `previous` to the record's key
    Resized {
        /// Key that no longer exists
        previous: ResourceKey,
        /// Replacement record
        record: ResourceRecord,
    },
    /// Resource removed
    Deleted(ResourceKey),
}

/// Resource provisioning state machine
#[derive(Debug, Clone)]
pub struct Provisioner {
    catalog: ResourceCatalog,
    config: ProvisionConfig,
}

impl Provisioner {
    /// Create provisioner
    pub fn new(catalog: ResourceCatalog, config: ProvisionConfig) -> Self {
        Self { catalog, config }
    }

    /// Tier catalog in use
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Start command for a capacity: the heap is pinned to the tier size
    pub fn launch_descriptor(&self, capacity: Capacity) -> String {
        format!(
            "{runtime} -Xms{mb}M -Xmx{mb}M -jar server.jar nogui",
            runtime = self.config.runtime,
            mb = capacity.mb()
        )
    }

    /// Coins charged to upgrade to `new_capacity`
    pub fn upgrade_cost(&self, new_capacity: Capacity) -> u64 {
        u64::from(new_capacity.mb()) / self.config.upgrade_price_divisor.max(1)
    }

    /// Buy a server from the catalog
    pub fn create(
        &self,
        snapshot: &mut Snapshot,
        owner: &OwnerId,
        selector: TierSelector,
    ) -> Result<ProvisionEvent> {
        let tier = self.catalog.lookup(selector)?;
        snapshot.account(owner)?;

        let key = ResourceKey::new(owner.clone(), tier.capacity);
        if snapshot.resources.contains_key(&key) {
            return Err(Error::DuplicateResource(key.to_string()));
        }

        ledger::debit(snapshot, owner, Asset::Coins, tier.price_coins)?;

        let record = ResourceRecord {
            owner: owner.clone(),
            capacity: tier.capacity,
            launch_descriptor: self.launch_descriptor(tier.capacity),
        };
        snapshot.resources.insert(key, record.clone());

        tracing::info!(
            owner = %owner,
            capacity = tier.capacity.mb(),
            price = tier.price_coins,
            "Server created"
        );
        Ok(ProvisionEvent::Created(record))
    }

    /// Move a server to a different capacity tier
    pub fn upgrade(
        &self,
        snapshot: &mut Snapshot,
        owner: &OwnerId,
        old_capacity: Capacity,
        new_capacity: Capacity,
    ) -> Result<ProvisionEvent> {
        snapshot.account(owner)?;

        let previous = ResourceKey::new(owner.clone(), old_capacity);
        if !snapshot.resources.contains_key(&previous) {
            return Err(Error::NotFound(format!("server {}", previous)));
        }

        let next = ResourceKey::new(owner.clone(), new_capacity);
        if snapshot.resources.contains_key(&next) {
            return Err(Error::DuplicateResource(next.to_string()));
        }

        let cost = self.upgrade_cost(new_capacity);
        if cost > 0 {
            ledger::debit(snapshot, owner, Asset::Coins, cost)?;
        }

        snapshot.resources.remove(&previous);
        let record = ResourceRecord {
            owner: owner.clone(),
            capacity: new_capacity,
            launch_descriptor: self.launch_descriptor(new_capacity),
        };
        snapshot.resources.insert(next, record.clone());

        tracing::info!(
            owner = %owner,
            from = old_capacity.mb(),
            to = new_capacity.mb(),
            cost,
            "Server upgraded"
        );
        Ok(ProvisionEvent::Resized { previous, record })
    }

    /// Destroy a server; no refund
    pub fn delete(
        &self,
        snapshot: &mut Snapshot,
        owner: &OwnerId,
        capacity: Capacity,
    ) -> Result<ProvisionEvent> {
        let key = ResourceKey::new(owner.clone(), capacity);
        if snapshot.resources.remove(&key).is_none() {
            return Err(Error::NotFound(format!("server {}", key)));
        }

        tracing::info!(owner = %owner, capacity = capacity.mb(), "Server deleted");
        Ok(ProvisionEvent::Deleted(key))
    }

    /// Servers owned by `owner`, ordered by capacity
    pub fn list_for(&self, snapshot: &Snapshot, owner: &OwnerId) -> Vec<ResourceRecord> {
        snapshot.resources_for(owner).cloned().collect()
    }
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new(ResourceCatalog::new(), ProvisionConfig::default())
    }
}
