//! Core types for the economy
//!
//! All persisted types serialize to the snapshot's JSON layout:
//! accounts keyed by owner id, resources keyed by `<capacity>_<owner>`.

use crate::catalog::Capacity;
use crate::rank::Rank;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Owner identifier supplied by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Wrap an id verbatim (no validation)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate an id before it is used to create an account
    ///
    /// Owner ids end up in resource names and launcher directory names, so
    /// path separators, `..` and control characters are rejected.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty()
            || trimmed != id
            || id == "."
            || id.contains("..")
            || id.contains(['/', '\\'])
            || id.chars().any(char::is_control)
        {
            return Err(Error::InvalidOwner(id));
        }
        Ok(Self(id))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Balance kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    /// Spendable currency
    Coins,
    /// Rare currency found while mining
    Tokens,
}

impl Asset {
    /// Lowercase label
    pub fn label(&self) -> &'static str {
        match self {
            Asset::Coins => "coins",
            Asset::Tokens => "tokens",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Persisted account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Coin balance
    pub coins: u64,

    /// Token balance
    pub tokens: u64,

    /// Cached rank, refreshed on every coin mutation and profile read
    pub rank: Rank,

    /// Last daily claim (epoch seconds, 0 = never)
    pub last_daily_claim: i64,

    /// Last mining claim (epoch seconds, 0 = never)
    pub last_mine_claim: i64,

    /// Port forwarding add-on purchased
    #[serde(default)]
    pub port_forwarding: bool,
}

impl Account {
    /// Fresh account with the given starting coins
    pub fn new(starting_coins: u64) -> Self {
        Self {
            coins: starting_coins,
            tokens: 0,
            rank: Rank::for_coins(starting_coins),
            last_daily_claim: 0,
            last_mine_claim: 0,
            port_forwarding: false,
        }
    }

    /// Balance of one asset
    pub fn balance(&self, kind: Asset) -> u64 {
        match kind {
            Asset::Coins => self.coins,
            Asset::Tokens => self.tokens,
        }
    }

    pub(crate) fn balance_mut(&mut self, kind: Asset) -> &mut u64 {
        match kind {
            Asset::Coins => &mut self.coins,
            Asset::Tokens => &mut self.tokens,
        }
    }

    /// Recompute the cached rank from the coin balance
    pub fn refresh_rank(&mut self) -> Rank {
        self.rank = Rank::for_coins(self.coins);
        self.rank
    }
}

/// Composite resource identity: one record per (owner, capacity)
///
/// Rendered as `<capacity>_<owner>`, the name external tooling uses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceKey {
    /// Owning account
    pub owner: OwnerId,
    /// Capacity tier (MB)
    pub capacity: Capacity,
}

impl ResourceKey {
    /// Create key
    pub fn new(owner: OwnerId, capacity: Capacity) -> Self {
        Self { owner, capacity }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.capacity, self.owner)
    }
}

impl FromStr for ResourceKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (capacity, owner) = s
            .split_once('_')
            .ok_or_else(|| Error::Storage(format!("Malformed resource key {:?}", s)))?;
        let capacity: u32 = capacity
            .parse()
            .map_err(|_| Error::Storage(format!("Malformed capacity in resource key {:?}", s)))?;
        if owner.is_empty() {
            return Err(Error::Storage(format!("Missing owner in resource key {:?}", s)));
        }
        Ok(Self::new(OwnerId::new(owner), Capacity::new(capacity)?))
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Provisioned server resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Owning account
    pub owner: OwnerId,

    /// Capacity tier (MB)
    pub capacity: Capacity,

    /// Start command handed to the process launcher
    pub launch_descriptor: String,
}

impl ResourceRecord {
    /// Identity key of this record
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.owner.clone(), self.capacity)
    }
}

/// One ledger transfer between two accounts (never persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Debited account
    pub from: OwnerId,
    /// Credited account
    pub to: OwnerId,
    /// Asset moved
    pub kind: Asset,
    /// Amount moved
    pub amount: u64,
}

/// Profile view of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owner id
    pub owner: OwnerId,
    /// Freshly computed rank
    pub rank: Rank,
    /// Coin balance
    pub coins: u64,
    /// Token balance
    pub tokens: u64,
    /// Port forwarding add-on purchased
    pub port_forwarding: bool,
    /// Owned servers, ordered by capacity
    pub resources: Vec<ResourceRecord>,
}

/// Full persisted state: the unit of atomic load/mutate/save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Optimistic concurrency token, bumped by every successful save
    #[serde(default)]
    pub version: u64,

    /// Accounts by owner id
    #[serde(default)]
    pub accounts: BTreeMap<OwnerId, Account>,

    /// Resource records by key
    #[serde(default)]
    pub resources: BTreeMap<ResourceKey, ResourceRecord>,
}

impl Snapshot {
    /// Look up an account
    pub fn account(&self, owner: &OwnerId) -> Result<&Account> {
        self.accounts
            .get(owner)
            .ok_or_else(|| Error::NotFound(format!("account {}", owner)))
    }

    /// Look up an account for mutation
    pub fn account_mut(&mut self, owner: &OwnerId) -> Result<&mut Account> {
        self.accounts
            .get_mut(owner)
            .ok_or_else(|| Error::NotFound(format!("account {}", owner)))
    }

    /// Records owned by `owner`, ordered by capacity
    pub fn resources_for<'a>(
        &'a self,
        owner: &'a OwnerId,
    ) -> impl Iterator<Item = &'a ResourceRecord> + 'a {
        self.resources
            .values()
            .filter(move |record| &record.owner == owner)
    }

    /// Refresh the cached rank and build the owner's profile
    pub fn profile(&mut self, owner: &OwnerId) -> Result<Profile> {
        let account = self.account_mut(owner)?;
        let rank = account.refresh_rank();
        let (coins, tokens, port_forwarding) =
            (account.coins, account.tokens, account.port_forwarding);

        Ok(Profile {
            owner: owner.clone(),
            rank,
            coins,
            tokens,
            port_forwarding,
            resources: self.resources_for(owner).cloned().collect(),
        })
    }

    /// Reject persisted data that breaks the snapshot's structure
    ///
    /// Every resource must sit under its own `<capacity>_<owner>` key and
    /// belong to a known account.
    pub fn check_integrity(&self) -> Result<()> {
        for (key, record) in &self.resources {
            if *key != record.key() {
                return Err(Error::Storage(format!(
                    "Resource {} is stored under key {}",
                    record.key(),
                    key
                )));
            }
            if !self.accounts.contains_key(&record.owner) {
                return Err(Error::Storage(format!(
                    "Resource {} belongs to unknown account {}",
                    key, record.owner
                )));
            }
        }
        Ok(())
    }

    /// Whether a record exists at (owner, capacity)
    pub fn has_resource(&self, owner: &OwnerId, capacity: Capacity) -> bool {
        self.resources
            .contains_key(&ResourceKey::new(owner.clone(), capacity))
    }
}
