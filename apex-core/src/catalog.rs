//! Static table of provisioning tiers
//!
//! The catalog is configuration data: six fixed (capacity, price) pairs
//! addressed by the menu selectors `1..=6`. Capacities outside the table are
//! rejected before any resource lookup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tier table: (selector, capacity MB, price in coins)
const TIERS: [(u8, u32, u64); 6] = [
    (1, 512, 30),
    (2, 1024, 60),
    (3, 2048, 120),
    (4, 4096, 250),
    (5, 6144, 400),
    (6, 8192, 800),
];

/// Resource capacity in MB, guaranteed to be a catalog value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub struct Capacity(u32);

impl Capacity {
    /// Validate a capacity against the catalog
    pub fn new(mb: u32) -> Result<Self> {
        if TIERS.iter().any(|(_, capacity, _)| *capacity == mb) {
            Ok(Self(mb))
        } else {
            Err(Error::NotFound(format!("capacity {}MB is not offered", mb)))
        }
    }

    /// Size in MB
    pub fn mb(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Capacity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mb = s
            .trim()
            .trim_end_matches("MB")
            .parse::<u32>()
            .map_err(|_| Error::NotFound(format!("capacity {:?} is not offered", s)))?;
        Self::new(mb)
    }
}

impl From<Capacity> for u32 {
    fn from(capacity: Capacity) -> Self {
        capacity.0
    }
}

impl TryFrom<u32> for Capacity {
    type Error = Error;

    fn try_from(mb: u32) -> Result<Self> {
        Self::new(mb)
    }
}

/// Opaque tier selector (menu code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierSelector(u8);

impl TierSelector {
    /// Wrap a selector code (validated on lookup)
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    /// Parse a menu choice such as `"3"`
    pub fn parse(code: &str) -> Result<Self> {
        code.trim()
            .parse::<u8>()
            .map(Self)
            .map_err(|_| Error::NotFound(format!("tier {:?}", code)))
    }

    /// Selector code
    pub fn code(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for TierSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTier {
    /// Menu code
    pub selector: TierSelector,
    /// Capacity
    pub capacity: Capacity,
    /// Creation price in coins
    pub price_coins: u64,
}

/// Static tier catalog
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceCatalog;

impl ResourceCatalog {
    /// Create catalog
    pub fn new() -> Self {
        Self
    }

    /// Look up a tier by selector
    pub fn lookup(&self, selector: TierSelector) -> Result<ResourceTier> {
        TIERS
            .iter()
            .find(|(code, _, _)| *code == selector.code())
            .map(|&(code, capacity, price_coins)| ResourceTier {
                selector: TierSelector(code),
                capacity: Capacity(capacity),
                price_coins,
            })
            .ok_or_else(|| Error::NotFound(format!("tier {}", selector)))
    }

    /// All tiers in menu order
    pub fn tiers(&self) -> Vec<ResourceTier> {
        TIERS
            .iter()
            .map(|&(code, capacity, price_coins)| ResourceTier {
                selector: TierSelector(code),
                capacity: Capacity(capacity),
                price_coins,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_all_tiers() {
        let catalog = ResourceCatalog::new();
        let expected = [
            (512, 30),
            (1024, 60),
            (2048, 120),
            (4096, 250),
            (6144, 400),
            (8192, 800),
        ];
        for (i, (mb, price)) in expected.iter().enumerate() {
            let tier = catalog.lookup(TierSelector::new(i as u8 + 1)).unwrap();
            assert_eq!(tier.capacity.mb(), *mb);
            assert_eq!(tier.price_coins, *price);
        }
        assert_eq!(catalog.tiers().len(), 6);
    }

    #[test]
    fn test_unknown_selector() {
        let catalog = ResourceCatalog::new();
        assert!(matches!(
            catalog.lookup(TierSelector::new(0)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            catalog.lookup(TierSelector::new(7)),
            Err(Error::NotFound(_))
        ));
        assert!(TierSelector::parse("x").is_err());
        assert_eq!(TierSelector::parse(" 4 ").unwrap().code(), 4);
    }

    #[test]
    fn test_capacity_validation() {
        assert!(Capacity::new(2048).is_ok());
        assert!(Capacity::new(3000).is_err());
        assert_eq!("6144".parse::<Capacity>().unwrap().mb(), 6144);
        assert_eq!("1024MB".parse::<Capacity>().unwrap().mb(), 1024);
        assert!("lots".parse::<Capacity>().is_err());
        assert!(serde_json::from_str::<Capacity>("100").is_err());
    }
}
