//! Coin balance → rank label

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rank label derived from the coin balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Below 100 coins
    #[default]
    Noob,
    /// 100+
    Miner,
    /// 500+
    Hoster,
    /// 1 500+
    ProHoster,
    /// 5 000+
    ApexHost,
    /// 20 000+
    Legend,
}

/// Thresholds, highest first; first match wins
const THRESHOLDS: [(u64, Rank); 5] = [
    (20_000, Rank::Legend),
    (5_000, Rank::ApexHost),
    (1_500, Rank::ProHoster),
    (500, Rank::Hoster),
    (100, Rank::Miner),
];

impl Rank {
    /// Rank for a coin balance
    pub fn for_coins(coins: u64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(min, _)| coins >= *min)
            .map(|(_, rank)| *rank)
            .unwrap_or(Rank::Noob)
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Rank::Noob => "Noob",
            Rank::Miner => "Miner",
            Rank::Hoster => "Hoster",
            Rank::ProHoster => "ProHoster",
            Rank::ApexHost => "ApexHost",
            Rank::Legend => "Legend",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rank for a coin balance
pub fn rank(coins: u64) -> Rank {
    Rank::for_coins(coins)
}
