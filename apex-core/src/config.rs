//! Configuration for the economy core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Economy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Snapshot store configuration
    pub store: StoreConfig,

    /// Reward configuration
    pub rewards: RewardConfig,

    /// Provisioning configuration
    pub provision: ProvisionConfig,

    /// Actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "apex-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            store: StoreConfig::default(),
            rewards: RewardConfig::default(),
            provision: ProvisionConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Which snapshot store backs the economy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, nothing persisted
    Memory,
    /// `users.json` under the data directory
    Json,
    /// RocksDB under the data directory (feature `rocksdb-store`)
    Rocksdb,
}

impl StoreBackend {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Some(StoreBackend::Memory),
            "json" => Some(StoreBackend::Json),
            "rocksdb" => Some(StoreBackend::Rocksdb),
            _ => None,
        }
    }
}

/// Snapshot store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend
    pub backend: StoreBackend,

    /// Data directory
    pub data_dir: PathBuf,

    /// Snapshot file name for the JSON backend
    pub file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Json,
            data_dir: PathBuf::from("./users"),
            file_name: "users.json".to_string(),
        }
    }
}

impl StoreConfig {
    /// Path of the JSON snapshot file
    pub fn json_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

/// Reward configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Coins granted at registration
    pub starting_coins: u64,

    /// Mining cooldown (seconds)
    pub mine_cooldown_secs: u64,

    /// Smallest mining reward (coins)
    pub mine_min_coins: u64,

    /// Largest mining reward (coins)
    pub mine_max_coins: u64,

    /// One token per this many mining claims on average
    pub token_odds: u32,

    /// Synthetic mining delay (milliseconds), spent outside the writer
    pub mine_delay_ms: u64,

    /// Daily claim cooldown (seconds)
    pub daily_cooldown_secs: u64,

    /// Daily reward (coins)
    pub daily_coins: u64,

    /// Seed for the reward RNG; entropy when unset
    pub rng_seed: Option<u64>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            starting_coins: 5,
            mine_cooldown_secs: 15,
            mine_min_coins: 1,
            mine_max_coins: 5,
            token_odds: 20,
            mine_delay_ms: 1_000,
            daily_cooldown_secs: 86_400,
            daily_coins: 5,
            rng_seed: None,
        }
    }
}

/// Provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Runtime named in launch descriptors
    pub runtime: String,

    /// Upgrade cost = new capacity (MB) / divisor
    pub upgrade_price_divisor: u64,

    /// Port forwarding add-on price (coins)
    pub port_forwarding_price: u64,

    /// Directory the directory launcher lays servers out in
    pub servers_dir: Option<PathBuf>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            runtime: "java".to_string(),
            upgrade_price_divisor: 10,
            port_forwarding_price: 300,
            servers_dir: None,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Mailbox capacity (bounded for backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("APEX_DATA_DIR") {
            config.store.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("APEX_STORE") {
            config.store.backend = StoreBackend::from_str(&backend).ok_or_else(|| {
                crate::Error::Config(format!("Unknown store backend: {}", backend))
            })?;
        }

        if let Ok(dir) = std::env::var("APEX_SERVERS_DIR") {
            config.provision.servers_dir = Some(PathBuf::from(dir));
        }

        if let Ok(runtime) = std::env::var("APEX_RUNTIME") {
            config.provision.runtime = runtime;
        }

        if let Ok(delay) = std::env::var("APEX_MINE_DELAY_MS") {
            config.rewards.mine_delay_ms = delay
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid APEX_MINE_DELAY_MS: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the reward and pricing rules cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let rewards = &self.rewards;
        if rewards.mine_min_coins == 0 || rewards.mine_min_coins > rewards.mine_max_coins {
            return Err(crate::Error::Config(format!(
                "Mining reward range {}..={} is invalid",
                rewards.mine_min_coins, rewards.mine_max_coins
            )));
        }
        if rewards.token_odds == 0 {
            return Err(crate::Error::Config("token_odds must be at least 1".to_string()));
        }
        if rewards.daily_coins == 0 {
            return Err(crate::Error::Config("daily_coins must be positive".to_string()));
        }
        if self.provision.upgrade_price_divisor == 0 {
            return Err(crate::Error::Config(
                "upgrade_price_divisor must be positive".to_string(),
            ));
        }
        if self.provision.port_forwarding_price == 0 {
            return Err(crate::Error::Config(
                "port_forwarding_price must be positive".to_string(),
            ));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config("mailbox_capacity must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "apex-core");
        assert_eq!(config.rewards.starting_coins, 5);
        assert_eq!(config.rewards.mine_cooldown_secs, 15);
        assert_eq!(config.rewards.daily_cooldown_secs, 86_400);
        assert_eq!(config.provision.runtime, "java");
        assert_eq!(config.store.json_path(), PathBuf::from("./users/users.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [store]
            backend = "memory"

            [rewards]
            mine_delay_ms = 0
            rng_seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.rewards.mine_delay_ms, 0);
        assert_eq!(config.rewards.rng_seed, Some(7));
        assert_eq!(config.rewards.mine_max_coins, 5);
    }

    #[test]
    fn test_from_file_rejects_bad_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apex.toml");
        std::fs::write(&path, "[rewards]\nmine_min_coins = 6\n").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(crate::Error::Config(_))
        ));
    }
}
