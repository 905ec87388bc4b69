//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the economy. Each [`Metrics`] owns its
//! own registry so several economies can live in one process.
//!
//! # Metrics
//!
//! - `apex_actions_total{action}` - Committed actions
//! - `apex_action_failures_total{action}` - Rejected or failed actions
//! - `apex_coins_minted_total` - Coins created by rewards
//! - `apex_coins_burned_total` - Coins spent on servers and add-ons
//! - `apex_resources_active` - Resource records in the last saved snapshot

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed actions by name
    pub actions_total: IntCounterVec,

    /// Failed actions by name
    pub action_failures: IntCounterVec,

    /// Coins minted by rewards
    pub coins_minted: IntCounter,

    /// Coins burned by purchases
    pub coins_burned: IntCounter,

    /// Active resource records
    pub resources_active: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("coins_minted", &self.coins_minted.get())
            .field("coins_burned", &self.coins_burned.get())
            .field("resources_active", &self.resources_active.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let actions_total = IntCounterVec::new(
            Opts::new("apex_actions_total", "Committed actions"),
            &["action"],
        )?;
        registry.register(Box::new(actions_total.clone()))?;

        let action_failures = IntCounterVec::new(
            Opts::new("apex_action_failures_total", "Rejected or failed actions"),
            &["action"],
        )?;
        registry.register(Box::new(action_failures.clone()))?;

        let coins_minted = IntCounter::new("apex_coins_minted_total", "Coins created by rewards")?;
        registry.register(Box::new(coins_minted.clone()))?;

        let coins_burned = IntCounter::new("apex_coins_burned_total", "Coins spent on purchases")?;
        registry.register(Box::new(coins_burned.clone()))?;

        let resources_active =
            IntGauge::new("apex_resources_active", "Resource records in the last snapshot")?;
        registry.register(Box::new(resources_active.clone()))?;

        Ok(Self {
            actions_total,
            action_failures,
            coins_minted,
            coins_burned,
            resources_active,
            registry,
        })
    }

    /// Record the outcome of one action
    pub fn record_action(&self, action: &str, ok: bool) {
        if ok {
            self.actions_total.with_label_values(&[action]).inc();
        } else {
            self.action_failures.with_label_values(&[action]).inc();
        }
    }

    /// Record coins created
    pub fn record_minted(&self, coins: u64) {
        self.coins_minted.inc_by(coins);
    }

    /// Record coins spent
    pub fn record_burned(&self, coins: u64) {
        self.coins_burned.inc_by(coins);
    }

    /// Update active resource gauge
    pub fn set_resources_active(&self, count: usize) {
        self.resources_active.set(count as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.coins_minted.get(), 0);
        assert_eq!(metrics.resources_active.get(), 0);

        // Independent registries
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_record_action() {
        let metrics = Metrics::new().unwrap();
        metrics.record_action("mine", true);
        metrics.record_action("mine", true);
        metrics.record_action("mine", false);

        assert_eq!(metrics.actions_total.with_label_values(&["mine"]).get(), 2);
        assert_eq!(metrics.action_failures.with_label_values(&["mine"]).get(), 1);
    }

    #[test]
    fn test_coin_flows() {
        let metrics = Metrics::new().unwrap();
        metrics.record_minted(5);
        metrics.record_burned(30);
        metrics.set_resources_active(2);
        assert_eq!(metrics.coins_minted.get(), 5);
        assert_eq!(metrics.coins_burned.get(), 30);
        assert_eq!(metrics.resources_active.get(), 2);
        assert!(!metrics.registry().gather().is_empty());
    }
}
