//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! carry defaults tuned for slow consumer networks; tests override the
//! timeouts down to fractions of a second.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the selection engines.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SelectionConfig {
    /// Base single-endpoint selection engine.
    pub selector: SelectorConfig,

    /// Replicated-storage selection engine.
    pub replica: ReplicaConfig,

    /// Blockchain gateway pool.
    pub gateway: GatewayConfig,
}

/// Tuning for the base selection engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Size of one probing round (random sample of the healthy pool).
    pub max_concurrent_requests: usize,

    /// Per-probe and per-race timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Milliseconds of round inactivity before the unhealthy set clears.
    pub unhealthy_ttl_ms: u64,

    /// Milliseconds of round inactivity before the backups map clears.
    pub backups_ttl_ms: u64,

    /// Delay between successive probe launches within a race.
    pub stagger_ms: u64,

    /// Upper bound on probing rounds per `select()` call.
    pub max_rounds: usize,

    /// Path appended to each endpoint for health checks.
    pub health_check_path: String,

    /// Keep only these candidates, when present.
    pub whitelist: Option<HashSet<String>>,

    /// Drop these candidates; wins over the whitelist.
    pub blacklist: Option<HashSet<String>>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 6,
            request_timeout_ms: 30_000,
            unhealthy_ttl_ms: 3_600_000,
            backups_ttl_ms: 120_000,
            stagger_ms: 100,
            max_rounds: 30,
            health_check_path: "health_check".to_string(),
            whitelist: None,
            blacklist: None,
        }
    }
}

impl SelectorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn unhealthy_ttl(&self) -> Duration {
        Duration::from_millis(self.unhealthy_ttl_ms)
    }

    pub fn backups_ttl(&self) -> Duration {
        Duration::from_millis(self.backups_ttl_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

/// Tuning for the replica selection engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplicaConfig {
    /// Total replicas to assemble: one primary plus N-1 secondaries.
    pub replica_count: usize,

    /// Per-probe timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Timeout for the per-candidate sync-status check.
    pub sync_timeout_ms: Option<u64>,

    /// Path appended to each endpoint for health checks. Storage nodes
    /// expose a verbose variant carrying version and capacity fields.
    pub health_check_path: String,

    /// Latency window within which candidates are interchangeable.
    pub equivalency_delta_ms: Option<u64>,

    /// Disk-usage ceiling (percent) above which a storage node is unhealthy.
    /// A node may override this with its own `maxStorageUsedPercent`.
    pub max_storage_used_percent: f64,

    pub whitelist: Option<HashSet<String>>,

    pub blacklist: Option<HashSet<String>>,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            replica_count: 3,
            request_timeout_ms: 30_000,
            sync_timeout_ms: None,
            health_check_path: "health_check/verbose".to_string(),
            equivalency_delta_ms: None,
            max_storage_used_percent: 95.0,
            whitelist: None,
            blacklist: None,
        }
    }
}

impl ReplicaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout_ms.map(Duration::from_millis)
    }

    pub fn equivalency_delta(&self) -> Option<Duration> {
        self.equivalency_delta_ms.map(Duration::from_millis)
    }
}

/// Fixed whitelist of blockchain RPC gateways.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Known-good gateway URLs, in preference order. Expected to be small
    /// (one or two entries); exhaustion requires operator intervention.
    pub gateway_urls: Vec<String>,

    /// Expected chain ID; 0 disables verification.
    pub chain_id: u64,

    /// Per-call RPC timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateway_urls: Vec::new(),
            chain_id: 0,
            rpc_timeout_secs: 10,
        }
    }
}

impl GatewayConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_defaults() {
        let config = SelectorConfig::default();
        assert_eq!(config.max_concurrent_requests, 6);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.unhealthy_ttl_ms, 3_600_000);
        assert_eq!(config.backups_ttl_ms, 120_000);
        assert_eq!(config.health_check_path, "health_check");
        assert!(config.whitelist.is_none());
    }

    #[test]
    fn test_replica_defaults() {
        let config = ReplicaConfig::default();
        assert_eq!(config.replica_count, 3);
        assert_eq!(config.health_check_path, "health_check/verbose");
        assert_eq!(config.max_storage_used_percent, 95.0);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: SelectionConfig = toml::from_str(
            r#"
            [selector]
            max_concurrent_requests = 3
            request_timeout_ms = 500

            [gateway]
            gateway_urls = ["https://rpc.example.com"]
            "#,
        )
        .unwrap();
        assert_eq!(config.selector.max_concurrent_requests, 3);
        assert_eq!(config.selector.unhealthy_ttl_ms, 3_600_000);
        assert_eq!(config.replica.replica_count, 3);
        assert_eq!(config.gateway.gateway_urls.len(), 1);
        assert_eq!(config.gateway.rpc_timeout_secs, 10);
    }
}
