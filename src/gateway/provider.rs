//! Gateway pool with active-provider failover.
//!
//! # Responsibilities
//! - Hold alloy providers for a small fixed whitelist of RPC gateways
//! - Route calls through the active provider with a timeout
//! - On failure, mark the active gateway unhealthy and switch to the first
//!   healthy survivor; error out once the whitelist is exhausted

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::providers::{Provider, ProviderBuilder};
use tokio::time::timeout;
use url::Url;

use crate::config::schema::GatewayConfig;
use crate::gateway::types::{ChainId, GatewayError};
use crate::observability::metrics;

struct GatewayEntry {
    url: Url,
    provider: Arc<dyn Provider + Send + Sync>,
    healthy: AtomicBool,
}

/// Fixed-whitelist RPC gateway pool.
pub struct GatewayPool {
    entries: Vec<GatewayEntry>,
    active: AtomicUsize,
    timeout_duration: Duration,
    expected_chain_id: u64,
}

impl GatewayPool {
    /// Build providers for every whitelisted gateway. No network IO happens
    /// here; connectivity problems surface on the first call.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        if config.gateway_urls.is_empty() {
            return Err(GatewayError::NoGateways);
        }

        let mut entries = Vec::new();
        for raw in &config.gateway_urls {
            let url: Url = raw
                .parse()
                .map_err(|e| GatewayError::InvalidUrl(format!("{raw}: {e}")))?;
            let provider = Arc::new(ProviderBuilder::new().connect_http(url.clone()))
                as Arc<dyn Provider + Send + Sync>;
            entries.push(GatewayEntry {
                url,
                provider,
                healthy: AtomicBool::new(true),
            });
        }

        tracing::info!(
            gateways = entries.len(),
            active = %entries[0].url,
            "Gateway pool initialized"
        );

        Ok(Self {
            entries,
            active: AtomicUsize::new(0),
            timeout_duration: config.rpc_timeout(),
            expected_chain_id: config.chain_id,
        })
    }

    /// URL of the gateway currently receiving calls.
    pub fn active_url(&self) -> &Url {
        &self.entries[self.active.load(Ordering::Relaxed)].url
    }

    /// Report a downstream contract-call failure against the active gateway:
    /// mark it unhealthy and switch to the first healthy survivor.
    pub fn fail_active(&self) -> Result<&Url, GatewayError> {
        let index = self.active.load(Ordering::Relaxed);
        self.fail_over(index).map(|next| &self.entries[next].url)
    }

    fn fail_over(&self, failed: usize) -> Result<usize, GatewayError> {
        self.entries[failed].healthy.store(false, Ordering::Relaxed);
        metrics::record_gateway_failover();
        match self
            .entries
            .iter()
            .position(|e| e.healthy.load(Ordering::Relaxed))
        {
            Some(next) => {
                self.active.store(next, Ordering::Relaxed);
                tracing::warn!(
                    failed = %self.entries[failed].url,
                    active = %self.entries[next].url,
                    "Gateway failed, switched active provider"
                );
                Ok(next)
            }
            None => {
                // No amnesia in this pool; an operator has to step in.
                tracing::error!("Every whitelisted gateway is unhealthy; giving up");
                Err(GatewayError::Exhausted)
            }
        }
    }

    /// Get the chain ID through the active gateway, failing over on error.
    pub async fn chain_id(&self) -> Result<ChainId, GatewayError> {
        let mut index = self.active.load(Ordering::Relaxed);
        loop {
            let entry = &self.entries[index];
            match timeout(self.timeout_duration, entry.provider.get_chain_id()).await {
                Ok(Ok(id)) => return Ok(ChainId(id)),
                Ok(Err(e)) => {
                    tracing::warn!(gateway = %entry.url, error = %e, "RPC error");
                }
                Err(_) => {
                    tracing::warn!(gateway = %entry.url, "RPC timeout");
                }
            }
            index = self.fail_over(index)?;
        }
    }

    /// Get the latest block number through the active gateway.
    pub async fn block_number(&self) -> Result<u64, GatewayError> {
        let mut index = self.active.load(Ordering::Relaxed);
        loop {
            let entry = &self.entries[index];
            match timeout(self.timeout_duration, entry.provider.get_block_number()).await {
                Ok(Ok(number)) => return Ok(number),
                Ok(Err(e)) => {
                    tracing::warn!(gateway = %entry.url, error = %e, "RPC error");
                }
                Err(_) => {
                    tracing::warn!(gateway = %entry.url, "RPC timeout");
                }
            }
            index = self.fail_over(index)?;
        }
    }

    /// Verify the connected chain ID matches configuration. A configured
    /// chain ID of 0 disables the check.
    pub async fn verify_chain_id(&self) -> Result<(), GatewayError> {
        if self.expected_chain_id == 0 {
            return Ok(());
        }
        let chain_id = self.chain_id().await?;
        if chain_id.0 != self.expected_chain_id {
            return Err(GatewayError::ChainMismatch {
                expected: self.expected_chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &[&str]) -> GatewayPool {
        let config = GatewayConfig {
            gateway_urls: urls.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        GatewayPool::new(&config).unwrap()
    }

    #[test]
    fn test_empty_whitelist_is_rejected() {
        let config = GatewayConfig::default();
        assert!(matches!(
            GatewayPool::new(&config),
            Err(GatewayError::NoGateways)
        ));
    }

    #[test]
    fn test_failover_walks_whitelist_then_exhausts() {
        let pool = pool(&["https://rpc-a.example.com", "https://rpc-b.example.com"]);
        assert_eq!(pool.active_url().as_str(), "https://rpc-a.example.com/");

        let next = pool.fail_active().unwrap();
        assert_eq!(next.as_str(), "https://rpc-b.example.com/");
        assert_eq!(pool.active_url().as_str(), "https://rpc-b.example.com/");

        // Second failure exhausts the whitelist; no automatic reset.
        assert!(matches!(pool.fail_active(), Err(GatewayError::Exhausted)));
        assert!(matches!(pool.fail_active(), Err(GatewayError::Exhausted)));
    }
}
