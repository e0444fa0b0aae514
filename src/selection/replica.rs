//! Replica selection for replicated storage.
//!
//! # Responsibilities
//! - Probe every filtered storage node (full visibility, no sampling)
//! - Qualify candidates by self-reported health, storage capacity,
//!   version currency, and sync status
//! - Assemble a primary plus N-1 secondaries across three fallback tiers
//!
//! # Design Decisions
//! - Fallback picks come from the retained version/latency-sorted list, so
//!   the least bad backup or unhealthy node is preferred over an arbitrary
//!   one
//! - A degraded cluster still gets a primary: qualifiers, then backups,
//!   then unhealthy — never nothing while any candidate responded
//! - A failed sync-status check disqualifies that one candidate; it never
//!   aborts the selection

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use reqwest::StatusCode;
use semver::Version;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::schema::ReplicaConfig;
use crate::observability::metrics;
use crate::probe::timed::{health_check_url, Candidate, ProbeRequest, Prober, Timing};
use crate::selection::memory::{Decision, DecisionStage, HealthMemory};
use crate::selection::registry::ServiceRegistry;
use crate::selection::sort::{extract_version, sort_timings, SortOptions};

/// Sync state reported by a storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_behind: bool,
    pub is_configured: bool,
}

impl SyncStatus {
    /// A node qualifies as a replica target when it is either a fresh,
    /// never-configured node or a configured node that has caught up.
    pub fn qualifies(&self) -> bool {
        let first_time = self.is_behind && !self.is_configured;
        let steady_state = !self.is_behind && self.is_configured;
        first_time || steady_state
    }
}

/// Failure performing a sync-status check.
#[derive(Debug, Error)]
#[error("sync status check failed: {0}")]
pub struct SyncError(pub String);

/// Capability for querying a storage node's sync state.
pub trait SyncStatusClient: Send + Sync {
    fn sync_status<'a>(
        &'a self,
        endpoint: &'a str,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<SyncStatus, SyncError>>;
}

/// Production sync-status client: `GET {endpoint}/sync_status`,
/// reading `data.isBehind` and `data.isConfigured` from the body.
#[derive(Debug, Clone, Default)]
pub struct HttpSyncStatusClient {
    client: reqwest::Client,
}

impl HttpSyncStatusClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStatusClient for HttpSyncStatusClient {
    fn sync_status<'a>(
        &'a self,
        endpoint: &'a str,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<SyncStatus, SyncError>> {
        async move {
            let url = format!("{}/sync_status", endpoint.trim_end_matches('/'));
            let mut builder = self.client.get(&url);
            if let Some(t) = timeout {
                builder = builder.timeout(t);
            }
            let response = builder
                .send()
                .await
                .map_err(|e| SyncError(e.to_string()))?;
            if !response.status().is_success() {
                return Err(SyncError(format!("status {}", response.status())));
            }
            let body: Value = response
                .json()
                .await
                .map_err(|e| SyncError(e.to_string()))?;
            let data = body
                .get("data")
                .ok_or_else(|| SyncError("missing data field".into()))?;
            let is_behind = data
                .get("isBehind")
                .and_then(Value::as_bool)
                .ok_or_else(|| SyncError("missing isBehind field".into()))?;
            let is_configured = data
                .get("isConfigured")
                .and_then(Value::as_bool)
                .ok_or_else(|| SyncError("missing isConfigured field".into()))?;
            Ok(SyncStatus {
                is_behind,
                is_configured,
            })
        }
        .boxed()
    }
}

/// Primary and secondaries chosen for a replicated storage assignment.
#[derive(Debug, Clone)]
pub struct ReplicaSet {
    pub primary: Option<Candidate>,
    pub secondaries: Vec<Candidate>,
    /// Every probed result, best-first. Not persisted by this subsystem.
    pub probed: Vec<Timing>,
}

/// Selects a primary and secondaries for replicated storage.
///
/// Unlike the base engine this one probes the whole filtered fleet per call
/// and is not meant to be retried internally; each `select()` is a fresh
/// attempt.
pub struct ReplicaSelector {
    registry: Arc<dyn ServiceRegistry>,
    sync_client: Arc<dyn SyncStatusClient>,
    prober: Prober,
    config: ReplicaConfig,
    memory: Mutex<HealthMemory>,
}

impl ReplicaSelector {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        sync_client: Arc<dyn SyncStatusClient>,
        config: ReplicaConfig,
    ) -> Self {
        Self {
            registry,
            sync_client,
            prober: Prober::new(),
            config,
            memory: Mutex::new(HealthMemory::new()),
        }
    }

    fn memory(&self) -> MutexGuard<'_, HealthMemory> {
        self.memory.lock().expect("health memory poisoned")
    }

    /// Assemble one primary and up to `desired_replica_count - 1`
    /// secondaries.
    pub async fn select(&self, desired_replica_count: usize) -> ReplicaSet {
        {
            let mut memory = self.memory();
            memory.clear_trace();
            memory.clear_backups();
            memory.clear_unhealthy();
        }

        let current_version = self.registry.current_version().await;
        let services = self.registry.services().await;

        let filtered = {
            let mut memory = self.memory();
            memory.record(DecisionStage::GetAllServices, json!(services));
            let mut filtered = services;
            if let Some(whitelist) = &self.config.whitelist {
                filtered.retain(|c| whitelist.contains(c));
                memory.record(DecisionStage::FilterToWhitelist, json!(filtered));
            }
            if let Some(blacklist) = &self.config.blacklist {
                filtered.retain(|c| !blacklist.contains(c));
                memory.record(DecisionStage::FilterFromBlacklist, json!(filtered));
            }
            filtered
        };

        // Replica selection needs full visibility over a small stable fleet;
        // probe everyone rather than sampling a round.
        let probes = filtered.iter().map(|candidate| {
            self.prober.probe(
                ProbeRequest {
                    id: candidate.clone(),
                    url: health_check_url(candidate, &self.config.health_check_path),
                },
                Some(self.config.request_timeout()),
            )
        });
        let timings = future::join_all(probes).await;
        self.memory().record_attempts(timings.len());
        metrics::record_round(timings.len());

        let sorted = sort_timings(
            timings,
            &SortOptions {
                by_version: true,
                current_version: current_version.clone(),
                equivalency_delta: self.config.equivalency_delta(),
            },
        );

        // Every probed candidate starts as a backup; failing the health or
        // version gate demotes it to unhealthy.
        let mut healthy: Vec<Candidate> = Vec::new();
        {
            let mut memory = self.memory();
            for timing in &sorted {
                let candidate = timing.request.id.clone();
                let body = timing
                    .response
                    .as_ref()
                    .map(|r| r.body.clone())
                    .unwrap_or(Value::Null);
                memory.add_backup(candidate.clone(), body);
                if node_is_healthy(
                    timing,
                    current_version.as_ref(),
                    self.config.max_storage_used_percent,
                ) {
                    healthy.push(candidate);
                } else {
                    memory.add_unhealthy(candidate);
                }
            }
            memory.record(DecisionStage::HealthCheck, json!(healthy));
        }

        // Second, more expensive qualification pass.
        let sync_timeout = self.config.sync_timeout();
        let checks = future::join_all(healthy.iter().map(|candidate| async move {
            (
                candidate.clone(),
                self.sync_client.sync_status(candidate, sync_timeout).await,
            )
        }))
        .await;

        let mut qualified: Vec<Candidate> = Vec::new();
        {
            let mut memory = self.memory();
            for (candidate, result) in checks {
                match result {
                    Ok(status) if status.qualifies() => qualified.push(candidate),
                    Ok(status) => {
                        tracing::warn!(
                            endpoint = %candidate,
                            is_behind = status.is_behind,
                            is_configured = status.is_configured,
                            "Disqualified by sync status"
                        );
                        memory.add_unhealthy(candidate);
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %candidate, error = %e, "Sync status check failed");
                        memory.add_unhealthy(candidate);
                    }
                }
            }
            // Qualifiers are primary/secondary material, not fallback-only.
            for candidate in &qualified {
                memory.remove_from_backups(candidate);
            }
            memory.record(DecisionStage::SyncStatusCheck, json!(qualified));
        }

        let (primary, secondaries) = self.assemble(&sorted, &qualified, desired_replica_count);

        {
            let mut memory = self.memory();
            if let Some(primary) = &primary {
                // Taking the primary out of the backup tier mirrors a pop.
                memory.remove_from_backups(primary);
            }
            memory.record(
                DecisionStage::SelectPrimaryAndSecondaries,
                json!({ "primary": primary, "secondaries": secondaries }),
            );
            metrics::record_tier_sizes(memory.unhealthy_size(), memory.backups_size());
        }
        tracing::info!(
            primary = ?primary,
            secondaries = ?secondaries,
            probed = sorted.len(),
            "Replica selection complete"
        );

        ReplicaSet {
            primary,
            secondaries,
            probed: sorted,
        }
    }

    /// Pick the primary and fill secondaries across the three tiers, always
    /// walking the retained sorted order and never duplicating the primary.
    fn assemble(
        &self,
        sorted: &[Timing],
        qualified: &[Candidate],
        desired_replica_count: usize,
    ) -> (Option<Candidate>, Vec<Candidate>) {
        let memory = self.memory();
        let backup_tier: Vec<Candidate> = sorted
            .iter()
            .map(|t| t.request.id.clone())
            .filter(|c| memory.is_backup(c))
            .collect();
        let unhealthy_tier: Vec<Candidate> = sorted
            .iter()
            .map(|t| t.request.id.clone())
            .filter(|c| memory.is_unhealthy(c))
            .collect();
        drop(memory);

        let primary = qualified
            .first()
            .cloned()
            .or_else(|| backup_tier.first().cloned())
            .or_else(|| unhealthy_tier.first().cloned());

        let want = desired_replica_count.saturating_sub(1);
        let mut secondaries = Vec::with_capacity(want);
        'tiers: for tier in [qualified, backup_tier.as_slice(), unhealthy_tier.as_slice()] {
            for candidate in tier {
                if secondaries.len() >= want {
                    break 'tiers;
                }
                if Some(candidate) == primary.as_ref() {
                    continue;
                }
                secondaries.push(candidate.clone());
            }
        }

        (primary, secondaries)
    }

    // --- Health-state accessors ---

    pub fn unhealthy_size(&self) -> usize {
        self.memory().unhealthy_size()
    }

    pub fn backups_size(&self) -> usize {
        self.memory().backups_size()
    }

    pub fn total_attempts(&self) -> u64 {
        self.memory().total_attempts()
    }

    /// Trace of the most recent `select()` call.
    pub fn decision_trace(&self) -> Vec<Decision> {
        self.memory().trace().to_vec()
    }
}

/// Health gate for a storage node: reachable, HTTP 200, self-reported
/// healthy, disk capacity below the usage ceiling, and on the expected
/// major.minor version. With no expected version known, the version
/// criterion is waived.
fn node_is_healthy(
    timing: &Timing,
    current: Option<&Version>,
    max_storage_used_percent: f64,
) -> bool {
    let Some(response) = &timing.response else {
        return false;
    };
    if response.status != StatusCode::OK {
        return false;
    }
    let data = response.body.get("data");
    let self_reported_healthy = data
        .and_then(|d| d.get("healthy"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !self_reported_healthy {
        return false;
    }
    if !has_enough_storage(data, max_storage_used_percent) {
        return false;
    }
    match current {
        Some(current) => match extract_version(timing) {
            Some(v) => v.major == current.major && v.minor == current.minor,
            None => false,
        },
        None => true,
    }
}

/// Storage-capacity gate: used/size must stay under the usage ceiling.
/// The node may report its own ceiling via `maxStorageUsedPercent`; absent
/// capacity figures default to enough storage.
fn has_enough_storage(data: Option<&Value>, default_max_percent: f64) -> bool {
    let Some(data) = data else {
        return true;
    };
    let max_percent = data
        .get("maxStorageUsedPercent")
        .and_then(Value::as_f64)
        .unwrap_or(default_max_percent);
    let (Some(size), Some(used)) = (
        data.get("storagePathSize").and_then(Value::as_f64),
        data.get("storagePathUsed").and_then(Value::as_f64),
    ) else {
        return true;
    };
    100.0 * used / size < max_percent
}
