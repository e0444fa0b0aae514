//! Base selection engine.
//!
//! # Responsibilities
//! - Filter the candidate list (whitelist, blacklist, known-unhealthy)
//! - Probe bounded rounds through the racer until a winner emerges
//! - Degrade through backups, then full amnesia, when the pool empties
//!
//! # Design Decisions
//! - Overridable behavior is a policy object injected at construction, not
//!   a subclass hook
//! - The health-state memory is owned by one engine instance behind a mutex;
//!   concurrent callers may at worst trigger a redundant probe
//! - The source-of-truth retry shape is an explicit bounded loop; each pass
//!   narrows the healthy pool as errored candidates are marked unhealthy
//! - `select()` never fails: total exhaustion is `None`, an operational
//!   signal, not an error

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures_util::future;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::schema::SelectorConfig;
use crate::observability::metrics;
use crate::probe::race::race;
use crate::probe::timed::{health_check_url, Candidate, ProbeRequest, ProbeResponse, Prober};
use crate::selection::memory::{Decision, DecisionStage, HealthMemory};
use crate::selection::registry::ServiceRegistry;

/// Override points for the selection engine.
///
/// `is_healthy` may stash a reachable-but-suboptimal candidate as a backup
/// via `memory` before returning false, routing it into the fallback tier
/// instead of the unhealthy tier.
pub trait SelectionPolicy: Send + Sync {
    fn is_healthy(
        &self,
        candidate: &str,
        response: &ProbeResponse,
        memory: &mut HealthMemory,
    ) -> bool {
        let _ = (candidate, memory);
        response.status == StatusCode::OK
    }

    /// Known-good endpoint to return without probing, when available.
    fn shortcircuit(&self) -> Option<Candidate> {
        None
    }

    /// Pick a fallback from the backup tier. Default: oldest insertion.
    fn select_from_backups(&self, memory: &mut HealthMemory) -> Option<Candidate> {
        memory.pop_backup()
    }
}

/// Default policy: any HTTP 200 is healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPolicy;

impl SelectionPolicy for StatusPolicy {}

/// Selects a single healthy endpoint from a service class.
///
/// One instance per service type; the health-state memory lives as long as
/// the instance and is mutated only through `select()` and the tier
/// accessors.
pub struct ServiceSelector {
    registry: Arc<dyn ServiceRegistry>,
    policy: Arc<dyn SelectionPolicy>,
    prober: Prober,
    config: SelectorConfig,
    memory: Mutex<HealthMemory>,
}

impl ServiceSelector {
    pub fn new(registry: Arc<dyn ServiceRegistry>, config: SelectorConfig) -> Self {
        Self::with_policy(registry, Arc::new(StatusPolicy), config)
    }

    pub fn with_policy(
        registry: Arc<dyn ServiceRegistry>,
        policy: Arc<dyn SelectionPolicy>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            registry,
            policy,
            prober: Prober::new(),
            config,
            memory: Mutex::new(HealthMemory::new()),
        }
    }

    fn memory(&self) -> MutexGuard<'_, HealthMemory> {
        self.memory.lock().expect("health memory poisoned")
    }

    fn is_blacklisted(&self, candidate: &str) -> bool {
        self.config
            .blacklist
            .as_ref()
            .is_some_and(|blacklist| blacklist.contains(candidate))
    }

    /// Select the best available endpoint.
    ///
    /// Returns `None` when nothing is reachable right now; callers should
    /// retry later or degrade, never treat this as a crash.
    pub async fn select(&self) -> Option<Candidate> {
        self.memory().clear_trace();

        for round in 0..self.config.max_rounds {
            // Escape hatch for policies that know an endpoint out-of-band;
            // the blacklist still wins over it.
            if let Some(choice) = self.policy.shortcircuit() {
                if !self.is_blacklisted(&choice) {
                    self.memory()
                        .record(DecisionStage::ShortCircuit, json!(choice));
                    metrics::record_selection("shortcircuit");
                    return Some(choice);
                }
            }

            let services = self.registry.services().await;

            let sample = {
                let mut memory = self.memory();
                memory.expire(
                    Instant::now(),
                    self.config.unhealthy_ttl(),
                    self.config.backups_ttl(),
                );
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
                // Candidates already routed to a tier are not re-probed this
                // attempt; backups resurface through the fallback path below.
                filtered.retain(|c| !memory.is_unhealthy(c) && !memory.is_backup(c));
                memory.record(DecisionStage::FilterOutKnownUnhealthy, json!(filtered));

                if filtered.is_empty() {
                    if memory.backups_size() > 0 {
                        let pick = self.policy.select_from_backups(&mut memory);
                        memory.record(DecisionStage::SelectedFromBackup, json!(pick));
                        tracing::info!(pick = ?pick, "Healthy pool exhausted, falling back to backup");
                        metrics::record_selection("backup");
                        return pick;
                    }
                    // Assume a transient outage: forget everything so the
                    // next call re-probes the full fleet.
                    memory.record(DecisionStage::NoServicesLeft, Value::Null);
                    memory.reset();
                    memory.record(DecisionStage::ResetAll, Value::Null);
                    tracing::warn!("No healthy, backup, or retryable candidates; resetting memory");
                    metrics::record_selection("exhausted");
                    return None;
                }

                let sample: Vec<Candidate> = {
                    let mut rng = rand::thread_rng();
                    filtered
                        .choose_multiple(&mut rng, self.config.max_concurrent_requests)
                        .cloned()
                        .collect()
                };
                memory.record_attempts(sample.len());
                memory.arm_ttls(Instant::now());
                memory.record(DecisionStage::Round, json!(sample));
                sample
            };

            metrics::record_round(sample.len());

            let outcome = race(
                &self.prober,
                &sample,
                &self.config.health_check_path,
                |candidate, response| {
                    let mut memory = self.memory();
                    self.policy.is_healthy(candidate, response, &mut memory)
                },
                self.config.request_timeout(),
                self.config.stagger(),
            )
            .await;

            let mut memory = self.memory();
            for candidate in &outcome.errored {
                // A candidate the policy deliberately stashed as a backup
                // stays in the fallback tier instead of going unhealthy.
                if !memory.is_backup(candidate) {
                    memory.add_unhealthy(candidate.clone());
                }
            }
            // Debounce: each completed round pushes both decay deadlines out.
            memory.arm_ttls(Instant::now());
            metrics::record_tier_sizes(memory.unhealthy_size(), memory.backups_size());

            if let Some(winner) = outcome.best {
                memory.record(DecisionStage::RaceWinner, json!(winner));
                tracing::info!(winner = %winner, round, "Selected healthy endpoint");
                metrics::record_selection("healthy");
                return Some(winner);
            }

            tracing::debug!(
                round,
                errored = outcome.errored.len(),
                "Round produced no winner, sampling again"
            );
        }

        self.memory()
            .record(DecisionStage::MaxRoundsExceeded, json!(self.config.max_rounds));
        tracing::warn!(
            max_rounds = self.config.max_rounds,
            "Selection gave up after exhausting the round budget"
        );
        metrics::record_selection("round_budget");
        None
    }

    /// Exhaustive variant: probe every whitelisted candidate concurrently
    /// and return all that responded within the timeout and passed the
    /// health policy. No rounds, no racing, no memory marking.
    pub async fn find_all(&self) -> Vec<Candidate> {
        let mut services = self.registry.services().await;
        if let Some(whitelist) = &self.config.whitelist {
            services.retain(|c| whitelist.contains(c));
        }

        let probes = services.iter().map(|candidate| {
            self.prober.probe(
                ProbeRequest {
                    id: candidate.clone(),
                    url: health_check_url(candidate, &self.config.health_check_path),
                },
                Some(self.config.request_timeout()),
            )
        });
        let timings = future::join_all(probes).await;

        // The policy validates against a scratch memory so a backup-stashing
        // policy cannot touch the engine's tiers during an exhaustive scan.
        let mut scratch = HealthMemory::new();
        timings
            .into_iter()
            .filter_map(|timing| {
                let response = timing.response.as_ref()?;
                self.policy
                    .is_healthy(&timing.request.id, response, &mut scratch)
                    .then(|| timing.request.id.clone())
            })
            .collect()
    }

    // --- Health-state accessors ---

    pub fn total_attempts(&self) -> u64 {
        self.memory().total_attempts()
    }

    pub fn unhealthy_size(&self) -> usize {
        self.memory().unhealthy_size()
    }

    pub fn backups_size(&self) -> usize {
        self.memory().backups_size()
    }

    pub fn add_unhealthy(&self, candidate: Candidate) {
        self.memory().add_unhealthy(candidate);
    }

    pub fn remove_from_unhealthy(&self, candidate: &str) {
        self.memory().remove_from_unhealthy(candidate);
    }

    pub fn add_backup(&self, candidate: Candidate, body: Value) {
        self.memory().add_backup(candidate, body);
    }

    pub fn remove_from_backups(&self, candidate: &str) {
        self.memory().remove_from_backups(candidate);
    }

    /// Trace of the most recent `select()` call.
    pub fn decision_trace(&self) -> Vec<Decision> {
        self.memory().trace().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::registry::StaticRegistry;

    fn selector_with(config: SelectorConfig) -> ServiceSelector {
        ServiceSelector::new(Arc::new(StaticRegistry::new(vec![])), config)
    }

    #[test]
    fn test_tier_accessors_share_one_memory() {
        let selector = selector_with(SelectorConfig::default());
        selector.add_backup("http://cn1".into(), json!({}));
        assert_eq!(selector.backups_size(), 1);

        selector.add_unhealthy("http://cn1".into());
        assert_eq!(selector.backups_size(), 0);
        assert_eq!(selector.unhealthy_size(), 1);

        selector.remove_from_unhealthy("http://cn1");
        assert_eq!(selector.unhealthy_size(), 0);
    }

    #[tokio::test]
    async fn test_empty_registry_selects_none_without_probing() {
        let selector = selector_with(SelectorConfig::default());
        assert_eq!(selector.select().await, None);
        assert_eq!(selector.total_attempts(), 0);
    }

    #[tokio::test]
    async fn test_blacklisted_shortcircuit_is_ignored() {
        struct Pinned;
        impl SelectionPolicy for Pinned {
            fn shortcircuit(&self) -> Option<Candidate> {
                Some("http://pinned".into())
            }
        }

        let mut config = SelectorConfig::default();
        config.blacklist = Some(["http://pinned".to_string()].into_iter().collect());
        let selector = ServiceSelector::with_policy(
            Arc::new(StaticRegistry::new(vec![])),
            Arc::new(Pinned),
            config,
        );
        // The pinned endpoint is blacklisted, and the registry is empty.
        assert_eq!(selector.select().await, None);

        let config = SelectorConfig::default();
        let selector = ServiceSelector::with_policy(
            Arc::new(StaticRegistry::new(vec![])),
            Arc::new(Pinned),
            config,
        );
        assert_eq!(selector.select().await.as_deref(), Some("http://pinned"));
    }
}
