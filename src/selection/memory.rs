//! Health-state memory.
//!
//! # Responsibilities
//! - Track candidates that failed validation (unhealthy set)
//! - Track reachable-but-suboptimal candidates (insertion-ordered backups)
//! - Decay both sets after their TTLs elapse without a probing round
//! - Record the decision trace of the most recent selection
//!
//! # Design Decisions
//! - A candidate is never in both tiers; entering one removes it from the other
//! - TTLs are lazy deadlines checked on entry rather than armed timers;
//!   every round rearms them, short-circuited calls do not
//! - `total_attempts` is a lifetime counter, untouched by TTL expiry

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::probe::timed::Candidate;

/// One step of the decision trace.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub stage: DecisionStage,
    pub val: Value,
}

/// Stages a selection attempt can pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStage {
    ShortCircuit,
    GetAllServices,
    FilterToWhitelist,
    FilterFromBlacklist,
    FilterOutKnownUnhealthy,
    Round,
    RaceWinner,
    SelectedFromBackup,
    NoServicesLeft,
    ResetAll,
    MaxRoundsExceeded,
    SyncStatusCheck,
    HealthCheck,
    SelectPrimaryAndSecondaries,
}

/// Process-local selection memory, owned by a single engine instance.
#[derive(Debug, Default)]
pub struct HealthMemory {
    unhealthy: HashSet<Candidate>,
    /// Insertion-ordered so the default backup pick is oldest-first.
    backups: Vec<(Candidate, Value)>,
    total_attempts: u64,
    trace: Vec<Decision>,
    unhealthy_armed_at: Option<Instant>,
    backups_armed_at: Option<Instant>,
}

impl HealthMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a candidate unhealthy, dropping any backup entry it held.
    pub fn add_unhealthy(&mut self, candidate: Candidate) {
        self.backups.retain(|(c, _)| *c != candidate);
        self.unhealthy.insert(candidate);
    }

    pub fn remove_from_unhealthy(&mut self, candidate: &str) {
        self.unhealthy.remove(candidate);
    }

    pub fn is_unhealthy(&self, candidate: &str) -> bool {
        self.unhealthy.contains(candidate)
    }

    /// Stash a reachable-but-suboptimal candidate with its response body.
    /// Re-adding replaces the stored body without changing insertion order.
    pub fn add_backup(&mut self, candidate: Candidate, body: Value) {
        self.unhealthy.remove(&candidate);
        if let Some(entry) = self.backups.iter_mut().find(|(c, _)| *c == candidate) {
            entry.1 = body;
        } else {
            self.backups.push((candidate, body));
        }
    }

    pub fn remove_from_backups(&mut self, candidate: &str) {
        self.backups.retain(|(c, _)| c != candidate);
    }

    pub fn is_backup(&self, candidate: &str) -> bool {
        self.backups.iter().any(|(c, _)| c == candidate)
    }

    /// Take the oldest backup out of the map.
    pub fn pop_backup(&mut self) -> Option<Candidate> {
        if self.backups.is_empty() {
            None
        } else {
            Some(self.backups.remove(0).0)
        }
    }

    pub fn unhealthy_size(&self) -> usize {
        self.unhealthy.len()
    }

    pub fn backups_size(&self) -> usize {
        self.backups.len()
    }

    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    pub fn record_attempts(&mut self, count: usize) {
        self.total_attempts += count as u64;
    }

    /// Drop both tiers wholesale. Full amnesia after total exhaustion.
    pub fn reset(&mut self) {
        self.unhealthy.clear();
        self.backups.clear();
        self.unhealthy_armed_at = None;
        self.backups_armed_at = None;
    }

    pub fn clear_unhealthy(&mut self) {
        self.unhealthy.clear();
    }

    pub fn clear_backups(&mut self) {
        self.backups.clear();
    }

    /// Rearm both decay deadlines. Called on every probing round.
    pub fn arm_ttls(&mut self, now: Instant) {
        self.unhealthy_armed_at = Some(now);
        self.backups_armed_at = Some(now);
    }

    /// Lazily apply TTL expiry; called on selection entry.
    pub fn expire(&mut self, now: Instant, unhealthy_ttl: Duration, backups_ttl: Duration) {
        if let Some(armed) = self.unhealthy_armed_at {
            if now.duration_since(armed) >= unhealthy_ttl {
                tracing::debug!(count = self.unhealthy.len(), "Unhealthy TTL elapsed, clearing");
                self.unhealthy.clear();
                self.unhealthy_armed_at = None;
            }
        }
        if let Some(armed) = self.backups_armed_at {
            if now.duration_since(armed) >= backups_ttl {
                tracing::debug!(count = self.backups.len(), "Backups TTL elapsed, clearing");
                self.backups.clear();
                self.backups_armed_at = None;
            }
        }
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub fn record(&mut self, stage: DecisionStage, val: Value) {
        self.trace.push(Decision { stage, val });
    }

    pub fn trace(&self) -> &[Decision] {
        &self.trace
    }
}
