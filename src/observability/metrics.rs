//! Metrics recording.
//!
//! # Metrics
//! - `selection_rounds_total` (counter): probing rounds started
//! - `selection_probes_total` (counter): individual probes issued
//! - `selection_outcomes_total` (counter, label `outcome`): how selections
//!   resolved (healthy, backup, shortcircuit, exhausted, round_budget)
//! - `selection_unhealthy_candidates` / `selection_backup_candidates`
//!   (gauges): current tier sizes
//! - `gateway_failovers_total` (counter): active-gateway switches

/// Record one probing round of the given size.
pub fn record_round(size: usize) {
    metrics::counter!("selection_rounds_total").increment(1);
    metrics::counter!("selection_probes_total").increment(size as u64);
}

/// Record how a selection resolved.
pub fn record_selection(outcome: &'static str) {
    metrics::counter!("selection_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record the current tier sizes.
pub fn record_tier_sizes(unhealthy: usize, backups: usize) {
    metrics::gauge!("selection_unhealthy_candidates").set(unhealthy as f64);
    metrics::gauge!("selection_backup_candidates").set(backups as f64);
}

/// Record a gateway failover.
pub fn record_gateway_failover() {
    metrics::counter!("gateway_failovers_total").increment(1);
}
