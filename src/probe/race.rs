//! Probe racing.
//!
//! # Responsibilities
//! - Dispatch one probe per candidate with a stagger between launches
//! - Resolve with the first response that passes validation
//! - Abort every other in-flight probe once a winner is known
//!
//! # Design Decisions
//! - The stagger biases toward earlier-listed candidates without
//!   guaranteeing they win; a fast later candidate can still beat them
//! - A global timeout races alongside the probes as a synthetic competitor
//! - Only candidates whose response failed validation are reported as
//!   errored; transport failures and cancelled probes stay unknown

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::probe::timed::{health_check_url, Candidate, ProbeRequest, ProbeResponse, Prober};

/// Outcome of one race round.
#[derive(Debug, Clone, Default)]
pub struct RaceOutcome {
    /// First candidate whose response passed validation, if any.
    pub best: Option<Candidate>,
    /// Candidates that responded but failed validation.
    pub errored: Vec<Candidate>,
}

/// Race health-check probes across `endpoints`.
///
/// Probe `i` waits `stagger * i` before firing; probes still behind their
/// stagger gate when a winner lands never fire at all. This function does
/// not fail: a completely lost race yields `{ best: None, errored: [] }`.
pub async fn race<F>(
    prober: &Prober,
    endpoints: &[Candidate],
    health_check_path: &str,
    validate: F,
    timeout: Duration,
    stagger: Duration,
) -> RaceOutcome
where
    F: FnMut(&str, &ProbeResponse) -> bool,
{
    let mut validate = validate;
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    for (i, endpoint) in endpoints.iter().enumerate() {
        let request = ProbeRequest {
            id: endpoint.clone(),
            url: health_check_url(endpoint, health_check_path),
        };
        let prober = prober.clone();
        let tx = result_tx.clone();
        let mut cancel = cancel_rx.clone();
        let delay = stagger * i as u32;

        tokio::spawn(async move {
            // Stagger gate: give earlier-listed endpoints a head start.
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.changed() => return,
            }
            if *cancel.borrow() {
                return;
            }
            let timing = tokio::select! {
                timing = prober.probe(request, Some(timeout)) => timing,
                _ = cancel.changed() => return,
            };
            let _ = tx.send(timing);
        });
    }
    drop(result_tx);

    let mut errored = Vec::new();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            received = result_rx.recv() => match received {
                Some(timing) => match &timing.response {
                    Some(response) if validate(&timing.request.id, response) => {
                        let _ = cancel_tx.send(true);
                        tracing::debug!(winner = %timing.request.id, "Race resolved");
                        return RaceOutcome {
                            best: Some(timing.request.id),
                            errored,
                        };
                    }
                    Some(response) => {
                        tracing::debug!(
                            endpoint = %timing.request.id,
                            status = %response.status,
                            "Probe response failed validation"
                        );
                        errored.push(timing.request.id);
                    }
                    // Transport failure: unknown, not penalized.
                    None => {}
                },
                // Every probe resolved without a winner.
                None => return RaceOutcome { best: None, errored },
            },
            _ = &mut deadline => {
                let _ = cancel_tx.send(true);
                tracing::debug!(errored = errored.len(), "Race timed out without a winner");
                return RaceOutcome { best: None, errored };
            }
        }
    }
}
