//! Timed health probes.
//!
//! # Responsibilities
//! - Issue a single GET to a candidate's health-check URL
//! - Record wall-clock latency for the sorter
//! - Encode every failure mode in the returned value

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::Value;

/// Candidate endpoint identifier (typically a base URL).
pub type Candidate = String;

/// Descriptor for a single outbound probe.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// The candidate this probe belongs to.
    pub id: Candidate,
    /// Full URL the probe is sent to.
    pub url: String,
}

/// Raw response captured from a probe.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: StatusCode,
    /// Parsed JSON body; `Value::Null` when the body is absent or not JSON.
    pub body: Value,
}

/// Result of a timed probe. `response` is `None` on timeout, DNS failure,
/// or connection refusal; that is an outcome, not an error.
#[derive(Debug, Clone)]
pub struct Timing {
    pub request: ProbeRequest,
    pub response: Option<ProbeResponse>,
    pub elapsed: Option<Duration>,
}

impl Timing {
    /// True when the probe got any response at all, regardless of status.
    pub fn reachable(&self) -> bool {
        self.response.is_some()
    }
}

/// Issues timed probes over a shared HTTP client.
#[derive(Debug, Clone, Default)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe `request.url` with an optional per-request timeout.
    ///
    /// Never fails: transport-level errors come back as
    /// `{ response: None, elapsed: None }`.
    pub async fn probe(&self, request: ProbeRequest, timeout: Option<Duration>) -> Timing {
        let start = Instant::now();

        let mut builder = self
            .client
            .get(&request.url)
            .header("user-agent", "node-selection-probe");
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                Timing {
                    request,
                    response: Some(ProbeResponse { status, body }),
                    elapsed: Some(start.elapsed()),
                }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "Probe failed at transport level");
                Timing {
                    request,
                    response: None,
                    elapsed: None,
                }
            }
        }
    }
}

/// Build the health-check URL for a candidate endpoint.
pub fn health_check_url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path)
}
