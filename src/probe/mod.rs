//! Network probing subsystem.
//!
//! # Data Flow
//! ```text
//! Candidate endpoints
//!     → timed.rs (single timed GET, failure encoded in the result)
//!     → race.rs (staggered dispatch, shared cancellation, first valid wins)
//!     → selection engine (classify winner / errored / unknown)
//! ```
//!
//! # Design Decisions
//! - The prober never returns an error; an absent response is a valid outcome
//! - Retries are the caller's responsibility, not the prober's
//! - Cancelled probes are unknown, not evidence of poor health

pub mod race;
pub mod timed;

pub use race::{race, RaceOutcome};
pub use timed::{Candidate, ProbeRequest, ProbeResponse, Prober, Timing};
