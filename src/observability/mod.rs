//! Observability subsystem.
//!
//! # Design Decisions
//! - The library only emits: `tracing` events at call sites, counters and
//!   gauges through the `metrics` facade
//! - Subscriber and recorder installation belong to the embedding process;
//!   only the CLI initializes a subscriber itself

pub mod logging;
pub mod metrics;
