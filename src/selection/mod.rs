//! Service selection subsystem.
//!
//! # Data Flow
//! ```text
//! registry.rs (fresh candidate list + expected version)
//!     → engine.rs (filter → sample a round → race → mark → retry)
//!         → probe::race (staggered probes, first valid wins)
//!         → memory.rs (unhealthy/backup tiers, TTL decay, trace)
//!         → sort.rs (version/latency ordering)
//!     → replica.rs (probe-all variant assembling primary + secondaries)
//! ```
//!
//! # Design Decisions
//! - One engine instance per service type; no cross-instance sharing
//! - Recoverable failures become tier membership, never errors
//! - Per-service-type behavior is an injected policy object, not a subclass

pub mod engine;
pub mod memory;
pub mod registry;
pub mod replica;
pub mod sort;

pub use engine::{SelectionPolicy, ServiceSelector, StatusPolicy};
pub use memory::{Decision, DecisionStage, HealthMemory};
pub use registry::{ServiceRegistry, StaticRegistry};
pub use replica::{
    HttpSyncStatusClient, ReplicaSelector, ReplicaSet, SyncError, SyncStatus, SyncStatusClient,
};
pub use sort::{extract_version, sort_timings, SortOptions};
