//! Service selection engine: probe candidate service endpoints concurrently
//! under strict time budgets and pick the best available one, degrading
//! through backup and unhealthy tiers when nothing fully healthy responds.

pub mod config;
pub mod gateway;
pub mod observability;
pub mod probe;
pub mod selection;

pub use config::{SelectionConfig, SelectorConfig};
pub use gateway::GatewayPool;
pub use probe::{Prober, Timing};
pub use selection::{ReplicaSelector, ServiceRegistry, ServiceSelector, StaticRegistry};
