//! Blockchain gateway subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayConfig (fixed whitelist of 1-2 RPC URLs)
//!     → provider.rs (alloy providers, active-gateway failover)
//!     → contract callers (report failures, read chain state)
//! ```
//!
//! # Design Decisions
//! - Unlike the base selection engine, an exhausted whitelist does NOT
//!   reset: the list is tiny and operator intervention is expected

pub mod provider;
pub mod types;

pub use provider::GatewayPool;
pub use types::{ChainId, GatewayError};
