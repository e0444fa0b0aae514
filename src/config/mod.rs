//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file / embedding process
//!     → loader.rs (read, parse)
//!     → validation.rs (reject malformed endpoints and zero budgets)
//!     → schema.rs (typed config with serde defaults)
//!     → engine constructors
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{GatewayConfig, ReplicaConfig, SelectionConfig, SelectorConfig};
