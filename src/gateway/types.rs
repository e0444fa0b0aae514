//! Gateway types and error definitions.

use thiserror::Error;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur operating the gateway pool.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The whitelist is empty.
    #[error("no gateway URLs configured")]
    NoGateways,

    /// A whitelist entry could not be parsed.
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),

    /// Every whitelisted gateway has been marked unhealthy.
    #[error("every whitelisted gateway is unhealthy")]
    Exhausted,

    /// Chain configuration mismatch.
    #[error("chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}
