//! Candidate registry seam.
//!
//! The engine never discovers endpoints itself; a registry capability hands
//! it a fresh candidate list on every selection, plus the expected current
//! version for versioned service classes (on-chain registry, static config).

use futures_util::future::{self, BoxFuture, FutureExt};
use semver::Version;

use crate::probe::timed::Candidate;

/// Supplies the raw candidate list and the expected current version.
pub trait ServiceRegistry: Send + Sync {
    /// Fetch the full candidate list. Called fresh on every selection.
    fn services(&self) -> BoxFuture<'_, Vec<Candidate>>;

    /// Expected current version for this service class, when known.
    fn current_version(&self) -> BoxFuture<'_, Option<Version>> {
        future::ready(None).boxed()
    }
}

/// Fixed-list registry for tests and the CLI.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    services: Vec<Candidate>,
    current_version: Option<Version>,
}

impl StaticRegistry {
    pub fn new(services: Vec<Candidate>) -> Self {
        Self {
            services,
            current_version: None,
        }
    }

    pub fn with_current_version(mut self, version: Version) -> Self {
        self.current_version = Some(version);
        self
    }
}

impl ServiceRegistry for StaticRegistry {
    fn services(&self) -> BoxFuture<'_, Vec<Candidate>> {
        future::ready(self.services.clone()).boxed()
    }

    fn current_version(&self) -> BoxFuture<'_, Option<Version>> {
        future::ready(self.current_version.clone()).boxed()
    }
}
