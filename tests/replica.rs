//! Integration tests for the replica selection engine.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use semver::Version;

use node_selection::config::ReplicaConfig;
use node_selection::selection::{
    HttpSyncStatusClient, ReplicaSelector, StaticRegistry, SyncError, SyncStatus, SyncStatusClient,
};

mod common;

fn fast_config() -> ReplicaConfig {
    let mut config = ReplicaConfig::default();
    config.request_timeout_ms = 2_000;
    config
}

fn registry(endpoints: Vec<String>) -> Arc<StaticRegistry> {
    Arc::new(
        StaticRegistry::new(endpoints).with_current_version(Version::parse("1.2.0").unwrap()),
    )
}

/// Storage node answering health checks and sync-status requests.
async fn spawn_storage_node(
    version: &'static str,
    status: u16,
    is_behind: bool,
    is_configured: bool,
) -> String {
    common::spawn_node(move |path| async move {
        if path.starts_with("/sync_status") {
            (200, common::sync_body(is_behind, is_configured))
        } else {
            (status, common::health_body(version))
        }
    })
    .await
}

/// Storage node with a steady-state sync status and a fixed verbose
/// health-check body.
async fn spawn_storage_node_with_body(body: String) -> String {
    common::spawn_node(move |path| {
        let body = body.clone();
        async move {
            if path.starts_with("/sync_status") {
                (200, common::sync_body(false, true))
            } else {
                (200, body)
            }
        }
    })
    .await
}

#[tokio::test]
async fn test_assembles_primary_and_two_secondaries() {
    let endpoints = vec![
        spawn_storage_node("1.2.3", 200, false, true).await,
        spawn_storage_node("1.2.1", 200, false, true).await,
        // A first-time node (behind, unconfigured) is a valid target too.
        spawn_storage_node("1.2.2", 200, true, false).await,
        spawn_storage_node("1.2.0", 200, false, true).await,
    ];

    let selector = ReplicaSelector::new(
        registry(endpoints.clone()),
        Arc::new(HttpSyncStatusClient::new()),
        fast_config(),
    );
    let replica_set = selector.select(3).await;

    let primary = replica_set.primary.expect("expected a primary");
    assert_eq!(replica_set.secondaries.len(), 2);
    assert!(!replica_set.secondaries.contains(&primary));
    assert_ne!(replica_set.secondaries[0], replica_set.secondaries[1]);
    assert_eq!(replica_set.probed.len(), 4);
}

#[tokio::test]
async fn test_mid_sync_node_is_disqualified_but_usable_as_last_resort() {
    // Behind AND configured: mid-sync, unsuitable as a fresh qualifier.
    let mid_sync = spawn_storage_node("1.2.5", 200, true, true).await;
    let steady = spawn_storage_node("1.2.1", 200, false, true).await;

    let selector = ReplicaSelector::new(
        registry(vec![mid_sync.clone(), steady.clone()]),
        Arc::new(HttpSyncStatusClient::new()),
        fast_config(),
    );
    let replica_set = selector.select(3).await;

    assert_eq!(replica_set.primary.as_deref(), Some(steady.as_str()));
    // The quota is short, so the disqualified node fills in from the
    // unhealthy tier rather than leaving a hole.
    assert_eq!(replica_set.secondaries, vec![mid_sync]);
    assert_eq!(selector.unhealthy_size(), 1);
}

#[tokio::test]
async fn test_degraded_cluster_still_gets_best_unhealthy_primary() {
    let older = spawn_storage_node("1.0.0", 400, false, true).await;
    let newer = spawn_storage_node("1.2.0", 400, false, true).await;

    let selector = ReplicaSelector::new(
        registry(vec![older.clone(), newer.clone()]),
        Arc::new(HttpSyncStatusClient::new()),
        fast_config(),
    );
    let replica_set = selector.select(3).await;

    // Nothing qualified, but the least-bad candidate (highest version in
    // the retained sorted order) still becomes the primary.
    assert_eq!(replica_set.primary.as_deref(), Some(newer.as_str()));
    assert_eq!(replica_set.secondaries, vec![older]);
}

#[tokio::test]
async fn test_full_disk_node_is_demoted_despite_newer_version() {
    let full =
        spawn_storage_node_with_body(common::verbose_health_body("1.2.9", true, 99, 100)).await;
    let roomy =
        spawn_storage_node_with_body(common::verbose_health_body("1.2.1", true, 40, 100)).await;

    let selector = ReplicaSelector::new(
        registry(vec![full.clone(), roomy.clone()]),
        Arc::new(HttpSyncStatusClient::new()),
        fast_config(),
    );
    let replica_set = selector.select(3).await;

    // The full node sorts first by version but fails the capacity gate.
    assert_eq!(replica_set.primary.as_deref(), Some(roomy.as_str()));
    assert_eq!(replica_set.secondaries, vec![full]);
    assert_eq!(selector.unhealthy_size(), 1);
}

#[tokio::test]
async fn test_self_reported_unhealthy_node_is_demoted() {
    let sick =
        spawn_storage_node_with_body(common::verbose_health_body("1.2.9", false, 10, 100)).await;
    let well =
        spawn_storage_node_with_body(common::verbose_health_body("1.2.1", true, 10, 100)).await;

    let selector = ReplicaSelector::new(
        registry(vec![sick.clone(), well.clone()]),
        Arc::new(HttpSyncStatusClient::new()),
        fast_config(),
    );
    let replica_set = selector.select(3).await;

    assert_eq!(replica_set.primary.as_deref(), Some(well.as_str()));
    assert_eq!(replica_set.secondaries, vec![sick]);
    assert_eq!(selector.unhealthy_size(), 1);
}

#[tokio::test]
async fn test_stale_version_is_demoted_even_with_200() {
    let stale = spawn_storage_node("1.1.9", 200, false, true).await;
    let current = spawn_storage_node("1.2.1", 200, false, true).await;

    let selector = ReplicaSelector::new(
        registry(vec![stale.clone(), current.clone()]),
        Arc::new(HttpSyncStatusClient::new()),
        fast_config(),
    );
    let replica_set = selector.select(2).await;

    assert_eq!(replica_set.primary.as_deref(), Some(current.as_str()));
    assert_eq!(replica_set.secondaries, vec![stale.clone()]);
    assert_eq!(selector.unhealthy_size(), 1);
}

/// Sync client that fails for one endpoint and reports steady state for the
/// rest.
struct FlakySyncClient {
    fail: String,
}

impl SyncStatusClient for FlakySyncClient {
    fn sync_status<'a>(
        &'a self,
        endpoint: &'a str,
        _timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<SyncStatus, SyncError>> {
        let result = if endpoint == self.fail {
            Err(SyncError("connection reset".into()))
        } else {
            Ok(SyncStatus {
                is_behind: false,
                is_configured: true,
            })
        };
        future::ready(result).boxed()
    }
}

#[tokio::test]
async fn test_sync_check_error_disqualifies_only_that_candidate() {
    let flaky = spawn_storage_node("1.2.9", 200, false, true).await;
    let steady = spawn_storage_node("1.2.1", 200, false, true).await;

    let selector = ReplicaSelector::new(
        registry(vec![flaky.clone(), steady.clone()]),
        Arc::new(FlakySyncClient {
            fail: flaky.clone(),
        }),
        fast_config(),
    );
    let replica_set = selector.select(3).await;

    // The flaky node sorts first by version but its failed sync check
    // pushes it down to the last-resort tier.
    assert_eq!(replica_set.primary.as_deref(), Some(steady.as_str()));
    assert_eq!(replica_set.secondaries, vec![flaky]);
}
