//! Version/latency ordering of probe results.
//!
//! # Responsibilities
//! - Order timed probe results by semantic version, then latency
//! - Treat response-less results as worst
//! - Load-balance across near-equal-latency peers via an equivalency window
//!
//! # Design Decisions
//! - The comparator itself is deterministic; randomness is applied afterwards
//!   by shuffling maximal runs of equivalent results. A randomized comparator
//!   would violate the total-order contract `sort_by` is allowed to enforce.

use std::cmp::Ordering;
use std::time::Duration;

use semver::Version;

use crate::probe::timed::Timing;

/// Ordering options for [`sort_timings`].
#[derive(Debug, Clone, Default)]
pub struct SortOptions {
    /// Order strictly by semantic version (descending) before latency.
    pub by_version: bool,
    /// Expected current version; when `by_version` is false, version only
    /// decides between two results when at least one is behind this.
    pub current_version: Option<Version>,
    /// Latency delta below which two otherwise-tied results are
    /// interchangeable and get shuffled rather than ordered.
    pub equivalency_delta: Option<Duration>,
}

/// Pull the `data.version` field out of a health-check response body.
pub fn extract_version(timing: &Timing) -> Option<Version> {
    let response = timing.response.as_ref()?;
    let raw = response.body.get("data")?.get("version")?.as_str()?;
    Version::parse(raw).ok()
}

/// Sort probe results best-first: version rule, then latency ascending,
/// response-less results last. Runs of equivalent results (same version
/// rank, latency within the equivalency window) are shuffled.
pub fn sort_timings(mut timings: Vec<Timing>, opts: &SortOptions) -> Vec<Timing> {
    timings.sort_by(|a, b| compare(a, b, opts));
    if let Some(window) = opts.equivalency_delta {
        shuffle_equivalent_runs(&mut timings, opts, window);
    }
    timings
}

fn compare(a: &Timing, b: &Timing, opts: &SortOptions) -> Ordering {
    match (a.response.is_some(), b.response.is_some()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
        (true, true) => version_order(a, b, opts).then_with(|| latency_order(a, b)),
    }
}

/// The version portion of the comparison, without the latency tie-break.
fn version_order(a: &Timing, b: &Timing, opts: &SortOptions) -> Ordering {
    let va = extract_version(a);
    let vb = extract_version(b);

    if opts.by_version {
        return descending(va, vb);
    }

    let Some(current) = &opts.current_version else {
        return Ordering::Equal;
    };
    let a_behind = va.as_ref().map_or(true, |v| v < current);
    let b_behind = vb.as_ref().map_or(true, |v| v < current);
    match (a_behind, b_behind) {
        // Both at or above current: version does not decide.
        (false, false) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        // Both behind: higher version still wins between them.
        (true, true) => descending(va, vb),
    }
}

/// Higher version first; a missing version goes to the back.
fn descending(a: Option<Version>, b: Option<Version>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn latency_order(a: &Timing, b: &Timing) -> Ordering {
    match (a.elapsed, b.elapsed) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn equivalent(a: &Timing, b: &Timing, opts: &SortOptions, window: Duration) -> bool {
    if a.response.is_none() || b.response.is_none() {
        return false;
    }
    if version_order(a, b, opts) != Ordering::Equal {
        return false;
    }
    match (a.elapsed, b.elapsed) {
        (Some(x), Some(y)) => {
            let delta = if x > y { x - y } else { y - x };
            delta < window
        }
        _ => false,
    }
}

fn shuffle_equivalent_runs(timings: &mut [Timing], opts: &SortOptions, window: Duration) {
    let mut start = 0;
    while start < timings.len() {
        let mut end = start + 1;
        while end < timings.len() && equivalent(&timings[end - 1], &timings[end], opts, window) {
            end += 1;
        }
        if end - start > 1 {
            fastrand::shuffle(&mut timings[start..end]);
        }
        start = end;
    }
}
