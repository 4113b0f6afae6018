//! Race-then-fallback element resolution.
//!
//! UI frameworks render asynchronously and mark elements visible
//! inconsistently. A single global wait is either too slow (burns the
//! full timeout when nothing will appear) or too fast (misses late
//! rendering). The resolver races one bounded probe per candidate
//! first, so latency tracks the slowest single probe rather than the
//! sum, then falls back to sequential waits for the stragglers.

use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

use crate::descriptor::Descriptor;
use crate::surface::{ElementRef, Surface, WaitState};

/// A successful resolution: the element plus the priority index of the
/// candidate that matched (lower = higher priority).
#[derive(Debug, Clone)]
pub struct Resolved {
    pub element: ElementRef,
    pub index: usize,
}

/// Resolves the highest-priority visible element from an ordered
/// candidate list. Never errors; exhaustion is `None` and the caller
/// decides the next action.
#[derive(Debug, Clone, Copy)]
pub struct CandidateResolver {
    /// Per-candidate budget in the parallel probe phase
    probe_budget: Duration,
    /// Per-candidate budget in the sequential fallback phase
    fallback_budget: Duration,
}

impl CandidateResolver {
    pub fn new(probe_budget: Duration, fallback_budget: Duration) -> Self {
        Self {
            probe_budget,
            fallback_budget,
        }
    }

    /// Resolve the first visible candidate, in two phases:
    ///
    /// 1. issue one time-bounded visibility probe per candidate
    ///    concurrently, then scan the results in priority order;
    /// 2. only if nothing was visible, retry each candidate in
    ///    priority order with an explicit wait-for-visible.
    ///
    /// A slow or erroring candidate never blocks the others, and ties
    /// in visibility are broken by list position.
    pub async fn resolve(
        &self,
        surface: &dyn Surface,
        candidates: &[Descriptor],
    ) -> Option<Resolved> {
        if candidates.is_empty() {
            return None;
        }

        // Phase 1: parallel bounded probes.
        let probes = candidates
            .iter()
            .map(|descriptor| self.probe_one(surface, descriptor));
        let results = join_all(probes).await;

        for (index, element) in results.into_iter().enumerate() {
            if let Some(element) = element {
                debug!(index, candidate = %candidates[index], "candidate visible in probe phase");
                return Some(Resolved { element, index });
            }
        }

        // Phase 2: sequential fallback waits.
        for (index, descriptor) in candidates.iter().enumerate() {
            match surface
                .wait_for(descriptor, self.fallback_budget, WaitState::Visible)
                .await
            {
                Ok(element) => {
                    debug!(index, candidate = %descriptor, "candidate appeared in fallback phase");
                    return Some(Resolved { element, index });
                }
                Err(_) => continue,
            }
        }

        debug!(
            candidates = candidates.len(),
            "no candidate resolved in either phase"
        );
        None
    }

    /// One bounded, non-blocking visibility check. Any error or
    /// timeout reports as not-visible.
    async fn probe_one(
        &self,
        surface: &dyn Surface,
        descriptor: &Descriptor,
    ) -> Option<ElementRef> {
        let probe = async {
            let element = surface.locate(descriptor).await.ok()??;
            match surface.is_visible(&element, self.probe_budget).await {
                Ok(true) => Some(element),
                _ => None,
            }
        };
        tokio::time::timeout(self.probe_budget, probe)
            .await
            .ok()
            .flatten()
    }
}
