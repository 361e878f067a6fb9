//! Runtime statistics for traversal and build.
//!
//! Counters live next to the tree they describe and are runtime-toggled per
//! tree so a disabled tree pays a single relaxed load per query.
//!
//! # Usage
//!
//! ```ignore
//! use facet_bvh::{BvhTraverser, StatsAccumulator};
//!
//! // Shared atomics (default):
//! BvhTraverser::intersect(&bvh, &ray)?;
//!
//! // Hot loops: accumulate locally, flush at a boundary.
//! let mut acc = StatsAccumulator::for_tree(&bvh);
//! for ray in &rays {
//!     BvhTraverser::intersect_with(&bvh, ray, &mut acc)?;
//! }
//! bvh.stats().merge(&mut acc);
//!
//! // Visualization reads an owned copy, never the live counters.
//! let snapshot = bvh.snapshot();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Receiver for traversal events.
///
/// Implemented by the shared atomic counters, by [`StatsAccumulator`] and by
/// a no-op sink used when collection is disabled.
pub trait StatsSink {
    /// A slab test ran on `node`; `passed` when the ray entered its box.
    fn node_tested(&mut self, node: u32, passed: bool);
    /// A polygon test ran on `facet` after `steps_before` traversal steps.
    fn facet_tested(&mut self, facet: u32, steps_before: u32, hit: bool);
    /// `facet` was returned as the nearest hit.
    fn nearest_hit(&mut self, facet: u32);
}

/// Sink that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStats;

impl StatsSink for NoStats {
    #[inline]
    fn node_tested(&mut self, _node: u32, _passed: bool) {}
    #[inline]
    fn facet_tested(&mut self, _facet: u32, _steps_before: u32, _hit: bool) {}
    #[inline]
    fn nearest_hit(&mut self, _facet: u32) {}
}

#[derive(Debug, Default)]
struct NodeCounters {
    nb_checks: AtomicU64,
    nb_intersects: AtomicU64,
}

#[derive(Debug, Default)]
struct FacetCounters {
    nb_checks: AtomicU64,
    nb_intersects: AtomicU64,
    nb_traversal_steps: AtomicU64,
    nb_intersections: AtomicU64,
}

/// Lock-free per-node and per-facet counters for one tree.
///
/// Each event bumps `nb_checks` first and the rarer counters after it with
/// release ordering. [`BvhStats::snapshot`] acquires the rarer counters
/// first, so a snapshot taken while queries run never shows more
/// intersects than checks. A snapshot racing [`BvhStats::clear`] may mix
/// old and zeroed values.
#[derive(Debug)]
pub struct BvhStats {
    nodes: Box<[NodeCounters]>,
    facets: Box<[FacetCounters]>,
    enabled: AtomicBool,
}

impl BvhStats {
    /// Zeroed counters, collection enabled.
    pub fn new(node_count: usize, facet_count: usize) -> Self {
        Self {
            nodes: (0..node_count).map(|_| NodeCounters::default()).collect(),
            facets: (0..facet_count).map(|_| FacetCounters::default()).collect(),
            enabled: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Runtime toggle for this tree's collection.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    /// Reset every counter to zero.
    pub fn clear(&self) {
        for n in self.nodes.iter() {
            n.nb_checks.store(0, Ordering::Relaxed);
            n.nb_intersects.store(0, Ordering::Relaxed);
        }
        for f in self.facets.iter() {
            f.nb_checks.store(0, Ordering::Relaxed);
            f.nb_intersects.store(0, Ordering::Relaxed);
            f.nb_traversal_steps.store(0, Ordering::Relaxed);
            f.nb_intersections.store(0, Ordering::Relaxed);
        }
    }

    /// Fold a thread-local accumulator into the shared counters and reset it.
    ///
    /// Accumulators sized for a different tree are ignored past the shorter
    /// length. Has no effect while collection is disabled.
    pub fn merge(&self, acc: &mut StatsAccumulator) {
        if !acc.dirty {
            return;
        }
        if self.is_enabled() {
            for (shared, local) in self.nodes.iter().zip(acc.nodes.iter()) {
                add(&shared.nb_checks, local[0], Ordering::Relaxed);
                add(&shared.nb_intersects, local[1], Ordering::Release);
            }
            for (shared, local) in self.facets.iter().zip(acc.facets.iter()) {
                add(&shared.nb_checks, local[0], Ordering::Relaxed);
                add(&shared.nb_traversal_steps, local[2], Ordering::Relaxed);
                add(&shared.nb_intersects, local[1], Ordering::Release);
                add(&shared.nb_intersections, local[3], Ordering::Release);
            }
        }
        acc.reset();
    }

    /// Owned copy of every counter. `facet_levels` supplies the static leaf
    /// depth of each facet (`None` for excluded facets).
    pub fn snapshot(&self, facet_levels: &[Option<u32>]) -> StatsSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let nb_intersects = n.nb_intersects.load(Ordering::Acquire);
                NodeStats {
                    nb_checks: n.nb_checks.load(Ordering::Relaxed),
                    nb_intersects,
                }
            })
            .collect();
        let facets = self
            .facets
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let nb_intersections = f.nb_intersections.load(Ordering::Acquire);
                let nb_intersects = f.nb_intersects.load(Ordering::Acquire);
                FacetStats {
                    nb_checks: f.nb_checks.load(Ordering::Relaxed),
                    nb_intersects,
                    nb_traversal_steps: f.nb_traversal_steps.load(Ordering::Relaxed),
                    nb_intersections,
                    level: facet_levels.get(i).copied().flatten(),
                }
            })
            .collect();
        StatsSnapshot { nodes, facets }
    }
}

#[inline]
fn add(counter: &AtomicU64, value: u64, order: Ordering) {
    if value != 0 {
        counter.fetch_add(value, order);
    }
}

/// Sink writing straight into the shared atomics.
pub(crate) struct SharedSink<'a>(pub(crate) &'a BvhStats);

impl StatsSink for SharedSink<'_> {
    #[inline]
    fn node_tested(&mut self, node: u32, passed: bool) {
        if let Some(n) = self.0.nodes.get(node as usize) {
            n.nb_checks.fetch_add(1, Ordering::Relaxed);
            if passed {
                n.nb_intersects.fetch_add(1, Ordering::Release);
            }
        }
    }

    #[inline]
    fn facet_tested(&mut self, facet: u32, steps_before: u32, hit: bool) {
        if let Some(f) = self.0.facets.get(facet as usize) {
            f.nb_checks.fetch_add(1, Ordering::Relaxed);
            f.nb_traversal_steps
                .fetch_add(steps_before as u64, Ordering::Relaxed);
            if hit {
                f.nb_intersects.fetch_add(1, Ordering::Release);
            }
        }
    }

    #[inline]
    fn nearest_hit(&mut self, facet: u32) {
        if let Some(f) = self.0.facets.get(facet as usize) {
            f.nb_intersections.fetch_add(1, Ordering::Release);
        }
    }
}

/// Plain per-thread counter buffers.
///
/// Layout per node: `[nb_checks, nb_intersects]`; per facet:
/// `[nb_checks, nb_intersects, nb_traversal_steps, nb_intersections]`.
#[derive(Clone, Debug, Default)]
pub struct StatsAccumulator {
    nodes: Vec<[u64; 2]>,
    facets: Vec<[u64; 4]>,
    dirty: bool,
}

impl StatsAccumulator {
    pub fn new(node_count: usize, facet_count: usize) -> Self {
        Self {
            nodes: vec![[0; 2]; node_count],
            facets: vec![[0; 4]; facet_count],
            dirty: false,
        }
    }

    /// Accumulator sized for `bvh`.
    pub fn for_tree(bvh: &crate::tree::Bvh) -> Self {
        Self::new(bvh.stats().node_count(), bvh.stats().facet_count())
    }

    /// True once anything has been recorded since the last flush.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn reset(&mut self) {
        self.nodes.fill([0; 2]);
        self.facets.fill([0; 4]);
        self.dirty = false;
    }
}

impl StatsSink for StatsAccumulator {
    #[inline]
    fn node_tested(&mut self, node: u32, passed: bool) {
        if let Some(n) = self.nodes.get_mut(node as usize) {
            n[0] += 1;
            n[1] += passed as u64;
            self.dirty = true;
        }
    }

    #[inline]
    fn facet_tested(&mut self, facet: u32, steps_before: u32, hit: bool) {
        if let Some(f) = self.facets.get_mut(facet as usize) {
            f[0] += 1;
            f[1] += hit as u64;
            f[2] += steps_before as u64;
            self.dirty = true;
        }
    }

    #[inline]
    fn nearest_hit(&mut self, facet: u32) {
        if let Some(f) = self.facets.get_mut(facet as usize) {
            f[3] += 1;
            self.dirty = true;
        }
    }
}

/// Ratio of passes to tests, 0 without tests, clamped to 1.
#[inline]
fn chance(intersects: u64, checks: u64) -> f64 {
    if checks == 0 {
        0.0
    } else {
        (intersects as f64 / checks as f64).min(1.0)
    }
}

/// Counters of one node at snapshot time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeStats {
    pub nb_checks: u64,
    pub nb_intersects: u64,
}

impl NodeStats {
    #[inline]
    pub fn chance(&self) -> f64 {
        chance(self.nb_intersects, self.nb_checks)
    }
}

/// Counters of one facet at snapshot time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacetStats {
    pub nb_checks: u64,
    pub nb_intersects: u64,
    pub nb_traversal_steps: u64,
    pub nb_intersections: u64,
    /// Depth of the owning leaf; `None` for excluded facets.
    pub level: Option<u32>,
}

impl FacetStats {
    #[inline]
    pub fn chance(&self) -> f64 {
        chance(self.nb_intersects, self.nb_checks)
    }

    /// Mean traversal steps spent before each test of this facet.
    #[inline]
    pub fn mean_steps(&self) -> f64 {
        if self.nb_checks == 0 {
            0.0
        } else {
            self.nb_traversal_steps as f64 / self.nb_checks as f64
        }
    }
}

/// Owned copy of a tree's counters; safe to hand to visualization code.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatsSnapshot {
    /// Indexed like the tree's node array.
    pub nodes: Vec<NodeStats>,
    /// Indexed like the facet slice the tree was built from.
    pub facets: Vec<FacetStats>,
}

impl StatsSnapshot {
    pub fn total_node_checks(&self) -> u64 {
        self.nodes.iter().map(|n| n.nb_checks).sum()
    }

    pub fn total_facet_checks(&self) -> u64 {
        self.facets.iter().map(|f| f.nb_checks).sum()
    }

    pub fn total_hits(&self) -> u64 {
        self.facets.iter().map(|f| f.nb_intersections).sum()
    }

    /// Normalized prior hit probabilities from nearest-hit counts.
    ///
    /// `None` until at least one query has hit something.
    pub fn hit_probabilities(&self) -> Option<Vec<f64>> {
        let total = self.total_hits();
        if total == 0 {
            return None;
        }
        let total = total as f64;
        Some(
            self.facets
                .iter()
                .map(|f| f.nb_intersections as f64 / total)
                .collect(),
        )
    }

    /// Facets whose mean steps per check exceed `factor` times the mean over
    /// all checked facets, most expensive first.
    pub fn expensive_facets(&self, factor: f64) -> Vec<usize> {
        let checked: Vec<(usize, f64)> = self
            .facets
            .iter()
            .enumerate()
            .filter(|(_, f)| f.nb_checks > 0)
            .map(|(i, f)| (i, f.mean_steps()))
            .collect();
        if checked.is_empty() {
            return Vec::new();
        }
        let mean = checked.iter().map(|(_, s)| s).sum::<f64>() / checked.len() as f64;
        let threshold = mean * factor;
        let mut out: Vec<(usize, f64)> = checked.into_iter().filter(|(_, s)| *s > threshold).collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out.into_iter().map(|(i, _)| i).collect()
    }
}

/// Rolling window for storing recent values (e.g., build timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl RollingWindow<u64> {
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
        }
    }

    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Build timings for one registry entry.
#[derive(Debug, Clone, Default)]
pub struct BuildMetrics {
    /// Recent successful build times in microseconds.
    pub build_timings: RollingWindow<u64>,
    pub last_build_us: u64,
    /// Successful builds since the entry was created.
    pub total_builds: u64,
    /// Builds that were cancelled or failed.
    pub failed_builds: u64,
}

impl BuildMetrics {
    pub fn record_build(&mut self, build_us: u64) {
        self.build_timings.push(build_us);
        self.last_build_us = build_us;
        self.total_builds += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_builds += 1;
    }
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod stats_test;
