//! Split heuristics as a table of pure partition functions.
//!
//! Every heuristic has the same shape:
//!
//! ```text
//! fn(&mut [PrimInfo], &SplitContext) -> Option<Split>
//!
//!   prims (in)   [ p0 p1 p2 p3 p4 p5 p6 ]
//!   prims (out)  [ p4 p1 p6 | p0 p5 p3 p2 ]
//!                 └─ left ─┘ └── right ──┘
//!                           ^ split.mid
//! ```
//!
//! A function reorders the slice so that `[..mid]` becomes the left child and
//! returns `None` when it finds no useful split; the builder then falls back
//! to [`equal_counts`]. The builder itself stays heuristic-agnostic.
//!
//! HLBVH is a whole-tree construction (see [`hlbvh`]); its table entry is the
//! SAH partition, which it also uses to merge treelets.

pub mod equal_counts;
pub mod hlbvh;
pub mod middle;
pub mod probability;
pub mod sah;

use std::cmp::Ordering;

use glam::DVec3;

use crate::bounds::DAabb3;
use crate::config::{BuildConfig, SplitMethod};

pub use equal_counts::equal_counts;
pub use middle::middle;
pub use probability::prob_split;
pub use sah::{molflow_split, sah};

/// Per-facet input to the builder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrimInfo {
  /// Index into the facet slice.
  pub index: u32,
  /// Facet bounds.
  pub aabb: DAabb3,
  /// Facet centroid (split key).
  pub centroid: DVec3,
  /// Normalized prior hit probability.
  pub probability: f64,
}

/// Node-level inputs shared by all heuristics.
#[derive(Clone, Copy, Debug)]
pub struct SplitContext<'a> {
  /// Union of the subset's facet bounds.
  pub bounds: DAabb3,
  /// Bounds of the subset's centroids.
  pub centroid_bounds: DAabb3,
  /// Widest axis of `centroid_bounds`.
  pub axis: usize,
  pub config: &'a BuildConfig,
}

impl<'a> SplitContext<'a> {
  /// Context for a subset, choosing the widest centroid axis.
  pub fn for_prims(prims: &[PrimInfo], config: &'a BuildConfig) -> Self {
    let (bounds, centroid_bounds) = subset_bounds(prims);
    Self {
      bounds,
      centroid_bounds,
      axis: centroid_bounds.longest_axis(),
      config,
    }
  }

  /// Centroid extent along the chosen axis.
  #[inline]
  pub fn axis_extent(&self) -> f64 {
    self.centroid_bounds.size()[self.axis]
  }
}

/// Chosen partition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Split {
  pub axis: usize,
  /// Split plane position along `axis`.
  pub position: f64,
  /// Facets in the left child.
  pub mid: usize,
}

/// Signature shared by all heuristics.
pub type PartitionFn = fn(&mut [PrimInfo], &SplitContext<'_>) -> Option<Split>;

/// Heuristic table.
pub fn partition_fn(method: SplitMethod) -> PartitionFn {
  match method {
    SplitMethod::Middle => middle,
    SplitMethod::EqualCounts => equal_counts,
    SplitMethod::Sah | SplitMethod::Hlbvh => sah,
    SplitMethod::MolflowSplit => molflow_split,
    SplitMethod::ProbSplit => prob_split,
  }
}

/// Facet bounds and centroid bounds of a subset.
pub fn subset_bounds(prims: &[PrimInfo]) -> (DAabb3, DAabb3) {
  prims.iter().fold((DAabb3::EMPTY, DAabb3::EMPTY), |(b, c), p| {
    (b.union(&p.aabb), c.grow_point(p.centroid))
  })
}

/// Total order on centroids along `axis`, ties broken by facet index so
/// every heuristic is deterministic.
#[inline]
pub(crate) fn cmp_centroid(a: &PrimInfo, b: &PrimInfo, axis: usize) -> Ordering {
  a.centroid[axis]
    .total_cmp(&b.centroid[axis])
    .then(a.index.cmp(&b.index))
}

/// Move every element matching `pred` to the front; returns their count.
pub(crate) fn partition_in_place<T>(items: &mut [T], pred: impl Fn(&T) -> bool) -> usize {
  let mut first = 0;
  for i in 0..items.len() {
    if pred(&items[i]) {
      items.swap(first, i);
      first += 1;
    }
  }
  first
}

#[cfg(test)]
pub(crate) mod test_prims {
  use super::*;

  /// Unit-box primitives centered on the given x positions.
  pub fn along_x(xs: &[f64]) -> Vec<PrimInfo> {
    let p = 1.0 / xs.len() as f64;
    xs.iter()
      .enumerate()
      .map(|(i, &x)| {
        let c = DVec3::new(x, 0.0, 0.0);
        PrimInfo {
          index: i as u32,
          aabb: DAabb3::new(c - DVec3::splat(0.5), c + DVec3::splat(0.5)),
          centroid: c,
          probability: p,
        }
      })
      .collect()
  }

  /// Sorted facet indices of a slice, for set comparisons.
  pub fn indices(prims: &[PrimInfo]) -> Vec<u32> {
    let mut v: Vec<u32> = prims.iter().map(|p| p.index).collect();
    v.sort_unstable();
    v
  }
}
