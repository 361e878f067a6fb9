//! Bucketed surface area heuristic and its probability-weighted variant.
//!
//! ```text
//!   centroid axis ──►
//!   | b0 | b1 | b2 | ... | b11 |
//!        ^    ^                 candidate planes at bucket boundaries
//!
//!   cost(plane) = c_trav + c_isect · (A_L·w_L + A_R·w_R) / A
//! ```
//!
//! `w` is the facet count of a side for plain SAH. MolflowSplit blends the
//! count with the side's share of prior hit probability:
//! `w = (1-α)·n_side + α·n·P_side/P_total`.
//!
//! All three axes with non-zero centroid extent are evaluated; large subsets
//! evaluate them on the rayon pool.

use rayon::prelude::*;

use super::{partition_in_place, PrimInfo, Split, SplitContext};
use crate::bounds::DAabb3;
use crate::constants::{MAX_SAH_BUCKETS, PARALLEL_SAH_THRESHOLD};

#[derive(Clone, Copy, Debug)]
struct Bucket {
  count: usize,
  bounds: DAabb3,
  probability: f64,
}

impl Default for Bucket {
  fn default() -> Self {
    Self {
      count: 0,
      bounds: DAabb3::EMPTY,
      probability: 0.0,
    }
  }
}

/// Best plane found on one axis.
#[derive(Clone, Copy, Debug)]
struct AxisCandidate {
  axis: usize,
  bucket: usize,
  cost: f64,
}

/// How a side's facet population is weighted in the cost.
#[derive(Clone, Copy, Debug)]
enum SideWeight {
  Count,
  Blended(f64),
}

/// Plain bucketed SAH.
pub fn sah(prims: &mut [PrimInfo], ctx: &SplitContext<'_>) -> Option<Split> {
  sweep(prims, ctx, SideWeight::Count)
}

/// SAH with probability-blended side weights.
pub fn molflow_split(prims: &mut [PrimInfo], ctx: &SplitContext<'_>) -> Option<Split> {
  sweep(prims, ctx, SideWeight::Blended(ctx.config.probability_weight))
}

fn sweep(prims: &mut [PrimInfo], ctx: &SplitContext<'_>, weight: SideWeight) -> Option<Split> {
  let n = prims.len();
  if n < 2 {
    return None;
  }
  let node_area = ctx.bounds.surface_area();
  if !(node_area > 0.0) {
    return None;
  }

  let buckets = ctx.config.sah.bucket_count.clamp(2, MAX_SAH_BUCKETS);
  let extent = ctx.centroid_bounds.size();
  let axes: Vec<usize> = (0..3).filter(|&a| extent[a] > 0.0).collect();
  if axes.is_empty() {
    return None;
  }

  let view: &[PrimInfo] = prims;
  let eval = |axis: usize| evaluate_axis(view, ctx, axis, buckets, node_area, weight);
  let candidates: Vec<Option<AxisCandidate>> = if n >= PARALLEL_SAH_THRESHOLD {
    axes.par_iter().map(|&a| eval(a)).collect()
  } else {
    axes.iter().map(|&a| eval(a)).collect()
  };

  // Lowest cost wins; ties keep the lower axis.
  let best = candidates
    .into_iter()
    .flatten()
    .fold(None::<AxisCandidate>, |acc, c| match acc {
      Some(b) if b.cost <= c.cost => Some(b),
      _ => Some(c),
    })?;

  let leaf_cost = n as f64 * ctx.config.sah.intersection_cost;
  if best.cost >= leaf_cost {
    return None;
  }

  let axis = best.axis;
  let min = ctx.centroid_bounds.min[axis];
  let width = extent[axis];
  let mid = partition_in_place(prims, |p| {
    bucket_index(p.centroid[axis], min, width, buckets) <= best.bucket
  });
  if mid == 0 || mid == n {
    return None;
  }
  Some(Split {
    axis,
    position: min + width * (best.bucket + 1) as f64 / buckets as f64,
    mid,
  })
}

#[inline]
fn bucket_index(c: f64, min: f64, width: f64, buckets: usize) -> usize {
  let b = (buckets as f64 * ((c - min) / width)) as usize;
  b.min(buckets - 1)
}

fn evaluate_axis(
  prims: &[PrimInfo],
  ctx: &SplitContext<'_>,
  axis: usize,
  buckets: usize,
  node_area: f64,
  weight: SideWeight,
) -> Option<AxisCandidate> {
  let mut table = [Bucket::default(); MAX_SAH_BUCKETS];
  let min = ctx.centroid_bounds.min[axis];
  let width = ctx.centroid_bounds.size()[axis];
  let mut total_probability = 0.0;
  for p in prims {
    let b = &mut table[bucket_index(p.centroid[axis], min, width, buckets)];
    b.count += 1;
    b.bounds = b.bounds.union(&p.aabb);
    b.probability += p.probability;
    total_probability += p.probability;
  }
  let table = &table[..buckets];
  let n = prims.len() as f64;

  let side_weight = |count: usize, probability: f64| -> f64 {
    match weight {
      SideWeight::Count => count as f64,
      SideWeight::Blended(alpha) if total_probability > 0.0 => {
        (1.0 - alpha) * count as f64 + alpha * n * probability / total_probability
      }
      SideWeight::Blended(_) => count as f64,
    }
  };

  // Suffix sweep so each plane is O(1).
  let mut right = vec![Bucket::default(); buckets];
  let mut acc = Bucket::default();
  for i in (0..buckets).rev() {
    acc.count += table[i].count;
    acc.bounds = acc.bounds.union(&table[i].bounds);
    acc.probability += table[i].probability;
    right[i] = acc;
  }

  let sah = &ctx.config.sah;
  let mut left = Bucket::default();
  let mut best: Option<AxisCandidate> = None;
  for i in 0..buckets - 1 {
    left.count += table[i].count;
    left.bounds = left.bounds.union(&table[i].bounds);
    left.probability += table[i].probability;
    let r = &right[i + 1];
    if left.count == 0 || r.count == 0 {
      continue;
    }
    let weighted = left.bounds.surface_area() * side_weight(left.count, left.probability)
      + r.bounds.surface_area() * side_weight(r.count, r.probability);
    let cost = sah.traversal_cost + sah.intersection_cost * weighted / node_area;
    if best.map_or(true, |b| cost < b.cost) {
      best = Some(AxisCandidate {
        axis,
        bucket: i,
        cost,
      });
    }
  }
  best
}

#[cfg(test)]
#[path = "sah_test.rs"]
mod sah_test;
