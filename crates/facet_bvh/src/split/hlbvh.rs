//! Hierarchical linear BVH.
//!
//! ```text
//!   centroids ──► 30-bit Morton codes ──► sort (code, index)
//!                                              │
//!          ┌──────── treelets: runs sharing the top 12 bits ────────┐
//!          ▼                  ▼                   ▼                 (parallel)
//!     bit splits         bit splits          bit splits
//!          └──────────────────┴─────────┬─────────┘
//!                                       ▼
//!                        SAH merge over treelet roots
//! ```
//!
//! Morton interleave is `z2 y2 x2 z1 y1 x1 …`: bit `b` splits axis `b % 3`.

use glam::DVec3;
use rayon::prelude::*;

use super::{equal_counts, sah, PrimInfo, SplitContext};
use crate::build::{BuildNode, CancelToken, Recursive};
use crate::config::BuildConfig;
use crate::constants::{MAX_BUILD_DEPTH, MORTON_SCALE, TREELET_FIRST_BIT, TREELET_MASK};
use crate::error::BvhResult;

/// Spread the low 10 bits of `x` so two zero bits follow each one.
#[inline]
pub fn left_shift3(mut x: u32) -> u32 {
  if x == 1 << 10 {
    x -= 1;
  }
  x = (x | (x << 16)) & 0b00000011000000000000000011111111;
  x = (x | (x << 8)) & 0b00000011000000001111000000001111;
  x = (x | (x << 4)) & 0b00000011000011000011000011000011;
  x = (x | (x << 2)) & 0b00001001001001001001001001001001;
  x
}

/// Morton code of a point in `[0, 1024]^3`.
#[inline]
pub fn morton_encode3(v: DVec3) -> u32 {
  let q = |c: f64| c.clamp(0.0, MORTON_SCALE) as u32;
  (left_shift3(q(v.z)) << 2) | (left_shift3(q(v.y)) << 1) | left_shift3(q(v.x))
}

/// Build the whole tree.
pub(crate) fn build(
  prims: &mut [PrimInfo],
  config: &BuildConfig,
  cancel: &CancelToken,
) -> BvhResult<BuildNode> {
  let ctx = SplitContext::for_prims(prims, config);
  let centroid_bounds = ctx.centroid_bounds;

  let mut keyed: Vec<(u32, PrimInfo)> = prims
    .par_iter()
    .map(|p| {
      let code = morton_encode3(centroid_bounds.offset(p.centroid) * MORTON_SCALE);
      (code, *p)
    })
    .collect();
  keyed.par_sort_unstable_by_key(|(code, p)| (*code, p.index));
  cancel.check()?;

  let codes: Vec<u32> = keyed.iter().map(|(c, _)| *c).collect();
  for (slot, (_, p)) in prims.iter_mut().zip(keyed) {
    *slot = p;
  }

  // Split the sorted array into treelet slices.
  let mut treelets: Vec<(&[u32], &mut [PrimInfo])> = Vec::new();
  let mut rest_codes: &[u32] = &codes;
  let mut rest_prims: &mut [PrimInfo] = prims;
  while !rest_codes.is_empty() {
    let key = rest_codes[0] & TREELET_MASK;
    let len = rest_codes
      .iter()
      .position(|c| c & TREELET_MASK != key)
      .unwrap_or(rest_codes.len());
    let (c, cr) = rest_codes.split_at(len);
    let (p, pr) = std::mem::take(&mut rest_prims).split_at_mut(len);
    treelets.push((c, p));
    rest_codes = cr;
    rest_prims = pr;
  }

  let finish = Recursive::new(config, equal_counts, cancel);
  let emitter = Emitter {
    config,
    cancel,
    finish: &finish,
  };
  let roots: Vec<BuildNode> = treelets
    .into_par_iter()
    .map(|(codes, prims)| emitter.emit(codes, prims, TREELET_FIRST_BIT, 0))
    .collect::<BvhResult<_>>()?;

  cancel.check()?;
  Ok(merge_treelets(roots, config))
}

struct Emitter<'a> {
  config: &'a BuildConfig,
  cancel: &'a CancelToken,
  finish: &'a Recursive<'a>,
}

impl Emitter<'_> {
  /// Bottom-up treelet construction from Morton bit splits.
  fn emit(&self, codes: &[u32], prims: &mut [PrimInfo], bit: i32, depth: u32) -> BvhResult<BuildNode> {
    self.cancel.check()?;
    let n = prims.len();
    if n <= self.config.max_prims_in_node {
      let ctx = SplitContext::for_prims(prims, self.config);
      return Ok(BuildNode::leaf(ctx.bounds, prims));
    }
    if bit < 0 || depth >= MAX_BUILD_DEPTH {
      // Identical codes, or too deep: finish with median splits.
      return self.finish.build(prims, depth);
    }

    let mask = 1u32 << bit;
    if codes[0] & mask == codes[n - 1] & mask {
      return self.emit(codes, prims, bit - 1, depth);
    }
    let mid = codes.partition_point(|c| c & mask == 0);
    let axis = bit as usize % 3;
    let position = 0.5 * (prims[mid - 1].centroid[axis] + prims[mid].centroid[axis]);

    let (lc, rc) = codes.split_at(mid);
    let (lp, rp) = prims.split_at_mut(mid);
    let left = self.emit(lc, lp, bit - 1, depth + 1)?;
    let right = self.emit(rc, rp, bit - 1, depth + 1)?;
    Ok(BuildNode::internal(axis, position, left, right))
  }
}

/// Top-down SAH over treelet roots; falls back to EqualCounts when SAH
/// finds nothing better than keeping the set together.
fn merge_treelets(roots: Vec<BuildNode>, config: &BuildConfig) -> BuildNode {
  if roots.len() <= 1 {
    return roots
      .into_iter()
      .next()
      .unwrap_or(BuildNode::Leaf {
        bounds: crate::bounds::DAabb3::EMPTY,
        facets: Vec::new(),
      });
  }

  let mut items: Vec<PrimInfo> = roots
    .iter()
    .enumerate()
    .map(|(i, r)| PrimInfo {
      index: i as u32,
      aabb: r.bounds(),
      centroid: r.bounds().center(),
      probability: 0.0,
    })
    .collect();
  let n = items.len();
  let ctx = SplitContext::for_prims(&items, config);
  let split = sah(&mut items, &ctx)
    .filter(|s| s.mid > 0 && s.mid < n)
    .or_else(|| equal_counts(&mut items, &ctx));

  let mut goes_left = vec![false; n];
  let (axis, position) = match split {
    Some(split) => {
      for it in &items[..split.mid] {
        goes_left[it.index as usize] = true;
      }
      (split.axis, split.position)
    }
    None => {
      goes_left[..n / 2].fill(true);
      (ctx.axis, ctx.centroid_bounds.center()[ctx.axis])
    }
  };
  let (mut left, mut right) = (Vec::new(), Vec::new());
  for (i, root) in roots.into_iter().enumerate() {
    if goes_left[i] {
      left.push(root);
    } else {
      right.push(root);
    }
  }
  BuildNode::internal(
    axis,
    position,
    merge_treelets(left, config),
    merge_treelets(right, config),
  )
}

#[cfg(test)]
#[path = "hlbvh_test.rs"]
mod hlbvh_test;
