//! EqualCounts split: median centroid along the axis.

use super::{cmp_centroid, PrimInfo, Split, SplitContext};

/// Partition at the median centroid; the left child gets `⌊n/2⌋` facets.
///
/// Works on zero-extent axes too (ties resolve by facet index), which makes
/// it the universal fallback.
pub fn equal_counts(prims: &mut [PrimInfo], ctx: &SplitContext<'_>) -> Option<Split> {
  let n = prims.len();
  if n < 2 {
    return None;
  }
  let axis = ctx.axis;
  let mid = n / 2;
  prims.select_nth_unstable_by(mid, |a, b| cmp_centroid(a, b, axis));
  Some(Split {
    axis,
    position: prims[mid].centroid[axis],
    mid,
  })
}
