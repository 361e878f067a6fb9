//! Middle split: midpoint of the centroid bounds.

use super::{partition_in_place, PrimInfo, Split, SplitContext};

/// Partition at the midpoint of the centroid bounds along `ctx.axis`.
///
/// The plane comes from `ctx.centroid_bounds`, not the subset's full AABB
/// in `ctx.bounds`: one long facet can stretch the AABB until its midpoint
/// lies past every centroid.
///
/// O(n). Clustered data can produce very unbalanced children. Returns `None`
/// when the extent is zero or every centroid lands on one side.
pub fn middle(prims: &mut [PrimInfo], ctx: &SplitContext<'_>) -> Option<Split> {
  let axis = ctx.axis;
  if !(ctx.axis_extent() > 0.0) {
    return None;
  }
  let position = 0.5 * (ctx.centroid_bounds.min[axis] + ctx.centroid_bounds.max[axis]);
  let mid = partition_in_place(prims, |p| p.centroid[axis] < position);
  if mid == 0 || mid == prims.len() {
    return None;
  }
  Some(Split {
    axis,
    position,
    mid,
  })
}
