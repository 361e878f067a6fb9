//! ProbSplit: balance prior hit probability between the two children.

use super::{cmp_centroid, PrimInfo, Split, SplitContext};

/// Sort along `ctx.axis` and cut where the cumulative probability is
/// closest to half the subset total.
///
/// Ties prefer the smaller left side, so uniform probabilities cut at
/// `⌊n/2⌋` exactly like [`super::equal_counts`]. A subset with zero total
/// probability is treated as uniform.
pub fn prob_split(prims: &mut [PrimInfo], ctx: &SplitContext<'_>) -> Option<Split> {
  let n = prims.len();
  if n < 2 {
    return None;
  }
  let axis = ctx.axis;
  prims.sort_unstable_by(|a, b| cmp_centroid(a, b, axis));

  let total: f64 = prims.iter().map(|p| p.probability).sum();
  let uniform = !(total > 0.0);
  let weight = |p: &PrimInfo| if uniform { 1.0 } else { p.probability };
  let total = if uniform { n as f64 } else { total };
  let half = 0.5 * total;
  let tolerance = total * 1e-12;

  let mut cumulative = 0.0;
  let mut best_mid = n / 2;
  let mut best_diff = f64::INFINITY;
  for k in 1..n {
    cumulative += weight(&prims[k - 1]);
    let diff = (cumulative - half).abs();
    if diff < best_diff - tolerance {
      best_diff = diff;
      best_mid = k;
    }
  }

  Some(Split {
    axis,
    position: 0.5 * (prims[best_mid - 1].centroid[axis] + prims[best_mid].centroid[axis]),
    mid: best_mid,
  })
}

#[cfg(test)]
#[path = "probability_test.rs"]
mod probability_test;
