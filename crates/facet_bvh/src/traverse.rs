//! BvhTraverser - nearest-hit ray queries.
//!
//! Explicit-stack descent with near-child-first ordering. Every popped node
//! gets a slab test against the best hit so far; leaves test each facet's
//! exact polygon.
//!
//! ```text
//!   ray ──► root ──► pop ──► slab test ──┬─ miss ─► next
//!                     ▲                  ├─ leaf ─► polygon tests
//!                     │                  └─ internal ─► push far, push near
//!                     └───────────────────────────────────────┘
//! ```
//!
//! The closest hit wins with ties going to the lower facet index, so the
//! result never depends on the split heuristic that shaped the tree.

use rayon::prelude::*;
use smallvec::{smallvec, SmallVec};

use crate::constants::{NODE_CULL_SLACK, TRAVERSAL_STACK_INLINE};
use crate::error::{BvhError, BvhResult};
use crate::stats::{NoStats, SharedSink, StatsAccumulator, StatsSink};
use crate::tree::{Bvh, BvhState, NodeKind};
use crate::types::{Hit, PreparedRay, Ray, TraversalCost};

/// Stateless query entry point.
pub struct BvhTraverser;

impl BvhTraverser {
  /// Nearest facet hit by `ray`, recording into the tree's shared counters.
  ///
  /// Fails with `InvalidState` unless the tree is Ready and with
  /// `InvalidQuery` for a non-finite origin or a degenerate direction.
  pub fn intersect(bvh: &Bvh, ray: &Ray) -> BvhResult<Option<Hit>> {
    Self::intersect_counted(bvh, ray).map(|(hit, _)| hit)
  }

  /// Like [`BvhTraverser::intersect`], recording into a thread-local
  /// accumulator flushed later with [`Bvh::flush`].
  pub fn intersect_with(bvh: &Bvh, ray: &Ray, acc: &mut StatsAccumulator) -> BvhResult<Option<Hit>> {
    let ray = prepare(bvh, ray)?;
    if bvh.stats().is_enabled() {
      Ok(traverse(bvh, &ray, acc).0)
    } else {
      Ok(traverse(bvh, &ray, &mut NoStats).0)
    }
  }

  /// Nearest hit plus the work the query performed.
  pub fn intersect_counted(bvh: &Bvh, ray: &Ray) -> BvhResult<(Option<Hit>, TraversalCost)> {
    let ray = prepare(bvh, ray)?;
    if bvh.stats().is_enabled() {
      Ok(traverse(bvh, &ray, &mut SharedSink(bvh.stats())))
    } else {
      Ok(traverse(bvh, &ray, &mut NoStats))
    }
  }

  /// Many queries on the rayon pool; results keep the input order.
  ///
  /// Fails as a whole on the first invalid ray.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "bvh::intersect_batch"))]
  pub fn intersect_batch(bvh: &Bvh, rays: &[Ray]) -> BvhResult<Vec<Option<Hit>>> {
    ensure_ready(bvh)?;
    rays.par_iter().map(|ray| Self::intersect(bvh, ray)).collect()
  }
}

#[inline]
fn ensure_ready(bvh: &Bvh) -> BvhResult<()> {
  match bvh.state() {
    BvhState::Ready => Ok(()),
    found => Err(BvhError::InvalidState {
      expected: BvhState::Ready,
      found,
    }),
  }
}

#[inline]
fn prepare(bvh: &Bvh, ray: &Ray) -> BvhResult<PreparedRay> {
  ensure_ready(bvh)?;
  ray.prepare()
}

pub(crate) fn traverse<S: StatsSink>(
  bvh: &Bvh,
  ray: &PreparedRay,
  sink: &mut S,
) -> (Option<Hit>, TraversalCost) {
  let mut cost = TraversalCost::default();
  let nodes = bvh.nodes();
  if nodes.is_empty() {
    return (None, cost);
  }
  let facets = bvh.facets();

  // (distance, facet index)
  let mut best: Option<(f64, u32)> = None;
  let mut stack: SmallVec<[u32; TRAVERSAL_STACK_INLINE]> = smallvec![0];

  while let Some(index) = stack.pop() {
    let Some(node) = nodes.get(index as usize) else {
      continue;
    };
    let cull = best.map_or(f64::INFINITY, |(t, _)| t + NODE_CULL_SLACK * t.max(1.0));
    let entered = node.aabb.ray_entry(ray.origin, ray.inv_dir, cull).is_some();
    cost.node_tests += 1;
    sink.node_tested(index, entered);
    if !entered {
      continue;
    }

    match node.kind {
      NodeKind::Leaf { .. } => {
        for &f in bvh.leaf_facets(node) {
          let steps_before = cost.total_steps();
          cost.facet_tests += 1;
          let crossing = facets
            .get(f as usize)
            .and_then(|facet| facet.intersect(ray.origin, ray.dir, f64::INFINITY));
          sink.facet_tested(f, steps_before, crossing.is_some());
          if let Some(t) = crossing {
            let closer = best.map_or(true, |(bt, bf)| t < bt || (t == bt && f < bf));
            if closer {
              best = Some((t, f));
            }
          }
        }
      }
      NodeKind::Internal {
        second_child, axis, ..
      } => {
        let first_child = index + 1;
        if ray.dir_is_neg[axis as usize] {
          stack.push(first_child);
          stack.push(second_child);
        } else {
          stack.push(second_child);
          stack.push(first_child);
        }
      }
    }
  }

  let hit = best.and_then(|(t, f)| {
    let facet = facets.get(f as usize)?;
    sink.nearest_hit(f);
    Some(Hit {
      facet_index: f as usize,
      facet_id: facet.id,
      distance: t,
      point: ray.at(t),
    })
  });
  (hit, cost)
}

#[cfg(test)]
#[path = "traverse_test.rs"]
mod traverse_test;
