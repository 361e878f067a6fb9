//! BvhBuilder - facet set + config → flattened [`Bvh`].
//!
//! Construction runs in three phases:
//!
//! ```text
//!   facets ──► PrimInfo[] ──► BuildNode tree ──► flatten ──► Bvh
//!          (drop degenerate)  (split table or    (depth-first,
//!                              HLBVH, rayon)      levels, nb_prim)
//! ```
//!
//! The pointer tree is built first so parallel subtrees never contend for a
//! shared node array; flattening afterwards is sequential and deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use web_time::Instant;

use crate::bounds::DAabb3;
use crate::config::{BuildConfig, SplitMethod};
use crate::constants::{MAX_BUILD_DEPTH, PARALLEL_BUILD_THRESHOLD};
use crate::error::{BvhError, BvhResult};
use crate::facet::Facet;
use crate::split::{equal_counts, hlbvh, partition_fn, PartitionFn, PrimInfo, SplitContext};
use crate::tree::{Bvh, BvhNode, NodeKind};

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag shared between a build and its owner.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn check(&self) -> BvhResult<()> {
    if self.is_cancelled() {
      Err(BvhError::PartialBuildAborted)
    } else {
      Ok(())
    }
  }
}

// =============================================================================
// Build statistics
// =============================================================================

/// Shape and timing of one build.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildStats {
  pub node_count: usize,
  pub leaf_count: usize,
  pub internal_count: usize,
  /// Deepest node level (root = 0).
  pub max_depth: u32,
  /// Mean facets per leaf.
  pub avg_leaf_size: f64,
  /// Degenerate facets left out of the tree.
  pub excluded_facets: usize,
  /// Wall time in microseconds.
  pub build_us: u64,
}

impl BuildStats {
  fn from_nodes(nodes: &[BvhNode], excluded_facets: usize) -> Self {
    let leaf_count = nodes.iter().filter(|n| n.is_leaf()).count();
    let leaf_facets: u64 = nodes
      .iter()
      .filter(|n| n.is_leaf())
      .map(|n| n.nb_prim as u64)
      .sum();
    Self {
      node_count: nodes.len(),
      leaf_count,
      internal_count: nodes.len() - leaf_count,
      max_depth: nodes.iter().map(|n| n.level).max().unwrap_or(0),
      avg_leaf_size: if leaf_count == 0 {
        0.0
      } else {
        leaf_facets as f64 / leaf_count as f64
      },
      excluded_facets,
      build_us: 0,
    }
  }
}

// =============================================================================
// Pointer tree
// =============================================================================

/// Intermediate tree produced by the heuristics, before flattening.
#[derive(Debug)]
pub(crate) enum BuildNode {
  Leaf {
    bounds: DAabb3,
    facets: Vec<u32>,
  },
  Internal {
    bounds: DAabb3,
    axis: usize,
    position: f64,
    children: Box<[BuildNode; 2]>,
  },
}

impl BuildNode {
  pub(crate) fn leaf(bounds: DAabb3, prims: &[PrimInfo]) -> Self {
    BuildNode::Leaf {
      bounds,
      facets: prims.iter().map(|p| p.index).collect(),
    }
  }

  pub(crate) fn internal(axis: usize, position: f64, left: BuildNode, right: BuildNode) -> Self {
    BuildNode::Internal {
      bounds: left.bounds().union(&right.bounds()),
      axis,
      position,
      children: Box::new([left, right]),
    }
  }

  pub(crate) fn bounds(&self) -> DAabb3 {
    match self {
      BuildNode::Leaf { bounds, .. } | BuildNode::Internal { bounds, .. } => *bounds,
    }
  }
}

/// Top-down recursive construction through the heuristic table.
pub(crate) struct Recursive<'a> {
  config: &'a BuildConfig,
  partition: PartitionFn,
  cancel: &'a CancelToken,
}

impl<'a> Recursive<'a> {
  pub(crate) fn new(config: &'a BuildConfig, partition: PartitionFn, cancel: &'a CancelToken) -> Self {
    Self {
      config,
      partition,
      cancel,
    }
  }

  pub(crate) fn build(&self, prims: &mut [PrimInfo], depth: u32) -> BvhResult<BuildNode> {
    self.cancel.check()?;
    let n = prims.len();
    let ctx = SplitContext::for_prims(prims, self.config);
    if n <= self.config.max_prims_in_node {
      return Ok(BuildNode::leaf(ctx.bounds, prims));
    }
    // Past the depth limit only median splits are taken.
    let partition = if depth >= MAX_BUILD_DEPTH {
      if depth == MAX_BUILD_DEPTH {
        tracing::debug!(facets = n, depth, "depth limit reached, finishing with EqualCounts");
      }
      equal_counts as PartitionFn
    } else {
      self.partition
    };

    // Coincident centroids on the widest axis go straight to EqualCounts.
    let split = if ctx.axis_extent() > 0.0 {
      partition(prims, &ctx).filter(|s| s.mid > 0 && s.mid < n)
    } else {
      None
    };
    let Some(split) = split.or_else(|| equal_counts(prims, &ctx)) else {
      return Ok(BuildNode::leaf(ctx.bounds, prims));
    };

    let (left, right) = prims.split_at_mut(split.mid);
    let (l, r) = if n >= PARALLEL_BUILD_THRESHOLD {
      rayon::join(|| self.build(left, depth + 1), || self.build(right, depth + 1))
    } else {
      (self.build(left, depth + 1), self.build(right, depth + 1))
    };
    Ok(BuildNode::internal(split.axis, split.position, l?, r?))
  }
}

// =============================================================================
// Flattening
// =============================================================================

struct Flattener {
  nodes: Vec<BvhNode>,
  order: Vec<u32>,
  levels: Vec<Option<u32>>,
}

impl Flattener {
  /// Returns the number of facets under `node`.
  fn push(&mut self, node: BuildNode, level: u32) -> u32 {
    match node {
      BuildNode::Leaf { bounds, facets } => {
        let first = self.order.len() as u32;
        let count = facets.len() as u32;
        for f in facets {
          if let Some(slot) = self.levels.get_mut(f as usize) {
            *slot = Some(level);
          }
          self.order.push(f);
        }
        self.nodes.push(BvhNode {
          aabb: bounds,
          kind: NodeKind::Leaf { first, count },
          level,
          nb_prim: count,
        });
        count
      }
      BuildNode::Internal {
        bounds,
        axis,
        position,
        children,
      } => {
        let index = self.nodes.len();
        self.nodes.push(BvhNode {
          aabb: bounds,
          kind: NodeKind::Internal {
            second_child: 0,
            axis: axis as u8,
            position,
          },
          level,
          nb_prim: 0,
        });
        let [left, right] = *children;
        let nb_left = self.push(left, level + 1);
        let second_child = self.nodes.len() as u32;
        let nb_right = self.push(right, level + 1);
        let node = &mut self.nodes[index];
        node.kind = NodeKind::Internal {
          second_child,
          axis: axis as u8,
          position,
        };
        node.nb_prim = nb_left + nb_right;
        node.nb_prim
      }
    }
  }
}

// =============================================================================
// BvhBuilder
// =============================================================================

/// Stateless entry point for tree construction.
pub struct BvhBuilder;

impl BvhBuilder {
  /// Build with uniform hit probabilities and no cancellation.
  pub fn build(facets: &[Facet], config: &BuildConfig) -> BvhResult<Bvh> {
    Self::build_shared(Arc::from(facets), config, None, None)
  }

  /// Build with optional prior hit probabilities (one weight per facet) and
  /// an optional cancellation token.
  pub fn build_with(
    facets: &[Facet],
    config: &BuildConfig,
    hit_probabilities: Option<&[f64]>,
    cancel: Option<&CancelToken>,
  ) -> BvhResult<Bvh> {
    Self::build_shared(Arc::from(facets), config, hit_probabilities, cancel)
  }

  /// Like [`BvhBuilder::build_with`] over an already shared facet array, so
  /// several trees can reference one copy of the geometry.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "bvh::build"))]
  pub fn build_shared(
    facets: Arc<[Facet]>,
    config: &BuildConfig,
    hit_probabilities: Option<&[f64]>,
    cancel: Option<&CancelToken>,
  ) -> BvhResult<Bvh> {
    config.validate()?;
    let start = Instant::now();
    let never = CancelToken::default();
    let cancel = cancel.unwrap_or(&never);

    let probabilities = normalized_probabilities(&facets, hit_probabilities);
    let (mut prims, excluded) = collect_prims(&facets, &probabilities);

    let root = if prims.is_empty() {
      None
    } else {
      #[cfg(feature = "profiling")]
      let _span = tracing::info_span!("bvh::build_nodes").entered();

      Some(match config.split_method {
        SplitMethod::Hlbvh => hlbvh::build(&mut prims, config, cancel)?,
        method => Recursive::new(config, partition_fn(method), cancel).build(&mut prims, 0)?,
      })
    };
    cancel.check()?;

    let mut flat = Flattener {
      nodes: Vec::with_capacity(2 * prims.len()),
      order: Vec::with_capacity(prims.len()),
      levels: vec![None; facets.len()],
    };
    if let Some(root) = root {
      #[cfg(feature = "profiling")]
      let _span = tracing::info_span!("bvh::flatten").entered();
      flat.push(root, 0);
    }

    let mut build_stats = BuildStats::from_nodes(&flat.nodes, excluded.len());
    build_stats.build_us = start.elapsed().as_micros() as u64;

    tracing::debug!(
      method = %config.split_method,
      facets = flat.order.len(),
      excluded = excluded.len(),
      nodes = build_stats.node_count,
      leaves = build_stats.leaf_count,
      max_depth = build_stats.max_depth,
      build_us = build_stats.build_us,
      "bvh build complete"
    );

    Ok(Bvh::from_parts(
      flat.nodes,
      flat.order,
      facets,
      flat.levels,
      excluded,
      *config,
      build_stats,
    ))
  }
}

/// Per-facet builder input; degenerate facets are logged and excluded.
fn collect_prims(facets: &[Facet], probabilities: &[f64]) -> (Vec<PrimInfo>, Vec<u32>) {
  let mut prims = Vec::with_capacity(facets.len());
  let mut excluded = Vec::new();
  for (i, facet) in facets.iter().enumerate() {
    if let Some(reason) = facet.degeneracy() {
      tracing::warn!(facet_id = facet.id, index = i, ?reason, "excluding degenerate facet");
      excluded.push(i as u32);
      continue;
    }
    prims.push(PrimInfo {
      index: i as u32,
      aabb: facet.aabb(),
      centroid: facet.centroid(),
      probability: probabilities.get(i).copied().unwrap_or(0.0),
    });
  }
  (prims, excluded)
}

/// Normalize caller weights over the non-degenerate facets, falling back to
/// uniform when none are given, the length is wrong or the total is zero.
pub(crate) fn normalized_probabilities(facets: &[Facet], supplied: Option<&[f64]>) -> Vec<f64> {
  let valid = facets.iter().filter(|f| !f.is_degenerate()).count().max(1);
  let uniform = || -> Vec<f64> {
    facets
      .iter()
      .map(|f| if f.is_degenerate() { 0.0 } else { 1.0 / valid as f64 })
      .collect()
  };
  let sanitize = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };

  let Some(weights) = supplied else {
    return uniform();
  };
  if weights.len() != facets.len() {
    tracing::warn!(
      expected = facets.len(),
      got = weights.len(),
      "hit probability count mismatch, using uniform"
    );
    return uniform();
  }
  let total: f64 = weights
    .iter()
    .zip(facets)
    .filter(|(_, f)| !f.is_degenerate())
    .map(|(w, _)| sanitize(*w))
    .sum();
  if !(total > 0.0) || !total.is_finite() {
    tracing::warn!(total, "hit probabilities sum to zero, using uniform");
    return uniform();
  }
  weights
    .iter()
    .zip(facets)
    .map(|(w, f)| if f.is_degenerate() { 0.0 } else { sanitize(*w) / total })
    .collect()
}

#[cfg(test)]
#[path = "build_test.rs"]
mod build_test;
