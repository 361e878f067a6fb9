//! Flattened BVH storage.
//!
//! Nodes are stored depth-first: the first child of an internal node sits
//! directly after its parent, the second child at `second_child`.
//!
//! ```text
//!          0
//!        /   \            index: 0  1  2  3  4
//!       1     4           node:  I  I  L  L  L
//!      / \                       └─second_child = 4
//!     2   3
//! ```

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::bounds::DAabb3;
use crate::build::BuildStats;
use crate::config::BuildConfig;
use crate::facet::Facet;
use crate::stats::{BvhStats, StatsAccumulator, StatsSnapshot};

// =============================================================================
// BvhId - unique identifier
// =============================================================================

static BVH_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identity of one built tree. A rebuild always yields a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BvhId(u64);

impl BvhId {
  pub(crate) fn next() -> Self {
    Self(BVH_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Lifecycle of a tree or registry entry.
///
/// `Unbuilt → Building → Ready → Stale → Building → Ready …`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BvhState {
  Unbuilt,
  Building,
  Ready,
  Stale,
}

impl BvhState {
  fn to_u8(self) -> u8 {
    match self {
      BvhState::Unbuilt => 0,
      BvhState::Building => 1,
      BvhState::Ready => 2,
      BvhState::Stale => 3,
    }
  }

  fn from_u8(v: u8) -> Self {
    match v {
      0 => BvhState::Unbuilt,
      1 => BvhState::Building,
      2 => BvhState::Ready,
      _ => BvhState::Stale,
    }
  }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
  /// `count` facets starting at `first` in the ordered facet array.
  Leaf { first: u32, count: u32 },
  /// First child at `self + 1`, second at `second_child`.
  Internal {
    second_child: u32,
    axis: u8,
    position: f64,
  },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvhNode {
  pub aabb: DAabb3,
  pub kind: NodeKind,
  /// Depth; the root is level 0.
  pub level: u32,
  /// Facets beneath this node.
  pub nb_prim: u32,
}

impl BvhNode {
  #[inline]
  pub fn is_leaf(&self) -> bool {
    matches!(self.kind, NodeKind::Leaf { .. })
  }

  /// Child indices of an internal node.
  #[inline]
  pub fn children(&self, index: u32) -> Option<(u32, u32)> {
    match self.kind {
      NodeKind::Internal { second_child, .. } => Some((index + 1, second_child)),
      NodeKind::Leaf { .. } => None,
    }
  }
}

// =============================================================================
// Bvh
// =============================================================================

/// Immutable tree topology plus live statistics counters.
///
/// Shared between query threads as `Arc<Bvh>`; only the counters and the
/// Ready/Stale flag change after construction.
#[derive(Debug)]
pub struct Bvh {
  id: BvhId,
  nodes: Vec<BvhNode>,
  facet_order: Vec<u32>,
  facets: Arc<[Facet]>,
  facet_levels: Vec<Option<u32>>,
  excluded: Vec<u32>,
  config: BuildConfig,
  build_stats: BuildStats,
  state: AtomicU8,
  stats: BvhStats,
}

impl Bvh {
  pub(crate) fn from_parts(
    nodes: Vec<BvhNode>,
    facet_order: Vec<u32>,
    facets: Arc<[Facet]>,
    facet_levels: Vec<Option<u32>>,
    excluded: Vec<u32>,
    config: BuildConfig,
    build_stats: BuildStats,
  ) -> Self {
    let stats = BvhStats::new(nodes.len(), facets.len());
    Self {
      id: BvhId::next(),
      nodes,
      facet_order,
      facets,
      facet_levels,
      excluded,
      config,
      build_stats,
      state: AtomicU8::new(BvhState::Ready.to_u8()),
      stats,
    }
  }

  pub fn id(&self) -> BvhId {
    self.id
  }

  /// Ready or Stale.
  #[inline]
  pub fn state(&self) -> BvhState {
    BvhState::from_u8(self.state.load(Ordering::Acquire))
  }

  /// Geometry changed under this tree; queries now fail with `InvalidState`.
  pub fn mark_stale(&self) {
    self.state.store(BvhState::Stale.to_u8(), Ordering::Release);
  }

  /// A tree with no nodes, built from empty or fully degenerate input.
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn nodes(&self) -> &[BvhNode] {
    &self.nodes
  }

  pub fn node(&self, index: u32) -> Option<&BvhNode> {
    self.nodes.get(index as usize)
  }

  /// Root bounds, empty for an empty tree.
  pub fn bounds(&self) -> DAabb3 {
    self.nodes.first().map_or(DAabb3::EMPTY, |n| n.aabb)
  }

  /// Facet indices grouped by leaf.
  pub fn facet_order(&self) -> &[u32] {
    &self.facet_order
  }

  /// Facet indices held by a leaf node; empty for internal nodes.
  pub fn leaf_facets(&self, node: &BvhNode) -> &[u32] {
    match node.kind {
      NodeKind::Leaf { first, count } => {
        let start = first as usize;
        self
          .facet_order
          .get(start..start + count as usize)
          .unwrap_or(&[])
      }
      NodeKind::Internal { .. } => &[],
    }
  }

  /// The facet slice the tree was built from (degenerate facets included).
  pub fn facets(&self) -> &[Facet] {
    &self.facets
  }

  /// Leaf depth per facet; `None` for excluded facets.
  pub fn facet_levels(&self) -> &[Option<u32>] {
    &self.facet_levels
  }

  /// Indices of degenerate facets left out of the tree.
  pub fn excluded(&self) -> &[u32] {
    &self.excluded
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  pub fn build_stats(&self) -> &BuildStats {
    &self.build_stats
  }

  pub fn stats(&self) -> &BvhStats {
    &self.stats
  }

  /// Owned copy of the counters.
  pub fn snapshot(&self) -> StatsSnapshot {
    self.stats.snapshot(&self.facet_levels)
  }

  /// Fold a thread-local accumulator into this tree's counters.
  pub fn flush(&self, acc: &mut StatsAccumulator) {
    self.stats.merge(acc);
  }

  pub fn clear_stats(&self) {
    self.stats.clear();
  }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
