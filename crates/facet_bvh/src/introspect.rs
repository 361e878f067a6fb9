//! Read-only views of a tree for visualization tooling.
//!
//! Views are built from a [`StatsSnapshot`], never from the live counters,
//! and filtering never touches the tree itself.

use crate::bounds::DAabb3;
use crate::stats::{FacetStats, NodeStats, StatsSnapshot};
use crate::tree::Bvh;

/// Per-level palette used when coloring by depth.
const LEVEL_PALETTE: [[f32; 3]; 8] = [
  [0.90, 0.10, 0.29],
  [0.24, 0.71, 0.29],
  [1.00, 0.88, 0.10],
  [0.00, 0.51, 0.78],
  [0.96, 0.51, 0.19],
  [0.57, 0.12, 0.71],
  [0.27, 0.94, 0.94],
  [0.94, 0.20, 0.90],
];

/// Controls for one introspection pass.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IntrospectionFilter {
  /// Inclusive `(min, max)` node level.
  pub level_range: (u32, u32),
  /// Alpha written into every color.
  pub alpha_blend: f32,
  pub show_leaves_only: bool,
  /// Heat ramp on chance instead of the per-level palette.
  pub color_by_stats: bool,
  /// Keep only nodes and facets whose chance lies in `[min, max]`.
  pub trim_by_probability_range: Option<(f64, f64)>,
}

impl Default for IntrospectionFilter {
  fn default() -> Self {
    Self {
      level_range: (0, u32::MAX),
      alpha_blend: 1.0,
      show_leaves_only: false,
      color_by_stats: false,
      trim_by_probability_range: None,
    }
  }
}

impl IntrospectionFilter {
  #[inline]
  fn level_ok(&self, level: u32) -> bool {
    level >= self.level_range.0 && level <= self.level_range.1
  }

  #[inline]
  fn chance_ok(&self, chance: f64) -> bool {
    self
      .trim_by_probability_range
      .map_or(true, |(min, max)| chance >= min && chance <= max)
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeView {
  /// Index in the tree's node array.
  pub id: u32,
  pub chance: f64,
  pub nb_prim: u32,
  pub level: u32,
  pub is_leaf: bool,
  pub aabb: DAabb3,
  /// Linear RGBA.
  pub color: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FacetView {
  /// Index in the facet slice.
  pub index: usize,
  pub id: u32,
  pub nb_traversal_steps: u64,
  pub chance: f64,
  /// Depth of the owning leaf.
  pub level: u32,
}

/// Result of one pass, nodes in depth-first order, facets by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Introspection {
  pub nodes: Vec<NodeView>,
  pub facets: Vec<FacetView>,
}

/// Blue (0) → white (0.5) → red (1).
pub fn heat_color(t: f64) -> [f32; 3] {
  let t = (if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 }) as f32;
  let s = 2.0 * t - 1.0;
  if s >= 0.0 {
    [1.0, 1.0 - s, 1.0 - s]
  } else {
    let s = -s;
    [1.0 - s, 1.0 - s, 1.0]
  }
}

/// Palette entry for a node level.
pub fn level_color(level: u32) -> [f32; 3] {
  LEVEL_PALETTE[level as usize % LEVEL_PALETTE.len()]
}

/// Filtered node and facet views of `bvh` using the counters in `snapshot`.
///
/// Entries missing from the snapshot read as zero counters.
pub fn introspect(bvh: &Bvh, snapshot: &StatsSnapshot, filter: &IntrospectionFilter) -> Introspection {
  let alpha = filter.alpha_blend.clamp(0.0, 1.0);

  let nodes = bvh
    .nodes()
    .iter()
    .enumerate()
    .filter_map(|(i, node)| {
      let chance = snapshot.nodes.get(i).copied().unwrap_or(NodeStats::default()).chance();
      let keep = filter.level_ok(node.level)
        && (!filter.show_leaves_only || node.is_leaf())
        && filter.chance_ok(chance);
      if !keep {
        return None;
      }
      let [r, g, b] = if filter.color_by_stats {
        heat_color(chance)
      } else {
        level_color(node.level)
      };
      Some(NodeView {
        id: i as u32,
        chance,
        nb_prim: node.nb_prim,
        level: node.level,
        is_leaf: node.is_leaf(),
        aabb: node.aabb,
        color: [r, g, b, alpha],
      })
    })
    .collect();

  let facets = bvh
    .facets()
    .iter()
    .zip(bvh.facet_levels())
    .enumerate()
    .filter_map(|(i, (facet, level))| {
      let level = (*level)?;
      let stats = snapshot.facets.get(i).copied().unwrap_or(FacetStats::default());
      let chance = stats.chance();
      (filter.level_ok(level) && filter.chance_ok(chance)).then_some(FacetView {
        index: i,
        id: facet.id,
        nb_traversal_steps: stats.nb_traversal_steps,
        chance,
        level,
      })
    })
    .collect();

  Introspection { nodes, facets }
}

#[cfg(test)]
#[path = "introspect_test.rs"]
mod introspect_test;
