//! BuildConfig - split heuristic selection and tree-shape parameters.

use std::fmt;
use std::str::FromStr;

use crate::constants::{
  DEFAULT_INTERSECTION_COST, DEFAULT_PROBABILITY_WEIGHT, DEFAULT_SAH_BUCKETS,
  DEFAULT_TRAVERSAL_COST, MAX_PRIMS_IN_NODE, MAX_SAH_BUCKETS,
};
use crate::error::{BvhError, BvhResult};

/// Partitioning strategy used at each internal node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitMethod {
  /// Surface area heuristic over bucketed split planes.
  Sah,
  /// Hierarchical linear BVH: Morton-ordered treelets merged with SAH.
  Hlbvh,
  /// Midpoint of the centroid bounds along the widest axis.
  Middle,
  /// Median split; children differ in size by at most one facet.
  EqualCounts,
  /// SAH sweep with facet counts blended with prior hit-probability mass.
  MolflowSplit,
  /// Cut that halves the cumulative hit-probability mass.
  ProbSplit,
}

impl SplitMethod {
  /// Every method, in declaration order.
  pub const ALL: [SplitMethod; 6] = [
    SplitMethod::Sah,
    SplitMethod::Hlbvh,
    SplitMethod::Middle,
    SplitMethod::EqualCounts,
    SplitMethod::MolflowSplit,
    SplitMethod::ProbSplit,
  ];

  /// Canonical name, as accepted by [`FromStr`].
  pub fn name(&self) -> &'static str {
    match self {
      SplitMethod::Sah => "SAH",
      SplitMethod::Hlbvh => "HLBVH",
      SplitMethod::Middle => "Middle",
      SplitMethod::EqualCounts => "EqualCounts",
      SplitMethod::MolflowSplit => "MolflowSplit",
      SplitMethod::ProbSplit => "ProbSplit",
    }
  }

  /// True for heuristics that read prior hit probabilities.
  #[inline]
  pub fn uses_hit_probability(&self) -> bool {
    matches!(self, SplitMethod::MolflowSplit | SplitMethod::ProbSplit)
  }
}

impl fmt::Display for SplitMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for SplitMethod {
  type Err = BvhError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    SplitMethod::ALL
      .iter()
      .copied()
      .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| BvhError::Config(format!("unrecognized split method '{}'", s)))
  }
}

/// Surface area heuristic parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SahParams {
  /// Candidate planes per axis = bucket_count - 1.
  pub bucket_count: usize,
  /// Relative cost of visiting an internal node.
  pub traversal_cost: f64,
  /// Relative cost of one facet polygon test.
  pub intersection_cost: f64,
}

impl Default for SahParams {
  fn default() -> Self {
    Self {
      bucket_count: DEFAULT_SAH_BUCKETS,
      traversal_cost: DEFAULT_TRAVERSAL_COST,
      intersection_cost: DEFAULT_INTERSECTION_COST,
    }
  }
}

/// Configuration for one tree build.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BuildConfig {
  /// Partitioning strategy.
  pub split_method: SplitMethod,

  /// Leaves hold at most this many facets (1..=255).
  pub max_prims_in_node: usize,

  /// Cost model for SAH-family heuristics.
  pub sah: SahParams,

  /// MolflowSplit blend: 0 weighs sides by facet count only (plain SAH),
  /// 1 by hit-probability mass only.
  pub probability_weight: f64,
}

impl BuildConfig {
  /// Config with the given method and leaf size, other fields default.
  pub fn new(split_method: SplitMethod, max_prims_in_node: usize) -> Self {
    Self {
      split_method,
      max_prims_in_node,
      ..Self::default()
    }
  }

  /// Reject configurations the builder cannot honor.
  pub fn validate(&self) -> BvhResult<()> {
    if self.max_prims_in_node < 1 {
      return Err(BvhError::Config(format!(
        "max_prims_in_node must be >= 1, got {}",
        self.max_prims_in_node
      )));
    }
    if self.max_prims_in_node > MAX_PRIMS_IN_NODE {
      return Err(BvhError::Config(format!(
        "max_prims_in_node must be <= {}, got {}",
        MAX_PRIMS_IN_NODE, self.max_prims_in_node
      )));
    }
    if !(2..=MAX_SAH_BUCKETS).contains(&self.sah.bucket_count) {
      return Err(BvhError::Config(format!(
        "sah.bucket_count must be in 2..={}, got {}",
        MAX_SAH_BUCKETS, self.sah.bucket_count
      )));
    }
    for (name, value) in [
      ("sah.traversal_cost", self.sah.traversal_cost),
      ("sah.intersection_cost", self.sah.intersection_cost),
    ] {
      if !value.is_finite() || value <= 0.0 {
        return Err(BvhError::Config(format!(
          "{} must be positive and finite, got {}",
          name, value
        )));
      }
    }
    if !(0.0..=1.0).contains(&self.probability_weight) {
      return Err(BvhError::Config(format!(
        "probability_weight must be in [0, 1], got {}",
        self.probability_weight
      )));
    }
    Ok(())
  }
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      split_method: SplitMethod::Sah,
      max_prims_in_node: 4,
      sah: SahParams::default(),
      probability_weight: DEFAULT_PROBABILITY_WEIGHT,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
