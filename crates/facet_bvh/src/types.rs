//! Query types shared by the traverser and the registry.

use glam::DVec3;

use crate::error::{BvhError, BvhResult};

/// Ray query: origin plus direction (any non-zero length).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ray {
  pub origin: DVec3,
  pub direction: DVec3,
}

impl Ray {
  pub fn new(origin: DVec3, direction: DVec3) -> Self {
    Self { origin, direction }
  }

  /// Validate and precompute the per-query constants used by traversal.
  pub fn prepare(&self) -> BvhResult<PreparedRay> {
    if !self.origin.is_finite() {
      return Err(BvhError::InvalidQuery(format!(
        "ray origin is not finite: {:?}",
        self.origin
      )));
    }
    if !self.direction.is_finite() {
      return Err(BvhError::InvalidQuery(format!(
        "ray direction is not finite: {:?}",
        self.direction
      )));
    }
    let len = self.direction.length();
    if !(len > 0.0) || !len.is_finite() {
      return Err(BvhError::InvalidQuery(
        "ray direction has zero length".to_string(),
      ));
    }
    let dir = self.direction / len;
    Ok(PreparedRay {
      origin: self.origin,
      dir,
      inv_dir: dir.recip(),
      dir_is_neg: [dir.x < 0.0, dir.y < 0.0, dir.z < 0.0],
    })
  }
}

/// Validated ray with unit direction and cached reciprocal.
#[derive(Clone, Copy, Debug)]
pub struct PreparedRay {
  pub origin: DVec3,
  /// Unit direction; hit distances are in world units.
  pub dir: DVec3,
  pub inv_dir: DVec3,
  /// Sign of each direction component, for near-child-first ordering.
  pub dir_is_neg: [bool; 3],
}

impl PreparedRay {
  #[inline]
  pub fn at(&self, t: f64) -> DVec3 {
    self.origin + self.dir * t
  }
}

/// Nearest intersection result.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hit {
  /// Index into the facet slice the tree was built from.
  pub facet_index: usize,
  /// Caller-assigned facet id.
  pub facet_id: u32,
  /// Distance from the ray origin, in world units.
  pub distance: f64,
  /// World-space hit point.
  pub point: DVec3,
}

/// Work performed by one query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalCost {
  /// Ray/AABB slab tests.
  pub node_tests: u32,
  /// Ray/polygon tests.
  pub facet_tests: u32,
}

impl TraversalCost {
  /// Node and facet tests combined.
  #[inline]
  pub fn total_steps(&self) -> u32 {
    self.node_tests + self.facet_tests
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
