//! Facet - planar polygon with cached derived geometry.
//!
//! The geometry collaborator supplies vertices; everything the builder and
//! the traverser need (bounds, centroid, area, normal, projection axis) is
//! computed once at construction.

use glam::DVec3;
use smallvec::SmallVec;

use crate::bounds::DAabb3;
use crate::constants::{DEGENERATE_AREA_EPS, HIT_EPSILON, PARALLEL_EPSILON};

/// Why a facet cannot take part in a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Degeneracy {
  /// Fewer than three vertices.
  TooFewVertices,
  /// NaN or infinite coordinate.
  NonFinite,
  /// Area below [`DEGENERATE_AREA_EPS`] (collinear or coincident vertices).
  ZeroArea,
}

/// Planar polygon (≥3 vertices) in 3D.
///
/// Polygons are double-sided for ray queries and may be concave.
#[derive(Clone, Debug)]
pub struct Facet {
  /// Caller-assigned identifier, carried through to hits and statistics.
  pub id: u32,
  vertices: SmallVec<[DVec3; 4]>,
  aabb: DAabb3,
  centroid: DVec3,
  normal: DVec3,
  area: f64,
  /// Axis dropped when projecting the polygon to 2D (dominant normal axis).
  drop_axis: usize,
  degeneracy: Option<Degeneracy>,
}

impl Facet {
  /// Create a facet from its polygon vertices.
  pub fn new(id: u32, vertices: impl IntoIterator<Item = DVec3>) -> Self {
    let vertices: SmallVec<[DVec3; 4]> = vertices.into_iter().collect();

    if vertices.len() < 3 {
      return Self::degenerate(id, vertices, Degeneracy::TooFewVertices);
    }
    if vertices.iter().any(|v| !v.is_finite()) {
      return Self::degenerate(id, vertices, Degeneracy::NonFinite);
    }

    let centroid = vertices.iter().copied().sum::<DVec3>() / vertices.len() as f64;

    // Newell's method, relative to the centroid to limit cancellation.
    let mut twice_area_normal = DVec3::ZERO;
    for (i, v) in vertices.iter().enumerate() {
      let next = vertices[(i + 1) % vertices.len()];
      twice_area_normal += (*v - centroid).cross(next - centroid);
    }
    let area = twice_area_normal.length() * 0.5;
    let aabb = DAabb3::from_points(vertices.iter());

    if !(area > DEGENERATE_AREA_EPS) {
      let mut facet = Self::degenerate(id, vertices, Degeneracy::ZeroArea);
      facet.aabb = aabb;
      facet.centroid = centroid;
      return facet;
    }

    let normal = twice_area_normal / (2.0 * area);
    let abs = normal.abs();
    let drop_axis = if abs.x >= abs.y && abs.x >= abs.z {
      0
    } else if abs.y >= abs.z {
      1
    } else {
      2
    };

    Self {
      id,
      vertices,
      aabb,
      centroid,
      normal,
      area,
      drop_axis,
      degeneracy: None,
    }
  }

  /// Triangle facet.
  pub fn triangle(id: u32, a: DVec3, b: DVec3, c: DVec3) -> Self {
    Self::new(id, [a, b, c])
  }

  /// Quadrilateral facet (vertices in winding order).
  pub fn quad(id: u32, a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> Self {
    Self::new(id, [a, b, c, d])
  }

  fn degenerate(id: u32, vertices: SmallVec<[DVec3; 4]>, reason: Degeneracy) -> Self {
    Self {
      id,
      vertices,
      aabb: DAabb3::EMPTY,
      centroid: DVec3::ZERO,
      normal: DVec3::ZERO,
      area: 0.0,
      drop_axis: 0,
      degeneracy: Some(reason),
    }
  }

  /// Polygon vertices in winding order.
  #[inline]
  pub fn vertices(&self) -> &[DVec3] {
    &self.vertices
  }

  /// Tight bounds; empty for non-finite facets.
  #[inline]
  pub fn aabb(&self) -> DAabb3 {
    self.aabb
  }

  /// Vertex mean.
  #[inline]
  pub fn centroid(&self) -> DVec3 {
    self.centroid
  }

  /// Unit normal (zero when degenerate).
  #[inline]
  pub fn normal(&self) -> DVec3 {
    self.normal
  }

  /// Polygon area.
  #[inline]
  pub fn area(&self) -> f64 {
    self.area
  }

  /// Reason the facet is unusable, if any.
  #[inline]
  pub fn degeneracy(&self) -> Option<Degeneracy> {
    self.degeneracy
  }

  /// True when the facet is excluded from builds.
  #[inline]
  pub fn is_degenerate(&self) -> bool {
    self.degeneracy.is_some()
  }

  /// Exact ray/polygon test.
  ///
  /// `dir` need not be normalized; the returned parameter is in units of
  /// `dir`. Only hits with `HIT_EPSILON < t < t_max` are reported.
  pub fn intersect(&self, origin: DVec3, dir: DVec3, t_max: f64) -> Option<f64> {
    if self.degeneracy.is_some() {
      return None;
    }
    let denom = self.normal.dot(dir);
    if denom.abs() <= PARALLEL_EPSILON * dir.length() {
      return None;
    }
    let t = self.normal.dot(self.centroid - origin) / denom;
    if !(t > HIT_EPSILON && t < t_max) {
      return None;
    }
    let p = origin + dir * t;
    self.contains_projected(p).then_some(t)
  }

  /// Even-odd test of a point on the facet plane, in the projection that
  /// drops the dominant normal axis.
  fn contains_projected(&self, p: DVec3) -> bool {
    let (a, b) = match self.drop_axis {
      0 => (1, 2),
      1 => (2, 0),
      _ => (0, 1),
    };
    let (px, py) = (p[a], p[b]);
    let n = self.vertices.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
      let (xi, yi) = (self.vertices[i][a], self.vertices[i][b]);
      let (xj, yj) = (self.vertices[j][a], self.vertices[j][b]);
      if (yi > py) != (yj > py) {
        let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
        if px < x_cross {
          inside = !inside;
        }
      }
      j = i;
    }
    inside
  }
}

#[cfg(test)]
#[path = "facet_test.rs"]
mod facet_test;
