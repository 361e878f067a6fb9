//! Synthetic facet scenes and ray sets for tests and benchmarks.
//!
//! Generators are deterministic for a given seeded RNG so benchmark runs
//! and property tests are reproducible.

use std::f64::consts::TAU;

use glam::DVec3;
use rand::Rng;

use crate::bounds::DAabb3;
use crate::facet::Facet;
use crate::types::Ray;

/// `nx × ny` axis-aligned square quads in the `z = 0` plane.
///
/// Cell `(i, j)` covers `[i·pitch, i·pitch + size] × [j·pitch, j·pitch + size]`
/// with `pitch = size + gap`; ids run row-major.
pub fn grid(nx: u32, ny: u32, size: f64, gap: f64) -> Vec<Facet> {
  let pitch = size + gap;
  let mut facets = Vec::with_capacity((nx * ny) as usize);
  for j in 0..ny {
    for i in 0..nx {
      let x = i as f64 * pitch;
      let y = j as f64 * pitch;
      facets.push(Facet::quad(
        j * nx + i,
        DVec3::new(x, y, 0.0),
        DVec3::new(x + size, y, 0.0),
        DVec3::new(x + size, y + size, 0.0),
        DVec3::new(x, y + size, 0.0),
      ));
    }
  }
  facets
}

/// Polygonal pipe along +z: `sides × segments` wall quads, optionally closed
/// by two `sides`-gon caps (ids after the walls).
pub fn tube(sides: u32, segments: u32, radius: f64, length: f64, capped: bool) -> Vec<Facet> {
  let sides = sides.max(3);
  let segments = segments.max(1);
  let ring = |k: u32, z: f64| {
    let a = TAU * (k % sides) as f64 / sides as f64;
    DVec3::new(radius * a.cos(), radius * a.sin(), z)
  };
  let dz = length / segments as f64;

  let mut facets = Vec::with_capacity((sides * segments + 2) as usize);
  for s in 0..segments {
    let z0 = s as f64 * dz;
    let z1 = z0 + dz;
    for k in 0..sides {
      facets.push(Facet::quad(
        s * sides + k,
        ring(k, z0),
        ring(k + 1, z0),
        ring(k + 1, z1),
        ring(k, z1),
      ));
    }
  }
  if capped {
    let base = sides * segments;
    facets.push(Facet::new(base, (0..sides).map(|k| ring(k, 0.0))));
    facets.push(Facet::new(base + 1, (0..sides).rev().map(|k| ring(k, length))));
  }
  facets
}

/// `count` triangles centered uniformly in `[-extent, extent]^3`, vertices
/// jittered up to `size` around the center.
pub fn random_triangles(count: u32, extent: f64, size: f64, rng: &mut impl Rng) -> Vec<Facet> {
  let mut point = |r: f64| {
    DVec3::new(
      rng.random_range(-r..=r),
      rng.random_range(-r..=r),
      rng.random_range(-r..=r),
    )
  };
  (0..count)
    .map(|id| {
      let c = point(extent);
      Facet::triangle(id, c + point(size), c + point(size), c + point(size))
    })
    .collect()
}

/// Rays from a sphere enclosing `bounds`, each aimed at a random point
/// inside `bounds`.
pub fn random_rays(bounds: &DAabb3, count: usize, rng: &mut impl Rng) -> Vec<Ray> {
  if bounds.is_empty() {
    return Vec::new();
  }
  let center = bounds.center();
  let radius = 0.5 * bounds.size().length() + 1.0;
  (0..count)
    .map(|_| {
      let z: f64 = rng.random_range(-1.0..=1.0);
      let phi: f64 = rng.random_range(0.0..TAU);
      let r = (1.0 - z * z).max(0.0).sqrt();
      let origin = center + radius * DVec3::new(r * phi.cos(), r * phi.sin(), z);
      let target = DVec3::new(
        rng.random_range(bounds.min.x..=bounds.max.x),
        rng.random_range(bounds.min.y..=bounds.max.y),
        rng.random_range(bounds.min.z..=bounds.max.z),
      );
      let dir = target - origin;
      Ray::new(origin, if dir.length_squared() > 0.0 { dir } else { DVec3::Z })
    })
    .collect()
}

/// Bounds of all non-degenerate facets.
pub fn scene_bounds(facets: &[Facet]) -> DAabb3 {
  facets
    .iter()
    .filter(|f| !f.is_degenerate())
    .fold(DAabb3::EMPTY, |b, f| b.union(&f.aabb()))
}
