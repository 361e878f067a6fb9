//! Axis-aligned bounding box with double precision.

use glam::DVec3;

use crate::constants::ROBUST_SLAB_FACTOR;

/// Double-precision axis-aligned bounding box.
///
/// The empty box has inverted extents (`min = +inf`, `max = -inf`) so that
/// growing it by any point or box yields that point or box.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DAabb3 {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl DAabb3 {
	/// Empty box, ready for encapsulation.
	pub const EMPTY: Self = Self {
		min: DVec3::splat(f64::INFINITY),
		max: DVec3::splat(f64::NEG_INFINITY),
	};

	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Degenerate box around a single point.
	#[inline]
	pub fn from_point(p: DVec3) -> Self {
		Self { min: p, max: p }
	}

	/// Tight box around a set of points. Empty input gives [`DAabb3::EMPTY`].
	pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Self {
		points
			.into_iter()
			.fold(Self::EMPTY, |acc, p| acc.grow_point(*p))
	}

	/// True when no point has been added yet.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
	}

	/// Box enlarged to include a point.
	#[inline]
	pub fn grow_point(&self, p: DVec3) -> Self {
		Self {
			min: self.min.min(p),
			max: self.max.max(p),
		}
	}

	/// Union of two boxes.
	#[inline]
	pub fn union(&self, other: &DAabb3) -> Self {
		Self {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
		}
	}

	/// Check if this AABB contains a point.
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Check if `other` lies entirely inside this box. An empty `other` is
	/// always contained.
	#[inline]
	pub fn contains(&self, other: &DAabb3) -> bool {
		other.is_empty() || (self.contains_point(other.min) && self.contains_point(other.max))
	}

	/// Get the size of the AABB (max - min). Zero for the empty box.
	#[inline]
	pub fn size(&self) -> DVec3 {
		if self.is_empty() {
			DVec3::ZERO
		} else {
			self.max - self.min
		}
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Surface area; zero for empty and flat-in-every-direction boxes.
	#[inline]
	pub fn surface_area(&self) -> f64 {
		let d = self.size();
		2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
	}

	/// Index of the longest axis (0 = x, 1 = y, 2 = z). Ties prefer the lower
	/// axis.
	#[inline]
	pub fn longest_axis(&self) -> usize {
		let d = self.size();
		if d.x >= d.y && d.x >= d.z {
			0
		} else if d.y >= d.z {
			1
		} else {
			2
		}
	}

	/// Position of `p` relative to the box corners: 0 at `min`, 1 at `max`,
	/// per axis. Axes with zero extent map to 0.
	#[inline]
	pub fn offset(&self, p: DVec3) -> DVec3 {
		let mut o = p - self.min;
		for axis in 0..3 {
			let extent = self.max[axis] - self.min[axis];
			o[axis] = if extent > 0.0 { o[axis] / extent } else { 0.0 };
		}
		o
	}

	/// Slab test against a ray given its precomputed inverse direction.
	///
	/// Returns the parametric entry distance when the ray overlaps the box
	/// within `[0, t_max]`. Axis-parallel rays (infinite inverse component)
	/// are handled without producing NaN.
	#[inline]
	pub fn ray_entry(&self, origin: DVec3, inv_dir: DVec3, t_max: f64) -> Option<f64> {
		if self.is_empty() {
			return None;
		}
		let mut t0 = 0.0_f64;
		let mut t1 = t_max;
		for axis in 0..3 {
			let o = origin[axis];
			let inv = inv_dir[axis];
			if inv.is_infinite() {
				if o < self.min[axis] || o > self.max[axis] {
					return None;
				}
				continue;
			}
			let mut near = (self.min[axis] - o) * inv;
			let mut far = (self.max[axis] - o) * inv;
			if near > far {
				std::mem::swap(&mut near, &mut far);
			}
			far *= ROBUST_SLAB_FACTOR;
			t0 = t0.max(near);
			t1 = t1.min(far);
			if t0 > t1 {
				return None;
			}
		}
		Some(t0)
	}
}

impl Default for DAabb3 {
	fn default() -> Self {
		Self::EMPTY
	}
}
