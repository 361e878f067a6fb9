//! Build and traversal constants.
//!
//! # Morton Code Layout (HLBVH)
//!
//! ```text
//! bit:   29 28 27 | 26 25 24 | ... | 2  1  0
//!        z  y  x  | z  y  x  | ... | z  y  x
//!        └──────── 12 treelet bits ────────┘└── 18 in-treelet bits ──┘
//!
//! MORTON_BITS_PER_AXIS = 10  →  30-bit codes, 1024 cells per axis
//! TREELET_MASK selects the top 12 bits (4 levels of octree subdivision)
//! ```
//!
//! # Cost Model (SAH / MolflowSplit)
//!
//! ```text
//! cost(split) = c_trav + (A_L / A) * n_L * c_isect + (A_R / A) * n_R * c_isect
//! cost(leaf)  = n * c_isect
//! ```
//!
//! `c_trav = 1/8` and `c_isect = 1` are the relative costs of a node visit and
//! a polygon test.

/// Hard upper bound on `max_prims_in_node`.
pub const MAX_PRIMS_IN_NODE: usize = 255;

/// Default bucket count for SAH plane sweeps.
pub const DEFAULT_SAH_BUCKETS: usize = 12;

/// Maximum bucket count accepted by `SahParams`.
pub const MAX_SAH_BUCKETS: usize = 32;

/// Default relative cost of visiting an internal node.
pub const DEFAULT_TRAVERSAL_COST: f64 = 0.125;

/// Default relative cost of one facet polygon test.
pub const DEFAULT_INTERSECTION_COST: f64 = 1.0;

/// Default blend between facet count and hit-probability mass in
/// MolflowSplit (0 = pure SAH, 1 = pure probability mass).
pub const DEFAULT_PROBABILITY_WEIGHT: f64 = 0.5;

/// Recursion depth past which the builder only takes EqualCounts splits.
pub const MAX_BUILD_DEPTH: u32 = 64;

/// Subsets at least this large build their two children with `rayon::join`.
pub const PARALLEL_BUILD_THRESHOLD: usize = 4096;

/// Subsets at least this large evaluate SAH axes in parallel.
pub const PARALLEL_SAH_THRESHOLD: usize = 1024;

/// Bits per axis in a Morton code.
pub const MORTON_BITS_PER_AXIS: u32 = 10;

/// Number of cells per axis in the Morton grid.
pub const MORTON_SCALE: f64 = (1u32 << MORTON_BITS_PER_AXIS) as f64;

/// Total Morton code width.
pub const MORTON_CODE_BITS: u32 = 3 * MORTON_BITS_PER_AXIS;

/// High bits shared by all primitives of one HLBVH treelet.
pub const TREELET_MASK: u32 = 0b0011_1111_1111_1100_0000_0000_0000_0000;

/// Number of bits covered by [`TREELET_MASK`].
pub const TREELET_BITS: u32 = 12;

/// Morton bit at which in-treelet splitting starts.
pub const TREELET_FIRST_BIT: i32 = (MORTON_CODE_BITS - TREELET_BITS) as i32 - 1;

/// Facets with area below this are treated as degenerate.
pub const DEGENERATE_AREA_EPS: f64 = 1e-12;

/// Minimum accepted ray parameter for a hit (self-intersection guard).
pub const HIT_EPSILON: f64 = 1e-9;

/// Rays whose direction is parallel to a facet plane within this tolerance
/// (|cos| of the angle to the plane normal) miss the facet.
pub const PARALLEL_EPSILON: f64 = 1e-12;

/// Far-plane inflation for conservative slab tests (pbrt's `1 + 2 * gamma(3)`).
pub const ROBUST_SLAB_FACTOR: f64 = 1.000_000_000_000_000_7;

/// Relative slack when culling nodes against the best hit, so facets tied
/// with it are still tested and the lower index can win.
pub const NODE_CULL_SLACK: f64 = 1e-9;

/// Inline capacity of the traversal stack.
pub const TRAVERSAL_STACK_INLINE: usize = 64;

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
