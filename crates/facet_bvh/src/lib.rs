//! facet_bvh - Bounding volume hierarchy over polygonal facets
//!
//! This crate accelerates nearest ray/facet intersection queries for Monte
//! Carlo particle transport. Trees are built under one of six pluggable split
//! heuristics, queried concurrently from many threads, and instrumented with
//! per-node and per-facet counters that feed probability-aware rebuilds and
//! visualization tooling.
//!
//! # Features
//!
//! - **Split heuristics**: SAH, HLBVH, Middle, EqualCounts and two
//!   probability-aware variants (MolflowSplit, ProbSplit) behind one table
//!   of pure partition functions
//! - **Parallel construction**: rayon subtree builds, parallel Morton
//!   sorting and treelet emission, cooperative cancellation
//! - **Lock-free statistics**: relaxed atomic counters or thread-local
//!   accumulators, read through owned snapshots
//! - **Registry**: several trees side by side with Unbuilt/Building/Ready/
//!   Stale lifecycle and asynchronous rebuilds
//!
//! # Example
//!
//! ```ignore
//! use facet_bvh::{BuildConfig, BvhBuilder, BvhTraverser, Facet, Ray, SplitMethod};
//! use glam::DVec3;
//!
//! let facets = facet_bvh::scene::tube(16, 32, 1.0, 20.0, true);
//! let config = BuildConfig::new(SplitMethod::Sah, 4);
//! let bvh = BvhBuilder::build(&facets, &config)?;
//!
//! let ray = Ray::new(DVec3::new(0.0, 0.0, 5.0), DVec3::X);
//! if let Some(hit) = BvhTraverser::intersect(&bvh, &ray)? {
//!     println!("facet {} at {:.3}", hit.facet_id, hit.distance);
//! }
//! ```

pub mod bounds;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use bounds::DAabb3;
pub use error::{BvhError, BvhResult};
pub use types::{Hit, PreparedRay, Ray, TraversalCost};

// Build configuration and heuristic selection
pub mod config;
pub use config::{BuildConfig, SahParams, SplitMethod};

// Facet geometry
pub mod facet;
pub use facet::{Degeneracy, Facet};

// Split heuristic table
pub mod split;

// Tree construction and storage
pub mod build;
pub mod tree;
pub use build::{BuildStats, BvhBuilder, CancelToken};
pub use tree::{Bvh, BvhId, BvhNode, BvhState, NodeKind};

// Ray traversal
pub mod traverse;
pub use traverse::BvhTraverser;

// Runtime statistics and visualization views
pub mod introspect;
pub mod stats;
pub use introspect::{introspect, FacetView, Introspection, IntrospectionFilter, NodeView};
pub use stats::{BuildMetrics, BvhStats, RollingWindow, StatsAccumulator, StatsSink, StatsSnapshot};

// Multi-structure ownership and rebuild lifecycle
pub mod registry;
pub use registry::{BvhRegistry, QueryTarget, RegistryHit};

// Synthetic scenes for tests and benchmarks
pub mod scene;

#[cfg(test)]
pub(crate) mod test_utils;
