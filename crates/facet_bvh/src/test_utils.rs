//! Fixtures and invariant checks shared by unit tests.

use glam::DVec3;

use crate::facet::Facet;
use crate::tree::{Bvh, NodeKind};

/// Two triangles on adjoining faces of the unit cube corner at the origin.
pub fn cube_corner() -> Vec<Facet> {
  vec![
    Facet::triangle(10, DVec3::ZERO, DVec3::X, DVec3::Y),
    Facet::triangle(11, DVec3::ZERO, DVec3::Y, DVec3::Z),
  ]
}

/// Partition, containment and bookkeeping checks on a built tree.
pub fn check_invariants(bvh: &Bvh) {
  let nodes = bvh.nodes();
  let mut seen = vec![0u32; bvh.facets().len()];

  for (i, node) in nodes.iter().enumerate() {
    match node.kind {
      NodeKind::Leaf { count, .. } => {
        assert!(count > 0, "leaf {i} is empty");
        assert_eq!(node.nb_prim, count);
        for &f in bvh.leaf_facets(node) {
          seen[f as usize] += 1;
          assert!(node.aabb.contains(&bvh.facets()[f as usize].aabb()));
          assert_eq!(bvh.facet_levels()[f as usize], Some(node.level));
        }
      }
      NodeKind::Internal { second_child, .. } => {
        let first = &nodes[i + 1];
        let second = &nodes[second_child as usize];
        assert!(node.aabb.contains(&first.aabb), "node {i} misses first child");
        assert!(node.aabb.contains(&second.aabb), "node {i} misses second child");
        assert_eq!(first.level, node.level + 1);
        assert_eq!(second.level, node.level + 1);
        assert_eq!(node.nb_prim, first.nb_prim + second.nb_prim);
      }
    }
  }

  for (i, facet) in bvh.facets().iter().enumerate() {
    let expected = if facet.is_degenerate() { 0 } else { 1 };
    assert_eq!(seen[i], expected, "facet {i} appears {} times", seen[i]);
  }
}
