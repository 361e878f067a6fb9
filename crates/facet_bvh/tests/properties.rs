//! Cross-module behavior of facet_bvh through its public API.
//!
//! # Test Categories
//!
//! 1. **Heuristic independence** - every split method returns the same
//!    nearest hit as a brute-force scan
//! 2. **Tree invariants** - partition, containment, leaf size
//! 3. **Reference scenes** - cube corner, miss-at-root, empty input,
//!    uniform-probability split
//! 4. **Concurrency** - shared trees queried from many threads

use std::sync::Arc;
use std::thread;

use facet_bvh::{
  scene, BuildConfig, Bvh, BvhBuilder, BvhRegistry, BvhState, BvhTraverser, Facet, NodeKind,
  QueryTarget, Ray, SplitMethod, StatsAccumulator,
};
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Helpers
// =============================================================================

/// Nearest hit by testing every facet: (index, distance).
fn brute_force(facets: &[Facet], ray: &Ray) -> Option<(usize, f64)> {
  let prepared = ray.prepare().ok()?;
  let mut best: Option<(usize, f64)> = None;
  for (i, facet) in facets.iter().enumerate() {
    if let Some(t) = facet.intersect(prepared.origin, prepared.dir, f64::INFINITY) {
      if best.map_or(true, |(_, bt)| t < bt) {
        best = Some((i, t));
      }
    }
  }
  best
}

fn check_tree(bvh: &Bvh, max_prims: usize) {
  let nodes = bvh.nodes();
  let mut seen = vec![0u32; bvh.facets().len()];
  for (i, node) in nodes.iter().enumerate() {
    match node.kind {
      NodeKind::Leaf { count, .. } => {
        assert!(count as usize >= 1 && count as usize <= max_prims);
        for &f in bvh.leaf_facets(node) {
          seen[f as usize] += 1;
          assert!(node.aabb.contains(&bvh.facets()[f as usize].aabb()));
        }
      }
      NodeKind::Internal { second_child, .. } => {
        assert!(node.aabb.contains(&nodes[i + 1].aabb));
        assert!(node.aabb.contains(&nodes[second_child as usize].aabb));
      }
    }
  }
  for (i, facet) in bvh.facets().iter().enumerate() {
    let expected = u32::from(!facet.is_degenerate());
    assert_eq!(seen[i], expected, "facet {i}");
  }
}

/// Facet ids of each leaf in depth-first order, sorted within the leaf.
fn leaf_sets(bvh: &Bvh) -> Vec<Vec<u32>> {
  bvh
    .nodes()
    .iter()
    .filter(|n| n.is_leaf())
    .map(|n| {
      let mut ids: Vec<u32> = bvh.leaf_facets(n).iter().map(|&f| bvh.facets()[f as usize].id).collect();
      ids.sort_unstable();
      ids
    })
    .collect()
}

fn mixed_scene(rng: &mut StdRng) -> Vec<Facet> {
  let mut facets = scene::tube(16, 24, 2.0, 30.0, true);
  let offset = facets.len() as u32;
  facets.extend(
    scene::random_triangles(400, 6.0, 1.0, rng)
      .into_iter()
      .map(|f| Facet::new(f.id + offset, f.vertices().iter().map(|v| *v + DVec3::Z * 15.0))),
  );
  facets
}

// =============================================================================
// Heuristic Independence
// =============================================================================

#[test]
fn every_method_matches_brute_force() {
  let mut rng = StdRng::seed_from_u64(7);
  let facets = mixed_scene(&mut rng);
  let mut rays = scene::random_rays(&scene::scene_bounds(&facets), 500, &mut rng);
  // Rays from inside the pipe as well.
  for _ in 0..200 {
    let origin = DVec3::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), rng.random_range(1.0..29.0));
    let dir = DVec3::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
    if dir.length() > 1e-3 {
      rays.push(Ray::new(origin, dir));
    }
  }

  let expected: Vec<Option<(usize, f64)>> = rays.iter().map(|r| brute_force(&facets, r)).collect();
  assert!(expected.iter().filter(|e| e.is_some()).count() > rays.len() / 5);

  for method in SplitMethod::ALL {
    for max_prims in [1, 4, 16] {
      let bvh = BvhBuilder::build(&facets, &BuildConfig::new(method, max_prims)).unwrap();
      check_tree(&bvh, max_prims);
      let hits = BvhTraverser::intersect_batch(&bvh, &rays).unwrap();
      for (hit, want) in hits.iter().zip(&expected) {
        match (hit, want) {
          (None, None) => {}
          (Some(hit), Some((index, t))) => {
            assert_eq!(hit.facet_index, *index, "{method}/{max_prims}: facet at {} vs {t}", hit.distance);
            assert!((hit.distance - t).abs() < 1e-9, "{method}/{max_prims}: {} vs {t}", hit.distance)
          }
          _ => panic!("{method}/{max_prims}: {hit:?} vs {want:?}"),
        }
      }
    }
  }
}

#[test]
fn probability_rebuild_keeps_results() {
  let mut rng = StdRng::seed_from_u64(11);
  let facets = mixed_scene(&mut rng);
  let rays = scene::random_rays(&scene::scene_bounds(&facets), 300, &mut rng);
  let cold = BvhBuilder::build(&facets, &BuildConfig::default()).unwrap();
  let baseline = BvhTraverser::intersect_batch(&cold, &rays).unwrap();
  let priors = cold.snapshot().hit_probabilities().unwrap();

  for method in [SplitMethod::MolflowSplit, SplitMethod::ProbSplit] {
    let warm = BvhBuilder::build_with(&facets, &BuildConfig::new(method, 2), Some(priors.as_slice()), None).unwrap();
    check_tree(&warm, 2);
    let hits = BvhTraverser::intersect_batch(&warm, &rays).unwrap();
    for (a, b) in hits.iter().zip(&baseline) {
      assert_eq!(a.map(|h| h.facet_index), b.map(|h| h.facet_index), "{method}");
    }
  }
}

#[test]
fn builds_are_deterministic() {
  let mut rng = StdRng::seed_from_u64(3);
  let facets = scene::random_triangles(2_000, 10.0, 0.5, &mut rng);
  for method in SplitMethod::ALL {
    let config = BuildConfig::new(method, 4);
    let a = BvhBuilder::build(&facets, &config).unwrap();
    let b = BvhBuilder::build(&facets, &config).unwrap();
    assert_eq!(a.nodes(), b.nodes(), "{method}");
    assert_eq!(a.facet_order(), b.facet_order(), "{method}");
  }
}

// =============================================================================
// Reference Scenes
// =============================================================================

#[test]
fn cube_corner_middle_split() {
  let facets = vec![
    Facet::triangle(0, DVec3::ZERO, DVec3::X, DVec3::Y),
    Facet::triangle(1, DVec3::ZERO, DVec3::Y, DVec3::Z),
  ];
  let bvh = BvhBuilder::build(&facets, &BuildConfig::new(SplitMethod::Middle, 1)).unwrap();
  let internal = bvh.nodes().iter().filter(|n| !n.is_leaf()).count();
  let leaves: Vec<_> = bvh.nodes().iter().filter(|n| n.is_leaf()).collect();
  assert_eq!(internal, 1);
  assert_eq!(leaves.len(), 2);
  assert!(leaves.iter().all(|n| n.nb_prim == 1));
  check_tree(&bvh, 1);
}

#[test]
fn ray_pointing_away_stops_at_root() {
  let facets = scene::tube(8, 8, 1.0, 5.0, true);
  let bvh = BvhBuilder::build(&facets, &BuildConfig::new(SplitMethod::Sah, 1)).unwrap();
  let ray = Ray::new(DVec3::new(10.0, 0.0, 2.5), DVec3::X);
  assert!(BvhTraverser::intersect(&bvh, &ray).unwrap().is_none());

  let snapshot = bvh.snapshot();
  assert_eq!(snapshot.nodes[0].nb_checks, 1);
  assert_eq!(snapshot.total_node_checks(), 1);
  assert_eq!(snapshot.total_facet_checks(), 0);
}

#[test]
fn empty_input_never_hits() {
  let bvh = BvhBuilder::build(&[], &BuildConfig::default()).unwrap();
  assert_eq!(bvh.state(), BvhState::Ready);
  let mut rng = StdRng::seed_from_u64(1);
  for _ in 0..50 {
    let origin = DVec3::new(rng.random(), rng.random(), rng.random());
    let ray = Ray::new(origin, DVec3::ONE - origin);
    assert!(BvhTraverser::intersect(&bvh, &ray).unwrap().is_none());
  }
}

#[test]
fn uniform_probability_split_matches_equal_counts() {
  for (nx, ny) in [(8, 1), (7, 3), (16, 16)] {
    let facets = scene::grid(nx, ny, 1.0, 0.1);
    let prob = BvhBuilder::build(&facets, &BuildConfig::new(SplitMethod::ProbSplit, 1)).unwrap();
    let counts = BvhBuilder::build(&facets, &BuildConfig::new(SplitMethod::EqualCounts, 1)).unwrap();
    assert_eq!(leaf_sets(&prob), leaf_sets(&counts), "{nx}x{ny}");
    assert_eq!(prob.build_stats().max_depth, counts.build_stats().max_depth);
  }
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_queries_share_counters() {
  let facets = scene::grid(16, 16, 1.0, 0.0);
  let bvh = Arc::new(BvhBuilder::build(&facets, &BuildConfig::new(SplitMethod::Hlbvh, 2)).unwrap());
  let threads = 8;
  let per_thread = 256;

  thread::scope(|s| {
    for t in 0..threads {
      let bvh = Arc::clone(&bvh);
      s.spawn(move || {
        let mut acc = StatsAccumulator::for_tree(&bvh);
        for i in 0..per_thread {
          let x = (i % 16) as f64 + 0.5;
          let y = ((i / 16 + t) % 16) as f64 + 0.5;
          let ray = Ray::new(DVec3::new(x, y, 4.0), DVec3::NEG_Z);
          // Half the threads use the shared sink, half flush locally.
          let hit = if t % 2 == 0 {
            BvhTraverser::intersect(&bvh, &ray).unwrap()
          } else {
            BvhTraverser::intersect_with(&bvh, &ray, &mut acc).unwrap()
          };
          let hit = hit.expect("every cell is covered");
          assert_eq!(hit.facet_id, ((i / 16 + t) % 16 * 16 + i % 16) as u32);
        }
        bvh.flush(&mut acc);
      });
    }
  });

  let snapshot = bvh.snapshot();
  assert_eq!(snapshot.total_hits(), (threads * per_thread) as u64);
  assert_eq!(snapshot.nodes[0].nb_checks, (threads * per_thread) as u64);
  let probabilities = snapshot.hit_probabilities().unwrap();
  assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn registry_serves_workers_during_async_rebuild() {
  let mut registry = BvhRegistry::new();
  let floor = registry.add_structure("floor");
  registry.rebuild(floor, scene::grid(8, 8, 1.0, 0.0), &BuildConfig::default()).unwrap();
  let tree = registry.tree(floor).unwrap();

  registry
    .start_rebuild(floor, scene::grid(8, 8, 1.0, 0.0), &BuildConfig::new(SplitMethod::Hlbvh, 1))
    .unwrap();
  // Workers keep querying the tree they were handed.
  let handles: Vec<_> = (0..4)
    .map(|k| {
      let tree = Arc::clone(&tree);
      thread::spawn(move || {
        let ray = Ray::new(DVec3::new(k as f64 + 0.5, 0.5, 1.0), DVec3::NEG_Z);
        BvhTraverser::intersect(&tree, &ray).unwrap().map(|h| h.facet_id)
      })
    })
    .collect();
  for (k, handle) in handles.into_iter().enumerate() {
    assert_eq!(handle.join().unwrap(), Some(k as u32));
  }

  registry.wait_rebuild(floor).unwrap();
  let rebuilt = registry.tree(floor).unwrap();
  assert_ne!(rebuilt.id(), tree.id());
  let hit = registry.query(QueryTarget::All, &Ray::new(DVec3::new(7.5, 7.5, 1.0), DVec3::NEG_Z)).unwrap();
  assert_eq!(hit.map(|h| h.hit.facet_id), Some(63));
}
