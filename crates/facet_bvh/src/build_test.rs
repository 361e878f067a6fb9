use glam::DVec3;

use super::*;
use crate::scene;
use crate::test_utils::{check_invariants, cube_corner};
use crate::tree::BvhState;

#[test]
fn test_empty_input_builds_empty_tree() {
  let bvh = BvhBuilder::build(&[], &BuildConfig::default()).unwrap();
  assert!(bvh.is_empty());
  assert_eq!(bvh.state(), BvhState::Ready);
  assert_eq!(bvh.build_stats().node_count, 0);
  assert!(bvh.bounds().is_empty());
}

#[test]
fn test_degenerate_facets_are_excluded() {
  let facets = vec![
    Facet::triangle(0, DVec3::ZERO, DVec3::X, DVec3::X * 2.0),
    Facet::new(1, [DVec3::ZERO, DVec3::X]),
    Facet::triangle(2, DVec3::ZERO, DVec3::X, DVec3::Y),
  ];
  let bvh = BvhBuilder::build(&facets, &BuildConfig::default()).unwrap();
  assert_eq!(bvh.excluded(), &[0, 1]);
  assert_eq!(bvh.build_stats().excluded_facets, 2);
  assert_eq!(bvh.facet_levels(), &[None, None, Some(0)]);
  check_invariants(&bvh);
}

#[test]
fn test_all_degenerate_is_empty_ready() {
  let facets = vec![Facet::new(0, [DVec3::ZERO, DVec3::ZERO, DVec3::ZERO])];
  let bvh = BvhBuilder::build(&facets, &BuildConfig::default()).unwrap();
  assert!(bvh.is_empty());
  assert_eq!(bvh.state(), BvhState::Ready);
}

#[test]
fn test_invalid_config_fails_fast() {
  let config = BuildConfig::new(SplitMethod::Sah, 0);
  let err = BvhBuilder::build(&scene::grid(2, 2, 1.0, 0.0), &config).unwrap_err();
  assert!(matches!(err, BvhError::Config(_)));
}

#[test]
fn test_cube_corner_middle_split() {
  let config = BuildConfig::new(SplitMethod::Middle, 1);
  let bvh = BvhBuilder::build(&cube_corner(), &config).unwrap();

  let stats = bvh.build_stats();
  assert_eq!(stats.node_count, 3);
  assert_eq!(stats.internal_count, 1);
  assert_eq!(stats.leaf_count, 2);
  for node in bvh.nodes().iter().filter(|n| n.is_leaf()) {
    assert_eq!(bvh.leaf_facets(node).len(), 1);
    assert_eq!(node.level, 1);
  }
  check_invariants(&bvh);
}

#[test]
fn test_every_method_respects_leaf_size() {
  let facets = scene::grid(12, 9, 1.0, 0.25);
  for method in SplitMethod::ALL {
    for max_prims in [1, 3, 8] {
      let config = BuildConfig::new(method, max_prims);
      let bvh = BvhBuilder::build(&facets, &config).unwrap();
      check_invariants(&bvh);
      for node in bvh.nodes().iter().filter(|n| n.is_leaf()) {
        assert!(node.nb_prim as usize <= max_prims, "{method} leaf of {}", node.nb_prim);
      }
      assert_eq!(bvh.nodes()[0].nb_prim as usize, facets.len());
    }
  }
}

#[test]
fn test_coincident_centroids_terminate() {
  // Stacked copies of the same square share one centroid.
  let facets: Vec<Facet> = (0..17)
    .map(|id| Facet::quad(id, DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y))
    .collect();
  for method in SplitMethod::ALL {
    let bvh = BvhBuilder::build(&facets, &BuildConfig::new(method, 2)).unwrap();
    check_invariants(&bvh);
    assert!(bvh.nodes().iter().all(|n| !n.is_leaf() || n.nb_prim <= 2));
  }
}

#[test]
fn test_geometric_spacing_still_reaches_leaf_size() {
  // Middle peels one facet per level here, far past the depth limit.
  let facets: Vec<Facet> = (0..120)
    .map(|i| {
      let x = 2f64.powi(i);
      Facet::triangle(i as u32, DVec3::new(x, 0.0, 0.0), DVec3::new(x, 1.0, 0.0), DVec3::new(x, 0.0, 1.0))
    })
    .collect();
  for method in SplitMethod::ALL {
    let bvh = BvhBuilder::build(&facets, &BuildConfig::new(method, 1)).unwrap();
    check_invariants(&bvh);
    assert!(bvh.excluded().is_empty());
    for node in bvh.nodes().iter().filter(|n| n.is_leaf()) {
      assert_eq!(node.nb_prim, 1, "{method} leaf of {}", node.nb_prim);
    }
    if method == SplitMethod::Middle {
      assert!(bvh.build_stats().max_depth >= MAX_BUILD_DEPTH);
    }
  }
}

#[test]
fn test_build_is_deterministic() {
  let facets = scene::tube(12, 20, 1.0, 15.0, true);
  for method in SplitMethod::ALL {
    let config = BuildConfig::new(method, 4);
    let a = BvhBuilder::build(&facets, &config).unwrap();
    let b = BvhBuilder::build(&facets, &config).unwrap();
    assert_eq!(a.nodes(), b.nodes(), "{method}");
    assert_eq!(a.facet_order(), b.facet_order(), "{method}");
    assert_ne!(a.id(), b.id());
  }
}

#[test]
fn test_cancelled_build_reports_abort() {
  let cancel = CancelToken::new();
  cancel.cancel();
  let facets = scene::grid(4, 4, 1.0, 0.0);
  let err = BvhBuilder::build_with(&facets, &BuildConfig::default(), None, Some(&cancel)).unwrap_err();
  assert_eq!(err, BvhError::PartialBuildAborted);
}

#[test]
fn test_probabilities_normalized() {
  let facets = scene::grid(2, 2, 1.0, 0.0);
  let p = normalized_probabilities(&facets, Some(&[1.0, 1.0, 2.0, 0.0][..]));
  assert_eq!(p, vec![0.25, 0.25, 0.5, 0.0]);

  let uniform = vec![0.25; 4];
  assert_eq!(normalized_probabilities(&facets, None), uniform);
  assert_eq!(normalized_probabilities(&facets, Some(&[1.0, 2.0][..])), uniform);
  assert_eq!(normalized_probabilities(&facets, Some(&[0.0; 4][..])), uniform);
  assert_eq!(
    normalized_probabilities(&facets, Some(&[f64::NAN, -1.0, 0.0, 0.0][..])),
    uniform
  );
}

#[test]
fn test_probabilities_skip_degenerate() {
  let mut facets = scene::grid(3, 1, 1.0, 0.0);
  facets.push(Facet::new(9, [DVec3::ZERO, DVec3::X]));
  let p = normalized_probabilities(&facets, None);
  assert_eq!(p[3], 0.0);
  assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
}

#[test]
fn test_build_stats_shape() {
  let facets = scene::grid(8, 8, 1.0, 0.0);
  let bvh = BvhBuilder::build(&facets, &BuildConfig::new(SplitMethod::EqualCounts, 4)).unwrap();
  let stats = bvh.build_stats();
  // 64 facets halved down to leaves of 4.
  assert_eq!(stats.leaf_count, 16);
  assert_eq!(stats.internal_count, 15);
  assert_eq!(stats.max_depth, 4);
  assert_eq!(stats.avg_leaf_size, 4.0);
}
