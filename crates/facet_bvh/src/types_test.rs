use super::*;

#[test]
fn test_prepare_normalizes_direction() {
  let ray = Ray::new(DVec3::ZERO, DVec3::new(0.0, 0.0, -4.0));
  let prepared = ray.prepare().unwrap();
  assert_eq!(prepared.dir, -DVec3::Z);
  assert_eq!(prepared.dir_is_neg, [false, false, true]);
  assert_eq!(prepared.at(2.0), DVec3::new(0.0, 0.0, -2.0));
}

#[test]
fn test_zero_direction_rejected() {
  let err = Ray::new(DVec3::ZERO, DVec3::ZERO).prepare().unwrap_err();
  assert!(matches!(err, BvhError::InvalidQuery(_)));
}

#[test]
fn test_nan_direction_rejected() {
  let ray = Ray::new(DVec3::ZERO, DVec3::new(f64::NAN, 1.0, 0.0));
  assert!(matches!(ray.prepare(), Err(BvhError::InvalidQuery(_))));
}

#[test]
fn test_infinite_origin_rejected() {
  let ray = Ray::new(DVec3::new(f64::INFINITY, 0.0, 0.0), DVec3::X);
  assert!(matches!(ray.prepare(), Err(BvhError::InvalidQuery(_))));
}

#[test]
fn test_traversal_cost_total() {
  let cost = TraversalCost {
    node_tests: 5,
    facet_tests: 3,
  };
  assert_eq!(cost.total_steps(), 8);
}
