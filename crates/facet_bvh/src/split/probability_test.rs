use super::*;
use crate::config::BuildConfig;
use crate::split::equal_counts;
use crate::split::test_prims::{along_x, indices};

#[test]
fn test_uniform_matches_equal_counts() {
  let cfg = BuildConfig::default();
  let xs = [4.0, 0.5, 6.0, 2.0, 9.0, 1.0, 3.0];

  let mut a = along_x(&xs);
  let ctx = SplitContext::for_prims(&a, &cfg);
  let prob = prob_split(&mut a, &ctx).unwrap();

  let mut b = along_x(&xs);
  let counts = equal_counts(&mut b, &ctx).unwrap();

  assert_eq!(prob.mid, 3);
  assert_eq!(prob.mid, counts.mid);
  assert_eq!(indices(&a[..prob.mid]), indices(&b[..counts.mid]));
}

#[test]
fn test_heavy_facet_gets_its_own_side() {
  let cfg = BuildConfig::default();
  let mut prims = along_x(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
  for p in prims.iter_mut() {
    p.probability = if p.index == 0 { 0.5 } else { 0.5 / 7.0 };
  }
  let ctx = SplitContext::for_prims(&prims, &cfg);

  let split = prob_split(&mut prims, &ctx).unwrap();
  assert_eq!(split.mid, 1);
  assert_eq!(prims[0].index, 0);
  assert_eq!(split.position, 0.5);
}

#[test]
fn test_zero_probability_treated_as_uniform() {
  let cfg = BuildConfig::default();
  let mut prims = along_x(&[3.0, 2.0, 1.0, 0.0]);
  for p in prims.iter_mut() {
    p.probability = 0.0;
  }
  let ctx = SplitContext::for_prims(&prims, &cfg);

  let split = prob_split(&mut prims, &ctx).unwrap();
  assert_eq!(split.mid, 2);
  assert_eq!(indices(&prims[..2]), vec![2, 3]);
}
