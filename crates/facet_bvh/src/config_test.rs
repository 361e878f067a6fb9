use super::*;

#[test]
fn test_default_config_is_valid() {
  let config = BuildConfig::default();
  assert_eq!(config.split_method, SplitMethod::Sah);
  assert_eq!(config.max_prims_in_node, 4);
  assert!(config.validate().is_ok());
}

/// Every method round-trips through its canonical name.
#[test]
fn test_method_names_parse() {
  for method in SplitMethod::ALL {
    let parsed: SplitMethod = method.name().parse().unwrap();
    assert_eq!(parsed, method);
  }
  assert_eq!("sah".parse::<SplitMethod>().unwrap(), SplitMethod::Sah);
  assert_eq!(" probsplit ".parse::<SplitMethod>().unwrap(), SplitMethod::ProbSplit);
}

/// Unknown names fail instead of falling back to a default heuristic.
#[test]
fn test_unknown_method_is_config_error() {
  let err = "Octree".parse::<SplitMethod>().unwrap_err();
  assert!(matches!(err, BvhError::Config(_)));
}

#[test]
fn test_zero_prims_rejected() {
  let config = BuildConfig::new(SplitMethod::Middle, 0);
  assert!(matches!(config.validate(), Err(BvhError::Config(_))));
}

#[test]
fn test_too_many_prims_rejected() {
  let config = BuildConfig::new(SplitMethod::Middle, MAX_PRIMS_IN_NODE + 1);
  assert!(matches!(config.validate(), Err(BvhError::Config(_))));

  let config = BuildConfig::new(SplitMethod::Middle, MAX_PRIMS_IN_NODE);
  assert!(config.validate().is_ok());
}

#[test]
fn test_sah_params_rejected() {
  let mut config = BuildConfig::default();
  config.sah.bucket_count = 1;
  assert!(config.validate().is_err());

  let mut config = BuildConfig::default();
  config.sah.traversal_cost = 0.0;
  assert!(config.validate().is_err());

  let mut config = BuildConfig::default();
  config.sah.intersection_cost = f64::NAN;
  assert!(config.validate().is_err());
}

#[test]
fn test_probability_weight_range() {
  let mut config = BuildConfig::new(SplitMethod::MolflowSplit, 2);
  config.probability_weight = 1.5;
  assert!(config.validate().is_err());

  config.probability_weight = 0.0;
  assert!(config.validate().is_ok());
  config.probability_weight = 1.0;
  assert!(config.validate().is_ok());
}

#[test]
fn test_uses_hit_probability() {
  assert!(SplitMethod::MolflowSplit.uses_hit_probability());
  assert!(SplitMethod::ProbSplit.uses_hit_probability());
  assert!(!SplitMethod::Sah.uses_hit_probability());
  assert!(!SplitMethod::Hlbvh.uses_hit_probability());
}
