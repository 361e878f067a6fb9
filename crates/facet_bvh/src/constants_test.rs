use super::*;

#[test]
fn test_morton_layout() {
  assert_eq!(MORTON_CODE_BITS, 30);
  assert_eq!(MORTON_SCALE, 1024.0);
  assert_eq!(TREELET_MASK.count_ones(), TREELET_BITS);
  // Mask covers exactly the top TREELET_BITS of the 30-bit code.
  assert_eq!(TREELET_MASK >> (MORTON_CODE_BITS - TREELET_BITS), (1 << TREELET_BITS) - 1);
  assert_eq!(TREELET_FIRST_BIT, 17);
}

#[test]
fn test_bucket_defaults_in_range() {
  assert!(DEFAULT_SAH_BUCKETS >= 2);
  assert!(DEFAULT_SAH_BUCKETS <= MAX_SAH_BUCKETS);
}

#[test]
fn test_slab_factor_is_slightly_above_one() {
  assert!(ROBUST_SLAB_FACTOR > 1.0);
  assert!(ROBUST_SLAB_FACTOR < 1.0 + 1e-12);
}
