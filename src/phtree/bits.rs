//! Bit manipulation on fixed-width keys.

/// Width of every key component.
pub(crate) const KEY_BITS: u32 = 64;

/// Bits strictly above `bit`.
#[inline]
pub(crate) const fn mask_above(bit: u32) -> u64 {
    if bit >= KEY_BITS - 1 { 0 } else { !0u64 << (bit + 1) }
}

/// Bits at and below `bit`.
#[inline]
pub(crate) const fn mask_at_and_below(bit: u32) -> u64 {
    !mask_above(bit)
}

/// Hypercube address of `key` at `bit`: one bit per dimension, dimension 0
/// most significant.
#[inline]
pub(crate) fn hc_address(key: &[u64], bit: u32) -> u64 {
    key.iter().fold(0, |hc, &k| (hc << 1) | ((k >> bit) & 1))
}

/// Highest bit at which any component of `a` and `b` differs.
#[inline]
pub(crate) fn highest_difference(a: &[u64], b: &[u64]) -> Option<u32> {
    a.iter()
        .zip(b)
        .map(|(x, y)| x ^ y)
        .filter(|&diff| diff != 0)
        .map(|diff| KEY_BITS - 1 - diff.leading_zeros())
        .max()
}

/// Whether `a` and `b` agree on every bit above `bit`.
#[inline]
pub(crate) fn same_prefix(a: &[u64], b: &[u64], bit: u32) -> bool {
    let mask = mask_above(bit);
    a.iter().zip(b).all(|(x, y)| (x ^ y) & mask == 0)
}

/// Order preserving encoding of an `f64` as an unsigned key component.
///
/// `-0.0` sorts directly before `0.0` and stays a distinct key.
#[inline]
pub fn f64_to_key(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 { !bits } else { bits | (1 << 63) }
}

/// Inverse of [`f64_to_key`].
#[inline]
pub fn key_to_f64(key: u64) -> f64 {
    if key >> 63 == 1 { f64::from_bits(key & !(1 << 63)) } else { f64::from_bits(!key) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks() {
        assert_eq!(mask_above(63), 0);
        assert_eq!(mask_above(0), !1);
        assert_eq!(mask_at_and_below(3), 0b1111);
        assert_eq!(mask_at_and_below(63), !0);
    }

    #[test]
    fn test_hc_address() {
        let key = [0b10, 0b01, 0b11];
        assert_eq!(hc_address(&key, 1), 0b101);
        assert_eq!(hc_address(&key, 0), 0b011);
    }

    #[test]
    fn test_highest_difference() {
        assert_eq!(highest_difference(&[1, 8], &[1, 8]), None);
        assert_eq!(highest_difference(&[1, 8], &[0, 12]), Some(2));
        assert_eq!(highest_difference(&[u64::MAX], &[0]), Some(63));
        assert!(same_prefix(&[0b1100], &[0b1111], 1));
        assert!(!same_prefix(&[0b1100], &[0b1111], 0));
    }

    #[test]
    fn test_f64_encoding_preserves_order() {
        let values =
            [f64::NEG_INFINITY, -1e300, -2.5, -1.0, -f64::MIN_POSITIVE, -0.0, 0.0, 1e-300, 1.0, 2.5, 1e300, f64::INFINITY];
        for pair in values.windows(2) {
            assert!(f64_to_key(pair[0]) < f64_to_key(pair[1]), "{} !< {}", pair[0], pair[1]);
        }
        for v in values {
            assert_eq!(key_to_f64(f64_to_key(v)).to_bits(), v.to_bits());
        }
    }
}
