//! Constant-time byte comparison.
//!
//! Both functions examine every byte of their inputs regardless of where the
//! first difference is, so the running time reveals nothing about how much
//! of a secret a guess got right.

use subtle::{Choice, ConstantTimeEq};

/// Compares two values whose length is public.
///
/// A length mismatch returns early. Use this when every valid value has the
/// same well-known length, as with a hex-encoded MAC.
pub fn eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Compares two values whose length is itself secret.
///
/// Both operands are zero-padded to the longer length before the byte
/// comparison, and the result is then combined with a separate length check.
/// Without that second check `"abc"` and `"abc\0"` would compare equal.
pub fn eq_padded(a: &[u8], b: &[u8]) -> bool {
    let width = a.len().max(b.len());
    let mut left = vec![0u8; width];
    let mut right = vec![0u8; width];
    left[..a.len()].copy_from_slice(a);
    right[..b.len()].copy_from_slice(b);

    let bytes_match: Choice = left.ct_eq(&right);
    let lengths_match: Choice = (a.len() as u64).ct_eq(&(b.len() as u64));
    (bytes_match & lengths_match).into()
}
