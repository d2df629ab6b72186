use crate::constants::DIGEST_BYTES;
use crate::digest::Digest;
use crate::error::HashError;
use itertools::Itertools;
use sha2::{Digest as _, Sha256};
use std::cmp::Ordering;

#[inline(always)]
pub fn sha256_digest(attr: &[u8]) -> Result<Digest, HashError> {
    let mut out = [0u8; DIGEST_BYTES];
    out.copy_from_slice(&Sha256::digest(attr));
    Ok(Digest::from_bytes(out))
}

/// Orders two keys by UTF-16 code units, the ordering RFC 8785 mandates.
/// Differs from `str::cmp` only when a supplementary-plane character meets
/// a BMP character at or above U+E000.
#[inline]
pub fn cmp_utf16(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// Iterates the members of `om` in canonical key order.
pub fn sorted_members(
    om: &serde_json::Map<String, serde_json::Value>,
) -> impl Iterator<Item = (&String, &serde_json::Value)> {
    om.iter().sorted_by(|(a, _), (b, _)| cmp_utf16(a, b))
}

/// Renders a canonical value to its byte-exact JCS (RFC 8785) encoding.
///
/// Integers held as `i64`/`u64` are written as exact decimals; only
/// floating-point numbers take the ECMAScript form. Integers beyond 2^53
/// therefore differ from what a strict double-based JCS encoder emits.
#[inline(always)]
pub fn canonical_rep(inp: &serde_json::Value) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(inp).map_err(|e| HashError::Encoding(e.to_string()))
}
