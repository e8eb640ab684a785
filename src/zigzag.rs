// Zigzag mapping between signed and unsigned 64-bit integers:
//   0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
//
// Small magnitudes of either sign map to small unsigned values, which keeps
// them short under the varint encoding. Not used by the block format itself.

/// Map a signed integer onto the unsigned zigzag domain.
#[inline]
pub fn encode_i64(i: i64) -> u64 {
    ((i << 1) ^ (i >> 63)) as u64
}

/// Inverse of [`encode_i64`].
#[inline]
pub fn decode_u64(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}
