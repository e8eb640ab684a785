// Variable-length unsigned integer encoding.
//
// Base-128, little-endian: least-significant group first.
// Each byte has bit 7 set except the final byte. Used for the decoded-length
// prefix of every block.

use std::io::{self, Write};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into the front of `buf`.
/// Returns the number of bytes written (1..=10).
#[inline]
pub fn encode(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = 0;
    while num >= 0x80 {
        buf[i] = (num as u8) | 0x80;
        num >>= 7;
        i += 1;
    }
    buf[i] = num as u8;
    i + 1
}

/// Append the encoding of `num` to `out`.
#[inline]
pub fn extend_u64(out: &mut Vec<u8>, num: u64) -> usize {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode(num, &mut buf);
    out.extend_from_slice(&buf[..len]);
    len
}

/// Encode a `u64` and write to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode(num, &mut buf);
    w.write_all(&buf[..len])
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a `u64` from the front of `data`.
///
/// Returns `(value, bytes_consumed)`. A consumed length of 0 means the input
/// was truncated, no terminating byte appeared within `MAX_VARINT_LEN`
/// bytes, or the value does not fit in 64 bits.
pub fn decode(data: &[u8]) -> (u64, usize) {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        // The tenth group only has room for the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return (0, 0);
        }
        val |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return (val, i + 1);
        }
    }
    (0, 0)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Return the encoded byte-length of a `u64` value without encoding it.
#[inline]
pub fn encoded_len(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    bits.max(1).div_ceil(7) as usize
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
