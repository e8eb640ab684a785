// Block chunk tags and their byte layouts.
//
// The first byte of every chunk splits into its 2 low bits (the tag) and its
// 6 high bits (m):
//
//   - Literal (0): if m < 60 the next 1 + m bytes are literal. Otherwise the
//     next m - 59 bytes hold n little-endian and 1 + n literal bytes follow.
//   - Copy1 (1): length 4 + (m & 7), offset bits 8..11 in m >> 3, offset bits
//     0..8 in the next byte.
//   - Copy2 (2): length 1 + m, offset in the next 2 bytes little-endian.
//   - Copy4 (3): legacy 4-byte offset form, rejected by this implementation.

use crate::error::{Error, Result};

pub const TAG_LITERAL: u8 = 0x00;
pub const TAG_COPY1: u8 = 0x01;
pub const TAG_COPY2: u8 = 0x02;
pub const TAG_COPY4: u8 = 0x03;

/// Minimum length of a copy the encoder will emit.
pub const MIN_MATCH: usize = 4;

/// Largest offset representable by the 2-byte copy form (exclusive).
pub const COPY1_MAX_OFFSET: usize = 1 << 11;

/// Longest copy a single Copy2 chunk carries.
pub const COPY2_MAX_LEN: usize = 64;

/// Worst-case size of an encoded literal header (tag + 4 length bytes).
pub const MAX_LITERAL_HEADER: usize = 5;

/// One decoded chunk of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk<'a> {
    Literal(&'a [u8]),
    Copy { offset: usize, len: usize },
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Append a literal chunk carrying `lit` to `dst`. `lit` must be non-empty.
pub fn emit_literal(dst: &mut Vec<u8>, lit: &[u8]) {
    debug_assert!(!lit.is_empty());
    dst.reserve(MAX_LITERAL_HEADER + lit.len());
    let n = lit.len() - 1;
    if n < 60 {
        dst.push(((n as u8) << 2) | TAG_LITERAL);
    } else if n < 1 << 8 {
        dst.extend_from_slice(&[(60 << 2) | TAG_LITERAL, n as u8]);
    } else if n < 1 << 16 {
        dst.push((61 << 2) | TAG_LITERAL);
        dst.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n < 1 << 24 {
        dst.push((62 << 2) | TAG_LITERAL);
        dst.extend_from_slice(&(n as u32).to_le_bytes()[..3]);
    } else {
        dst.push((63 << 2) | TAG_LITERAL);
        dst.extend_from_slice(&(n as u32).to_le_bytes());
    }
    dst.extend_from_slice(lit);
}

/// Append one or more copy chunks reproducing `len` bytes from `offset`
/// bytes back.
///
/// Requires `1 <= offset <= 65535` and `4 <= len`.
///
/// Lengths of 68 and above are peeled off 64 at a time. A remainder in
/// 65..=67 is split as 60 + (5..=7) so the tail still fits the 2-byte form
/// instead of leaving a 1..=3 byte tail that would need 3 bytes.
pub fn emit_copy(dst: &mut Vec<u8>, offset: usize, mut len: usize) {
    debug_assert!((1..=u16::MAX as usize).contains(&offset));
    debug_assert!(len >= MIN_MATCH);
    let [lo, hi] = (offset as u16).to_le_bytes();

    while len >= 68 {
        dst.extend_from_slice(&[(63 << 2) | TAG_COPY2, lo, hi]);
        len -= 64;
    }
    if len > 64 {
        dst.extend_from_slice(&[(59 << 2) | TAG_COPY2, lo, hi]);
        len -= 60;
    }
    if len >= 12 || offset >= COPY1_MAX_OFFSET {
        dst.extend_from_slice(&[(((len - 1) as u8) << 2) | TAG_COPY2, lo, hi]);
        return;
    }
    dst.extend_from_slice(&[(hi << 5) | (((len - 4) as u8) << 2) | TAG_COPY1, lo]);
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the chunk at the front of `src`.
///
/// Returns the chunk and the number of input bytes it occupies. Only the
/// chunk's own bytes are validated here; offsets are checked against the
/// output by the decoder.
pub fn parse_chunk(src: &[u8]) -> Result<(Chunk<'_>, usize)> {
    let Some(&tag) = src.first() else {
        return Err(Error::Corrupt("missing chunk tag"));
    };
    match tag & 0x03 {
        TAG_LITERAL => {
            let m = (tag >> 2) as usize;
            let (n, header) = if m < 60 {
                (m, 1)
            } else {
                let extra = m - 59;
                let bytes = src
                    .get(1..1 + extra)
                    .ok_or(Error::Corrupt("truncated literal length"))?;
                let mut le = [0u8; 4];
                le[..extra].copy_from_slice(bytes);
                (u32::from_le_bytes(le) as usize, 1 + extra)
            };
            let len = n
                .checked_add(1)
                .ok_or(Error::Corrupt("literal length overflow"))?;
            let end = header
                .checked_add(len)
                .ok_or(Error::Corrupt("literal length overflow"))?;
            let lit = src
                .get(header..end)
                .ok_or(Error::Corrupt("literal overruns input"))?;
            Ok((Chunk::Literal(lit), end))
        }
        TAG_COPY1 => {
            let &next = src.get(1).ok_or(Error::Corrupt("truncated copy"))?;
            let len = 4 + ((tag >> 2) & 0x07) as usize;
            let offset = ((tag as usize & 0xe0) << 3) | next as usize;
            Ok((Chunk::Copy { offset, len }, 2))
        }
        TAG_COPY2 => {
            let bytes = src.get(1..3).ok_or(Error::Corrupt("truncated copy"))?;
            let len = 1 + (tag >> 2) as usize;
            let offset = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
            Ok((Chunk::Copy { offset, len }, 3))
        }
        _ => Err(Error::Unsupported(
            "legacy 4-byte offset copy tag".to_string(),
        )),
    }
}

/// Iterator over the chunks of a block body (after the length prefix).
///
/// Stops after the first error.
pub struct Chunks<'a> {
    src: &'a [u8],
    failed: bool,
}

impl<'a> Chunks<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self {
            src: body,
            failed: false,
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.src.is_empty() {
            return None;
        }
        match parse_chunk(self.src) {
            Ok((chunk, used)) => {
                self.src = &self.src[used..];
                Some(Ok(chunk))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
