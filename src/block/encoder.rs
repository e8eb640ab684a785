// Block encoder: greedy single-candidate match finding.
//
// The input is cut into fragments of at most 64 KiB so that every copy
// offset fits the 16-bit Copy2 field. Each fragment is scanned left to
// right; at every position the fingerprint's table slot is swapped for the
// current position and, if the previous occupant shares the fingerprint,
// the match is extended and emitted as copies. Everything else becomes
// literal runs.

use super::table::{self, MatchTable};
use super::tag::{self, MIN_MATCH};
use crate::varint;

/// Longest fragment encoded against a single table.
pub const MAX_FRAGMENT_LEN: usize = 1 << 16;

/// Bytes at the end of a fragment that are never probed for a match.
pub const INPUT_MARGIN: usize = 16 - 1;

/// Fragments shorter than this are emitted as one literal.
pub const MIN_NON_LITERAL_LEN: usize = 1 + 1 + INPUT_MARGIN;

/// Worst-case encoded size for an input of `src_len` bytes.
///
/// Returns `None` if the input, or its worst-case encoding, would not fit
/// in 32 bits.
pub fn max_encoded_len(src_len: usize) -> Option<usize> {
    let n = src_len as u64;
    if n > u64::from(u32::MAX) {
        return None;
    }
    // A 1-byte literal followed by a 5-byte copy is the costliest item:
    // 6 input bytes become 7 output bytes.
    let n = 32 + n + n / 6;
    if n > u64::from(u32::MAX) {
        return None;
    }
    usize::try_from(n).ok()
}

// ---------------------------------------------------------------------------
// BlockEncoder
// ---------------------------------------------------------------------------

/// Reusable block encoder.
///
/// Holds the match table so that encoding many blocks (one per stream frame)
/// does not reallocate it.
///
/// # Example
/// ```
/// use snapkit::block::{BlockEncoder, decode};
/// let mut enc = BlockEncoder::new();
/// let block = enc.encode(b"abcabcabcabcabcabcabcabc");
/// assert_eq!(decode(&block).unwrap(), b"abcabcabcabcabcabcabcabc");
/// ```
#[derive(Default)]
pub struct BlockEncoder {
    table: MatchTable,
}

impl BlockEncoder {
    pub fn new() -> Self {
        Self {
            table: MatchTable::new(),
        }
    }

    /// Encode `src` into a freshly allocated block.
    pub fn encode(&mut self, src: &[u8]) -> Vec<u8> {
        let mut dst = Vec::with_capacity(max_encoded_len(src.len()).unwrap_or(src.len()));
        self.encode_into(&mut dst, src);
        dst
    }

    /// Append the block encoding of `src` to `dst`.
    ///
    /// Returns the number of bytes appended, which never exceeds
    /// `max_encoded_len(src.len())`.
    pub fn encode_into(&mut self, dst: &mut Vec<u8>, src: &[u8]) -> usize {
        let start = dst.len();
        varint::extend_u64(dst, src.len() as u64);

        for fragment in src.chunks(MAX_FRAGMENT_LEN) {
            if fragment.len() < MIN_NON_LITERAL_LEN {
                tag::emit_literal(dst, fragment);
            } else {
                self.encode_fragment(dst, fragment);
            }
        }

        dst.len() - start
    }

    /// Encode one fragment. Requires
    /// `MIN_NON_LITERAL_LEN <= src.len() <= MAX_FRAGMENT_LEN`.
    fn encode_fragment(&mut self, dst: &mut Vec<u8>, src: &[u8]) {
        debug_assert!((MIN_NON_LITERAL_LEN..=MAX_FRAGMENT_LEN).contains(&src.len()));
        self.table.reset(src.len());

        let s_limit = src.len() - INPUT_MARGIN;
        let mut next_emit = 0usize;
        let mut s = 0usize;

        while s < s_limit {
            let fingerprint = table::load_u32(src, s);
            let candidate = self.table.replace(fingerprint, s);

            let Some(c) = candidate.filter(|&c| table::load_u32(src, c) == fingerprint) else {
                s += 1;
                continue;
            };

            if next_emit < s {
                tag::emit_literal(dst, &src[next_emit..s]);
            }
            let end = table::extend_match(src, c + MIN_MATCH, s + MIN_MATCH);
            tag::emit_copy(dst, s - c, end - s);

            s = end;
            next_emit = s;
            if s >= s_limit {
                break;
            }
            // The cursor jumped over the match; index the byte just behind
            // it so a repeat starting there can still be found.
            self.table.insert(table::load_u32(src, s - 1), s - 1);
        }

        if next_emit < src.len() {
            tag::emit_literal(dst, &src[next_emit..]);
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Encode `src` as a block.
pub fn encode(src: &[u8]) -> Vec<u8> {
    BlockEncoder::new().encode(src)
}

/// Append the block encoding of `src` to `dst`, returning the bytes written.
pub fn encode_into(dst: &mut Vec<u8>, src: &[u8]) -> usize {
    BlockEncoder::new().encode_into(dst, src)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
