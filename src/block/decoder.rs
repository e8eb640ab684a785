// Block decoder.
//
// Every length and offset read from the input is validated against the
// input remaining and the output produced so far before any byte moves, so
// arbitrary input can only ever produce an error, never an out-of-bounds
// access. The output buffer is reserved once from the declared length, and
// that length is first checked against what the input could possibly expand
// to.

use super::tag::{self, Chunk};
use crate::error::{Error, Result};
use crate::varint;

/// Default ceiling for the declared decoded length of a block.
pub const MAX_DECODED_LEN: u64 = u32::MAX as u64;

/// Upper bound on output bytes per input byte: a 3-byte Copy2 chunk yields
/// at most 64 bytes.
const MAX_EXPANSION: usize = 22;

// ---------------------------------------------------------------------------
// BlockDecoder
// ---------------------------------------------------------------------------

/// Block decoder with a configurable decoded-length ceiling.
#[derive(Debug, Clone, Copy)]
pub struct BlockDecoder {
    max_decoded_len: u64,
}

impl Default for BlockDecoder {
    fn default() -> Self {
        Self {
            max_decoded_len: MAX_DECODED_LEN,
        }
    }
}

impl BlockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder rejecting blocks that declare more than `max` decoded bytes
    /// with [`Error::TooLarge`].
    pub fn with_max_len(max: u64) -> Self {
        Self {
            max_decoded_len: max,
        }
    }

    pub fn max_decoded_len(&self) -> u64 {
        self.max_decoded_len
    }

    /// Read the declared decoded length without decoding the block.
    pub fn decoded_len(&self, src: &[u8]) -> Result<usize> {
        self.header(src).map(|(len, _)| len)
    }

    /// Decode `src` into a freshly allocated buffer.
    pub fn decode(&self, src: &[u8]) -> Result<Vec<u8>> {
        let mut dst = Vec::new();
        self.decode_into(&mut dst, src)?;
        Ok(dst)
    }

    /// Decode `src`, replacing the contents of `dst`.
    ///
    /// Returns the decoded length. On error the contents of `dst` are
    /// unspecified and must be discarded.
    pub fn decode_into(&self, dst: &mut Vec<u8>, src: &[u8]) -> Result<usize> {
        let (len, header_len) = self.header(src)?;
        let body = &src[header_len..];
        if len > body.len().saturating_mul(MAX_EXPANSION) {
            return Err(Error::Corrupt("declared length exceeds what the input can produce"));
        }

        dst.clear();
        dst.reserve(len);
        decode_body(dst, body, len)?;
        Ok(len)
    }

    /// Parse the varint prefix. Returns `(decoded_len, prefix_len)`.
    fn header(&self, src: &[u8]) -> Result<(usize, usize)> {
        let (len, n) = varint::decode(src);
        if n == 0 {
            return Err(Error::Corrupt("invalid length prefix"));
        }
        if len > self.max_decoded_len {
            return Err(Error::TooLarge {
                len,
                max: self.max_decoded_len,
            });
        }
        let len = usize::try_from(len).map_err(|_| Error::TooLarge {
            len,
            max: usize::MAX as u64,
        })?;
        Ok((len, n))
    }
}

/// Execute the chunks of `body`, appending exactly `len` bytes to `dst`.
fn decode_body(dst: &mut Vec<u8>, body: &[u8], len: usize) -> Result<()> {
    let base = dst.len();
    let mut s = 0usize;

    while s < body.len() {
        let (chunk, used) = tag::parse_chunk(&body[s..])?;
        s += used;
        let produced = dst.len() - base;

        match chunk {
            Chunk::Literal(lit) => {
                if lit.len() > len - produced {
                    return Err(Error::Corrupt("literal overruns declared length"));
                }
                dst.extend_from_slice(lit);
            }
            Chunk::Copy { offset, len: n } => {
                if offset == 0 || offset > produced {
                    return Err(Error::Corrupt("copy offset out of range"));
                }
                if n > len - produced {
                    return Err(Error::Corrupt("copy overruns declared length"));
                }
                let start = dst.len() - offset;
                if offset >= n {
                    dst.extend_from_within(start..start + n);
                } else {
                    // Overlapping copy: each byte may be one written by this
                    // same copy.
                    for i in start..start + n {
                        let b = dst[i];
                        dst.push(b);
                    }
                }
            }
        }
    }

    if dst.len() - base != len {
        return Err(Error::Corrupt("decoded length mismatch"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Convenience functions
// ---------------------------------------------------------------------------

/// Decode a block with the default length ceiling.
pub fn decode(src: &[u8]) -> Result<Vec<u8>> {
    BlockDecoder::default().decode(src)
}

/// Decode a block into `dst` (replacing its contents) with the default
/// length ceiling. Returns the decoded length.
pub fn decode_into(dst: &mut Vec<u8>, src: &[u8]) -> Result<usize> {
    BlockDecoder::default().decode_into(dst, src)
}

/// Read a block's declared decoded length.
pub fn decoded_len(src: &[u8]) -> Result<usize> {
    BlockDecoder::default().decoded_len(src)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
