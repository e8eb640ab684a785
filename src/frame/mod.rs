// Stream framing: a sequence of typed, length-prefixed frames carrying
// checksummed blocks.
//
// Every frame starts with a 4-byte header: one type byte followed by the
// payload length as a 24-bit little-endian integer. The stream opens with a
// fixed identifier frame. Data frames carry a 4-byte masked CRC-32C of the
// uncompressed bytes followed by either a block (compressed) or the raw bytes
// (uncompressed).
//
// This module provides:
// - Frame constants and header parsing (`FrameType`, `FrameHeader`)
// - Masked CRC-32C checksums (`checksum`)
// - A process-wide scratch buffer pool (`pool`)
// - An `io::Write` stream encoder (`writer`)
// - An `io::Read` stream decoder (`reader`)

pub mod checksum;
pub mod pool;
pub mod reader;
pub mod writer;

pub use pool::{BufferPool, PooledBuffer};
pub use reader::StreamReader;
pub use writer::{StreamWriter, WriterState};

/// Maximum uncompressed bytes carried by one data frame.
pub const MAX_BLOCK_LEN: usize = 65536;

/// Worst-case encoded size of a `MAX_BLOCK_LEN` block.
pub const MAX_ENCODED_BLOCK_LEN: usize = 76490;

/// Size of the masked checksum at the front of every data frame payload.
pub const CHECKSUM_LEN: usize = 4;

/// Size of a frame header (type + 24-bit length).
pub const HEADER_LEN: usize = 4;

/// Capacity of a scratch buffer able to hold a whole encoded frame.
pub const MAX_BUFFER_LEN: usize = MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN + HEADER_LEN;

/// Largest payload length a frame header can express.
pub const MAX_FRAME_LEN: usize = (1 << 24) - 1;

/// Body of the stream identifier frame.
pub const MAGIC_BODY: &[u8; 6] = b"sNaPpY";

/// The complete stream identifier frame.
pub const STREAM_MARKER: [u8; 10] = [0xff, 0x06, 0x00, 0x00, b's', b'N', b'a', b'P', b'p', b'Y'];

const TYPE_COMPRESSED: u8 = 0x00;
const TYPE_UNCOMPRESSED: u8 = 0x01;
const TYPE_PADDING: u8 = 0xfe;
const TYPE_STREAM_IDENTIFIER: u8 = 0xff;

// ---------------------------------------------------------------------------
// Frame header
// ---------------------------------------------------------------------------

/// Classification of a frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// 0x00: checksum + block.
    Compressed,
    /// 0x01: checksum + raw bytes.
    Uncompressed,
    /// 0x02..=0x7f: reserved; a reader must not skip these.
    Reserved(u8),
    /// 0x80..=0xfd: reserved; skipped by readers.
    Skippable(u8),
    /// 0xfe: padding, skipped by readers.
    Padding,
    /// 0xff: stream identifier.
    StreamIdentifier,
}

impl FrameType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            TYPE_COMPRESSED => Self::Compressed,
            TYPE_UNCOMPRESSED => Self::Uncompressed,
            0x02..=0x7f => Self::Reserved(b),
            0x80..=0xfd => Self::Skippable(b),
            TYPE_PADDING => Self::Padding,
            TYPE_STREAM_IDENTIFIER => Self::StreamIdentifier,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Compressed => TYPE_COMPRESSED,
            Self::Uncompressed => TYPE_UNCOMPRESSED,
            Self::Reserved(b) | Self::Skippable(b) => b,
            Self::Padding => TYPE_PADDING,
            Self::StreamIdentifier => TYPE_STREAM_IDENTIFIER,
        }
    }

    /// Whether a reader discards frames of this type.
    pub fn is_skippable(self) -> bool {
        matches!(self, Self::Skippable(_) | Self::Padding)
    }
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    /// Payload length in bytes, excluding the header itself.
    pub len: usize,
}

impl FrameHeader {
    pub fn new(frame_type: FrameType, len: usize) -> Self {
        debug_assert!(len <= MAX_FRAME_LEN);
        Self { frame_type, len }
    }

    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let [ty, a, b, c] = *bytes;
        Self {
            frame_type: FrameType::from_byte(ty),
            len: u32::from_le_bytes([a, b, c, 0]) as usize,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let [a, b, c, _] = (self.len as u32).to_le_bytes();
        [self.frame_type.to_byte(), a, b, c]
    }
}
