// Stream- and file-level helpers around `StreamWriter` / `StreamReader`.
//
// Provides `compress_stream()` / `decompress_stream()` for arbitrary readers
// and writers, and `compress_file()` / `decompress_file()` which add buffered
// file handles. With the `file-io` feature a SHA-256 of the uncompressed data
// is computed as it flows through.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::error::Result;
use crate::frame::{StreamReader, StreamWriter};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by the compress / decompress helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct StreamStats {
    /// Bytes read from the input.
    pub bytes_in: u64,
    /// Bytes written to the output.
    pub bytes_out: u64,
    /// Data frames written or read.
    pub frames: u64,
    /// Data frames stored compressed.
    pub compressed_frames: u64,
    /// SHA-256 of the uncompressed data (if `file-io` feature is enabled).
    #[cfg_attr(feature = "cli", serde(serialize_with = "serialize_digest"))]
    pub sha256: Option<[u8; 32]>,
}

impl StreamStats {
    /// Output size over input size, or `None` for empty input.
    pub fn ratio(&self) -> Option<f64> {
        (self.bytes_in > 0).then(|| self.bytes_out as f64 / self.bytes_in as f64)
    }

    /// Lowercase hex of the SHA-256 digest, when computed.
    pub fn sha256_hex(&self) -> Option<String> {
        self.sha256.as_ref().map(|d| to_hex(d))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(feature = "cli")]
fn serialize_digest<S: serde::Serializer>(
    digest: &Option<[u8; 32]>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match digest {
        Some(d) => s.serialize_some(&to_hex(d)),
        None => s.serialize_none(),
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Compress everything from `reader` into a framed stream on `writer`.
pub fn compress_stream<R: Read, W: Write>(mut reader: R, writer: W) -> Result<StreamStats> {
    let mut encoder = StreamWriter::new(writer);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        #[cfg(feature = "file-io")]
        hasher.update(&buf[..n]);
        encoder.write_all(&buf[..n])?;
    }
    encoder.close()?;

    #[cfg(feature = "file-io")]
    let sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let sha256: Option<[u8; 32]> = None;

    Ok(StreamStats {
        bytes_in: encoder.bytes_in(),
        bytes_out: encoder.bytes_out(),
        frames: encoder.frames_written(),
        compressed_frames: encoder.compressed_frames(),
        sha256,
    })
}

/// Decompress a framed stream from `reader` onto `writer`.
///
/// Output already written when a corrupt frame is found stays written; the
/// error is returned without flushing `writer`.
pub fn decompress_stream<R: Read, W: Write>(reader: R, mut writer: W) -> Result<StreamStats> {
    let mut decoder = StreamReader::new(reader);

    #[cfg(feature = "file-io")]
    let mut hasher = sha2::Sha256::new();

    while let Some(frame) = decoder.read_frame()? {
        #[cfg(feature = "file-io")]
        hasher.update(frame);
        writer.write_all(frame)?;
    }
    writer.flush()?;

    #[cfg(feature = "file-io")]
    let sha256 = Some(hasher.finalize().into());
    #[cfg(not(feature = "file-io"))]
    let sha256: Option<[u8; 32]> = None;

    Ok(StreamStats {
        bytes_in: decoder.bytes_in(),
        bytes_out: decoder.bytes_out(),
        frames: decoder.frames_read(),
        compressed_frames: decoder.compressed_frames(),
        sha256,
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Compress `input_path` into a new framed file at `output_path`.
pub fn compress_file(input_path: &Path, output_path: &Path) -> Result<StreamStats> {
    let input = BufReader::with_capacity(BUF_SIZE, File::open(input_path)?);
    let mut output = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    let stats = compress_stream(input, &mut output)?;
    output.flush()?;
    Ok(stats)
}

/// Decompress the framed file at `input_path` into `output_path`.
pub fn decompress_file(input_path: &Path, output_path: &Path) -> Result<StreamStats> {
    let input = BufReader::with_capacity(BUF_SIZE, File::open(input_path)?);
    let mut output = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    let stats = decompress_stream(input, &mut output)?;
    output.flush()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
