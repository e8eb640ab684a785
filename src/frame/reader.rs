// Streaming frame decoder.
//
// Frames are pulled from the source one at a time; only the current frame's
// payload and decoded bytes are held in memory. Skippable frames are
// discarded by streaming them into a sink, and are held to the same payload
// limit as compressed frames.
//
// Any failure is terminal: the error is stored and every later call returns
// an equivalent error without touching the source again.

use std::io::{self, Read};

use log::{debug, trace, warn};

use super::checksum;
use super::{
    CHECKSUM_LEN, FrameHeader, FrameType, HEADER_LEN, MAGIC_BODY, MAX_BLOCK_LEN,
    MAX_ENCODED_BLOCK_LEN,
};
use crate::block::BlockDecoder;
use crate::error::{Error, ErrorKind, Result};

/// Decompresses a framed stream read from `R`.
///
/// # Example
/// ```
/// use std::io::{Read, Write};
/// use snapkit::frame::{StreamReader, StreamWriter};
///
/// let mut w = StreamWriter::new(Vec::new());
/// w.write_all(b"round trip").unwrap();
/// let framed = w.into_inner().unwrap();
///
/// let mut out = Vec::new();
/// StreamReader::new(framed.as_slice()).read_to_end(&mut out).unwrap();
/// assert_eq!(out, b"round trip");
/// ```
pub struct StreamReader<R: Read> {
    inner: R,
    decoder: BlockDecoder,
    verify: bool,
    /// Stream identifier seen.
    started: bool,
    /// Clean end of stream reached.
    finished: bool,
    failed: Option<Error>,
    /// Compressed body of the current frame.
    scratch: Vec<u8>,
    /// Uncompressed bytes of the current frame.
    data: Vec<u8>,
    /// Read position within `data`.
    pos: usize,
    bytes_in: u64,
    bytes_out: u64,
    frames_read: u64,
    compressed_frames: u64,
    frames_skipped: u64,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: BlockDecoder::with_max_len(MAX_BLOCK_LEN as u64),
            verify: true,
            started: false,
            finished: false,
            failed: None,
            scratch: Vec::new(),
            data: Vec::with_capacity(MAX_BLOCK_LEN),
            pos: 0,
            bytes_in: 0,
            bytes_out: 0,
            frames_read: 0,
            compressed_frames: 0,
            frames_skipped: 0,
        }
    }

    /// Enable or disable checksum verification (enabled by default).
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Framed bytes consumed from the source so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Uncompressed bytes decoded so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Data frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Data frames that were stored compressed.
    pub fn compressed_frames(&self) -> u64 {
        self.compressed_frames
    }

    /// Padding and reserved-skippable frames discarded so far.
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Decode the next data frame and return its bytes, or `None` at the end
    /// of the stream.
    ///
    /// Bytes of the current frame not yet consumed through [`Read`] are
    /// discarded.
    pub fn read_frame(&mut self) -> Result<Option<&[u8]>> {
        if self.advance()? {
            self.pos = self.data.len();
            Ok(Some(&self.data))
        } else {
            Ok(None)
        }
    }

    /// Load the next data frame into `data`, recording any failure.
    fn advance(&mut self) -> Result<bool> {
        if let Some(err) = &self.failed {
            return Err(err.duplicate());
        }
        if self.finished {
            return Ok(false);
        }
        match self.next_frame() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.finished = true;
                debug!(
                    "stream ended: {} frames, {} bytes, {} skipped",
                    self.frames_read, self.bytes_out, self.frames_skipped
                );
                Ok(false)
            }
            Err(e) => {
                if e.kind() == ErrorKind::Io {
                    debug!("stream read failed: {e}");
                } else {
                    warn!("rejecting stream after {} frames: {e}", self.frames_read);
                }
                self.failed = Some(e.duplicate());
                self.data.clear();
                self.pos = 0;
                Err(e)
            }
        }
    }

    /// Returns `false` at a clean end of stream.
    fn next_frame(&mut self) -> Result<bool> {
        loop {
            let Some(header) = self.read_header()? else {
                return Ok(false);
            };
            if !self.started && header.frame_type != FrameType::StreamIdentifier {
                return Err(Error::Corrupt("stream does not start with an identifier frame"));
            }
            trace!("frame {:?}: {} byte payload", header.frame_type, header.len);

            match header.frame_type {
                FrameType::StreamIdentifier => {
                    if header.len != MAGIC_BODY.len() {
                        return Err(Error::Corrupt("bad stream identifier length"));
                    }
                    let mut body = [0u8; 6];
                    self.read_payload(&mut body)?;
                    if &body != MAGIC_BODY {
                        return Err(Error::Corrupt("bad stream identifier"));
                    }
                    self.started = true;
                }
                FrameType::Compressed => {
                    if header.len < CHECKSUM_LEN
                        || header.len > MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN
                    {
                        return Err(Error::Corrupt("bad compressed frame length"));
                    }
                    let expected = self.read_checksum()?;
                    let mut body = std::mem::take(&mut self.scratch);
                    body.resize(header.len - CHECKSUM_LEN, 0);
                    let read = self.read_payload(&mut body);
                    let decoded = read.and_then(|()| self.decode_block(&body));
                    self.scratch = body;
                    decoded?;
                    self.finish_data_frame(expected)?;
                    self.compressed_frames += 1;
                    return Ok(true);
                }
                FrameType::Uncompressed => {
                    if header.len < CHECKSUM_LEN || header.len - CHECKSUM_LEN > MAX_BLOCK_LEN {
                        return Err(Error::Corrupt("bad uncompressed frame length"));
                    }
                    let expected = self.read_checksum()?;
                    let mut data = std::mem::take(&mut self.data);
                    data.clear();
                    data.resize(header.len - CHECKSUM_LEN, 0);
                    let read = self.read_payload(&mut data);
                    self.data = data;
                    read?;
                    self.finish_data_frame(expected)?;
                    return Ok(true);
                }
                FrameType::Reserved(b) => {
                    return Err(Error::Unsupported(format!(
                        "reserved unskippable frame type {b:#04x}"
                    )));
                }
                FrameType::Padding | FrameType::Skippable(_) => {
                    if header.len > MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN {
                        return Err(Error::Unsupported(format!(
                            "skippable frame of {} bytes exceeds the frame limit",
                            header.len
                        )));
                    }
                    self.skip_payload(header.len)?;
                    self.frames_skipped += 1;
                    debug!("skipped {:?} frame of {} bytes", header.frame_type, header.len);
                }
            }
        }
    }

    /// Decode a compressed body into `data`. Any block-level failure inside
    /// a frame is reported as corruption of the stream.
    fn decode_block(&mut self, body: &[u8]) -> Result<()> {
        match self.decoder.decode_into(&mut self.data, body) {
            Ok(_) => Ok(()),
            Err(Error::TooLarge { .. }) => {
                Err(Error::Corrupt("compressed frame exceeds block size"))
            }
            Err(Error::Unsupported(_)) => {
                Err(Error::Corrupt("compressed frame uses an unsupported chunk"))
            }
            Err(e) => Err(e),
        }
    }

    fn finish_data_frame(&mut self, expected: u32) -> Result<()> {
        if self.verify {
            checksum::verify(expected, &self.data)?;
        }
        self.pos = 0;
        self.frames_read += 1;
        self.bytes_out += self.data.len() as u64;
        Ok(())
    }

    /// Read a frame header. `None` means the source ended exactly at a frame
    /// boundary.
    fn read_header(&mut self) -> Result<Option<FrameHeader>> {
        let mut buf = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.bytes_in += filled as u64;
        match filled {
            0 => Ok(None),
            HEADER_LEN => Ok(Some(FrameHeader::parse(&buf))),
            _ => Err(Error::Corrupt("truncated frame header")),
        }
    }

    fn read_checksum(&mut self) -> Result<u32> {
        let mut buf = [0u8; CHECKSUM_LEN];
        self.read_payload(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_payload(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Corrupt("truncated frame"),
            _ => e.into(),
        })?;
        self.bytes_in += buf.len() as u64;
        Ok(())
    }

    fn skip_payload(&mut self, len: usize) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(len as u64), &mut io::sink())?;
        self.bytes_in += skipped;
        if skipped < len as u64 {
            return Err(Error::Corrupt("truncated frame"));
        }
        Ok(())
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.data.len() {
            if !self.advance()? {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block;
    use crate::frame::{STREAM_MARKER, StreamWriter};
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut w = StreamWriter::new(Vec::new());
        w.write_all(data).unwrap();
        w.into_inner().unwrap()
    }

    fn decompress(stream: &[u8]) -> Result<Vec<u8>> {
        let mut r = StreamReader::new(stream);
        let mut out = Vec::new();
        while let Some(frame) = r.read_frame()? {
            out.extend_from_slice(frame);
        }
        Ok(out)
    }

    fn data_frame(frame_type: FrameType, checksum_of: &[u8], body: &[u8]) -> Vec<u8> {
        let header = FrameHeader::new(frame_type, CHECKSUM_LEN + body.len());
        let mut out = header.encode().to_vec();
        out.extend_from_slice(&checksum::masked_crc(checksum_of).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn with_marker(frames: &[&[u8]]) -> Vec<u8> {
        let mut out = STREAM_MARKER.to_vec();
        for f in frames {
            out.extend_from_slice(f);
        }
        out
    }

    #[test]
    fn empty_input_is_clean_end() {
        let mut r = StreamReader::new(&[][..]);
        assert!(r.read_frame().unwrap().is_none());
        assert!(r.read_frame().unwrap().is_none());
    }

    #[test]
    fn marker_only_stream_is_empty() {
        assert_eq!(decompress(&STREAM_MARKER).unwrap(), b"");
    }

    #[test]
    fn hand_built_frames_decode() {
        let raw = data_frame(FrameType::Uncompressed, b"plain", b"plain");
        let packed = block::encode(b"squeezed squeezed squeezed");
        let comp = data_frame(FrameType::Compressed, b"squeezed squeezed squeezed", &packed);
        let stream = with_marker(&[&raw, &comp]);
        assert_eq!(decompress(&stream).unwrap(), b"plainsqueezed squeezed squeezed");
    }

    #[test]
    fn missing_marker_is_corrupt() {
        let stream = data_frame(FrameType::Uncompressed, b"x", b"x");
        assert!(matches!(decompress(&stream), Err(Error::Corrupt(_))));
    }

    #[test]
    fn repeated_marker_is_accepted() {
        let frame = data_frame(FrameType::Uncompressed, b"ab", b"ab");
        let mut stream = with_marker(&[&frame]);
        stream.extend_from_slice(&STREAM_MARKER);
        stream.extend_from_slice(&frame);
        assert_eq!(decompress(&stream).unwrap(), b"abab");
    }

    #[test]
    fn bad_later_marker_is_corrupt() {
        let stream = with_marker(&[&[0xff, 0x06, 0x00, 0x00, b's', b'N', b'a', b'P', b'p', b'X']]);
        assert!(matches!(decompress(&stream), Err(Error::Corrupt(_))));
        let stream = with_marker(&[&[0xff, 0x05, 0x00, 0x00, b's', b'N', b'a', b'P', b'p']]);
        assert!(matches!(decompress(&stream), Err(Error::Corrupt(_))));
    }

    #[test]
    fn skippable_frames_are_ignored() {
        let padding = [0xfe, 0x03, 0x00, 0x00, 0, 0, 0];
        let reserved = [0x80, 0x02, 0x00, 0x00, 9, 9];
        let frame = data_frame(FrameType::Uncompressed, b"ok", b"ok");
        let stream = with_marker(&[&padding, &reserved, &frame]);
        let mut r = StreamReader::new(stream.as_slice());
        assert_eq!(r.read_frame().unwrap(), Some(&b"ok"[..]));
        assert_eq!(r.frames_skipped(), 2);
        assert_eq!(r.frames_read(), 1);
    }

    #[test]
    fn skippable_frame_at_the_limit_is_skipped() {
        let limit = MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN;
        let mut big = FrameHeader::new(FrameType::Skippable(0xfd), limit)
            .encode()
            .to_vec();
        big.resize(HEADER_LEN + limit, 0xaa);
        let frame = data_frame(FrameType::Uncompressed, b"after", b"after");
        let stream = with_marker(&[&big, &frame]);
        assert_eq!(decompress(&stream).unwrap(), b"after");
    }

    #[test]
    fn oversized_skippable_frame_is_rejected() {
        for (frame_type, len) in [
            (FrameType::Skippable(0x80), crate::frame::MAX_FRAME_LEN),
            (FrameType::Padding, MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN + 1),
        ] {
            let header = FrameHeader::new(frame_type, len).encode();
            let mut stream = with_marker(&[&header]);
            stream.resize(stream.len() + len, 0);
            let mut r = StreamReader::new(stream.as_slice());
            let mut out = Vec::new();
            let err = r.read_to_end(&mut out).unwrap_err();
            assert!(matches!(Error::from_io(&err), Some(Error::Unsupported(_))));
            assert_eq!(r.frames_skipped(), 0);
            // Terminal.
            assert!(matches!(r.read_frame(), Err(Error::Unsupported(_))));
        }
    }

    #[test]
    fn reserved_unskippable_is_unsupported() {
        let stream = with_marker(&[&[0x02, 0x00, 0x00, 0x00]]);
        assert!(matches!(decompress(&stream), Err(Error::Unsupported(_))));
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let frame = data_frame(FrameType::Uncompressed, b"other", b"bytes");
        let stream = with_marker(&[&frame]);
        assert!(matches!(decompress(&stream), Err(Error::Corrupt(_))));

        let mut r = StreamReader::new(stream.as_slice()).verify_checksums(false);
        assert_eq!(r.read_frame().unwrap(), Some(&b"bytes"[..]));
    }

    #[test]
    fn frame_length_limits() {
        let short = with_marker(&[&[0x00, 0x03, 0x00, 0x00, 1, 2, 3]]);
        assert!(matches!(decompress(&short), Err(Error::Corrupt(_))));

        let too_long = MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN + 1;
        let header = FrameHeader::new(FrameType::Compressed, too_long).encode();
        let stream = with_marker(&[&header]);
        assert!(matches!(decompress(&stream), Err(Error::Corrupt(_))));

        let big = vec![0u8; MAX_BLOCK_LEN + 1];
        let frame = data_frame(FrameType::Uncompressed, &big, &big);
        assert!(matches!(decompress(&with_marker(&[&frame])), Err(Error::Corrupt(_))));
    }

    #[test]
    fn oversized_block_in_frame_is_corrupt() {
        let data = vec![0u8; MAX_BLOCK_LEN + 1];
        let packed = block::encode(&data);
        let frame = data_frame(FrameType::Compressed, &data, &packed);
        assert!(matches!(decompress(&with_marker(&[&frame])), Err(Error::Corrupt(_))));
    }

    #[test]
    fn truncation_is_corrupt_not_eof() {
        let stream = compress(&vec![3u8; 5000]);
        for cut in 1..stream.len() {
            if cut == STREAM_MARKER.len() {
                continue;
            }
            assert!(
                matches!(decompress(&stream[..cut]), Err(Error::Corrupt(_))),
                "cut={cut}"
            );
        }
    }

    #[test]
    fn errors_are_terminal() {
        let mut stream = compress(b"first frame");
        stream.extend_from_slice(&[0x01, 0x09]);
        let mut r = StreamReader::new(stream.as_slice());
        assert_eq!(r.read_frame().unwrap(), Some(&b"first frame"[..]));
        let first = r.read_frame().unwrap_err();
        assert_eq!(first.kind(), ErrorKind::Corrupt);
        for _ in 0..3 {
            assert_eq!(r.read_frame().unwrap_err().kind(), ErrorKind::Corrupt);
        }
        let mut buf = [0u8; 8];
        let io_err = r.read(&mut buf).unwrap_err();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_trait_serves_partial_reads() {
        let data: Vec<u8> = (0..150_000u32).map(|i| (i % 13) as u8).collect();
        let stream = compress(&data);
        let mut r = StreamReader::new(stream.as_slice());
        let mut out = Vec::new();
        let mut buf = [0u8; 1000];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, data);
        assert_eq!(r.bytes_out(), data.len() as u64);
        assert_eq!(r.frames_read(), 3);
        assert_eq!(r.compressed_frames(), 3);
        assert_eq!(r.read(&mut buf).unwrap(), 0);
        assert_eq!(r.bytes_in(), stream.len() as u64);
    }

    #[test]
    fn empty_data_frames_are_allowed() {
        let empty_raw = data_frame(FrameType::Uncompressed, b"", b"");
        let empty_block = data_frame(FrameType::Compressed, b"", &[0x00]);
        let tail = data_frame(FrameType::Uncompressed, b"z", b"z");
        let stream = with_marker(&[&empty_raw, &empty_block, &tail]);
        let mut r = StreamReader::new(stream.as_slice());
        assert_eq!(r.read_frame().unwrap(), Some(&b""[..]));
        assert_eq!(r.read_frame().unwrap(), Some(&b""[..]));
        let mut rest = Vec::new();
        r.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"z");
    }
}
