// Streaming frame encoder.
//
// Input is staged in a `MAX_BLOCK_LEN` buffer. Whenever a full slice is
// available it is encoded as one frame; slices that are already complete in
// the caller's input are encoded straight from it without staging.
//
// A failed write, flush or close poisons the writer: the sink may hold a
// partial frame, so every later call returns the same error.

use std::io::{self, Write};

use log::{debug, trace};

use super::checksum;
use super::pool::BufferPool;
use super::{CHECKSUM_LEN, FrameHeader, FrameType, HEADER_LEN, MAX_BLOCK_LEN, STREAM_MARKER};
use crate::block::BlockEncoder;
use crate::error::{Error, Result};

/// Lifecycle of a [`StreamWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing written yet, not even the stream identifier.
    Unstarted,
    /// Identifier written; accepting data.
    Active,
    /// Closed; all further writes fail with [`Error::Closed`].
    Closed,
}

/// Compresses everything written to it into a framed stream on `W`.
///
/// Data is emitted in frames of at most 64 KiB of uncompressed input. Each
/// frame is stored compressed only when that is strictly smaller than the raw
/// bytes. Call [`close`](Self::close) (or [`into_inner`](Self::into_inner))
/// to emit the final partial frame; dropping the writer closes it on a
/// best-effort basis and discards any error.
///
/// Once any operation fails, the writer is unusable: later writes, flushes
/// and closes return an equivalent error and nothing more reaches the sink.
///
/// # Example
/// ```
/// use std::io::Write;
/// use snapkit::frame::StreamWriter;
///
/// let mut w = StreamWriter::new(Vec::new());
/// w.write_all(b"hello hello hello hello").unwrap();
/// let framed = w.into_inner().unwrap();
/// assert_eq!(&framed[..10], b"\xff\x06\x00\x00sNaPpY");
/// ```
pub struct StreamWriter<W: Write> {
    inner: Option<W>,
    state: WriterState,
    /// Staged input shorter than one full frame.
    buffer: Vec<u8>,
    encoder: BlockEncoder,
    pool: &'static BufferPool,
    failed: Option<Error>,
    bytes_in: u64,
    bytes_out: u64,
    frames_written: u64,
    compressed_frames: u64,
}

impl<W: Write> StreamWriter<W> {
    /// Writer drawing scratch buffers from [`BufferPool::global`].
    pub fn new(inner: W) -> Self {
        Self::with_pool(inner, BufferPool::global())
    }

    pub fn with_pool(inner: W, pool: &'static BufferPool) -> Self {
        Self {
            inner: Some(inner),
            state: WriterState::Unstarted,
            buffer: Vec::with_capacity(MAX_BLOCK_LEN),
            encoder: BlockEncoder::new(),
            pool,
            failed: None,
            bytes_in: 0,
            bytes_out: 0,
            frames_written: 0,
            compressed_frames: 0,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// The underlying sink.
    pub fn get_ref(&self) -> &W {
        match &self.inner {
            Some(w) => w,
            None => unreachable!("sink is only taken by into_inner"),
        }
    }

    /// Uncompressed bytes accepted so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Framed bytes written to the sink so far, identifier included.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Data frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Data frames stored compressed so far.
    pub fn compressed_frames(&self) -> u64 {
        self.compressed_frames
    }

    /// Emit staged data and the stream identifier if still pending, flush
    /// the sink and refuse further writes.
    ///
    /// Closing an already closed writer is a no-op. A failed close leaves
    /// the writer failed, not closed.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.guard(|w| {
            w.start()?;
            w.flush_buffer()?;
            w.sink()?.flush()?;
            Ok(())
        })?;
        self.state = WriterState::Closed;
        debug!(
            "stream closed: {} bytes in, {} bytes out, {} frames ({} compressed)",
            self.bytes_in, self.bytes_out, self.frames_written, self.compressed_frames
        );
        Ok(())
    }

    /// Close the stream and return the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        self.inner.take().ok_or(Error::Closed)
    }

    /// Run `op` unless an earlier operation failed, recording its failure.
    fn guard<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if let Some(err) = &self.failed {
            return Err(err.duplicate());
        }
        op(self).inspect_err(|e| {
            if !matches!(e, Error::Closed) {
                debug!("stream writer failed: {e}");
                self.failed = Some(e.duplicate());
            }
        })
    }

    /// Accept `data`, emitting every frame it completes.
    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.start()?;
        self.bytes_in += data.len() as u64;
        let mut offset = 0usize;

        // Complete a partially staged frame first.
        if !self.buffer.is_empty() {
            let take = (MAX_BLOCK_LEN - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            offset += take;
            if self.buffer.len() == MAX_BLOCK_LEN {
                self.flush_buffer()?;
            }
        }

        while offset + MAX_BLOCK_LEN <= data.len() {
            let end = offset + MAX_BLOCK_LEN;
            self.emit_frame(&data[offset..end])?;
            offset = end;
        }

        if offset < data.len() {
            self.buffer.extend_from_slice(&data[offset..]);
        }
        Ok(())
    }

    /// Write the stream identifier if it has not been written yet.
    fn start(&mut self) -> Result<()> {
        match self.state {
            WriterState::Unstarted => {
                self.sink()?.write_all(&STREAM_MARKER)?;
                self.bytes_out += STREAM_MARKER.len() as u64;
                self.state = WriterState::Active;
                debug!("stream opened");
                Ok(())
            }
            WriterState::Active => Ok(()),
            WriterState::Closed => Err(Error::Closed),
        }
    }

    /// Emit the staged data, if any, as one frame.
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let staged = std::mem::take(&mut self.buffer);
        let result = self.emit_frame(&staged);
        self.buffer = staged;
        if result.is_ok() {
            self.buffer.clear();
        }
        result
    }

    /// Encode `raw` (at most `MAX_BLOCK_LEN` bytes) as one data frame.
    fn emit_frame(&mut self, raw: &[u8]) -> Result<()> {
        debug_assert!(!raw.is_empty() && raw.len() <= MAX_BLOCK_LEN);
        let pool = self.pool;
        let mut frame = pool.acquire();
        frame.resize(HEADER_LEN + CHECKSUM_LEN, 0);

        let body_len = self.encoder.encode_into(&mut frame, raw);
        let frame_type = if body_len < raw.len() {
            FrameType::Compressed
        } else {
            frame.truncate(HEADER_LEN + CHECKSUM_LEN);
            frame.extend_from_slice(raw);
            FrameType::Uncompressed
        };

        let payload_len = frame.len() - HEADER_LEN;
        let header = FrameHeader::new(frame_type, payload_len);
        frame[..HEADER_LEN].copy_from_slice(&header.encode());
        frame[HEADER_LEN..HEADER_LEN + CHECKSUM_LEN]
            .copy_from_slice(&checksum::masked_crc(raw).to_le_bytes());

        self.sink()?.write_all(&frame)?;

        self.bytes_out += frame.len() as u64;
        self.frames_written += 1;
        if frame_type == FrameType::Compressed {
            self.compressed_frames += 1;
        }
        trace!(
            "frame {:?}: {} bytes -> {} byte payload",
            frame_type,
            raw.len(),
            payload_len
        );
        Ok(())
    }

    fn sink(&mut self) -> Result<&mut W> {
        self.inner.as_mut().ok_or(Error::Closed)
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard(|w| w.write_data(buf))?;
        Ok(buf.len())
    }

    /// Emit staged data as a (possibly short) frame and flush the sink.
    fn flush(&mut self) -> io::Result<()> {
        self.guard(|w| {
            w.start()?;
            w.flush_buffer()?;
            w.sink()?.flush()?;
            Ok(())
        })?;
        Ok(())
    }
}

impl<W: Write> Drop for StreamWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some()
            && self.state != WriterState::Closed
            && self.failed.is_none()
            && let Err(e) = self.close()
        {
            debug!("close on drop failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameHeader, MAX_ENCODED_BLOCK_LEN};

    /// Split a framed stream into `(header, payload)` pairs.
    fn frames(stream: &[u8]) -> Vec<(FrameHeader, &[u8])> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < stream.len() {
            let mut head = [0u8; HEADER_LEN];
            head.copy_from_slice(&stream[pos..pos + HEADER_LEN]);
            let header = FrameHeader::parse(&head);
            let start = pos + HEADER_LEN;
            out.push((header, &stream[start..start + header.len]));
            pos = start + header.len;
        }
        out
    }

    #[test]
    fn empty_stream_is_only_the_marker() {
        let w = StreamWriter::new(Vec::new());
        assert_eq!(w.into_inner().unwrap(), STREAM_MARKER);
    }

    #[test]
    fn marker_written_once() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_all(b"a").unwrap();
        w.flush().unwrap();
        w.write_all(b"b").unwrap();
        let out = w.into_inner().unwrap();
        let marker_count = frames(&out)
            .iter()
            .filter(|(h, _)| h.frame_type == FrameType::StreamIdentifier)
            .count();
        assert_eq!(marker_count, 1);
        assert_eq!(frames(&out).len(), 3);
    }

    #[test]
    fn flush_emits_marker_on_unstarted_writer() {
        let mut w = StreamWriter::new(Vec::new());
        w.flush().unwrap();
        assert_eq!(w.get_ref().as_slice(), STREAM_MARKER);
        assert_eq!(w.state(), WriterState::Active);
    }

    #[test]
    fn compressible_data_uses_compressed_frames() {
        let data = vec![b'x'; 1000];
        let mut w = StreamWriter::new(Vec::new());
        w.write_all(&data).unwrap();
        w.close().unwrap();
        assert_eq!(w.frames_written(), 1);
        assert_eq!(w.compressed_frames(), 1);
        let out = w.get_ref().clone();
        let (header, payload) = frames(&out)[1];
        assert_eq!(header.frame_type, FrameType::Compressed);
        assert!(payload.len() < data.len());
        assert_eq!(
            &payload[..CHECKSUM_LEN],
            checksum::masked_crc(&data).to_le_bytes()
        );
    }

    #[test]
    fn tiny_data_stays_uncompressed() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_all(b"hi").unwrap();
        let out = w.into_inner().unwrap();
        let (header, payload) = frames(&out)[1];
        assert_eq!(header.frame_type, FrameType::Uncompressed);
        assert_eq!(&payload[CHECKSUM_LEN..], b"hi");
    }

    #[test]
    fn frames_hold_at_most_one_block() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut w = StreamWriter::new(Vec::new());
        for piece in data.chunks(7000) {
            w.write_all(piece).unwrap();
        }
        w.close().unwrap();
        assert_eq!(w.frames_written(), 4);
        assert_eq!(w.bytes_in(), data.len() as u64);
        assert_eq!(w.bytes_out(), w.get_ref().len() as u64);
        for (header, _) in frames(w.get_ref()).iter().skip(1) {
            assert!(header.len <= MAX_ENCODED_BLOCK_LEN + CHECKSUM_LEN);
        }
    }

    #[test]
    fn write_after_close_fails() {
        let mut w = StreamWriter::new(Vec::new());
        w.write_all(b"data").unwrap();
        w.close().unwrap();
        let err = w.write(b"more").unwrap_err();
        assert!(matches!(Error::from_io(&err), Some(Error::Closed)));
        assert!(w.flush().is_err());
        // Second close is a no-op.
        assert!(w.close().is_ok());
        assert_eq!(w.state(), WriterState::Closed);
    }

    #[test]
    fn drop_closes_stream() {
        let mut sink = Vec::new();
        {
            let mut w = StreamWriter::new(&mut sink);
            w.write_all(b"pending").unwrap();
        }
        let parsed = frames(&sink);
        assert_eq!(parsed.len(), 2);
        assert_eq!(&parsed[1].1[CHECKSUM_LEN..], b"pending");
    }

    #[test]
    fn uses_the_supplied_pool() {
        static POOL: BufferPool = BufferPool::new(crate::frame::MAX_BUFFER_LEN);
        let mut w = StreamWriter::with_pool(Vec::new(), &POOL);
        w.write_all(&[7u8; 100]).unwrap();
        w.close().unwrap();
        assert_eq!(POOL.idle(), 1);
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink down"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_errors_propagate_and_release_scratch() {
        static POOL: BufferPool = BufferPool::new(crate::frame::MAX_BUFFER_LEN);
        let mut w = StreamWriter::with_pool(FailingSink, &POOL);
        let err = w.close().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(w.state(), WriterState::Unstarted);

        let mut w = StreamWriter::with_pool(Vec::new(), &POOL);
        w.write_all(b"abc").unwrap();
        let inner = w.into_inner().unwrap();
        assert!(!inner.is_empty());
        assert_eq!(POOL.idle(), 1);
    }

    /// Accepts everything except the write issued while `fail_next` is set.
    struct FlakySink {
        out: Vec<u8>,
        fail_next: bool,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if std::mem::take(&mut self.fail_next) {
                return Err(io::Error::other("transient"));
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_poisons_the_writer() {
        let data: Vec<u8> = (0..70_000u32).map(|i| (i * 7 % 256) as u8).collect();
        let sink = FlakySink {
            out: Vec::new(),
            fail_next: false,
        };
        let mut w = StreamWriter::new(sink);
        w.write_all(&data[..60_000]).unwrap();

        // Completing the staged frame hits the failing sink.
        w.inner.as_mut().unwrap().fail_next = true;
        assert!(w.write(&data[60_000..]).is_err());

        // Retrying the same bytes must not duplicate them downstream.
        let err = w.write_all(&data[60_000..]).unwrap_err();
        assert_eq!(err.to_string(), "transient");
        assert!(w.flush().is_err());
        assert!(matches!(w.close(), Err(Error::Io(_))));
        assert_ne!(w.state(), WriterState::Closed);

        let written = w.get_ref().out.clone();
        let mut r = crate::frame::StreamReader::new(written.as_slice());
        let mut decoded = Vec::new();
        while let Ok(Some(frame)) = r.read_frame() {
            decoded.extend_from_slice(frame);
        }
        assert!(data.starts_with(&decoded));
        assert!(decoded.len() < data.len());
    }
}
