// Process-wide pool of scratch buffers for frame encoding.
//
// A buffer is checked out as a `PooledBuffer` guard and returned to the pool
// when the guard drops, whichever way the holder exits. The pool keeps at
// most `MAX_IDLE_BUFFERS` idle buffers; extra returns are freed.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock, PoisonError};

use super::MAX_BUFFER_LEN;

/// Idle buffers retained by a pool.
pub const MAX_IDLE_BUFFERS: usize = 16;

/// A bounded free list of `Vec<u8>` scratch buffers.
///
/// # Example
/// ```
/// use snapkit::frame::BufferPool;
/// static POOL: BufferPool = BufferPool::new(1024);
///
/// {
///     let mut buf = POOL.acquire();
///     buf.extend_from_slice(b"scratch");
/// }
/// assert_eq!(POOL.idle(), 1);
/// ```
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    /// Pool handing out buffers with at least `capacity` bytes reserved.
    pub const fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// The shared pool used by [`StreamWriter::new`](super::StreamWriter::new).
    pub fn global() -> &'static BufferPool {
        static POOL: OnceLock<BufferPool> = OnceLock::new();
        POOL.get_or_init(|| BufferPool::new(MAX_BUFFER_LEN))
    }

    /// Check out an empty buffer.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let recycled = self.lock().pop();
        let mut buf = recycled.unwrap_or_else(|| Vec::with_capacity(self.capacity));
        buf.clear();
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    /// Minimum capacity of buffers handed out.
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.capacity() < self.capacity {
            return;
        }
        let mut idle = self.lock();
        if idle.len() < MAX_IDLE_BUFFERS {
            idle.push(buf);
        }
    }

    // A panic while holding the lock cannot leave the free list inconsistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped handle to a pooled buffer. Dereferences to `Vec<u8>`.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
