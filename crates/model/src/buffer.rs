use bytes::BytesMut;
use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tracing::trace;

pub const DEFAULT_PAGE_SIZE: usize = 32 * 1024;

const DEFAULT_MAX_POOLED: usize = 64;

/// Pool of fixed-size page buffers shared by every task of a session.
///
/// Every acquired buffer is handed out as a [`PooledBuffer`] and goes back to
/// the pool when that handle is dropped, so each buffer is released exactly
/// once. `outstanding()` reports the number of live handles.
#[derive(Debug, Clone)]
pub struct BufferAllocator {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    page_size: usize,
    max_pooled: usize,
    free: Mutex<Vec<BytesMut>>,
    outstanding: AtomicUsize,
}

impl BufferAllocator {
    pub fn new(page_size: usize) -> Self {
        Self::with_max_pooled(page_size, DEFAULT_MAX_POOLED)
    }

    pub fn with_max_pooled(page_size: usize, max_pooled: usize) -> Self {
        BufferAllocator {
            inner: Arc::new(PoolInner {
                page_size: page_size.max(64),
                max_pooled,
                free: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Takes a page-sized buffer from the pool, allocating when it is empty.
    pub fn acquire(&self) -> PooledBuffer {
        self.acquire_with_capacity(self.inner.page_size)
    }

    /// Takes a buffer of at least `min_capacity` bytes. Requests larger than
    /// the page size get a dedicated allocation that is not kept on release.
    pub fn acquire_with_capacity(&self, min_capacity: usize) -> PooledBuffer {
        let data = if min_capacity <= self.inner.page_size {
            self.inner
                .free
                .lock()
                .ok()
                .and_then(|mut free| free.pop())
                .unwrap_or_else(|| BytesMut::with_capacity(self.inner.page_size))
        } else {
            trace!(capacity = min_capacity, "Allocating oversized page buffer");
            BytesMut::with_capacity(min_capacity)
        };

        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledBuffer {
            data,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of buffers handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    pub fn pooled(&self) -> usize {
        self.inner.free.lock().map(|free| free.len()).unwrap_or(0)
    }
}

impl Default for BufferAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Exclusive handle on a pool buffer. Dropping it releases the buffer.
#[derive(Debug)]
pub struct PooledBuffer {
    data: BytesMut,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    pub fn page_size(&self) -> usize {
        self.pool.page_size
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);

        let mut data = std::mem::take(&mut self.data);
        let page_size = self.pool.page_size;
        if data.capacity() < page_size || data.capacity() > page_size * 2 {
            return;
        }
        data.clear();
        if let Ok(mut free) = self.pool.free.lock() {
            if free.len() < self.pool.max_pooled {
                free.push(data);
            }
        }
    }
}
