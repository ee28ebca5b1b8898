//! Reusable byte buffers for the repack pipeline
//!
//! Repacking touches tens of thousands of frames, each needing several
//! multi-megabyte buffers. Buffers are checked out as [`PooledBuffer`]
//! guards that go back to their pool when dropped, so every borrowed buffer
//! is returned exactly once whichever way the task ends.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Configuration for one buffer class
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Capacity of freshly allocated buffers
    pub initial_capacity: usize,
    /// Maximum number of idle buffers kept around
    pub max_buffers: usize,
}

/// Free-list of byte buffers of one class
#[derive(Debug, Clone)]
pub struct BufferPool {
    buffers: Arc<Mutex<Vec<Vec<u8>>>>,
    config: PoolConfig,
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            buffers: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    /// Check out an empty buffer with room for at least `requested_size` bytes
    pub fn get(&self, requested_size: usize) -> PooledBuffer {
        let recycled = self.buffers.lock().pop();
        let mut data = recycled
            .unwrap_or_else(|| Vec::with_capacity(self.config.initial_capacity.max(requested_size)));
        data.clear();
        data.reserve(requested_size);
        PooledBuffer {
            data,
            pool: self.clone(),
        }
    }

    fn put(&self, data: Vec<u8>) {
        if data.capacity() == 0 {
            return;
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.config.max_buffers {
            buffers.push(data);
        }
        // Otherwise the buffer is dropped
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn clear(&self) {
        self.buffers.lock().clear();
    }
}

/// Buffer checked out of a [`BufferPool`]; returns itself on drop
#[derive(Debug)]
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: BufferPool,
}

impl PooledBuffer {
    /// Detach the buffer from its pool
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.data));
    }
}

/// The four buffer classes used while rebuilding frames
#[derive(Debug, Clone)]
pub struct FramePools {
    /// Compressed bytes read from the source package
    pub read: BufferPool,
    /// Decompressed source frames
    pub decompressed: BufferPool,
    /// Recompressed output frames
    pub compressed: BufferPool,
    /// Frames being reassembled from original and replacement files
    pub construction: BufferPool,
}

impl FramePools {
    pub fn new(max_buffers: usize) -> Self {
        let class = |initial_capacity| {
            BufferPool::new(PoolConfig {
                initial_capacity,
                max_buffers,
            })
        };
        Self {
            read: class(1024 * 1024),
            decompressed: class(4 * 1024 * 1024),
            compressed: class(1024 * 1024),
            construction: class(4 * 1024 * 1024),
        }
    }
}

impl Default for FramePools {
    fn default() -> Self {
        Self::new(32)
    }
}
