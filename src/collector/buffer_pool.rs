//! A bounded free-list pool for the sample buffers used by sector binning.

use parking_lot::Mutex;

/// Process-wide pool of reusable `Vec<T>` buffers. Buffers come back
/// cleared when a [`PooledBuffer`] is dropped; the free list is bounded so
/// the pool cannot grow without limit across training sessions.
pub struct BufferPool<T: Send + 'static> {
    free: Mutex<Vec<Vec<T>>>,
    max_pooled: usize,
    initial_capacity: usize,
}

impl<T: Send + 'static> BufferPool<T> {
    pub fn new(max_pooled: usize, initial_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            initial_capacity,
        }
    }

    /// Takes a buffer from the free list, or allocates a fresh one.
    pub fn get(&'static self) -> PooledBuffer<T> {
        let buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.initial_capacity));
        PooledBuffer {
            buf: Some(buf),
            pool: self,
        }
    }

    fn release(&self, mut buf: Vec<T>) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }

    #[cfg(test)]
    fn pooled(&self) -> usize {
        self.free.lock().len()
    }
}

/// A buffer on loan from a [`BufferPool`]; returns there on drop.
pub struct PooledBuffer<T: Send + 'static> {
    buf: Option<Vec<T>>,
    pool: &'static BufferPool<T>,
}

impl<T: Send + 'static> PooledBuffer<T> {
    pub fn push(&mut self, value: T) {
        self.buf.as_mut().expect("buffer taken").push(value);
    }
}

impl<T: Send + 'static> std::ops::Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.buf.as_deref().expect("buffer taken")
    }
}

impl<T: Send + 'static> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
