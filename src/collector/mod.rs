//! Sector binning for candidate splits, backed by a pooled buffer store.

pub mod buffer_pool;
pub mod sector_collector;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use sector_collector::SectorCollector;

use once_cell::sync::Lazy;

use crate::loss::SectorSample;

static SAMPLE_POOL: Lazy<BufferPool<SectorSample>> = Lazy::new(|| BufferPool::new(128, 1024));

/// A sample buffer on loan from the process-wide pool.
pub fn sample_buffer() -> PooledBuffer<SectorSample> {
    SAMPLE_POOL.get()
}
