//! Bins working-set rows into sectors for a proposed split.

use crate::collector::sample_buffer;
use crate::collector::PooledBuffer;
use crate::dataset::PredictedLabel;
use crate::loss::{SectorGroup, SectorSample};

/// Collects `(label, background logit, count)` tuples into one of `2^k`
/// sector bins, where `k` is the number of proposed split variables. Bins
/// are pooled buffers allocated lazily on first use; `add_delta` is the
/// inherited node logit folded into every sample's background.
pub struct SectorCollector {
    bins: Vec<Option<PooledBuffer<SectorSample>>>,
    add_delta: f64,
}

impl SectorCollector {
    pub fn start(vars_number: u32, add_delta: f64) -> Self {
        assert!(
            vars_number <= 24,
            "too many split variables for sector binning"
        );
        let mut bins = Vec::new();
        bins.resize_with(1usize << vars_number, || None);
        Self { bins, add_delta }
    }

    pub fn add(&mut self, mask: u64, label: &PredictedLabel, count: u64) {
        let bin = self.bins[mask as usize].get_or_insert_with(sample_buffer);
        bin.push(SectorSample {
            value: label.value,
            pred: label.pred + self.add_delta,
            count,
        });
    }

    /// The non-empty sectors with their bitmasks, ready for an objective.
    pub fn finalize(self) -> Vec<SectorGroup> {
        self.bins
            .into_iter()
            .enumerate()
            .filter_map(|(mask, bin)| bin.map(|samples| SectorGroup::new(mask as u64, samples)))
            .collect()
    }
}
