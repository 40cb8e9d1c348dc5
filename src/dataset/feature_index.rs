//! Per-bag inverted index from feature id to the rows possessing it.

use std::collections::HashMap;

use crate::dataset::label::Label;
use crate::dataset::svm::{Dataset, PredictGroup};

/// For a fixed bag, maps every occurring feature id to the sub-dataset of
/// rows that carry it. Built once per bag in O(total nonzero entries) and
/// consulted at every candidate split; the "no" side of a split is the
/// pointer-identity difference against the node's working set.
#[derive(Debug, Clone)]
pub struct FeatureIndex<L: Label> {
    features: Vec<u32>,
    rows_with: HashMap<u32, Dataset<L>>,
}

impl<L: Label> FeatureIndex<L> {
    pub fn build(bag: &Dataset<L>) -> Self {
        let mut rows_with: HashMap<u32, Dataset<L>> = HashMap::new();

        for group in &bag.groups {
            for row in &group.rows {
                for &(feature_id, value) in row.features.iter() {
                    if value == 0 {
                        continue;
                    }
                    let subset = rows_with.entry(feature_id).or_default();
                    // Group structure mirrors the bag: one group slot per
                    // source group, appended on first use.
                    match subset
                        .groups
                        .iter_mut()
                        .find(|g| g.label == group.label)
                    {
                        Some(existing) => existing.rows.push(row.clone()),
                        None => subset.groups.push(PredictGroup {
                            label: group.label.clone(),
                            rows: vec![row.clone()],
                        }),
                    }
                }
            }
        }

        let mut features: Vec<u32> = rows_with.keys().copied().collect();
        features.sort_unstable();

        Self { features, rows_with }
    }

    /// Every feature id that occurs in at least one row, ascending.
    pub fn features(&self) -> &[u32] {
        &self.features
    }

    /// The bag subset carrying `feature_id`, if the feature occurs at all.
    pub fn rows_with(&self, feature_id: u32) -> Option<&Dataset<L>> {
        self.rows_with.get(&feature_id)
    }
}
