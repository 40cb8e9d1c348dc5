//! Labeled datasets grouped by identical label state, with SVM-light-like
//! text I/O and the set operations the tree learner partitions with.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::dataset::feature::{row_key, FeatureVec, Row, RowRef};
use crate::dataset::label::{Label, LabelAdapter};
use crate::errors::DatasetError;

/// A group of rows sharing one label state.
#[derive(Debug, Clone)]
pub struct PredictGroup<L: Label> {
    pub label: L,
    pub rows: Vec<RowRef>,
}

/// An ordered collection of [`PredictGroup`]s. A row appears in at most one
/// group; groups are never empty after any dataset operation.
#[derive(Debug, Clone)]
pub struct Dataset<L: Label> {
    pub groups: Vec<PredictGroup<L>>,
}

impl<L: Label> Default for Dataset<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Label> Dataset<L> {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Number of rows across all groups.
    pub fn size(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of `label.to_float()` over every row.
    pub fn label_sum_float(&self) -> f64 {
        self.groups
            .iter()
            .map(|g| g.label.to_float() * g.rows.len() as f64)
            .sum()
    }

    /// Appends a row to the group with this exact label state, creating the
    /// group if none exists. Rows are not deduplicated.
    pub fn add_row(&mut self, row: RowRef, label: L) {
        if let Some(group) = self.groups.iter_mut().rev().find(|g| g.label == label) {
            group.rows.push(row);
            return;
        }
        self.groups.push(PredictGroup {
            label,
            rows: vec![row],
        });
    }

    /// Sorts groups by label state and merges duplicates; empty groups are
    /// dropped. Bulk constructors call this instead of per-row matching.
    fn normalize(&mut self) {
        self.groups.retain(|g| !g.rows.is_empty());
        self.groups.sort_by(|a, b| a.label.order(&b.label));

        let mut merged: Vec<PredictGroup<L>> = Vec::with_capacity(self.groups.len());
        for group in self.groups.drain(..) {
            match merged.last_mut() {
                Some(last) if last.label == group.label => {
                    last.rows.extend(group.rows);
                }
                _ => merged.push(group),
            }
        }
        self.groups = merged;
    }

    /// The sub-dataset of rows for which `feature_id` is present
    /// (`yes = true`) or absent (`yes = false`). Group identity is kept.
    pub fn by_feature(&self, feature_id: u32, yes: bool) -> Self {
        let mut res = Self::new();
        for group in &self.groups {
            let rows: Vec<RowRef> = group
                .rows
                .iter()
                .filter(|row| row.has(feature_id) == yes)
                .cloned()
                .collect();
            if !rows.is_empty() {
                res.groups.push(PredictGroup {
                    label: group.label.clone(),
                    rows,
                });
            }
        }
        res
    }

    /// Splits into `n` datasets by round-robin assignment inside every
    /// group, preserving group labels. Used to form bags.
    pub fn split_into(&self, n: usize) -> Vec<Self> {
        assert!(n > 0, "portion count must be positive");
        let mut portions: Vec<Self> = (0..n).map(|_| Self::new()).collect();
        for group in &self.groups {
            let mut portion_rows: Vec<Vec<RowRef>> = vec![Vec::new(); n];
            for (i, row) in group.rows.iter().enumerate() {
                portion_rows[i % n].push(row.clone());
            }
            for (portion, rows) in portions.iter_mut().zip(portion_rows) {
                if !rows.is_empty() {
                    portion.groups.push(PredictGroup {
                        label: group.label.clone(),
                        rows,
                    });
                }
            }
        }
        portions
    }

    /// Row-wise set split of `left` against `right` by pointer identity:
    /// returns `(rows of left also in right, rows of left not in right)`,
    /// both preserving `left`'s group structure.
    pub fn cross(left: &Self, right: &Self) -> (Self, Self) {
        let right_rows: HashSet<usize> = right
            .groups
            .iter()
            .flat_map(|g| g.rows.iter().map(row_key))
            .collect();

        let mut intersection = Self::new();
        let mut left_only = Self::new();

        for group in &left.groups {
            let mut both = Vec::new();
            let mut only = Vec::new();
            for row in &group.rows {
                if right_rows.contains(&row_key(row)) {
                    both.push(row.clone());
                } else {
                    only.push(row.clone());
                }
            }
            if !both.is_empty() {
                intersection.groups.push(PredictGroup {
                    label: group.label.clone(),
                    rows: both,
                });
            }
            if !only.is_empty() {
                left_only.groups.push(PredictGroup {
                    label: group.label.clone(),
                    rows: only,
                });
            }
        }

        (intersection, left_only)
    }

    /// Copies the dataset, transforming every row's label through the
    /// adapter. The boosting loop threads running logits with this.
    pub fn copy_with<A: LabelAdapter<L>>(&self, adapter: &mut A) -> Dataset<A::Out> {
        let mut res = Dataset::new();
        for group in &self.groups {
            for row in &group.rows {
                let label = adapter.adapt(row, &group.label);
                res.groups.push(PredictGroup {
                    label,
                    rows: vec![row.clone()],
                });
            }
        }
        res.normalize();
        res
    }

    /// Parses the SVM-light-like text form. Empty lines are skipped; the
    /// first malformed line aborts the load with its 1-based number. When
    /// `limit` is set, at most that many rows are read.
    pub fn load<R: BufRead>(reader: R, limit: Option<usize>) -> Result<Self, DatasetError> {
        let mut res = Self::new();
        let mut rows_read = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            if let Some(limit) = limit {
                if rows_read >= limit {
                    break;
                }
            }

            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            let line_no = idx + 1;
            let (label, row) = Self::parse_line(line)
                .map_err(|reason| DatasetError::Parse { line: line_no, reason })?;
            res.groups.push(PredictGroup {
                label,
                rows: vec![Arc::new(row)],
            });
            rows_read += 1;
        }

        res.normalize();
        Ok(res)
    }

    fn parse_line(line: &str) -> Result<(L, Row), String> {
        let mut tokens = line.split_ascii_whitespace();
        let label_token = tokens.next().ok_or_else(|| "no label".to_string())?;
        let label = L::parse(label_token)?;

        let mut features = FeatureVec::new();
        let mut prev_id: Option<u32> = None;
        for token in tokens {
            let (id_part, value_part) = token
                .split_once(':')
                .ok_or_else(|| format!("invalid feature '{}'", token))?;
            let id: u32 = id_part
                .parse()
                .map_err(|_| format!("invalid feature id '{}'", id_part))?;
            let value: u32 = value_part
                .parse()
                .map_err(|_| format!("invalid feature value '{}'", value_part))?;
            if prev_id.map_or(false, |prev| prev >= id) {
                return Err(format!("feature ids not in ascending order at '{}'", token));
            }
            prev_id = Some(id);
            features.push(id, value);
        }

        Ok((label, Row::new(features)))
    }

    /// Writes one row per line in the canonical form: label first, then
    /// features in ascending id order.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), DatasetError> {
        for group in &self.groups {
            for row in &group.rows {
                let mut line = String::new();
                group.label.write(&mut line);
                for &(id, value) in row.features.iter() {
                    line.push_str(&format!(" {}:{}", id, value));
                }
                line.push('\n');
                writer.write_all(line.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::label::{BoolLabel, PredictedLabel};

    fn sample() -> Dataset<PredictedLabel> {
        let text = "1 1:1 7:1\n0 2:1\n1 1:1\n\n0,0.5 7:1\n";
        Dataset::load(text.as_bytes(), None).unwrap()
    }

    #[test]
    fn load_groups_rows_by_label_state() {
        let svm = sample();
        assert_eq!(svm.size(), 4);
        // labels: (0, 0.0), (0, 0.5), (1, 0.0)
        assert_eq!(svm.groups.len(), 3);
        let ones = svm
            .groups
            .iter()
            .find(|g| g.label == PredictedLabel::new(true, 0.0))
            .unwrap();
        assert_eq!(ones.rows.len(), 2);
    }

    #[test]
    fn load_reports_first_bad_line() {
        let text = "1 1:1\n0 7:x\n1 2:1\n";
        let err = Dataset::<BoolLabel>::load(text.as_bytes(), None).unwrap_err();
        match err {
            DatasetError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_rejects_unordered_features() {
        let text = "1 7:1 3:1\n";
        assert!(Dataset::<BoolLabel>::load(text.as_bytes(), None).is_err());
    }

    #[test]
    fn load_honors_row_limit() {
        let text = "1 1:1\n0 2:1\n1 3:1\n";
        let svm = Dataset::<BoolLabel>::load(text.as_bytes(), Some(2)).unwrap();
        assert_eq!(svm.size(), 2);
    }

    #[test]
    fn save_round_trips() {
        let svm = sample();
        let mut buf = Vec::new();
        svm.save(&mut buf).unwrap();
        let reloaded = Dataset::<PredictedLabel>::load(buf.as_slice(), None).unwrap();
        assert_eq!(reloaded.size(), svm.size());
        assert_eq!(reloaded.groups.len(), svm.groups.len());
        assert_eq!(reloaded.label_sum_float(), svm.label_sum_float());
    }

    #[test]
    fn by_feature_partitions_the_dataset() {
        let svm = sample();
        let yes = svm.by_feature(7, true);
        let no = svm.by_feature(7, false);
        assert_eq!(yes.size(), 2);
        assert_eq!(no.size(), 2);
        assert_eq!(yes.size() + no.size(), svm.size());
        for group in yes.groups.iter().chain(no.groups.iter()) {
            assert!(!group.rows.is_empty());
        }
    }

    #[test]
    fn cross_splits_by_row_identity() {
        let svm = sample();
        let yes = svm.by_feature(1, true);
        let (intersection, left_only) = Dataset::cross(&svm, &yes);
        assert_eq!(intersection.size(), yes.size());
        assert_eq!(intersection.size() + left_only.size(), svm.size());
    }

    #[test]
    fn split_into_round_robins_each_group() {
        let svm = sample();
        let parts = svm.split_into(2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].size() + parts[1].size(), svm.size());
        // The two-row group is split one row to each bag.
        assert!(parts
            .iter()
            .all(|p| p.groups.iter().any(|g| g.label == PredictedLabel::new(true, 0.0))));
    }

    #[test]
    fn add_row_reuses_matching_group() {
        let mut svm: Dataset<BoolLabel> = Dataset::new();
        let row = Arc::new(Row::new(FeatureVec::from_sorted(vec![(1, 1)])));
        svm.add_row(row.clone(), BoolLabel::new(true));
        svm.add_row(row.clone(), BoolLabel::new(true));
        svm.add_row(row, BoolLabel::new(false));
        assert_eq!(svm.groups.len(), 2);
        assert_eq!(svm.size(), 3);
    }
}
