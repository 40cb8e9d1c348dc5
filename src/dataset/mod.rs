//! Training data: sparse rows, labels with running logits, grouped
//! datasets and the per-bag feature index.

pub mod feature;
pub mod feature_index;
pub mod label;
pub mod svm;

pub use feature::{FeatureVec, Row, RowRef};
pub use feature_index::FeatureIndex;
pub use label::{
    AnnealingAdapter, BoolLabel, Label, LabelAdapter, PredictedLabel, PredictorAddAdapter,
};
pub use svm::{Dataset, PredictGroup};
