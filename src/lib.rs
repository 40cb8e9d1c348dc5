//! Boosted multinode decision trees for binary classification over sparse
//! binary features.
//!
//! The learner consumes datasets in an SVM-light-like text format and
//! produces predictors — single decision trees or additive tree sets whose
//! raw outputs sum into a logit that a sigmoid maps to a probability. Tree
//! growth jointly fits the leaf logits of each proposed split by minimizing
//! a regularized logloss with a bounded quasi-Newton search, scores
//! candidates by loss reduction (optionally discounted by hold-out regret),
//! and recurses with a configurable look-ahead depth.

pub mod collector;
pub mod dataset;
pub mod errors;
pub mod learner;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod optim;

pub use dataset::{
    AnnealingAdapter, BoolLabel, Dataset, FeatureVec, Label, PredictedLabel, PredictorAddAdapter,
    Row, RowRef,
};
pub use errors::{DatasetError, ModelError, TrainError};
pub use learner::{
    Context, FeatureSelectionStrategy, LearnContext, RayonRunner, SerialRunner, TaskRunner,
    TrainConfig,
};
pub use model::{DecisionTree, Predict, Predictor, PredictorSet};
