//! Trained predictors: multinode decision trees, tree sets, and their
//! on-disk text format.

pub mod dtree;
pub mod io;
pub mod predictor_set;

pub use dtree::{DecisionTree, NodeIdx, TreeBranch, TreeNode};
pub use predictor_set::PredictorSet;

use crate::dataset::FeatureVec;

/// Anything that maps a sparse feature vector to a raw logit.
pub trait Predict {
    fn predict(&self, features: &FeatureVec) -> f64;
}

impl Predict for DecisionTree {
    fn predict(&self, features: &FeatureVec) -> f64 {
        DecisionTree::predict(self, features)
    }
}

impl Predict for PredictorSet {
    fn predict(&self, features: &FeatureVec) -> f64 {
        PredictorSet::predict(self, features)
    }
}

/// A trained model of either kind, dispatched at evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Predictor {
    Tree(DecisionTree),
    Set(PredictorSet),
}

impl Predict for Predictor {
    fn predict(&self, features: &FeatureVec) -> f64 {
        match self {
            Predictor::Tree(tree) => tree.predict(features),
            Predictor::Set(set) => set.predict(features),
        }
    }
}
