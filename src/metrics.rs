//! Evaluation helpers for boosting loops and tests.

use crate::dataset::{Dataset, PredictedLabel};
use crate::loss::{sigmoid, LOGLOSS_EPS};
use crate::model::Predict;

/// Mean logloss of the rows' running logits alone.
pub fn logloss_by_pred(svm: &Dataset<PredictedLabel>) -> f64 {
    let mut loss = 0.0;
    let mut rows = 0usize;

    for group in &svm.groups {
        let p = sigmoid(group.label.pred);
        let per_row = if group.label.value {
            -p.max(LOGLOSS_EPS).ln()
        } else {
            -(1.0 - p.min(1.0 - LOGLOSS_EPS)).ln()
        };
        loss += per_row * group.rows.len() as f64;
        rows += group.rows.len();
    }

    if rows > 0 {
        loss / rows as f64
    } else {
        0.0
    }
}

/// Mean logloss with a predictor's raw output added to every row's running
/// logit before the sigmoid.
pub fn log_reg_logloss<P: Predict>(predictor: &P, svm: &Dataset<PredictedLabel>) -> f64 {
    let mut loss = 0.0;
    let mut rows = 0usize;

    for group in &svm.groups {
        for row in &group.rows {
            let logit = group.label.pred + predictor.predict(&row.features);
            let p = sigmoid(logit);
            loss += if group.label.value {
                -p.max(LOGLOSS_EPS).ln()
            } else {
                -(1.0 - p.min(1.0 - LOGLOSS_EPS)).ln()
            };
            rows += 1;
        }
    }

    if rows > 0 {
        loss / rows as f64
    } else {
        0.0
    }
}

/// Fraction of rows whose thresholded probability matches the label.
pub fn accuracy<P: Predict>(predictor: &P, svm: &Dataset<PredictedLabel>) -> f64 {
    let mut correct = 0usize;
    let mut rows = 0usize;

    for group in &svm.groups {
        for row in &group.rows {
            let logit = group.label.pred + predictor.predict(&row.features);
            let predicted = sigmoid(logit) > 0.5;
            if predicted == group.label.value {
                correct += 1;
            }
            rows += 1;
        }
    }

    if rows > 0 {
        correct as f64 / rows as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DecisionTree;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn perfect_predictions_have_tiny_loss() {
        let text = "1,10 1:1\n0,-10 2:1\n";
        let svm = Dataset::<PredictedLabel>::load(text.as_bytes(), None).unwrap();
        assert!(logloss_by_pred(&svm) < 1e-3);
        assert_approx_eq!(accuracy(&DecisionTree::leaf(1, 0.0), &svm), 1.0, 1e-12);
    }

    #[test]
    fn uninformed_predictions_cost_ln_two() {
        let text = "1 1:1\n0 2:1\n";
        let svm = Dataset::<PredictedLabel>::load(text.as_bytes(), None).unwrap();
        assert_approx_eq!(logloss_by_pred(&svm), std::f64::consts::LN_2, 1e-12);
        assert_approx_eq!(
            log_reg_logloss(&DecisionTree::leaf(1, 0.0), &svm),
            std::f64::consts::LN_2,
            1e-12
        );
    }
}
