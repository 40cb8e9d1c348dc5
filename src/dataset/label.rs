//! Labels and the adapters that thread boosting state through datasets.

use std::cmp::Ordering;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dataset::feature::Row;
use crate::model::Predict;

/// A dataset label. Implementations carry whatever per-row learning state
/// the trainer needs; grouping in a dataset is by exact label state.
pub trait Label: Clone + PartialEq + Send + Sync + 'static {
    /// Parses the label column of a dataset line. The returned reason is
    /// wrapped with the line number by the dataset loader.
    fn parse(text: &str) -> Result<Self, String>;

    /// Writes the label column in its canonical form.
    fn write(&self, out: &mut String);

    fn to_float(&self) -> f64;

    /// Total order used to merge identical groups after bulk operations.
    fn order(&self, other: &Self) -> Ordering;
}

/// Plain binary ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoolLabel {
    pub value: bool,
}

impl BoolLabel {
    pub fn new(value: bool) -> Self {
        Self { value }
    }
}

impl Label for BoolLabel {
    fn parse(text: &str) -> Result<Self, String> {
        match text {
            "0" => Ok(Self { value: false }),
            "1" => Ok(Self { value: true }),
            other => Err(format!("can't parse label '{}'", other)),
        }
    }

    fn write(&self, out: &mut String) {
        out.push(if self.value { '1' } else { '0' });
    }

    fn to_float(&self) -> f64 {
        if self.value {
            1.0
        } else {
            0.0
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

/// Binary ground truth plus the running logit accumulated from the prior
/// ensemble. Each boosting iteration trains against these residual logits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PredictedLabel {
    pub value: bool,
    pub pred: f64,
}

impl PredictedLabel {
    pub fn new(value: bool, pred: f64) -> Self {
        Self { value, pred }
    }

    /// Aggregation used by collectors: OR on the truth, sum on the logits.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            value: self.value || other.value,
            pred: self.pred + other.pred,
        }
    }
}

impl Label for PredictedLabel {
    fn parse(text: &str) -> Result<Self, String> {
        match text.split_once(',') {
            None => {
                let base = BoolLabel::parse(text)?;
                Ok(Self {
                    value: base.value,
                    pred: 0.0,
                })
            }
            Some((value_part, pred_part)) => {
                let base = BoolLabel::parse(value_part)?;
                let pred = pred_part
                    .parse::<f64>()
                    .map_err(|_| format!("can't parse label predicted part '{}'", pred_part))?;
                Ok(Self {
                    value: base.value,
                    pred,
                })
            }
        }
    }

    fn write(&self, out: &mut String) {
        out.push(if self.value { '1' } else { '0' });
        if self.pred != 0.0 {
            out.push(',');
            out.push_str(&format!("{}", self.pred));
        }
    }

    fn to_float(&self) -> f64 {
        if self.value {
            1.0
        } else {
            0.0
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.pred.partial_cmp(&other.pred).unwrap_or(Ordering::Equal))
    }
}

/// Per-row label transform applied by [`Dataset::copy_with`].
///
/// [`Dataset::copy_with`]: crate::dataset::Dataset::copy_with
pub trait LabelAdapter<In: Label> {
    type Out: Label;

    fn adapt(&mut self, row: &Row, label: &In) -> Self::Out;
}

/// Adds a predictor's raw output to every row's running logit. This is the
/// boosting step between trees; rows themselves are never mutated.
pub struct PredictorAddAdapter<'a, P: Predict> {
    predictor: &'a P,
}

impl<'a, P: Predict> PredictorAddAdapter<'a, P> {
    pub fn new(predictor: &'a P) -> Self {
        Self { predictor }
    }
}

impl<'a, P: Predict> LabelAdapter<PredictedLabel> for PredictorAddAdapter<'a, P> {
    type Out = PredictedLabel;

    fn adapt(&mut self, row: &Row, label: &PredictedLabel) -> PredictedLabel {
        PredictedLabel {
            value: label.value,
            pred: label.pred + self.predictor.predict(&row.features),
        }
    }
}

/// Simulated-annealing exploration: perturbs each row's running logit by up
/// to 0.2 * U[0, 1] against its label. Deterministic only when seeded.
pub struct AnnealingAdapter {
    rng: ChaCha8Rng,
}

impl AnnealingAdapter {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl LabelAdapter<PredictedLabel> for AnnealingAdapter {
    type Out = PredictedLabel;

    fn adapt(&mut self, _row: &Row, label: &PredictedLabel) -> PredictedLabel {
        let amount = 0.2 * self.rng.gen::<f64>();
        let pred = if label.value {
            label.pred - amount
        } else {
            label.pred + amount
        };
        PredictedLabel {
            value: label.value,
            pred,
        }
    }
}
