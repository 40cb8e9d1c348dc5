//! Objective functions with analytic gradients over proposed leaf logits.
//!
//! A candidate node with `k` proposed split variables defines up to `2^k`
//! sectors. The variable vector is `(b, d1..dk)`: `b` is a shared offset
//! and `d_i` the signed half-delta of variable `i`. Sector `s` with bitmask
//! `m` contributes logit `b + sum(m_i ? d_i : -d_i)` on top of each
//! sample's background logit.

pub mod growth_penalty;
pub mod logloss;
pub mod sector;
pub mod square_loss;
pub mod sum;

pub use growth_penalty::GrowthPenalty;
pub use logloss::LogLoss;
pub use sector::{SectorGroup, SectorSample};
pub use square_loss::SquaredProbabilityLoss;
pub use sum::SumObjective;

/// Lower clamp for probabilities entering a logarithm.
pub const LOGLOSS_EPS: f64 = 1e-7;
/// Soft bound box for optimizer variables.
pub const LOGLOSS_EXP_MIN: f64 = -10.0;
pub const LOGLOSS_EXP_MAX: f64 = 10.0;

/// Hard clamp for exponent arguments inside the loss kernels.
pub(crate) const EXP_ARG_MIN: f64 = -500.0;
pub(crate) const EXP_ARG_MAX: f64 = 500.0;

/// A differentiable objective over the variable vector `(b, d1..dk)`.
pub trait Objective {
    /// Evaluates the function at `vars` and writes its gradient into
    /// `gradient` (which is reset before accumulation). Both slices have
    /// the same length.
    fn eval_with_gradient(&self, gradient: &mut [f64], vars: &[f64]) -> f64;
}

/// 1 / (1 + exp(-x)).
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
