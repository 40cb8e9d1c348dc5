//! Regularized logloss over sector groups.

use crate::loss::sector::SectorGroup;
use crate::loss::{Objective, EXP_ARG_MAX, EXP_ARG_MIN};

/// Logistic loss of the sectored samples under the proposed variable
/// vector, with analytic gradient.
pub struct LogLoss<'a> {
    groups: &'a [SectorGroup],
}

impl<'a> LogLoss<'a> {
    pub fn new(groups: &'a [SectorGroup]) -> Self {
        Self { groups }
    }
}

impl<'a> Objective for LogLoss<'a> {
    fn eval_with_gradient(&self, gradient: &mut [f64], vars: &[f64]) -> f64 {
        let var_number = vars.len() - 1;
        let mut fun_val = 0.0;

        gradient.fill(0.0);

        for group in self.groups {
            let mask = group.mask();

            // Linear combination of the variables for this sector.
            let mut group_x = vars[0];
            for var_index in 0..var_number {
                let yes = mask & (1u64 << var_index) != 0;
                group_x += if yes {
                    vars[var_index + 1]
                } else {
                    -vars[var_index + 1]
                };
            }

            let mut grad_sum = 0.0;
            for sample in group.samples() {
                if sample.count == 0 {
                    continue;
                }
                let count = sample.count as f64;
                let exp_arg = (group_x + sample.pred).clamp(EXP_ARG_MIN, EXP_ARG_MAX);
                let e = 1.0 + (-exp_arg).exp();
                let y = if sample.value { 1.0 } else { 0.0 };

                grad_sum += (1.0 - e * y) * count / e;
                fun_val += if sample.value {
                    e.ln() * count
                } else {
                    (exp_arg + e.ln()) * count
                };
            }

            gradient[0] += grad_sum;
            for var_index in 0..var_number {
                gradient[var_index + 1] += if mask & (1u64 << var_index) != 0 {
                    grad_sum
                } else {
                    -grad_sum
                };
            }
        }

        fun_val
    }
}
