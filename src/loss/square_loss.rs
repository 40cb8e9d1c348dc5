//! Squared probability deviation loss over sector groups.

use crate::loss::sector::SectorGroup;
use crate::loss::{Objective, EXP_ARG_MAX, EXP_ARG_MIN};

/// `(y - sigmoid(x))^2` summed over the sectored samples, with analytic
/// gradient. Same sector structure as [`LogLoss`](crate::loss::LogLoss).
pub struct SquaredProbabilityLoss<'a> {
    groups: &'a [SectorGroup],
}

impl<'a> SquaredProbabilityLoss<'a> {
    pub fn new(groups: &'a [SectorGroup]) -> Self {
        Self { groups }
    }
}

impl<'a> Objective for SquaredProbabilityLoss<'a> {
    fn eval_with_gradient(&self, gradient: &mut [f64], vars: &[f64]) -> f64 {
        let var_number = vars.len() - 1;
        let mut fun_val = 0.0;

        gradient.fill(0.0);

        for group in self.groups {
            let mask = group.mask();

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
                let p = 1.0 / e;
                let y = if sample.value { 1.0 } else { 0.0 };

                grad_sum += 2.0 * (p - y) * (1.0 - p) * count;
                fun_val += (y - p) * (y - p) * count;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SectorCollector;
    use crate::dataset::PredictedLabel;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn zero_point_on_balanced_data() {
        // p = 0.5 against labels 1 and 0: loss = 2 * 0.25, gradient
        // contributions cancel.
        let mut collector = SectorCollector::start(1, 0.0);
        collector.add(1, &PredictedLabel::new(true, 0.0), 1);
        collector.add(1, &PredictedLabel::new(false, 0.0), 1);
        let groups = collector.finalize();

        let loss = SquaredProbabilityLoss::new(&groups);
        let mut grad = vec![0.0; 2];
        let value = loss.eval_with_gradient(&mut grad, &[0.0, 0.0]);
        assert_approx_eq!(value, 0.5, 1e-12);
        assert_approx_eq!(grad[0], 0.0, 1e-12);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let mut collector = SectorCollector::start(2, 0.1);
        collector.add(0, &PredictedLabel::new(false, 0.0), 4);
        collector.add(1, &PredictedLabel::new(true, -0.2), 2);
        collector.add(3, &PredictedLabel::new(true, 0.3), 1);
        let groups = collector.finalize();

        let loss = SquaredProbabilityLoss::new(&groups);
        let point = [0.1, -0.3, 0.2];
        let mut grad = vec![0.0; 3];
        let f0 = loss.eval_with_gradient(&mut grad, &point);

        let h = 1e-6;
        for i in 0..point.len() {
            let mut shifted = point;
            shifted[i] += h;
            let mut scratch = vec![0.0; 3];
            let f1 = loss.eval_with_gradient(&mut scratch, &shifted);
            assert_approx_eq!((f1 - f0) / h, grad[i], 1e-4);
        }
    }
}
