//! Bounded descent over a fused objective: the per-split optimization that
//! jointly fits a proposed node's leaf logits.

use crate::loss::{Objective, LOGLOSS_EXP_MAX, LOGLOSS_EXP_MIN};
use crate::optim::line_search::line_search;
use crate::optim::vec_ops::{dist_sq, neg_into, norm_sq};

const MAX_ITERATIONS: u32 = 100;
const F_TOL: f64 = 1e-6;
const GRAD_TOL_SQ: f64 = 1e-3;
const VAR_TOL_SQ: f64 = 1e-3;
/// Deltas at or below this magnitude are truncated to zero in the result.
const DELTA_FLOOR: f64 = 1e-3;

/// Result of a [`minimize`] run. The optimizer is best effort: failure to
/// converge is not an error and the last iterate is returned.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub vars: Vec<f64>,
    pub value: f64,
    pub iterations: u32,
    pub converged: bool,
}

impl Minimum {
    pub fn is_finite(&self) -> bool {
        self.value.is_finite() && self.vars.iter().all(|v| v.is_finite())
    }
}

/// Minimizes `fun` over `var_count` coordinates `(b, d1..dk)` starting from
/// zero, keeping every coordinate inside the soft bound box.
///
/// Each iteration takes the steepest-descent direction through a
/// backtracking line search seeded with step `1/|g|`. When the convergence
/// tolerances first trip, a single "stepped" phase restricts descent to the
/// largest-magnitude gradient coordinate to force progress along one axis;
/// the run terminates once the tolerances trip again with the flag off.
pub fn minimize<F: Objective>(fun: &F, var_count: usize) -> Minimum {
    assert!(var_count > 0);

    let mut x = vec![0.0; var_count];
    let mut grad = vec![0.0; var_count];
    let mut f = fun.eval_with_gradient(&mut grad, &x);

    let mut direction = vec![0.0; var_count];
    let mut stepped = false;
    let mut tried_stepped = false;
    let mut converged = false;
    let mut iteration = 0;

    while iteration < MAX_ITERATIONS {
        let mut search_grad = grad.clone();
        if stepped {
            reduce_to_largest(&mut search_grad);
        }

        let mut new_x = x.clone();
        let mut new_f = f;
        let mut new_grad = grad.clone();

        let grad_norm_sq = norm_sq(&search_grad);
        if grad_norm_sq > 1e-14 {
            neg_into(&mut direction, &search_grad);
            let initial_step = 1.0 / grad_norm_sq.sqrt();
            line_search(
                fun,
                &mut new_x,
                &mut new_f,
                &mut new_grad,
                &direction,
                initial_step,
            );
        }

        for v in new_x.iter_mut() {
            *v = v.clamp(LOGLOSS_EXP_MIN, LOGLOSS_EXP_MAX);
        }

        let f_diff = (new_f - f).abs();
        let var_diff = dist_sq(&new_x, &x);
        let g_norm_sq = norm_sq(&new_grad);

        x = new_x;
        f = new_f;
        grad = new_grad;
        iteration += 1;

        if stepped {
            // The stepped phase ends on any sign of stalling.
            if f_diff < F_TOL
                || g_norm_sq < GRAD_TOL_SQ
                || var_diff < VAR_TOL_SQ
                || iteration >= MAX_ITERATIONS / 2
            {
                stepped = false;
            }
        } else if f_diff < F_TOL && g_norm_sq < GRAD_TOL_SQ && var_diff < VAR_TOL_SQ {
            if !tried_stepped && var_count > 1 {
                stepped = true;
                tried_stepped = true;
            } else {
                converged = true;
                break;
            }
        }
    }

    let mut truncated = false;
    for v in x[1..].iter_mut() {
        if v.abs() <= DELTA_FLOOR {
            if *v != 0.0 {
                truncated = true;
            }
            *v = 0.0;
        }
    }
    if truncated {
        f = fun.eval_with_gradient(&mut grad, &x);
    }

    Minimum {
        vars: x,
        value: f,
        iterations: iteration,
        converged,
    }
}

/// Zeroes every gradient coordinate except the one with the largest
/// magnitude, restricting the next step to a single axis.
fn reduce_to_largest(grads: &mut [f64]) {
    let mut max_index = 0;
    let mut max_abs = grads[0].abs();
    for (i, g) in grads.iter().enumerate().skip(1) {
        if g.abs() > max_abs {
            max_abs = g.abs();
            max_index = i;
        }
    }
    for (i, g) in grads.iter_mut().enumerate() {
        if i != max_index {
            *g = 0.0;
        }
    }
}
