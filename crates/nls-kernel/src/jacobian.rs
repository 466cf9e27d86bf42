//! Forward-difference Jacobian estimation.

use crate::kernel::{Evaluation, ResidualFn};
use nalgebra::{DMatrix, DVector};

/// Scratch vectors for [`forward_difference`].
pub struct FdScratch<'a> {
    pub f: &'a mut DVector<f64>,
    pub x: &'a mut DVector<f64>,
}

/// Number of residual evaluations one Jacobian estimate costs.
pub fn evaluations_per_jacobian(n: usize, ml: usize, mu: usize) -> usize {
    let msum = ml + mu + 1;
    if msum >= n { n } else { msum }
}

/// Estimate `jac = df/dx` at `x` by forward differences.
///
/// Column j is perturbed by `sqrt(max(epsfcn, eps)) * |x[j]|` (or the bare
/// relative step when `x[j] == 0`). When the band `ml + mu + 1` is narrower
/// than `n`, columns that cannot interact are perturbed together and entries
/// outside the band are zeroed. `x` is restored before returning.
///
/// Returns `Invalid` as soon as one perturbed evaluation is rejected.
pub fn forward_difference(
    fcn: &mut ResidualFn<'_>,
    x: &mut [f64],
    fvec: &DVector<f64>,
    jac: &mut DMatrix<f64>,
    ml: usize,
    mu: usize,
    epsfcn: f64,
    scratch: FdScratch<'_>,
) -> Evaluation {
    let n = x.len();
    let eps = epsfcn.max(f64::EPSILON).sqrt();
    let msum = ml + mu + 1;

    if msum >= n {
        for j in 0..n {
            let temp = x[j];
            let h = step_size(eps, temp);
            x[j] = temp + h;
            let eval = fcn(&mut *x, scratch.f.as_mut_slice());
            x[j] = temp;
            if !eval.is_valid() {
                return Evaluation::Invalid;
            }
            for i in 0..n {
                jac[(i, j)] = (scratch.f[i] - fvec[i]) / h;
            }
        }
        return Evaluation::Valid;
    }

    for k in 0..msum {
        for j in (k..n).step_by(msum) {
            scratch.x[j] = x[j];
            x[j] += step_size(eps, x[j]);
        }
        let eval = fcn(&mut *x, scratch.f.as_mut_slice());
        for j in (k..n).step_by(msum) {
            x[j] = scratch.x[j];
        }
        if !eval.is_valid() {
            return Evaluation::Invalid;
        }
        for j in (k..n).step_by(msum) {
            let h = step_size(eps, x[j]);
            for i in 0..n {
                let in_band = i + mu >= j && i <= j + ml;
                jac[(i, j)] = if in_band {
                    (scratch.f[i] - fvec[i]) / h
                } else {
                    0.0
                };
            }
        }
    }
    Evaluation::Valid
}

fn step_size(eps: f64, x: f64) -> f64 {
    let h = eps * x.abs();
    if h == 0.0 { eps } else { h }
}
