//! Model-side callbacks.

use nalgebra::{DMatrix, DVector};
use nls_kernel::Evaluation;
use serde::{Deserialize, Serialize};

/// How a model should treat its discontinuities during one evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMode {
    /// Relations are frozen; the residual is smooth in `x`.
    Continuous,
    /// Relations are re-evaluated at the current point (event handling).
    #[default]
    Discrete,
}

/// Residual of a nonlinear equation system in physical coordinates.
pub trait ResidualModel {
    /// Write `f(x)` into `f`. Returning [`Evaluation::Invalid`] aborts the
    /// kernel's current step; `f` must still hold finite values.
    fn residual(&mut self, x: &[f64], f: &mut [f64], mode: EvalMode) -> Evaluation;

    /// Commit the relation values of the last discrete evaluation.
    fn store_relations(&mut self) {}
}

/// [`ResidualModel`] backed by a closure.
pub struct FnModel<F> {
    f: F,
}

impl<F> FnModel<F>
where
    F: FnMut(&[f64], &mut [f64], EvalMode) -> Evaluation,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ResidualModel for FnModel<F>
where
    F: FnMut(&[f64], &mut [f64], EvalMode) -> Evaluation,
{
    fn residual(&mut self, x: &[f64], f: &mut [f64], mode: EvalMode) -> Evaluation {
        (self.f)(x, f, mode)
    }
}

/// Matrix and right-hand side of a linear system `A x = b`.
///
/// Both are rebuilt on every solve; `a` arrives zeroed.
pub trait LinearModel {
    fn set_matrix(&mut self, a: &mut DMatrix<f64>);
    fn set_rhs(&mut self, b: &mut DVector<f64>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_model_forwards_mode() {
        let mut model = FnModel::new(|x: &[f64], f: &mut [f64], mode: EvalMode| {
            f[0] = match mode {
                EvalMode::Continuous => x[0],
                EvalMode::Discrete => -x[0],
            };
            Evaluation::Valid
        });
        let mut f = [0.0];
        model.residual(&[2.0], &mut f, EvalMode::Continuous);
        assert_eq!(f[0], 2.0);
        model.residual(&[2.0], &mut f, EvalMode::Discrete);
        assert_eq!(f[0], -2.0);
        model.store_relations();
    }
}
