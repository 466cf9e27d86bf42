//! Residual evaluation between kernel space and model space.

use crate::model::{EvalMode, ResidualModel};
use nls_core::{to_conditioned_in_place, to_physical_in_place};
use nls_kernel::Evaluation;
use tracing::trace;

/// Callback state for one kernel invocation.
///
/// Borrows everything it needs from the owning system, so the kernel callback
/// never has to look its target up.
pub struct ResidualAdapter<'a> {
    model: &'a mut dyn ResidualModel,
    scaling: &'a [f64],
    use_scaling: bool,
    mode: EvalMode,
}

impl<'a> ResidualAdapter<'a> {
    pub fn new(
        model: &'a mut dyn ResidualModel,
        scaling: &'a [f64],
        use_scaling: bool,
        mode: EvalMode,
    ) -> Self {
        Self {
            model,
            scaling,
            use_scaling,
            mode,
        }
    }

    /// Evaluate the model at `x`.
    ///
    /// With scaling active `x` is conditioned on entry; it is moved to
    /// physical space for the model call and moved back before returning.
    pub fn evaluate(&mut self, x: &mut [f64], f: &mut [f64]) -> Evaluation {
        trace!(x = ?x, "residual call, point (conditioned)");
        if self.use_scaling {
            to_physical_in_place(x, self.scaling);
        }
        trace!(x = ?x, "residual call, point (physical)");

        let eval = self.model.residual(x, f, self.mode);

        if self.use_scaling {
            to_conditioned_in_place(x, self.scaling);
        }
        trace!(f = ?f, valid = eval.is_valid(), "residual values");
        eval
    }
}
