//! Diagnostic dumps of a solver state.

use crate::state::SolverState;
use tracing::{debug, trace};

/// Verbosity of a status dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detail {
    /// Emitted at `debug` (solved / no solution summaries).
    Summary,
    /// Emitted at `trace` (tier transitions).
    Verbose,
}

/// Dump evaluation count, error norms, and every unknown and residual with
/// its scaling factor.
pub fn print_status(
    state: &SolverState,
    nfunc_evals: usize,
    error: f64,
    error_scaled: f64,
    detail: Detail,
) {
    let b = &state.buffers;
    match detail {
        Detail::Summary => {
            debug!(nfunc = nfunc_evals, error, error_scaled, "status");
            for i in 0..state.len() {
                debug!(i, x = b.x[i], scaling = b.diag[i], "unknown");
            }
            for i in 0..state.len() {
                debug!(i, res = b.fvec[i], scaling = state.res_scaling[i], "residual");
            }
        }
        Detail::Verbose => {
            trace!(nfunc = nfunc_evals, error, error_scaled, "status");
            for i in 0..state.len() {
                trace!(i, x = b.x[i], scaling = b.diag[i], "unknown");
            }
            for i in 0..state.len() {
                trace!(i, res = b.fvec[i], scaling = state.res_scaling[i], "residual");
            }
        }
    }
}

/// Working Jacobian, one event per row.
pub fn trace_jacobian(state: &SolverState) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    trace!("jacobian matrix");
    for (i, row) in state.buffers.fjac.row_iter().enumerate() {
        let values: Vec<f64> = row.iter().copied().collect();
        trace!(row = i, values = ?values);
    }
}

pub fn trace_res_scaling(state: &SolverState) {
    trace!(factors = ?state.res_scaling.as_slice(), "scaling factors for residual vector");
}
