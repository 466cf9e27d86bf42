//! Per-system solver workspace.

use crate::config::HybridConfig;
use crate::tier::{MAX_TIER_ACTIONS, RecoveryTier};
use nalgebra::DVector;
use nls_kernel::{DiagMode, HybridBuffers, HybridParams, KernelStatus};

/// Workspace of one nonlinear system, allocated once and reused by every
/// solve.
///
/// Besides the kernel buffers it carries the tuning that recovery may change:
/// conditioning on/off, the diagonal source, the diagonal itself and the
/// convergence tolerance. These persist into the next solve unless
/// `reset_tuning_each_solve` is set.
#[derive(Clone, Debug)]
pub struct SolverState {
    pub(crate) buffers: HybridBuffers,
    pub(crate) res_scaling: DVector<f64>,
    pub(crate) params: HybridParams,
    pub(crate) config: HybridConfig,
    pub(crate) tolerance: f64,
    pub(crate) use_x_scaling: bool,
    pub(crate) info: KernelStatus,
    pub(crate) nfev: usize,
    pub(crate) tier_log: Vec<RecoveryTier>,
}

impl SolverState {
    pub fn new(n: usize, config: &HybridConfig) -> Self {
        let tier_log = if config.record_tiers {
            Vec::with_capacity(MAX_TIER_ACTIONS)
        } else {
            Vec::new()
        };
        Self {
            buffers: HybridBuffers::new(n),
            res_scaling: DVector::zeros(n),
            params: config.params_for(n),
            config: config.clone(),
            tolerance: config.tolerance,
            use_x_scaling: true,
            info: KernelStatus::ImproperInput,
            nfev: 0,
            tier_log,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    /// Convergence tolerance the next solve starts with.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn use_x_scaling(&self) -> bool {
        self.use_x_scaling
    }

    pub fn mode(&self) -> DiagMode {
        self.params.mode
    }

    /// Trust-region factor handed to the next kernel call.
    pub fn factor(&self) -> f64 {
        self.params.factor
    }

    /// Status of the last kernel call (after norm reclassification).
    pub fn info(&self) -> KernelStatus {
        self.info
    }

    /// Evaluations of the last kernel call.
    pub fn nfev(&self) -> usize {
        self.nfev
    }

    pub fn diag(&self) -> &[f64] {
        self.buffers.diag.as_slice()
    }

    pub fn res_scaling(&self) -> &[f64] {
        self.res_scaling.as_slice()
    }

    pub fn residual(&self) -> &[f64] {
        self.buffers.fvec.as_slice()
    }

    pub(crate) fn initial_factor(&self) -> f64 {
        self.config.factor
    }

    /// Restore the configured tuning, discarding recovery leftovers.
    pub fn reset_tuning(&mut self) {
        self.use_x_scaling = true;
        self.params.mode = self.config.diag_mode;
        self.buffers.diag.fill(1.0);
        self.tolerance = self.config.tolerance;
    }

    /// `res_scaling[i] = fvec[i] / max(TINY, max_k |J[k, i]|)`, with the
    /// maximum taken over column `i` of the Jacobian snapshot.
    pub(crate) fn update_res_scaling(&mut self) {
        let n = self.len();
        for i in 0..n {
            let peak = self
                .buffers
                .fjacobian
                .column(i)
                .iter()
                .fold(nls_core::TINY, |acc, v| acc.max(v.abs()));
            self.res_scaling[i] = self.buffers.fvec[i] * (1.0 / peak);
        }
    }
}
