//! Recovery driver around a root-finding kernel.
//!
//! One solve runs the kernel on the conditioned point, judges the result with
//! its own residual norms and, while the kernel reports a stall, applies the
//! next admitted [`RecoveryTier`] and tries again. Hard kernel failures and an
//! exhausted ladder end the solve without a solution; improper input ends it
//! at once.

use crate::adapter::ResidualAdapter;
use crate::context::SimulationInfo;
use crate::error::{SolverError, SolverResult};
use crate::report::{Detail, print_status, trace_jacobian, trace_res_scaling};
use crate::state::SolverState;
use crate::system::NonlinearSystem;
use crate::tier::{RecoveryTier, RetryCounters};
use nls_core::{SysId, TINY, enorm, to_conditioned_in_place, to_physical_in_place};
use nls_kernel::{DiagMode, KernelStatus, RootKernel};
use serde::Serialize;
use tracing::{debug, debug_span, error, trace};

/// Why a solve produced no solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The kernel rejected its parameters.
    ImproperInput,
    /// Hard kernel failure or recovery ladder exhausted.
    NoSolution,
}

/// Outcome of one nonlinear solve.
#[derive(Clone, Debug, Serialize)]
pub struct SolveReport {
    pub system: SysId,
    pub name: String,
    pub time: f64,
    pub success: bool,
    pub failure: Option<FailureKind>,
    /// Kernel status of the last attempt, after norm reclassification.
    pub status: KernelStatus,
    pub kernel_calls: usize,
    /// Kernel residual evaluations summed over all attempts.
    pub function_evals: usize,
    pub tier_actions: usize,
    /// Applied tiers in order (empty unless `record_tiers`).
    pub tiers: Vec<RecoveryTier>,
    pub counters: RetryCounters,
    pub error: f64,
    pub error_scaled: f64,
    /// Tolerance in effect when the solve ended.
    pub tolerance: f64,
}

impl SolveReport {
    pub fn into_result(self) -> SolverResult<()> {
        match self.failure {
            None => Ok(()),
            Some(FailureKind::ImproperInput) => Err(SolverError::ImproperInput {
                system: self.name,
                time: self.time,
            }),
            Some(FailureKind::NoSolution) => Err(SolverError::NoSolution {
                system: self.name,
                time: self.time,
            }),
        }
    }
}

fn within(norm: f64, tolerance: f64) -> bool {
    norm <= tolerance
}

/// Apply `tier` to the physical point and the tuning in `state`.
fn apply_tier(
    tier: RecoveryTier,
    state: &mut SolverState,
    x_scaling: &[f64],
    x_old: &[f64],
    x_extrapolation: &[f64],
) {
    use RecoveryTier::*;
    let initial_factor = state.initial_factor();
    let b = &mut state.buffers;
    match tier {
        ShrinkTrustRegion => {
            state.params.factor /= 10.0;
        }
        PerturbPoint => {
            for (x, s) in b.x.iter_mut().zip(x_scaling) {
                *x += s * 0.1;
            }
        }
        DisableScaling => {
            state.use_x_scaling = false;
        }
        RestartAbove | RestartBelow => {
            let f = if tier == RestartAbove { 1.01 } else { 0.99 };
            for (x, e) in b.x.iter_mut().zip(x_extrapolation) {
                *x = e * f;
            }
            state.use_x_scaling = true;
        }
        RestartFromOld => {
            b.x.copy_from_slice(x_old);
            state.params.factor = initial_factor;
            state.use_x_scaling = true;
        }
        ResidualDiagonal => {
            for (d, r) in b.diag.iter_mut().zip(state.res_scaling.iter()) {
                let v = r.abs();
                *d = if v > 0.0 { v } else { TINY };
            }
            state.params.mode = DiagMode::Supplied;
        }
        PointFromScaling => {
            b.x.copy_from_slice(x_scaling);
            state.params.mode = DiagMode::Automatic;
        }
        PointOnes => {
            b.x.fill(1.0);
            state.params.mode = DiagMode::Automatic;
        }
        PointZeros => {
            b.x.fill(0.0);
            state.params.mode = DiagMode::Automatic;
        }
        UnitDiagonal => {
            b.x.copy_from_slice(x_extrapolation);
            b.diag.fill(1.0);
            state.params.mode = DiagMode::Supplied;
        }
        RelaxTolerance => {
            state.tolerance *= 10.0;
            state.params.mode = DiagMode::Supplied;
        }
    }
    if matches!(
        tier,
        ResidualDiagonal | PointFromScaling | PointOnes | PointZeros | UnitDiagonal | RelaxTolerance
    ) {
        state.params.factor = initial_factor;
        state.use_x_scaling = true;
    }
}

/// Solve `system` at the time point described by `sim`.
///
/// Starts from `x_old` on discrete calls and from `x_extrapolation`
/// otherwise, and always leaves the best point found in `system.x`. On
/// failure `sim.found_solution` is set to `NotFound`.
pub fn solve_nonlinear(
    system: &mut NonlinearSystem,
    kernel: &mut dyn RootKernel,
    sim: &mut SimulationInfo,
) -> SolveReport {
    let span = debug_span!("nonlinear_solve", system = %system.name, time = sim.time);
    let _enter = span.enter();

    let NonlinearSystem {
        id,
        name,
        model,
        x,
        x_old,
        x_extrapolation,
        x_scaling,
        state,
    } = system;
    let n = x.len();

    let initial_factor = state.initial_factor();
    state.params.factor = initial_factor;
    if state.config.reset_tuning_each_solve {
        state.reset_tuning();
    }
    state.tier_log.clear();

    debug!(n, discrete = sim.discrete_call, "start solving nonlinear system");
    for i in 0..n {
        debug!(
            i,
            x = x[i],
            scaling = x_scaling[i],
            old = x_old[i],
            extrapolated = x_extrapolation[i],
            "start value"
        );
    }

    let start = if sim.discrete_call {
        &x_old[..]
    } else {
        &x_extrapolation[..]
    };
    state.buffers.x.copy_from_slice(start);

    ResidualAdapter::new(&mut **model, x_scaling, false, sim.eval_mode()).evaluate(
        state.buffers.x.as_mut_slice(),
        state.buffers.fvec.as_mut_slice(),
    );

    let mut counters = RetryCounters::default();
    let mut kernel_calls = 0;
    let mut function_evals = 0;
    let mut tier_actions = 0;
    let mut failure = None;
    let mut error_norm;
    let mut error_scaled;

    loop {
        trace!(x = ?state.buffers.x.as_slice(), "iteration start point");
        if state.use_x_scaling {
            to_conditioned_in_place(state.buffers.x.as_mut_slice(), x_scaling);
            trace!(x = ?state.buffers.x.as_slice(), "iteration start point (conditioned)");
        }

        // A stalled discrete solve keeps evaluating its discontinuities.
        if !(state.info == KernelStatus::NoProgressJacobian && sim.discrete_call) {
            sim.solve_continuous = true;
        }

        let report = {
            let mut adapter = ResidualAdapter::new(
                &mut **model,
                x_scaling,
                state.use_x_scaling,
                sim.eval_mode(),
            );
            let mut fcn = |x: &mut [f64], f: &mut [f64]| adapter.evaluate(x, f);
            kernel.solve(&mut fcn, &state.params, &mut state.buffers)
        };
        sim.solve_continuous = false;
        kernel_calls += 1;
        function_evals += report.nfev;
        state.nfev = report.nfev;
        state.info = report.status;

        if state.use_x_scaling {
            to_physical_in_place(state.buffers.x.as_mut_slice(), x_scaling);
        }

        if state.info == KernelStatus::ImproperInput {
            error!(system = %name, time = sim.time, "improper input parameters to nonlinear solver");
            sim.mark_not_found();
            failure = Some(FailureKind::ImproperInput);
            error_norm = enorm(state.buffers.fvec.as_slice());
            error_scaled = enorm(state.res_scaling.as_slice());
            break;
        }

        if sim.discrete_call {
            ResidualAdapter::new(&mut **model, x_scaling, false, sim.eval_mode()).evaluate(
                state.buffers.x.as_mut_slice(),
                state.buffers.fvec.as_mut_slice(),
            );
            model.store_relations();
        }

        trace_jacobian(state);
        state.update_res_scaling();
        trace_res_scaling(state);

        error_norm = enorm(state.buffers.fvec.as_slice());
        error_scaled = enorm(state.res_scaling.as_slice());
        let tolerance = state.tolerance;

        if state.info == KernelStatus::Converged
            && !within(error_norm, tolerance)
            && !within(error_scaled, tolerance)
        {
            state.info = KernelStatus::NoProgressJacobian;
        }

        if state.info == KernelStatus::Converged
            || within(error_norm, tolerance)
            || within(error_scaled, tolerance)
        {
            debug!(
                retries = counters.retries,
                restarts = counters.restarts + counters.rescales,
                "system solved"
            );
            print_status(state, function_evals, error_norm, error_scaled, Detail::Summary);
            break;
        }

        let next = if state.info.is_stall() {
            RecoveryTier::select(&counters)
        } else {
            None
        };
        let Some(tier) = next else {
            sim.mark_not_found();
            if !sim.initial {
                error!(system = %name, time = sim.time, "nonlinear system failed");
            }
            debug!(
                status = %state.info,
                retries = counters.retries,
                restarts = counters.restarts + counters.rescales,
                "no solution"
            );
            print_status(state, function_evals, error_norm, error_scaled, Detail::Summary);
            failure = Some(FailureKind::NoSolution);
            break;
        };

        apply_tier(tier, state, x_scaling, x_old, x_extrapolation);
        counters.record(tier);
        tier_actions += 1;
        if state.config.record_tiers {
            state.tier_log.push(tier);
        }
        debug!(
            tier = %tier,
            factor = state.params.factor,
            tolerance = state.tolerance,
            "iteration making no progress"
        );
        print_status(state, function_evals, error_norm, error_scaled, Detail::Verbose);
    }

    x.copy_from_slice(state.buffers.x.as_slice());
    state.params.factor = initial_factor;

    SolveReport {
        system: *id,
        name: name.clone(),
        time: sim.time,
        success: failure.is_none(),
        failure,
        status: state.info,
        kernel_calls,
        function_evals,
        tier_actions,
        tiers: state.tier_log.clone(),
        counters,
        error: error_norm,
        error_scaled,
        tolerance: state.tolerance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HybridConfig;

    fn state_with_point(x: &[f64]) -> SolverState {
        let mut state = SolverState::new(x.len(), &HybridConfig::default());
        state.buffers.x.copy_from_slice(x);
        state
    }

    #[test]
    fn shrink_divides_factor_only() {
        let mut state = state_with_point(&[1.0, 2.0]);
        apply_tier(RecoveryTier::ShrinkTrustRegion, &mut state, &[1.0; 2], &[0.0; 2], &[0.0; 2]);
        assert_eq!(state.factor(), 10.0);
        assert_eq!(state.buffers.x.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn perturb_adds_tenth_of_scaling() {
        let mut state = state_with_point(&[1.0, 2.0]);
        apply_tier(RecoveryTier::PerturbPoint, &mut state, &[10.0, 0.5], &[0.0; 2], &[0.0; 2]);
        assert!((state.buffers.x[0] - 2.0).abs() < 1e-15);
        assert!((state.buffers.x[1] - 2.05).abs() < 1e-15);
    }

    #[test]
    fn restarts_use_extrapolation_and_old_point() {
        let mut state = state_with_point(&[0.0]);
        state.use_x_scaling = false;
        apply_tier(RecoveryTier::RestartAbove, &mut state, &[1.0], &[3.0], &[100.0]);
        assert!((state.buffers.x[0] - 101.0).abs() < 1e-12);
        assert!(state.use_x_scaling());
        apply_tier(RecoveryTier::RestartBelow, &mut state, &[1.0], &[3.0], &[100.0]);
        assert!((state.buffers.x[0] - 99.0).abs() < 1e-12);
        state.params.factor = 0.1;
        apply_tier(RecoveryTier::RestartFromOld, &mut state, &[1.0], &[3.0], &[100.0]);
        assert_eq!(state.buffers.x[0], 3.0);
        assert_eq!(state.factor(), 100.0);
    }

    #[test]
    fn residual_diagonal_floors_non_positive_entries() {
        let mut state = state_with_point(&[0.0; 3]);
        state.res_scaling.copy_from_slice(&[-2.0, 0.0, f64::NAN]);
        apply_tier(RecoveryTier::ResidualDiagonal, &mut state, &[1.0; 3], &[0.0; 3], &[0.0; 3]);
        assert_eq!(state.diag(), &[2.0, TINY, TINY]);
        assert_eq!(state.mode(), DiagMode::Supplied);
    }

    #[test]
    fn rescale_tiers_reset_factor_and_scaling() {
        for tier in [
            RecoveryTier::PointFromScaling,
            RecoveryTier::PointOnes,
            RecoveryTier::PointZeros,
            RecoveryTier::UnitDiagonal,
            RecoveryTier::RelaxTolerance,
        ] {
            let mut state = state_with_point(&[5.0]);
            state.params.factor = 1e-3;
            state.use_x_scaling = false;
            apply_tier(tier, &mut state, &[2.0], &[3.0], &[4.0]);
            assert_eq!(state.factor(), 100.0, "{tier}");
            assert!(state.use_x_scaling(), "{tier}");
        }
    }

    #[test]
    fn rescale_tier_points_and_modes() {
        let cases = [
            (RecoveryTier::PointFromScaling, 2.0, DiagMode::Automatic),
            (RecoveryTier::PointOnes, 1.0, DiagMode::Automatic),
            (RecoveryTier::PointZeros, 0.0, DiagMode::Automatic),
            (RecoveryTier::UnitDiagonal, 4.0, DiagMode::Supplied),
            (RecoveryTier::RelaxTolerance, 5.0, DiagMode::Supplied),
        ];
        for (tier, expected_x, expected_mode) in cases {
            let mut state = state_with_point(&[5.0]);
            state.buffers.diag[0] = 9.0;
            apply_tier(tier, &mut state, &[2.0], &[3.0], &[4.0]);
            assert_eq!(state.buffers.x[0], expected_x, "{tier}");
            assert_eq!(state.mode(), expected_mode, "{tier}");
        }
    }

    #[test]
    fn unit_diagonal_and_relaxed_tolerance() {
        let mut state = state_with_point(&[5.0, 5.0]);
        state.buffers.diag.fill(9.0);
        apply_tier(RecoveryTier::UnitDiagonal, &mut state, &[1.0; 2], &[0.0; 2], &[0.0; 2]);
        assert_eq!(state.diag(), &[1.0, 1.0]);

        apply_tier(RecoveryTier::RelaxTolerance, &mut state, &[1.0; 2], &[0.0; 2], &[0.0; 2]);
        apply_tier(RecoveryTier::RelaxTolerance, &mut state, &[1.0; 2], &[0.0; 2], &[0.0; 2]);
        assert!((state.tolerance() - 1e-10).abs() < 1e-24);
    }

    #[test]
    fn report_maps_failures_to_errors() {
        let mut report = SolveReport {
            system: SysId::from_index(0),
            name: "sys".to_string(),
            time: 2.5,
            success: true,
            failure: None,
            status: KernelStatus::Converged,
            kernel_calls: 1,
            function_evals: 4,
            tier_actions: 0,
            tiers: Vec::new(),
            counters: RetryCounters::default(),
            error: 0.0,
            error_scaled: 0.0,
            tolerance: 1e-12,
        };
        assert!(report.clone().into_result().is_ok());

        report.success = false;
        report.failure = Some(FailureKind::NoSolution);
        let err = report.clone().into_result().unwrap_err();
        assert!(matches!(err, SolverError::NoSolution { time, .. } if time == 2.5));

        report.failure = Some(FailureKind::ImproperInput);
        assert!(matches!(
            report.into_result(),
            Err(SolverError::ImproperInput { .. })
        ));
    }
}
