//! Root-finding kernel contract.

use crate::dense::LuFactors;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Outcome of one residual evaluation as seen by a kernel.
///
/// `Invalid` is an iteration-abort signal (e.g. the model hit a domain
/// error); the kernel decides how to react, it is never raised as an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluation {
    Valid,
    Invalid,
}

impl Evaluation {
    pub fn is_valid(self) -> bool {
        matches!(self, Evaluation::Valid)
    }
}

/// Residual callback handed to a kernel: `fcn(x, f)`.
///
/// The kernel owns `x`; implementations may transform it temporarily but must
/// hand it back unchanged.
pub type ResidualFn<'a> = dyn FnMut(&mut [f64], &mut [f64]) -> Evaluation + 'a;

/// Source of the kernel's per-variable scale `diag`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DiagMode {
    /// Kernel derives `diag` from Jacobian column norms (MINPACK `mode = 1`).
    #[default]
    Automatic,
    /// Caller supplies `diag` (MINPACK `mode = 2`).
    Supplied,
}

impl DiagMode {
    pub fn code(self) -> i32 {
        match self {
            DiagMode::Automatic => 1,
            DiagMode::Supplied => 2,
        }
    }
}

/// Kernel termination status. Numeric codes follow MINPACK `hybrd`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum KernelStatus {
    /// Improper input parameters.
    #[default]
    ImproperInput,
    /// Relative error between two consecutive iterates is at most `xtol`.
    Converged,
    /// Number of residual evaluations reached `maxfev`.
    MaxEvaluations,
    /// `xtol` is too small; no further improvement of the point is possible.
    ToleranceTooSmall,
    /// No progress as measured over the last five Jacobian evaluations.
    NoProgressJacobian,
    /// No progress as measured over the last ten iterations.
    NoProgressIterations,
}

impl KernelStatus {
    pub fn code(self) -> i32 {
        match self {
            KernelStatus::ImproperInput => 0,
            KernelStatus::Converged => 1,
            KernelStatus::MaxEvaluations => 2,
            KernelStatus::ToleranceTooSmall => 3,
            KernelStatus::NoProgressJacobian => 4,
            KernelStatus::NoProgressIterations => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(KernelStatus::ImproperInput),
            1 => Some(KernelStatus::Converged),
            2 => Some(KernelStatus::MaxEvaluations),
            3 => Some(KernelStatus::ToleranceTooSmall),
            4 => Some(KernelStatus::NoProgressJacobian),
            5 => Some(KernelStatus::NoProgressIterations),
            _ => None,
        }
    }

    /// Stall codes (4, 5) are the only ones eligible for tiered recovery.
    pub fn is_stall(self) -> bool {
        matches!(
            self,
            KernelStatus::NoProgressJacobian | KernelStatus::NoProgressIterations
        )
    }

    /// Any non-convergent status other than improper input (codes 2..=5).
    pub fn is_failure(self) -> bool {
        (2..=5).contains(&self.code())
    }
}

impl fmt::Display for KernelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            KernelStatus::ImproperInput => "improper input",
            KernelStatus::Converged => "converged",
            KernelStatus::MaxEvaluations => "maximum evaluations reached",
            KernelStatus::ToleranceTooSmall => "xtol too small",
            KernelStatus::NoProgressJacobian => "no progress (jacobian)",
            KernelStatus::NoProgressIterations => "no progress (iterations)",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

/// Scalar inputs of one kernel invocation.
#[derive(Clone, Debug)]
pub struct HybridParams {
    /// Relative step tolerance.
    pub xtol: f64,
    /// Evaluation budget for one invocation.
    pub maxfev: usize,
    /// Lower band half-width of the Jacobian.
    pub ml: usize,
    /// Upper band half-width of the Jacobian.
    pub mu: usize,
    /// Relative error of the residual function, drives the FD step.
    pub epsfcn: f64,
    pub mode: DiagMode,
    /// Initial trust-region bound factor.
    pub factor: f64,
    /// Report every `nprint` iterations at trace level (0 = never).
    pub nprint: usize,
}

impl HybridParams {
    /// Full-band defaults for an `n`-dimensional system.
    pub fn for_size(n: usize) -> Self {
        let band = n.saturating_sub(1);
        Self {
            xtol: 1e-12,
            maxfev: n * 10_000,
            ml: band,
            mu: band,
            epsfcn: 1e-12,
            mode: DiagMode::Automatic,
            factor: 100.0,
            nprint: 0,
        }
    }
}

/// Buffers shared between a kernel and its caller.
///
/// Allocated once per system; every invocation reuses them in place.
/// `fjac` is the working Jacobian (Broyden-updated); `fjacobian` is the last
/// finite-difference snapshot, kept stable for residual-scaling derivation.
/// Both are column-major.
#[derive(Clone, Debug)]
pub struct HybridBuffers {
    pub x: DVector<f64>,
    pub fvec: DVector<f64>,
    pub diag: DVector<f64>,
    pub fjac: DMatrix<f64>,
    pub fjacobian: DMatrix<f64>,
    pub(crate) step: DVector<f64>,
    pub(crate) trial_x: DVector<f64>,
    pub(crate) trial_f: DVector<f64>,
    pub(crate) model_f: DVector<f64>,
    pub(crate) grad: DVector<f64>,
    pub(crate) col_norms: DVector<f64>,
    pub(crate) fd_f: DVector<f64>,
    pub(crate) fd_x: DVector<f64>,
    pub(crate) norm_scratch: DVector<f64>,
    pub(crate) lu: LuFactors,
}

impl HybridBuffers {
    pub fn new(n: usize) -> Self {
        Self {
            x: DVector::zeros(n),
            fvec: DVector::zeros(n),
            diag: DVector::from_element(n, 1.0),
            fjac: DMatrix::zeros(n, n),
            fjacobian: DMatrix::zeros(n, n),
            step: DVector::zeros(n),
            trial_x: DVector::zeros(n),
            trial_f: DVector::zeros(n),
            model_f: DVector::zeros(n),
            grad: DVector::zeros(n),
            col_norms: DVector::zeros(n),
            fd_f: DVector::zeros(n),
            fd_x: DVector::zeros(n),
            norm_scratch: DVector::zeros(n),
            lu: LuFactors::new(n),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Result of one kernel invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelReport {
    pub status: KernelStatus,
    /// Residual evaluations consumed by this invocation.
    pub nfev: usize,
}

/// Derivative-free root finder.
///
/// On return `buf.x` holds the best point found (conditioned space),
/// `buf.fvec` its residual, and `buf.fjac` / `buf.fjacobian` the Jacobian
/// estimates. Implementations must not retry internally.
pub trait RootKernel {
    fn solve(
        &mut self,
        fcn: &mut ResidualFn<'_>,
        params: &HybridParams,
        buf: &mut HybridBuffers,
    ) -> KernelReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for code in 0..=5 {
            let status = KernelStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(KernelStatus::from_code(6).is_none());
        assert!(KernelStatus::from_code(-1).is_none());
    }

    #[test]
    fn stall_and_failure_classes() {
        assert!(KernelStatus::NoProgressJacobian.is_stall());
        assert!(KernelStatus::NoProgressIterations.is_stall());
        assert!(!KernelStatus::MaxEvaluations.is_stall());
        assert!(KernelStatus::MaxEvaluations.is_failure());
        assert!(KernelStatus::ToleranceTooSmall.is_failure());
        assert!(!KernelStatus::ImproperInput.is_failure());
        assert!(!KernelStatus::Converged.is_failure());
    }

    #[test]
    fn params_default_to_full_band() {
        let p = HybridParams::for_size(4);
        assert_eq!(p.ml, 3);
        assert_eq!(p.mu, 3);
        assert_eq!(p.maxfev, 40_000);
        assert_eq!(p.mode.code(), 1);
    }
}
