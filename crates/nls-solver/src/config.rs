//! Solver configuration.

use crate::error::{SolverError, SolverResult};
use nls_kernel::{DiagMode, HybridParams};
use serde::{Deserialize, Serialize};

/// Tuning knobs for nonlinear solves.
///
/// Kernel parameters (`xtol`, `factor`, ...) are passed through unchecked so
/// that bad values surface as the kernel's improper-input status. Only the
/// driver's own `tolerance` is validated here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Relative step tolerance of the kernel
    pub xtol: f64,
    /// Kernel evaluation budget per unknown
    pub evals_per_unknown: usize,
    /// Relative error of the residual function
    pub epsfcn: f64,
    /// Initial trust-region factor
    pub factor: f64,
    /// Absolute convergence tolerance on the raw and scaled residual norms
    pub tolerance: f64,
    /// Initial source of the kernel's per-variable scale
    pub diag_mode: DiagMode,
    /// Kernel iteration report interval (0 = silent)
    pub print_level: usize,
    /// Start every solve from the configured scaling mode, diagonal and
    /// tolerance instead of what recovery left behind
    pub reset_tuning_each_solve: bool,
    /// Keep the sequence of recovery tiers in each report
    pub record_tiers: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            xtol: 1e-12,
            evals_per_unknown: 10_000,
            epsfcn: 1e-12,
            factor: 100.0,
            tolerance: 1e-12,
            diag_mode: DiagMode::Automatic,
            print_level: 0,
            reset_tuning_each_solve: false,
            record_tiers: true,
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> SolverResult<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SolverError::Setup {
                what: format!("tolerance must be positive and finite, got {}", self.tolerance),
            });
        }
        Ok(())
    }

    /// Full-band kernel parameters for an `n`-dimensional system.
    pub fn params_for(&self, n: usize) -> HybridParams {
        let band = n.saturating_sub(1);
        HybridParams {
            xtol: self.xtol,
            maxfev: self.evals_per_unknown.saturating_mul(n),
            ml: band,
            mu: band,
            epsfcn: self.epsfcn,
            mode: self.diag_mode,
            factor: self.factor,
            nprint: self.print_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kernel_defaults() {
        let config = HybridConfig::default();
        let from_config = config.params_for(3);
        let reference = HybridParams::for_size(3);
        assert_eq!(from_config.xtol, reference.xtol);
        assert_eq!(from_config.maxfev, reference.maxfev);
        assert_eq!(from_config.ml, reference.ml);
        assert_eq!(from_config.mu, reference.mu);
        assert_eq!(from_config.factor, reference.factor);
        assert_eq!(from_config.mode, reference.mode);
    }

    #[test]
    fn rejects_bad_tolerance() {
        let mut config = HybridConfig::default();
        config.tolerance = 0.0;
        assert!(config.validate().is_err());
        config.tolerance = f64::NAN;
        assert!(config.validate().is_err());
        config.tolerance = 1e-8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: HybridConfig =
            serde_json::from_str(r#"{"factor": 10.0, "diag_mode": "supplied"}"#).unwrap();
        assert_eq!(config.factor, 10.0);
        assert_eq!(config.diag_mode, DiagMode::Supplied);
        assert_eq!(config.tolerance, 1e-12);
        assert!(config.record_tiers);
    }
}
