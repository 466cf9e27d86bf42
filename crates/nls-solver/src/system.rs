//! Nonlinear equation system descriptor.

use crate::config::HybridConfig;
use crate::context::SimulationInfo;
use crate::driver::{SolveReport, solve_nonlinear};
use crate::error::{SolverError, SolverResult};
use crate::model::ResidualModel;
use crate::state::SolverState;
use nls_core::{NlsError, SysId};
use nls_kernel::{HybridDogleg, RootKernel};

/// A nonlinear system of the simulated model together with its start values,
/// scaling factors and solver workspace.
///
/// All vectors are in physical coordinates.
pub struct NonlinearSystem {
    pub(crate) id: SysId,
    pub(crate) name: String,
    pub(crate) model: Box<dyn ResidualModel>,
    pub(crate) x: Vec<f64>,
    pub(crate) x_old: Vec<f64>,
    pub(crate) x_extrapolation: Vec<f64>,
    pub(crate) x_scaling: Vec<f64>,
    pub(crate) state: SolverState,
}

fn check_len(what: &'static str, expected: usize, values: &[f64]) -> SolverResult<()> {
    if values.len() != expected {
        return Err(NlsError::DimensionMismatch {
            what,
            expected,
            actual: values.len(),
        }
        .into());
    }
    Ok(())
}

fn check_finite(what: &'static str, values: &[f64]) -> SolverResult<()> {
    for v in values {
        nls_core::ensure_finite(*v, what)?;
    }
    Ok(())
}

impl NonlinearSystem {
    /// Create a system of size `start.len()` with unit scaling.
    ///
    /// `start` seeds the current, previous and extrapolated points.
    pub fn new(
        id: SysId,
        name: impl Into<String>,
        model: Box<dyn ResidualModel>,
        start: &[f64],
        config: &HybridConfig,
    ) -> SolverResult<Self> {
        let n = start.len();
        if n == 0 {
            return Err(SolverError::Setup {
                what: "nonlinear system must have at least one unknown".to_string(),
            });
        }
        config.validate()?;
        check_finite("start value", start)?;

        Ok(Self {
            id,
            name: name.into(),
            model,
            x: start.to_vec(),
            x_old: start.to_vec(),
            x_extrapolation: start.to_vec(),
            x_scaling: vec![1.0; n],
            state: SolverState::new(n, config),
        })
    }

    /// Replace the per-unknown scaling factors (nominal magnitudes).
    pub fn with_scaling(mut self, scaling: &[f64]) -> SolverResult<Self> {
        check_len("scaling", self.len(), scaling)?;
        for (index, s) in scaling.iter().enumerate() {
            if !s.is_finite() || *s <= 0.0 {
                return Err(NlsError::NonPositiveScale { index, value: *s }.into());
            }
        }
        self.x_scaling.copy_from_slice(scaling);
        Ok(self)
    }

    pub fn id(&self) -> SysId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Latest point, the solution after a successful solve.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn x_old(&self) -> &[f64] {
        &self.x_old
    }

    pub fn x_extrapolation(&self) -> &[f64] {
        &self.x_extrapolation
    }

    pub fn x_scaling(&self) -> &[f64] {
        &self.x_scaling
    }

    pub fn state(&self) -> &SolverState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SolverState {
        &mut self.state
    }

    pub fn set_x(&mut self, values: &[f64]) -> SolverResult<()> {
        check_len("x", self.len(), values)?;
        self.x.copy_from_slice(values);
        Ok(())
    }

    /// Previous accepted point, the start value of discrete calls.
    pub fn set_x_old(&mut self, values: &[f64]) -> SolverResult<()> {
        check_len("x_old", self.len(), values)?;
        check_finite("x_old", values)?;
        self.x_old.copy_from_slice(values);
        Ok(())
    }

    /// Predicted point, the start value of continuous calls.
    pub fn set_x_extrapolation(&mut self, values: &[f64]) -> SolverResult<()> {
        check_len("x_extrapolation", self.len(), values)?;
        check_finite("x_extrapolation", values)?;
        self.x_extrapolation.copy_from_slice(values);
        Ok(())
    }

    /// Solve with the default hybrid kernel.
    pub fn solve(&mut self, sim: &mut SimulationInfo) -> SolveReport {
        self.solve_with(&mut HybridDogleg::new(), sim)
    }

    pub fn solve_with(
        &mut self,
        kernel: &mut dyn RootKernel,
        sim: &mut SimulationInfo,
    ) -> SolveReport {
        solve_nonlinear(self, kernel, sim)
    }
}

impl std::fmt::Debug for NonlinearSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonlinearSystem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("x", &self.x)
            .field("x_scaling", &self.x_scaling)
            .finish_non_exhaustive()
    }
}
