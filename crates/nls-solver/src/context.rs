//! Simulation-wide flags shared by every solve at one time point.

use crate::model::EvalMode;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    #[default]
    Found,
    NotFound,
}

/// Per-time-point simulation state handed to every solve by `&mut`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    pub time: f64,
    /// Solve happens at an event boundary.
    pub discrete_call: bool,
    /// Model initialization is in progress.
    pub initial: bool,
    /// Residual models should keep their relations frozen.
    pub solve_continuous: bool,
    pub found_solution: SolutionStatus,
}

impl SimulationInfo {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    pub fn eval_mode(&self) -> EvalMode {
        if self.solve_continuous {
            EvalMode::Continuous
        } else {
            EvalMode::Discrete
        }
    }

    pub fn mark_not_found(&mut self) {
        self.found_solution = SolutionStatus::NotFound;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_flag_selects_mode() {
        let mut sim = SimulationInfo::new(1.5);
        assert_eq!(sim.eval_mode(), EvalMode::Discrete);
        sim.solve_continuous = true;
        assert_eq!(sim.eval_mode(), EvalMode::Continuous);
        assert_eq!(sim.found_solution, SolutionStatus::Found);
        sim.mark_not_found();
        assert_eq!(sim.found_solution, SolutionStatus::NotFound);
    }
}
