//! Built-in equation systems for exercising the drivers.

use crate::error::{CliError, CliResult};
use nalgebra::{DMatrix, DVector};
use nls_kernel::Evaluation;
use nls_sim::{EquationSystems, StepReport, SystemSummary};
use nls_solver::{FnModel, HybridConfig, LinearModel, ResidualModel};
use serde::Serialize;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// x0^2 = 2, x1 = 1
    Sqrt2,
    /// Powell's badly scaled function
    Powell,
    /// Broyden tridiagonal function with ten unknowns
    Broyden,
    /// Residual that is never valid; walks the whole recovery ladder
    Stall,
    /// Linear system with a rank-one matrix
    Singular,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Sqrt2,
        Scenario::Powell,
        Scenario::Broyden,
        Scenario::Stall,
        Scenario::Singular,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Sqrt2 => "sqrt2",
            Scenario::Powell => "powell",
            Scenario::Broyden => "broyden",
            Scenario::Stall => "stall",
            Scenario::Singular => "singular",
        }
    }

    fn register(self, systems: &mut EquationSystems) -> CliResult<()> {
        let name = self.name();
        match self {
            Scenario::Sqrt2 => {
                systems.add_nonlinear(name, sqrt2(), &[1.0, 1.0], &[1.0, 1.0])?;
            }
            Scenario::Powell => {
                systems.add_nonlinear(name, powell(), &[0.0, 1.0], &[1.0, 1.0])?;
            }
            Scenario::Broyden => {
                let n = 10;
                systems.add_nonlinear(name, broyden(), &vec![-1.0; n], &vec![1.0; n])?;
            }
            Scenario::Stall => {
                systems.add_nonlinear(name, stall(), &[0.0, 0.0], &[2.0, 4.0])?;
            }
            Scenario::Singular => {
                let model = Dense {
                    a: DMatrix::from_element(2, 2, 1.0),
                    b: DVector::from_element(2, 2.0),
                };
                systems.add_linear(name, 2, Box::new(model))?;
            }
        }
        Ok(())
    }
}

/// Read a YAML solver configuration, or the defaults without a path.
pub fn load_config(path: Option<&Path>) -> CliResult<HybridConfig> {
    let Some(path) = path else {
        return Ok(HybridConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: HybridConfig = serde_yaml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Solve one scenario in initialization mode at `t = 0`.
pub fn run_scenario(scenario: Scenario, config: HybridConfig) -> CliResult<StepReport> {
    let mut systems = EquationSystems::new(config)?;
    scenario.register(&mut systems)?;
    info!(scenario = scenario.name(), "running scenario");
    Ok(systems.initialize(0.0)?)
}

#[derive(Clone, Debug, Serialize)]
pub struct TransientRun {
    pub steps: usize,
    pub failed_steps: usize,
    pub final_time: f64,
    /// Solution of `x^2 = 2 + t` at the final time.
    pub root: f64,
    pub systems: Vec<SystemSummary>,
}

/// Track a moving root and a time-dependent linear system from `0` to
/// `t_end` in steps of `dt`, with an event re-solve at every `event_every`
/// steps (never when zero).
pub fn run_transient(
    config: HybridConfig,
    dt: f64,
    t_end: f64,
    event_every: usize,
) -> CliResult<TransientRun> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(CliError::InvalidArg {
            what: format!("dt must be positive, got {dt}"),
        });
    }
    if !(t_end >= 0.0 && t_end.is_finite()) {
        return Err(CliError::InvalidArg {
            what: format!("t_end must be non-negative, got {t_end}"),
        });
    }

    let clock = Rc::new(Cell::new(0.0));
    let mut systems = EquationSystems::new(config)?;
    let root = systems.add_nonlinear("moving_root", moving_root(clock.clone()), &[1.0], &[1.0])?;
    systems.add_linear("ramp", 2, Box::new(Ramp { clock: clock.clone() }))?;

    let mut failed_steps = usize::from(!systems.initialize(0.0)?.all_solved());
    let mut steps = 0;
    let mut t = 0.0;
    while t < t_end {
        steps += 1;
        t = (steps as f64 * dt).min(t_end);
        clock.set(t);
        let mut solved = systems.step(t, false)?.all_solved();
        if event_every > 0 && steps % event_every == 0 {
            solved &= systems.step(t, true)?.all_solved();
        }
        if !solved {
            failed_steps += 1;
        }
    }
    info!(steps, failed_steps, "transient run finished");

    Ok(TransientRun {
        steps,
        failed_steps,
        final_time: t,
        root: systems.nonlinear(root)?.x()[0],
        systems: systems.summary(),
    })
}

fn sqrt2() -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(|x: &[f64], f: &mut [f64], _| {
        f[0] = x[0] * x[0] - 2.0;
        f[1] = x[1] - 1.0;
        Evaluation::Valid
    }))
}

fn powell() -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(|x: &[f64], f: &mut [f64], _| {
        f[0] = 1e4 * x[0] * x[1] - 1.0;
        f[1] = (-x[0]).exp() + (-x[1]).exp() - 1.0001;
        Evaluation::Valid
    }))
}

fn broyden() -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(|x: &[f64], f: &mut [f64], _| {
        let n = x.len();
        for i in 0..n {
            let left = if i > 0 { x[i - 1] } else { 0.0 };
            let right = if i + 1 < n { x[i + 1] } else { 0.0 };
            f[i] = (3.0 - 2.0 * x[i]) * x[i] - left - 2.0 * right + 1.0;
        }
        Evaluation::Valid
    }))
}

fn stall() -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(|_: &[f64], f: &mut [f64], _| {
        f.fill(1.0);
        Evaluation::Invalid
    }))
}

fn moving_root(clock: Rc<Cell<f64>>) -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(move |x: &[f64], f: &mut [f64], _| {
        f[0] = x[0] * x[0] - (2.0 + clock.get());
        Evaluation::Valid
    }))
}

struct Dense {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl LinearModel for Dense {
    fn set_matrix(&mut self, a: &mut DMatrix<f64>) {
        a.copy_from(&self.a);
    }

    fn set_rhs(&mut self, b: &mut DVector<f64>) {
        b.copy_from(&self.b);
    }
}

/// `[[2, 1], [0, 1]] x = [2 + 3t, t]`, solved by `x = [1 + t, t]`.
struct Ramp {
    clock: Rc<Cell<f64>>,
}

impl LinearModel for Ramp {
    fn set_matrix(&mut self, a: &mut DMatrix<f64>) {
        a[(0, 0)] = 2.0;
        a[(0, 1)] = 1.0;
        a[(1, 1)] = 1.0;
    }

    fn set_rhs(&mut self, b: &mut DVector<f64>) {
        let t = self.clock.get();
        b[0] = 2.0 + 3.0 * t;
        b[1] = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nls_solver::{LinearFailure, MAX_KERNEL_CALLS};

    #[test]
    fn sqrt2_is_solved_without_recovery() {
        let report = run_scenario(Scenario::Sqrt2, HybridConfig::default()).unwrap();
        assert!(report.all_solved());
        assert_eq!(report.nonlinear[0].tier_actions, 0);
    }

    #[test]
    fn stall_exhausts_the_ladder() {
        let report = run_scenario(Scenario::Stall, HybridConfig::default()).unwrap();
        assert!(!report.all_solved());
        assert_eq!(report.nonlinear[0].kernel_calls, MAX_KERNEL_CALLS);
    }

    #[test]
    fn singular_reports_the_pivot() {
        let report = run_scenario(Scenario::Singular, HybridConfig::default()).unwrap();
        assert_eq!(
            report.linear[0].failure,
            Some(LinearFailure::Singular { pivot: 2 })
        );
    }

    #[test]
    fn transient_rejects_bad_step() {
        assert!(matches!(
            run_transient(HybridConfig::default(), 0.0, 1.0, 0),
            Err(CliError::InvalidArg { .. })
        ));
        assert!(run_transient(HybridConfig::default(), 0.1, f64::INFINITY, 0).is_err());
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/nls.yaml"))).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
        assert_eq!(load_config(None).unwrap().factor, 100.0);
    }
}
