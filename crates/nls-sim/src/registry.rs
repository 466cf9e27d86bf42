//! Registry of the equation systems of one simulation run.

use crate::error::{SimError, SimResult};
use crate::extrapolation::History;
use nls_core::SysId;
use nls_core::timing::{SolveTimes, Timer};
use nls_kernel::{HybridDogleg, RootKernel};
use nls_solver::{
    HybridConfig, LinearModel, LinearReport, LinearSystem, NonlinearSystem, ResidualModel,
    SimulationInfo, SolutionStatus, SolveReport, solve_linear,
};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemKind {
    Nonlinear,
    Linear,
}

#[derive(Default)]
struct Stats {
    calls: usize,
    failures: usize,
    times: SolveTimes,
}

struct NonlinearEntry {
    system: NonlinearSystem,
    history: History,
    stats: Stats,
}

struct LinearEntry {
    system: LinearSystem,
    stats: Stats,
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Nonlinear(usize),
    Linear(usize),
}

/// Per-system counters.
#[derive(Clone, Debug, Serialize)]
pub struct SystemSummary {
    pub id: SysId,
    pub name: String,
    pub kind: SystemKind,
    pub size: usize,
    pub calls: usize,
    pub failures: usize,
    /// Wall time spent solving (zero unless timing is enabled).
    pub seconds: f64,
    pub slowest_seconds: f64,
}

/// Results of every solve at one time point, in registration order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StepReport {
    pub time: f64,
    pub discrete: bool,
    pub initial: bool,
    pub nonlinear: Vec<SolveReport>,
    pub linear: Vec<LinearReport>,
}

impl StepReport {
    pub fn all_solved(&self) -> bool {
        self.nonlinear.iter().all(|r| r.success) && self.linear.iter().all(|r| r.success)
    }

    pub fn failed_systems(&self) -> Vec<SysId> {
        self.nonlinear
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.system)
            .chain(self.linear.iter().filter(|r| !r.success).map(|r| r.system))
            .collect()
    }

    /// First failure as an error.
    pub fn into_result(self) -> SimResult<()> {
        for report in self.nonlinear {
            report.into_result()?;
        }
        for report in self.linear {
            report.into_result()?;
        }
        Ok(())
    }
}

/// Owns all equation systems of a run together with the shared
/// [`SimulationInfo`].
pub struct EquationSystems {
    config: HybridConfig,
    kernel: Box<dyn RootKernel>,
    sim: SimulationInfo,
    nonlinear: Vec<NonlinearEntry>,
    linear: Vec<LinearEntry>,
    order: Vec<Slot>,
    scratch: Vec<f64>,
}

impl EquationSystems {
    pub fn new(config: HybridConfig) -> SimResult<Self> {
        Self::with_kernel(config, Box::new(HybridDogleg::new()))
    }

    pub fn with_kernel(config: HybridConfig, kernel: Box<dyn RootKernel>) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            kernel,
            sim: SimulationInfo::default(),
            nonlinear: Vec::new(),
            linear: Vec::new(),
            order: Vec::new(),
            scratch: Vec::new(),
        })
    }

    fn next_id(&self) -> SysId {
        SysId::from_index(self.order.len() as u32)
    }

    /// Register a nonlinear system; `start` seeds every start value.
    pub fn add_nonlinear(
        &mut self,
        name: impl Into<String>,
        model: Box<dyn ResidualModel>,
        start: &[f64],
        scaling: &[f64],
    ) -> SimResult<SysId> {
        let id = self.next_id();
        let system =
            NonlinearSystem::new(id, name, model, start, &self.config)?.with_scaling(scaling)?;
        debug!(%id, name = system.name(), n = system.len(), "registered nonlinear system");
        self.order.push(Slot::Nonlinear(self.nonlinear.len()));
        self.nonlinear.push(NonlinearEntry {
            system,
            history: History::new(),
            stats: Stats::default(),
        });
        Ok(id)
    }

    pub fn add_linear(
        &mut self,
        name: impl Into<String>,
        n: usize,
        model: Box<dyn LinearModel>,
    ) -> SimResult<SysId> {
        let id = self.next_id();
        let system = LinearSystem::new(id, name, n, model)?;
        debug!(%id, name = system.name(), n, "registered linear system");
        self.order.push(Slot::Linear(self.linear.len()));
        self.linear.push(LinearEntry {
            system,
            stats: Stats::default(),
        });
        Ok(id)
    }

    pub fn sim(&self) -> &SimulationInfo {
        &self.sim
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn nonlinear(&self, id: SysId) -> SimResult<&NonlinearSystem> {
        match self.order.get(id.slot()) {
            Some(Slot::Nonlinear(i)) => Ok(&self.nonlinear[*i].system),
            _ => Err(SimError::UnknownSystem { id }),
        }
    }

    pub fn linear(&self, id: SysId) -> SimResult<&LinearSystem> {
        match self.order.get(id.slot()) {
            Some(Slot::Linear(i)) => Ok(&self.linear[*i].system),
            _ => Err(SimError::UnknownSystem { id }),
        }
    }

    /// Solve every system once in initialization mode at `t0`.
    pub fn initialize(&mut self, t0: f64) -> SimResult<StepReport> {
        if !t0.is_finite() {
            return Err(SimError::InvalidArg {
                what: "initial time must be finite",
            });
        }
        self.sim = SimulationInfo::new(t0);
        self.sim.initial = true;
        info!(time = t0, systems = self.len(), "initializing equation systems");
        let report = self.solve_all();
        self.sim.initial = false;
        Ok(report)
    }

    /// Solve every system at time `t`.
    ///
    /// Continuous calls start from the extrapolation of the last two accepted
    /// points, discrete calls from the last accepted point. A failed system
    /// does not stop the others; inspect the returned report.
    pub fn step(&mut self, t: f64, discrete: bool) -> SimResult<StepReport> {
        if !t.is_finite() {
            return Err(SimError::InvalidArg {
                what: "time must be finite",
            });
        }
        if t < self.sim.time {
            return Err(SimError::TimeReversal {
                time: t,
                current: self.sim.time,
            });
        }
        self.sim.time = t;
        self.sim.discrete_call = discrete;
        let report = self.solve_all();
        self.sim.discrete_call = false;
        Ok(report)
    }

    fn solve_all(&mut self) -> StepReport {
        let t = self.sim.time;
        self.sim.found_solution = SolutionStatus::Found;
        let mut report = StepReport {
            time: t,
            discrete: self.sim.discrete_call,
            initial: self.sim.initial,
            ..StepReport::default()
        };

        for slot in &self.order {
            match *slot {
                Slot::Nonlinear(i) => {
                    let entry = &mut self.nonlinear[i];
                    prepare_start_values(entry, t, &mut self.scratch);
                    let timer = Timer::start();
                    let solve = entry.system.solve_with(self.kernel.as_mut(), &mut self.sim);
                    timer.stop_into(&entry.stats.times);
                    entry.stats.calls += 1;
                    if solve.success {
                        entry.history.accept(t, entry.system.x());
                    } else {
                        entry.stats.failures += 1;
                    }
                    report.nonlinear.push(solve);
                }
                Slot::Linear(i) => {
                    let entry = &mut self.linear[i];
                    let timer = Timer::start();
                    let solve = solve_linear(&mut entry.system, &self.sim);
                    timer.stop_into(&entry.stats.times);
                    entry.stats.calls += 1;
                    if !solve.success {
                        entry.stats.failures += 1;
                    }
                    report.linear.push(solve);
                }
            }
        }

        debug!(
            time = t,
            solved = report.all_solved(),
            discrete = report.discrete,
            "equation systems step"
        );
        report
    }

    pub fn summary(&self) -> Vec<SystemSummary> {
        self.order
            .iter()
            .map(|slot| match *slot {
                Slot::Nonlinear(i) => {
                    let e = &self.nonlinear[i];
                    SystemSummary {
                        id: e.system.id(),
                        name: e.system.name().to_string(),
                        kind: SystemKind::Nonlinear,
                        size: e.system.len(),
                        calls: e.stats.calls,
                        failures: e.stats.failures,
                        seconds: e.stats.times.total_seconds(),
                        slowest_seconds: e.stats.times.slowest_seconds(),
                    }
                }
                Slot::Linear(i) => {
                    let e = &self.linear[i];
                    SystemSummary {
                        id: e.system.id(),
                        name: e.system.name().to_string(),
                        kind: SystemKind::Linear,
                        size: e.system.len(),
                        calls: e.stats.calls,
                        failures: e.stats.failures,
                        seconds: e.stats.times.total_seconds(),
                        slowest_seconds: e.stats.times.slowest_seconds(),
                    }
                }
            })
            .collect()
    }
}

/// Load `x_old` and `x_extrapolation` from the accepted history.
fn prepare_start_values(entry: &mut NonlinearEntry, t: f64, scratch: &mut Vec<f64>) {
    let Some((_, latest)) = entry.history.latest() else {
        return;
    };
    scratch.clear();
    scratch.resize(latest.len(), 0.0);
    // A rejected value keeps the previous start value.
    if let Err(err) = entry.system.set_x_old(latest) {
        warn!(system = entry.system.name(), time = t, %err, "previous point not updated");
    }
    if entry.history.extrapolate(t, scratch) {
        if let Err(err) = entry.system.set_x_extrapolation(scratch) {
            warn!(system = entry.system.name(), time = t, %err, "extrapolation not updated");
        }
    }
}
