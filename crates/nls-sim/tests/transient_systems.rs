//! Equation systems solved along a simple time axis.

use nls_kernel::Evaluation;
use nls_sim::{EquationSystems, SimError, SystemKind};
use nls_solver::{FnModel, HybridConfig, ResidualModel, SolutionStatus};
use std::cell::Cell;
use std::rc::Rc;

/// `x^2 = 2 + t`, with the time read from a shared clock.
fn moving_root(clock: Rc<Cell<f64>>) -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(move |x: &[f64], f: &mut [f64], _| {
        f[0] = x[0] * x[0] - (2.0 + clock.get());
        Evaluation::Valid
    }))
}

fn broken() -> Box<dyn ResidualModel> {
    Box::new(FnModel::new(|_: &[f64], f: &mut [f64], _| {
        f.fill(1.0);
        Evaluation::Invalid
    }))
}

#[test]
fn tracks_a_moving_root() {
    let clock = Rc::new(Cell::new(0.0));
    let mut systems = EquationSystems::new(HybridConfig::default()).unwrap();
    let id = systems
        .add_nonlinear("root", moving_root(clock.clone()), &[1.0], &[1.0])
        .unwrap();

    let init = systems.initialize(0.0).unwrap();
    assert!(init.initial);
    assert!(init.all_solved());
    assert!(!systems.sim().initial);

    for t in [0.1, 0.2, 0.3] {
        clock.set(t);
        let report = systems.step(t, false).unwrap();
        assert!(report.all_solved(), "{report:?}");
        let x = systems.nonlinear(id).unwrap().x()[0];
        assert!((x - (2.0 + t).sqrt()).abs() < 1e-8, "t = {t}: x = {x}");
    }

    // Start values of the last step came from the two previous solutions.
    let system = systems.nonlinear(id).unwrap();
    let (x1, x2) = (2.2_f64.sqrt(), 2.1_f64.sqrt());
    assert!((system.x_old()[0] - x1).abs() < 1e-8);
    assert!((system.x_extrapolation()[0] - (2.0 * x1 - x2)).abs() < 1e-8);

    let summary = systems.summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].kind, SystemKind::Nonlinear);
    assert_eq!(summary[0].calls, 4);
    assert_eq!(summary[0].failures, 0);
}

#[test]
fn discrete_step_resolves_at_the_same_time() {
    let clock = Rc::new(Cell::new(0.0));
    let mut systems = EquationSystems::new(HybridConfig::default()).unwrap();
    let id = systems
        .add_nonlinear("root", moving_root(clock.clone()), &[1.0], &[1.0])
        .unwrap();
    systems.initialize(0.0).unwrap();

    // An event changes the equations without moving the clock.
    clock.set(2.0);
    let report = systems.step(0.0, true).unwrap();
    assert!(report.discrete);
    assert!(report.all_solved());
    assert!(!systems.sim().discrete_call);
    assert!((systems.nonlinear(id).unwrap().x()[0] - 2.0).abs() < 1e-8);
}

#[test]
fn failed_system_does_not_stop_the_others() {
    let clock = Rc::new(Cell::new(0.0));
    let mut systems = EquationSystems::new(HybridConfig::default()).unwrap();
    let first = systems
        .add_nonlinear("first", moving_root(clock.clone()), &[1.0], &[1.0])
        .unwrap();
    let bad = systems
        .add_nonlinear("bad", broken(), &[0.0], &[1.0])
        .unwrap();
    let last = systems
        .add_nonlinear("last", moving_root(clock.clone()), &[1.0], &[1.0])
        .unwrap();

    systems.initialize(0.0).unwrap();
    clock.set(0.5);
    let report = systems.step(0.5, false).unwrap();

    assert!(!report.all_solved());
    assert_eq!(report.failed_systems(), vec![bad]);
    assert_eq!(systems.sim().found_solution, SolutionStatus::NotFound);
    for id in [first, last] {
        let x = systems.nonlinear(id).unwrap().x()[0];
        assert!((x - 2.5_f64.sqrt()).abs() < 1e-8);
    }
    assert!(matches!(report.into_result(), Err(SimError::Solver(_))));

    let summary = systems.summary();
    assert_eq!(summary[1].name, "bad");
    assert_eq!(summary[1].failures, 2);
    assert_eq!(summary[2].failures, 0);
}
