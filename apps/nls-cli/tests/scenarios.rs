//! End-to-end runs of the built-in scenarios.

use nls_cli::{CliError, Scenario, load_config, run_scenario, run_transient};
use nls_solver::{HybridConfig, SolverError};

fn write_config(name: &str, text: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("nls-cli-{}-{name}.yaml", std::process::id()));
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn yaml_config_overrides_defaults() {
    let path = write_config("partial", "factor: 50.0\nrecord_tiers: false\n");
    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.factor, 50.0);
    assert!(!config.record_tiers);
    assert_eq!(config.tolerance, HybridConfig::default().tolerance);

    let report = run_scenario(Scenario::Stall, config).unwrap();
    assert!(report.nonlinear[0].tiers.is_empty());
    assert!(report.nonlinear[0].tier_actions > 0);
    std::fs::remove_file(path).ok();
}

#[test]
fn invalid_tolerance_is_rejected() {
    let path = write_config("bad", "tolerance: -1.0\n");
    let err = load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, CliError::Sim(_)), "{err:?}");
    std::fs::remove_file(path).ok();
}

#[test]
fn broyden_converges() {
    let report = run_scenario(Scenario::Broyden, HybridConfig::default()).unwrap();
    assert!(report.all_solved(), "{report:?}");
    assert!(report.nonlinear[0].error <= report.nonlinear[0].tolerance);
}

#[test]
fn strict_stall_surfaces_the_failure() {
    let report = run_scenario(Scenario::Stall, HybridConfig::default()).unwrap();
    let err = report.into_result().unwrap_err();
    assert!(matches!(
        err,
        nls_sim::SimError::Solver(SolverError::NoSolution { .. })
    ));
}

#[test]
fn transient_follows_both_systems() {
    let run = run_transient(HybridConfig::default(), 0.25, 1.0, 2).unwrap();
    assert_eq!(run.steps, 4);
    assert_eq!(run.failed_steps, 0);
    assert_eq!(run.final_time, 1.0);
    assert!((run.root - 3.0_f64.sqrt()).abs() < 1e-8);
    // Initialization, four steps and two events.
    assert!(run.systems.iter().all(|s| s.calls == 7));
}

#[test]
fn report_json_names_the_tiers() {
    let report = run_scenario(Scenario::Stall, HybridConfig::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["nonlinear"][0]["tiers"][0], "shrink_trust_region");
    assert_eq!(json["linear"].as_array().map(Vec::len), Some(0));
}
