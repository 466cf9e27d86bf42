use clap::{Parser, Subcommand};
use nls_cli::{CliResult, Scenario, TransientRun, load_config, run_scenario, run_transient};
use nls_sim::StepReport;
use nls_solver::HybridConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nls-cli")]
#[command(about = "Nonlinear system solver driver - scenario runner", long_about = None)]
struct Cli {
    /// Solver configuration (YAML); defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,
    /// Record wall time per system
    #[arg(long, global = true)]
    timing: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a built-in scenario once
    Scenario {
        #[arg(value_enum)]
        name: Scenario,
        /// Exit with an error when a system fails
        #[arg(long)]
        strict: bool,
    },
    /// Solve every built-in scenario and list the outcome of each
    All,
    /// Follow time-dependent systems over a time range
    Transient {
        /// Time step in seconds
        #[arg(long, default_value_t = 0.1)]
        dt: f64,
        /// End time in seconds
        #[arg(long, default_value_t = 1.0)]
        t_end: f64,
        /// Re-solve as an event every N steps (0 = never)
        #[arg(long, default_value_t = 0)]
        event_every: usize,
    },
    /// Print the default solver configuration as YAML
    Config,
}

fn main() -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.timing {
        nls_core::timing::enable_timing();
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scenario { name, strict } => cmd_scenario(name, config, cli.json, strict),
        Commands::All => cmd_all(config, cli.json),
        Commands::Transient {
            dt,
            t_end,
            event_every,
        } => cmd_transient(config, dt, t_end, event_every, cli.json),
        Commands::Config => cmd_config(),
    }
}

fn cmd_scenario(
    scenario: Scenario,
    config: HybridConfig,
    json: bool,
    strict: bool,
) -> CliResult<()> {
    let report = run_scenario(scenario, config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Scenario: {}", scenario.name());
        print_step(&report);
    }
    if strict {
        report.into_result()?;
    }
    Ok(())
}

fn cmd_all(config: HybridConfig, json: bool) -> CliResult<()> {
    let mut reports = Vec::with_capacity(Scenario::ALL.len());
    for scenario in Scenario::ALL {
        reports.push((scenario, run_scenario(scenario, config.clone())?));
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }
    for (scenario, report) in &reports {
        let mark = if report.all_solved() { "✓" } else { "✗" };
        let actions: usize = report.nonlinear.iter().map(|r| r.tier_actions).sum();
        println!("{mark} {:<10} recovery actions: {actions}", scenario.name());
    }
    Ok(())
}

fn cmd_transient(
    config: HybridConfig,
    dt: f64,
    t_end: f64,
    event_every: usize,
    json: bool,
) -> CliResult<()> {
    let run = run_transient(config, dt, t_end, event_every)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_transient(&run);
    }
    Ok(())
}

fn cmd_config() -> CliResult<()> {
    print!("{}", serde_yaml::to_string(&HybridConfig::default())?);
    Ok(())
}

fn print_step(report: &StepReport) {
    for r in &report.nonlinear {
        let mark = if r.success { "✓" } else { "✗" };
        println!("{mark} {} (system {}) at t = {}", r.name, r.system, r.time);
        println!("  Kernel status:   {}", r.status);
        println!("  Kernel calls:    {}", r.kernel_calls);
        println!("  Residual evals:  {}", r.function_evals);
        println!(
            "  Residual norm:   {:.3e} (scaled {:.3e}, tolerance {:.1e})",
            r.error, r.error_scaled, r.tolerance
        );
        println!(
            "  Recovery:        {} actions (retries {}, restarts {}, rescales {})",
            r.tier_actions, r.counters.retries, r.counters.restarts, r.counters.rescales
        );
        if !r.tiers.is_empty() {
            let letters: String = r.tiers.iter().map(|t| t.letter()).collect();
            println!("  Tier sequence:   {letters}");
        }
    }
    for r in &report.linear {
        let mark = if r.success { "✓" } else { "✗" };
        println!("{mark} {} (system {}) at t = {}", r.name, r.system, r.time);
        if let Some(failure) = &r.failure {
            println!("  Failure:         {failure:?}");
        }
    }
}

fn print_transient(run: &TransientRun) {
    println!("Transient run to t = {:.3} s", run.final_time);
    println!("  Steps:        {}", run.steps);
    println!("  Failed steps: {}", run.failed_steps);
    println!("  Root:         {:.12}", run.root);
    println!("\nSystems:");
    for s in &run.systems {
        println!(
            "  {} {:<12} {:?} n={} calls={} failures={} time={:.3}s slowest={:.3}s",
            s.id, s.name, s.kind, s.size, s.calls, s.failures, s.seconds, s.slowest_seconds
        );
    }
}
