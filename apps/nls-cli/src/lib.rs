//! Command-line front end for the nonlinear-system solvers.
//!
//! Runs built-in scenarios through the full driver stack and reports the
//! recovery behaviour in text or JSON.

pub mod error;
pub mod scenario;

pub use error::{CliError, CliResult};
pub use scenario::{Scenario, TransientRun, load_config, run_scenario, run_transient};
