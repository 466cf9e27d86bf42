//! Equation-system bookkeeping for a running simulation.
//!
//! Provides:
//! - a registry owning every nonlinear and linear system of a model
//! - start-value extrapolation from the last two accepted points
//! - per-step sequencing of solves with initialization and event flags
//! - per-system call, failure and timing statistics

pub mod error;
pub mod extrapolation;
pub mod registry;

pub use error::{SimError, SimResult};
pub use extrapolation::History;
pub use registry::{EquationSystems, StepReport, SystemKind, SystemSummary};
