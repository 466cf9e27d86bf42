//! Error types for equation-system solving.

use nls_core::NlsError;
use thiserror::Error;

/// Errors surfaced by the nonlinear and linear system drivers.
///
/// Numerical failures are reported through [`SolveReport`](crate::SolveReport)
/// and [`LinearReport`](crate::LinearReport); they only become errors when a
/// caller asks for one via `into_result`.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    Setup { what: String },

    #[error("Improper input parameters for system {system} at time {time}")]
    ImproperInput { system: String, time: f64 },

    #[error("Nonlinear system {system} failed at time {time}")]
    NoSolution { system: String, time: f64 },

    #[error("Linear system {system} is singular: U({pivot},{pivot}) = 0")]
    Singular { system: String, pivot: usize },

    #[error("Linear system {system}: illegal value for argument {argument}")]
    IllegalArgument { system: String, argument: i32 },

    #[error("Numeric error: {0}")]
    Core(#[from] NlsError),
}

pub type SolverResult<T> = Result<T, SolverError>;
