//! Error types for simulation-level equation handling.

use nls_core::SysId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown equation system {id}")]
    UnknownSystem { id: SysId },

    #[error("Time {time} is before the current time {current}")]
    TimeReversal { time: f64, current: f64 },

    #[error("Solver error: {0}")]
    Solver(#[from] nls_solver::SolverError),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<nls_core::NlsError> for SimError {
    fn from(e: nls_core::NlsError) -> Self {
        SimError::Solver(e.into())
    }
}
