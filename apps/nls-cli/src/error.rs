use nls_sim::SimError;
use nls_solver::SolverError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error(transparent)]
    Sim(#[from] SimError),
}

impl From<SolverError> for CliError {
    fn from(e: SolverError) -> Self {
        CliError::Sim(e.into())
    }
}

pub type CliResult<T> = Result<T, CliError>;
