use thiserror::Error;

pub type NlsResult<T> = Result<T, NlsError>;

#[derive(Error, Debug)]
pub enum NlsError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Non-positive scaling factor at index {index}: {value}")]
    NonPositiveScale { index: usize, value: f64 },
}
