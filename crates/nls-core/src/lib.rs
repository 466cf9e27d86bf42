//! nls-core: shared foundation for the nonlinear-system workspace.
//!
//! Contains:
//! - numeric (Real, comparison tolerances, finiteness check, Euclidean norm)
//! - scaling (physical <-> conditioned coordinate transform)
//! - ids (stable compact IDs for equation systems)
//! - timing (opt-in wall clock accounting for solves)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod scaling;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{NlsError, NlsResult};
pub use ids::*;
pub use numeric::*;
pub use scaling::{to_conditioned, to_conditioned_in_place, to_physical, to_physical_in_place};
