//! Robust driver for derivative-free nonlinear equation systems.
//!
//! A [`NonlinearSystem`] owns its residual model, its scaling factors and a
//! [`SolverState`] that is reused by every solve. [`solve_nonlinear`] wraps a
//! [`RootKernel`](nls_kernel::RootKernel) call in the scaling transform and,
//! when the kernel stalls, walks an ordered ladder of [`RecoveryTier`]s before
//! giving up. Linear systems get a single-attempt LU driver in [`linear`].

pub mod adapter;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod linear;
pub mod model;
pub mod report;
pub mod state;
pub mod system;
pub mod tier;

pub use adapter::ResidualAdapter;
pub use config::HybridConfig;
pub use context::{SimulationInfo, SolutionStatus};
pub use driver::{FailureKind, SolveReport, solve_nonlinear};
pub use error::{SolverError, SolverResult};
pub use linear::{LinearFailure, LinearReport, LinearSystem, solve_linear};
pub use model::{EvalMode, FnModel, LinearModel, ResidualModel};
pub use state::SolverState;
pub use system::NonlinearSystem;
pub use tier::{MAX_KERNEL_CALLS, MAX_TIER_ACTIONS, RecoveryTier, RetryCounters};
