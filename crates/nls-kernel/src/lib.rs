//! Numerical kernels used by the nonlinear and linear system drivers.
//!
//! The drivers treat everything here as a black box behind a narrow contract:
//! - [`RootKernel`]: derivative-free root finding on a conditioned point,
//!   reporting a MINPACK-style status code and never retrying on its own
//! - [`HybridDogleg`]: Powell hybrid trust-region dogleg with a
//!   finite-difference Jacobian and Broyden updates
//! - [`dense`]: nalgebra LU factorization behind LAPACK status codes

pub mod dense;
pub mod hybrid;
pub mod jacobian;
pub mod kernel;

pub use dense::{LuFactors, gesv};
pub use hybrid::HybridDogleg;
pub use kernel::{
    DiagMode, Evaluation, HybridBuffers, HybridParams, KernelReport, KernelStatus, ResidualFn,
    RootKernel,
};
