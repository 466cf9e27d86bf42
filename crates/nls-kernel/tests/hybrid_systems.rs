//! Classic test systems for the hybrid kernel.

use nls_core::enorm;
use nls_kernel::{Evaluation, HybridBuffers, HybridDogleg, HybridParams, KernelStatus, RootKernel};

fn broyden_tridiagonal(x: &mut [f64], f: &mut [f64]) -> Evaluation {
    let n = x.len();
    for i in 0..n {
        let left = if i > 0 { x[i - 1] } else { 0.0 };
        let right = if i + 1 < n { x[i + 1] } else { 0.0 };
        f[i] = (3.0 - 2.0 * x[i]) * x[i] - left - 2.0 * right + 1.0;
    }
    Evaluation::Valid
}

#[test]
fn broyden_tridiagonal_full_band() {
    let n = 10;
    let mut buf = HybridBuffers::new(n);
    buf.x.fill(-1.0);
    let params = HybridParams::for_size(n);

    let report = HybridDogleg.solve(&mut broyden_tridiagonal, &params, &mut buf);

    assert_eq!(report.status, KernelStatus::Converged);
    assert!(enorm(buf.fvec.as_slice()) < 1e-8);
}

#[test]
fn broyden_tridiagonal_banded_jacobian() {
    let n = 10;
    let mut buf = HybridBuffers::new(n);
    buf.x.fill(-1.0);
    let mut params = HybridParams::for_size(n);
    params.ml = 1;
    params.mu = 1;

    let report = HybridDogleg.solve(&mut broyden_tridiagonal, &params, &mut buf);

    assert_eq!(report.status, KernelStatus::Converged);
    assert!(enorm(buf.fvec.as_slice()) < 1e-8);
    // Banded estimates leave the far corners empty.
    assert_eq!(buf.fjacobian[(0, n - 1)], 0.0);
}

#[test]
fn buffers_are_reusable_across_calls() {
    let mut buf = HybridBuffers::new(2);
    let params = HybridParams::for_size(2);
    let mut kernel = HybridDogleg::new();

    for target in [2.0, 3.0, 5.0] {
        let mut f = |x: &mut [f64], out: &mut [f64]| {
            out[0] = x[0] * x[0] - target;
            out[1] = x[0] - x[1];
            Evaluation::Valid
        };
        buf.x.fill(1.0);
        let report = kernel.solve(&mut f, &params, &mut buf);
        assert_eq!(report.status, KernelStatus::Converged);
        let root = f64::sqrt(target);
        assert!((buf.x[0] - root).abs() < 1e-9);
        assert!((buf.x[1] - root).abs() < 1e-9);
    }
}

#[test]
fn kernel_never_hands_back_a_modified_point_through_callback() {
    // The callback temporarily rescales the point and restores it; the kernel
    // must see its own coordinates on return.
    let scale = [10.0, 0.1];
    let mut f = |x: &mut [f64], out: &mut [f64]| {
        for (v, s) in x.iter_mut().zip(&scale) {
            *v *= s;
        }
        out[0] = x[0] - 20.0;
        out[1] = x[1] - 0.3;
        for (v, s) in x.iter_mut().zip(&scale) {
            *v *= 1.0 / s;
        }
        Evaluation::Valid
    };
    let mut buf = HybridBuffers::new(2);
    buf.x.fill(1.0);
    let report = HybridDogleg.solve(&mut f, &HybridParams::for_size(2), &mut buf);
    assert_eq!(report.status, KernelStatus::Converged);
    assert!((buf.x[0] - 2.0).abs() < 1e-9);
    assert!((buf.x[1] - 3.0).abs() < 1e-9);
}
