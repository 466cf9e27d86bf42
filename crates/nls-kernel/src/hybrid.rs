//! Powell hybrid trust-region dogleg kernel.
//!
//! The iteration follows MINPACK `hybrd`:
//! - a forward-difference Jacobian is estimated, then kept current with
//!   Broyden rank-one updates until two consecutive steps fail
//! - each step is a dogleg between the Cauchy point and the Newton step,
//!   bounded by `delta` in the `diag`-scaled norm
//! - `delta` starts at `factor * ||diag .* x||` and follows the usual
//!   actual/predicted reduction ratio rules
//! - two stall counters end the attempt when progress dries up
//!
//! Newton steps reuse the [`crate::dense::LuFactors`] held in the kernel's
//! buffers, so the factor storage survives across steps and calls.

use crate::jacobian::{FdScratch, evaluations_per_jacobian, forward_difference};
use crate::kernel::{
    DiagMode, Evaluation, HybridBuffers, HybridParams, KernelReport, KernelStatus, ResidualFn,
    RootKernel,
};
use nalgebra::DVector;
use nls_core::enorm;
use tracing::trace;

/// Stateless Powell hybrid solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct HybridDogleg;

impl HybridDogleg {
    pub fn new() -> Self {
        Self
    }
}

fn improper_input(params: &HybridParams, buf: &HybridBuffers) -> bool {
    let n = buf.len();
    n == 0
        || buf.fvec.len() != n
        || buf.diag.len() != n
        || buf.fjac.shape() != (n, n)
        || buf.fjacobian.shape() != (n, n)
        || buf.norm_scratch.len() != n
        || buf.lu.dim() != n
        || params.xtol.is_nan()
        || params.xtol < 0.0
        || params.maxfev == 0
        || params.factor.is_nan()
        || params.factor <= 0.0
        || (params.mode == DiagMode::Supplied && buf.diag.iter().any(|d| !(*d > 0.0)))
}

/// `||diag .* v||`
fn scaled_norm(diag: &DVector<f64>, v: &DVector<f64>, scratch: &mut DVector<f64>) -> f64 {
    scratch.copy_from(diag);
    scratch.component_mul_assign(v);
    enorm(scratch.as_slice())
}

/// Dogleg step into `buf.step`.
///
/// Requires `buf.lu` to hold the factors of `buf.fjac`; singular factors
/// drop the Newton step and leave the scaled gradient direction.
fn dogleg(buf: &mut HybridBuffers, delta: f64) {
    let n = buf.len();

    let mut qnorm = f64::INFINITY;
    let newton_ok = !buf.lu.is_singular() && {
        buf.step.copy_from(&buf.fvec);
        buf.step.neg_mut();
        buf.lu.solve_mut(&mut buf.step)
    };
    if newton_ok {
        qnorm = scaled_norm(&buf.diag, &buf.step, &mut buf.norm_scratch);
        if qnorm <= delta {
            return;
        }
    }

    // Scaled gradient g = D^-1 J^T f, stored in `grad`.
    buf.grad.gemv_tr(1.0, &buf.fjac, &buf.fvec, 0.0);
    for j in 0..n {
        buf.grad[j] /= buf.diag[j];
    }
    let gnorm = enorm(buf.grad.as_slice());

    if gnorm == 0.0 {
        if newton_ok && qnorm.is_finite() && qnorm > 0.0 {
            buf.step *= delta / qnorm;
        } else {
            buf.step.fill(0.0);
        }
        return;
    }

    // Descent direction in x-space d = D^-1 g (kept in `col_norms` scratch).
    for j in 0..n {
        buf.col_norms[j] = buf.grad[j] / buf.diag[j];
    }
    buf.model_f.gemv(1.0, &buf.fjac, &buf.col_norms, 0.0);
    let jd = enorm(buf.model_f.as_slice());
    let sgnorm = if jd == 0.0 {
        f64::INFINITY
    } else {
        (gnorm / jd) * (gnorm / jd) * gnorm
    };

    if sgnorm >= delta {
        let t = delta / gnorm;
        for j in 0..n {
            buf.step[j] = -t * buf.col_norms[j];
        }
        return;
    }

    let t = sgnorm / gnorm;
    if !newton_ok {
        for j in 0..n {
            buf.step[j] = -t * buf.col_norms[j];
        }
        return;
    }

    // Walk from the Cauchy point toward the Newton step until ||D p|| = delta.
    // grad <- D * p_cauchy, model_f <- D * (p_newton - p_cauchy)
    for j in 0..n {
        let cauchy = -t * buf.col_norms[j];
        buf.model_f[j] = buf.diag[j] * (buf.step[j] - cauchy);
        buf.grad[j] = buf.diag[j] * cauchy;
    }
    let a = buf.model_f.dot(&buf.model_f);
    let b = buf.grad.dot(&buf.model_f);
    let c = buf.grad.dot(&buf.grad) - delta * delta;
    let disc = (b * b - a * c).max(0.0).sqrt();
    let beta = if a == 0.0 {
        0.0
    } else if b <= 0.0 {
        (-b + disc) / a
    } else {
        -c / (b + disc)
    };
    for j in 0..n {
        buf.step[j] = (buf.grad[j] + beta * buf.model_f[j]) / buf.diag[j];
    }
}

impl RootKernel for HybridDogleg {
    fn solve(
        &mut self,
        fcn: &mut ResidualFn<'_>,
        params: &HybridParams,
        buf: &mut HybridBuffers,
    ) -> KernelReport {
        if improper_input(params, buf) {
            return KernelReport {
                status: KernelStatus::ImproperInput,
                nfev: 0,
            };
        }

        let n = buf.len();
        let epsmch = f64::EPSILON;
        let fd_cost = evaluations_per_jacobian(n, params.ml, params.mu);

        let mut nfev = 1;
        if !fcn(buf.x.as_mut_slice(), buf.fvec.as_mut_slice()).is_valid() {
            return KernelReport {
                status: KernelStatus::NoProgressIterations,
                nfev,
            };
        }
        let mut fnorm = enorm(buf.fvec.as_slice());

        let mut iter = 1_usize;
        let mut ncsuc = 0_usize;
        let mut nslow1 = 0_usize;
        let mut nslow2 = 0_usize;
        let mut delta = 0.0;
        let mut xnorm = 0.0;

        loop {
            let mut jeval = true;

            let eval = forward_difference(
                fcn,
                buf.x.as_mut_slice(),
                &buf.fvec,
                &mut buf.fjac,
                params.ml,
                params.mu,
                params.epsfcn,
                FdScratch {
                    f: &mut buf.fd_f,
                    x: &mut buf.fd_x,
                },
            );
            nfev += fd_cost;
            if eval == Evaluation::Invalid {
                return KernelReport {
                    status: KernelStatus::NoProgressJacobian,
                    nfev,
                };
            }
            buf.fjacobian.copy_from(&buf.fjac);

            for j in 0..n {
                buf.col_norms[j] = buf.fjac.column(j).norm();
            }
            if iter == 1 {
                if params.mode == DiagMode::Automatic {
                    for j in 0..n {
                        let c = buf.col_norms[j];
                        buf.diag[j] = if c == 0.0 { 1.0 } else { c };
                    }
                }
                xnorm = scaled_norm(&buf.diag, &buf.x, &mut buf.norm_scratch);
                delta = params.factor * xnorm;
                if delta == 0.0 {
                    delta = params.factor;
                }
            }
            if params.mode == DiagMode::Automatic {
                for j in 0..n {
                    buf.diag[j] = buf.diag[j].max(buf.col_norms[j]);
                }
            }

            if fnorm == 0.0 {
                return KernelReport {
                    status: KernelStatus::Converged,
                    nfev,
                };
            }

            let mut ncfail = 0_usize;
            loop {
                buf.lu.factor(&buf.fjac);
                dogleg(buf, delta);

                let pnorm = scaled_norm(&buf.diag, &buf.step, &mut buf.norm_scratch);
                if iter == 1 {
                    delta = delta.min(pnorm);
                }

                buf.trial_x.copy_from(&buf.x);
                buf.trial_x += &buf.step;
                nfev += 1;
                let trial_valid =
                    fcn(buf.trial_x.as_mut_slice(), buf.trial_f.as_mut_slice()).is_valid();
                let fnorm1 = if trial_valid {
                    enorm(buf.trial_f.as_slice())
                } else {
                    f64::INFINITY
                };

                let actred = if fnorm1 < fnorm {
                    1.0 - (fnorm1 / fnorm).powi(2)
                } else {
                    -1.0
                };

                // Linear model residual f + J p.
                buf.model_f.copy_from(&buf.fvec);
                buf.model_f.gemv(1.0, &buf.fjac, &buf.step, 1.0);
                let temp = enorm(buf.model_f.as_slice());
                let prered = if temp < fnorm {
                    1.0 - (temp / fnorm).powi(2)
                } else {
                    0.0
                };
                let ratio = if prered > 0.0 { actred / prered } else { 0.0 };

                if ratio < 0.1 {
                    ncsuc = 0;
                    ncfail += 1;
                    delta *= 0.5;
                } else {
                    ncfail = 0;
                    ncsuc += 1;
                    if ratio >= 0.5 || ncsuc > 1 {
                        delta = delta.max(pnorm / 0.5);
                    }
                    if (ratio - 1.0).abs() <= 0.1 {
                        delta = pnorm / 0.5;
                    }
                }

                if ratio >= 1e-4 {
                    buf.x.copy_from(&buf.trial_x);
                    buf.fvec.copy_from(&buf.trial_f);
                    xnorm = scaled_norm(&buf.diag, &buf.x, &mut buf.norm_scratch);
                    fnorm = fnorm1;
                    iter += 1;
                }

                nslow1 = if actred >= 0.001 { 0 } else { nslow1 + 1 };
                if jeval {
                    nslow2 += 1;
                }
                if actred >= 0.1 {
                    nslow2 = 0;
                }

                if params.nprint > 0 && iter % params.nprint == 0 {
                    trace!(iter, nfev, fnorm, delta, "hybrid iteration");
                }

                if delta <= params.xtol * xnorm || fnorm == 0.0 {
                    return KernelReport {
                        status: KernelStatus::Converged,
                        nfev,
                    };
                }
                if nfev >= params.maxfev {
                    return KernelReport {
                        status: KernelStatus::MaxEvaluations,
                        nfev,
                    };
                }
                if 0.1 * (0.1 * delta).max(pnorm) <= epsmch * xnorm {
                    return KernelReport {
                        status: KernelStatus::ToleranceTooSmall,
                        nfev,
                    };
                }
                if nslow2 == 5 {
                    return KernelReport {
                        status: KernelStatus::NoProgressJacobian,
                        nfev,
                    };
                }
                if nslow1 == 10 {
                    return KernelReport {
                        status: KernelStatus::NoProgressIterations,
                        nfev,
                    };
                }

                if ncfail == 2 {
                    break;
                }

                // Broyden rank-one update: J += (f1 - f - J p) (D^2 p)^T / ||D p||^2
                if trial_valid && pnorm > 0.0 {
                    for i in 0..n {
                        buf.model_f[i] = buf.trial_f[i] - buf.model_f[i];
                        buf.grad[i] = buf.diag[i] * buf.diag[i] * buf.step[i];
                    }
                    buf.fjac
                        .ger(1.0 / (pnorm * pnorm), &buf.model_f, &buf.grad, 1.0);
                }
                jeval = false;
            }
        }
    }
}
