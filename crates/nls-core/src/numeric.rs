use crate::NlsError;

/// Floating point type used throughout system
pub type Real = f64;

/// Absolute floor applied wherever a scale or norm is used as a divisor.
pub const TINY: Real = 1e-16;

/// Absolute and relative comparison tolerances.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, NlsError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(NlsError::NonFinite { what, value: v })
    }
}

/// Euclidean norm that does not overflow or underflow on extreme entries.
///
/// Non-finite entries propagate (NaN in, NaN out).
pub fn enorm(v: &[Real]) -> Real {
    let scale = v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 || !scale.is_finite() {
        if v.iter().any(|x| x.is_nan()) {
            return Real::NAN;
        }
        return scale;
    }
    let sum: Real = v.iter().map(|x| (x / scale) * (x / scale)).sum();
    scale * sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances::default();
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn enorm_matches_naive_norm() {
        let v = [3.0, -4.0];
        assert!((enorm(&v) - 5.0).abs() < 1e-15);
        assert_eq!(enorm(&[]), 0.0);
        assert_eq!(enorm(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn enorm_survives_large_entries() {
        let v = [1e200, 1e200];
        let n = enorm(&v);
        assert!(n.is_finite());
        assert!((n / 1e200 - 2.0_f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn enorm_propagates_nan() {
        assert!(enorm(&[1.0, Real::NAN]).is_nan());
        assert!(enorm(&[Real::INFINITY, 1.0]).is_infinite());
    }
}
