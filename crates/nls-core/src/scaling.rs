//! Physical <-> conditioned coordinate transform.
//!
//! The root-finding kernel works on `x ./ s` (conditioned space); models work
//! on `x` (physical space). Every value handed to model code is unscaled
//! first and every value returned to the kernel is rescaled. Scale factors are
//! validated strictly positive by their owner, so no division guard is needed.

use crate::Real;

/// `v .* scale`
pub fn to_physical(v: &[Real], scale: &[Real]) -> Vec<Real> {
    debug_assert_eq!(v.len(), scale.len());
    v.iter().zip(scale).map(|(x, s)| x * s).collect()
}

/// `v ./ scale`, computed as `v * (1 / scale)`.
pub fn to_conditioned(v: &[Real], scale: &[Real]) -> Vec<Real> {
    debug_assert_eq!(v.len(), scale.len());
    v.iter().zip(scale).map(|(x, s)| (1.0 / s) * x).collect()
}

pub fn to_physical_in_place(v: &mut [Real], scale: &[Real]) {
    debug_assert_eq!(v.len(), scale.len());
    for (x, s) in v.iter_mut().zip(scale) {
        *x *= s;
    }
}

pub fn to_conditioned_in_place(v: &mut [Real], scale: &[Real]) {
    debug_assert_eq!(v.len(), scale.len());
    for (x, s) in v.iter_mut().zip(scale) {
        *x *= 1.0 / s;
    }
}
