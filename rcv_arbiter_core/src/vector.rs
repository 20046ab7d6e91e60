use crate::error::{ArbiterError, ArbiterResult};

/// Number of tracked axes (existence, relation, duty, creation).
pub const AXES: usize = 4;

/// Fixed-dimension per-axis vector. Used both for observed/predicted signal
/// vectors and for the caller-owned fatigue integrals.
pub type Vec4 = [f64; AXES];

/// Copy a caller slice into a `Vec4`, rejecting any other length.
pub fn vec4_from_slice(xs: &[f64]) -> ArbiterResult<Vec4> {
    if xs.len() != AXES {
        return Err(ArbiterError::InvalidDimension { expected: AXES, got: xs.len() });
    }
    let mut out = [0.0; AXES];
    out.copy_from_slice(xs);
    Ok(out)
}

/// Reject vectors carrying NaN or infinities. `what` names the argument in the error.
pub fn ensure_finite(v: &Vec4, what: &str) -> ArbiterResult<()> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(ArbiterError::non_finite(what))
    }
}

/// Reject a NaN or infinite scalar argument.
pub fn ensure_finite_scalar(x: f64, what: &str) -> ArbiterResult<()> {
    if x.is_finite() {
        Ok(())
    } else {
        Err(ArbiterError::non_finite(what))
    }
}

/// Folded with `hypot` so large finite components do not overflow when squared.
/// Still infinite when a single difference `x - y` overflows.
#[inline]
pub fn euclidean(a: &Vec4, b: &Vec4) -> f64 {
    a.iter().zip(b.iter()).fold(0.0_f64, |acc, (x, y)| acc.hypot(x - y))
}

#[inline]
pub fn norm(v: &Vec4) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.hypot(*x))
}

#[inline]
pub fn scale(v: &Vec4, k: f64) -> Vec4 {
    let mut out = *v;
    for x in &mut out {
        *x *= k;
    }
    out
}
