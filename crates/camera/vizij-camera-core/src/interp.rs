//! Interpolation helpers:
//! - scalar/array lerp
//! - quaternion slerp (shortest-arc, nlerp fallback for near-parallel inputs)
//! - easing curves used by blends and parameter setters

use serde::{Deserialize, Serialize};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Component-wise lerp for fixed-size arrays.
#[inline]
pub fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = lerp_f32(a[i], b[i], t);
    }
    out
}

#[inline]
fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize a quaternion (x, y, z, w). A zero quaternion maps to identity.
#[inline]
pub fn normalize_quat(q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        [q[0] * inv_len, q[1] * inv_len, q[2] * inv_len, q[3] * inv_len]
    } else {
        [0.0, 0.0, 0.0, 1.0]
    }
}

/// Slerp between two quaternions along the shortest arc.
pub fn slerp_quat(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let qa = normalize_quat(a);
    let mut qb = normalize_quat(b);

    let mut dot = dot4(qa, qb);
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat(lerp_array(&qa, &qb, t));
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    [
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ]
}

/// Easing curve applied to a normalized blend time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendCurve {
    #[default]
    Linear,
    SmoothStep,
    SmootherStep,
}

impl BlendCurve {
    /// Evaluate the curve at `x`, clamped to [0, 1].
    #[inline]
    pub fn eval(self, x: f32) -> f32 {
        let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) };
        match self {
            BlendCurve::Linear => x,
            BlendCurve::SmoothStep => x * x * (3.0 - 2.0 * x),
            BlendCurve::SmootherStep => x * x * x * (x * (x * 6.0 - 15.0) + 10.0),
        }
    }
}
