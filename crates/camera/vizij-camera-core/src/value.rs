//! Value: runtime parameter values carried in parameter tables.
//! All numeric types use f32.

use serde::{Deserialize, Serialize};

use crate::interp::{lerp_array, lerp_f32, slerp_quat};

/// Lightweight kind enum for pattern-matching and diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Float,
    Bool,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Quat,
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// Boolean (step)
    Bool(bool),

    /// Integer (step)
    Int(i32),

    /// 2D vector
    Vec2([f32; 2]),

    /// 3D vector
    Vec3([f32; 3]),

    /// 4D vector
    Vec4([f32; 4]),

    /// Quaternion (x, y, z, w)
    Quat([f32; 4]),

    /// Text; step-only for blending
    Text(String),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Vec4(_) => ValueKind::Vec4,
            Value::Quat(_) => ValueKind::Quat,
            Value::Text(_) => ValueKind::Text,
        }
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }
}

/// Blend two values. Numeric kinds lerp, quaternions slerp, step kinds (and
/// mismatched kinds) pick `a` for t < 0.5 and `b` otherwise.
pub fn blend_values(a: &Value, b: &Value, t: f32) -> Value {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Value::Float(lerp_f32(*x, *y, t)),
        (Value::Vec2(x), Value::Vec2(y)) => Value::Vec2(lerp_array(x, y, t)),
        (Value::Vec3(x), Value::Vec3(y)) => Value::Vec3(lerp_array(x, y, t)),
        (Value::Vec4(x), Value::Vec4(y)) => Value::Vec4(lerp_array(x, y, t)),
        (Value::Quat(x), Value::Quat(y)) => Value::Quat(slerp_quat(*x, *y, t)),
        _ => step_blend(a, b, t),
    }
}

/// Step blending for step-only types: choose a for t < 0.5, else b.
pub fn step_blend(a: &Value, b: &Value, t: f32) -> Value {
    if t < 0.5 {
        a.clone()
    } else {
        b.clone()
    }
}

/// Typed access into a [`Value`], used by `ParameterTable::try_get`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f32),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for [f32; 3] {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<[f32; 3]> for Value {
    fn from(v: [f32; 3]) -> Self {
        Value::Vec3(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
