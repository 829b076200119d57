use std::fmt;

use crate::vartype::VarType;

/// A dynamically typed element extracted from a SafeArray.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
}

impl Value {
    /// The variant type tag this value is stored under in a SafeArray.
    pub const fn vartype(&self) -> VarType {
        match self {
            Self::Bool(_) => VarType::Bool,
            Self::I8(_) => VarType::I1,
            Self::I16(_) => VarType::I2,
            Self::I32(_) => VarType::I4,
            Self::I64(_) => VarType::I8,
            Self::U8(_) => VarType::UI1,
            Self::U16(_) => VarType::UI2,
            Self::U32(_) => VarType::UI4,
            Self::U64(_) => VarType::UI8,
            Self::F32(_) => VarType::R4,
            Self::F64(_) => VarType::R8,
            Self::String(_) => VarType::Bstr,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Returned when a [`Value`] is not the requested native type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Value of type {actual} is not {expected}")]
pub struct ValueTypeMismatch {
    pub expected: &'static str,
    pub actual: VarType,
}

macro_rules! native_conversions {
    ($($case:ident => $native:ty),* $(,)?) => {
        $(
            impl From<$native> for Value {
                fn from(v: $native) -> Self {
                    Self::$case(v)
                }
            }

            impl TryFrom<Value> for $native {
                type Error = ValueTypeMismatch;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$case(v) => Ok(v),
                        other => Err(ValueTypeMismatch {
                            expected: stringify!($native),
                            actual: other.vartype(),
                        }),
                    }
                }
            }
        )*
    };
}

native_conversions! {
    Bool => bool,
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    U8 => u8,
    U16 => u16,
    U32 => u32,
    U64 => u64,
    F32 => f32,
    F64 => f64,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}
