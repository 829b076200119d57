//! Tag dispatch for typed element extraction.

use crate::value::Value;
use crate::vartype::VarType;

/// How an array element is decoded, selected once from the array's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCodec {
    /// Fixed-width element decoded from its native-endian bytes.
    Fixed(FixedKind),
    /// `VT_BSTR`, read through the string accessor.
    Text,
    /// `VT_VARIANT`, decoded from the element's own dynamic type.
    Variant,
    /// Tag with no decoder; slots stay unset.
    Unsupported(VarType),
}

/// Fixed-width element encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl From<VarType> for ElementCodec {
    fn from(vt: VarType) -> Self {
        match vt {
            VarType::Bool => Self::Fixed(FixedKind::Bool),
            VarType::I1 => Self::Fixed(FixedKind::I8),
            VarType::I2 => Self::Fixed(FixedKind::I16),
            VarType::I4 => Self::Fixed(FixedKind::I32),
            VarType::I8 => Self::Fixed(FixedKind::I64),
            VarType::UI1 => Self::Fixed(FixedKind::U8),
            VarType::UI2 => Self::Fixed(FixedKind::U16),
            VarType::UI4 => Self::Fixed(FixedKind::U32),
            VarType::UI8 => Self::Fixed(FixedKind::U64),
            VarType::R4 => Self::Fixed(FixedKind::F32),
            VarType::R8 => Self::Fixed(FixedKind::F64),
            VarType::Bstr => Self::Text,
            VarType::Variant => Self::Variant,
            other => Self::Unsupported(other),
        }
    }
}

impl FixedKind {
    /// Element width in bytes. `Bool` is the two-byte `VARIANT_BOOL`.
    pub const fn width(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::Bool | Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Decode one element from exactly [`width`](Self::width) bytes.
    ///
    /// Returns `None` if `bytes` has the wrong length.
    pub fn decode(self, bytes: &[u8]) -> Option<Value> {
        Some(match self {
            Self::Bool => Value::Bool(i16::from_ne_bytes(bytes.try_into().ok()?) != 0),
            Self::I8 => Value::I8(i8::from_ne_bytes(bytes.try_into().ok()?)),
            Self::I16 => Value::I16(i16::from_ne_bytes(bytes.try_into().ok()?)),
            Self::I32 => Value::I32(i32::from_ne_bytes(bytes.try_into().ok()?)),
            Self::I64 => Value::I64(i64::from_ne_bytes(bytes.try_into().ok()?)),
            Self::U8 => Value::U8(u8::from_ne_bytes(bytes.try_into().ok()?)),
            Self::U16 => Value::U16(u16::from_ne_bytes(bytes.try_into().ok()?)),
            Self::U32 => Value::U32(u32::from_ne_bytes(bytes.try_into().ok()?)),
            Self::U64 => Value::U64(u64::from_ne_bytes(bytes.try_into().ok()?)),
            Self::F32 => Value::F32(f32::from_ne_bytes(bytes.try_into().ok()?)),
            Self::F64 => Value::F64(f64::from_ne_bytes(bytes.try_into().ok()?)),
        })
    }

    /// Zero value of this kind, used for slots whose read failed.
    pub const fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::I8 => Value::I8(0),
            Self::I16 => Value::I16(0),
            Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::U8 => Value::U8(0),
            Self::U16 => Value::U16(0),
            Self::U32 => Value::U32(0),
            Self::U64 => Value::U64(0),
            Self::F32 => Value::F32(0.0),
            Self::F64 => Value::F64(0.0),
        }
    }
}

/// Encode a fixed-width value as the bytes a SafeArray stores for it.
///
/// Returns `None` for [`Value::String`], which is not stored inline.
pub fn encode_fixed(value: &Value) -> Option<Vec<u8>> {
    Some(match value {
        Value::Bool(v) => i16::from(*v).wrapping_neg().to_ne_bytes().to_vec(),
        Value::I8(v) => v.to_ne_bytes().to_vec(),
        Value::I16(v) => v.to_ne_bytes().to_vec(),
        Value::I32(v) => v.to_ne_bytes().to_vec(),
        Value::I64(v) => v.to_ne_bytes().to_vec(),
        Value::U8(v) => v.to_ne_bytes().to_vec(),
        Value::U16(v) => v.to_ne_bytes().to_vec(),
        Value::U32(v) => v.to_ne_bytes().to_vec(),
        Value::U64(v) => v.to_ne_bytes().to_vec(),
        Value::F32(v) => v.to_ne_bytes().to_vec(),
        Value::F64(v) => v.to_ne_bytes().to_vec(),
        Value::String(_) => return None,
    })
}
