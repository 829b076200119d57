//! Variant type tags (`VARENUM`) as declared by a SafeArray.

use std::fmt;

/// The declared element type of a SafeArray or the dynamic type of a variant.
///
/// Raw codes follow the OLE Automation `VARENUM` numbering. Codes this crate
/// does not name are kept as [`VarType::Other`] so no information is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Empty,
    Null,
    I2,
    I4,
    R4,
    R8,
    Cy,
    Date,
    Bstr,
    Dispatch,
    Error,
    Bool,
    Variant,
    Unknown,
    Decimal,
    I1,
    UI1,
    UI2,
    UI4,
    I8,
    UI8,
    Int,
    UInt,
    Other(u16),
}

impl VarType {
    /// Decode a raw `VARTYPE` value.
    ///
    /// The `VT_ARRAY`/`VT_BYREF` modifier bits are not stripped; a tag
    /// carrying them decodes to [`VarType::Other`].
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Empty,
            1 => Self::Null,
            2 => Self::I2,
            3 => Self::I4,
            4 => Self::R4,
            5 => Self::R8,
            6 => Self::Cy,
            7 => Self::Date,
            8 => Self::Bstr,
            9 => Self::Dispatch,
            10 => Self::Error,
            11 => Self::Bool,
            12 => Self::Variant,
            13 => Self::Unknown,
            14 => Self::Decimal,
            16 => Self::I1,
            17 => Self::UI1,
            18 => Self::UI2,
            19 => Self::UI4,
            20 => Self::I8,
            21 => Self::UI8,
            22 => Self::Int,
            23 => Self::UInt,
            other => Self::Other(other),
        }
    }

    /// The raw `VARTYPE` value.
    pub const fn to_raw(self) -> u16 {
        match self {
            Self::Empty => 0,
            Self::Null => 1,
            Self::I2 => 2,
            Self::I4 => 3,
            Self::R4 => 4,
            Self::R8 => 5,
            Self::Cy => 6,
            Self::Date => 7,
            Self::Bstr => 8,
            Self::Dispatch => 9,
            Self::Error => 10,
            Self::Bool => 11,
            Self::Variant => 12,
            Self::Unknown => 13,
            Self::Decimal => 14,
            Self::I1 => 16,
            Self::UI1 => 17,
            Self::UI2 => 18,
            Self::UI4 => 19,
            Self::I8 => 20,
            Self::UI8 => 21,
            Self::Int => 22,
            Self::UInt => 23,
            Self::Other(raw) => raw,
        }
    }

    /// Byte width of one array element of this type on the current target.
    ///
    /// `None` for tags that cannot be stored in a SafeArray.
    pub const fn element_width(self) -> Option<u32> {
        const POINTER: u32 = std::mem::size_of::<usize>() as u32;
        match self {
            Self::I1 | Self::UI1 => Some(1),
            Self::I2 | Self::UI2 | Self::Bool => Some(2),
            Self::I4 | Self::UI4 | Self::R4 | Self::Int | Self::UInt | Self::Error => Some(4),
            Self::I8 | Self::UI8 | Self::R8 | Self::Cy | Self::Date => Some(8),
            Self::Decimal => Some(16),
            Self::Bstr | Self::Dispatch | Self::Unknown => Some(POINTER),
            // vt + 3 reserved words, then a two-pointer payload
            Self::Variant => Some(8 + 2 * POINTER),
            Self::Empty | Self::Null | Self::Other(_) => None,
        }
    }
}

impl From<u16> for VarType {
    fn from(raw: u16) -> Self {
        Self::from_raw(raw)
    }
}

impl From<VarType> for u16 {
    fn from(vt: VarType) -> Self {
        vt.to_raw()
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "VT({raw})"),
            named => write!(f, "VT_{}", format!("{named:?}").to_uppercase()),
        }
    }
}
