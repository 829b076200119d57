use thiserror::Error;

/// Result type alias for SafeArray operations.
pub type SafeArrayResult<T> = Result<T, SafeArrayError>;

/// `HRESULT` codes reported by the SafeArray API.
///
/// Stored as the signed 32-bit value the COM runtime returns so the error type
/// stays portable across hosts without the `windows` crate.
pub mod hresult {
    #![allow(clippy::cast_possible_wrap)]

    pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
    pub const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;
    pub const DISP_E_TYPEMISMATCH: i32 = 0x8002_0005_u32 as i32;
    pub const DISP_E_BADVARTYPE: i32 = 0x8002_0008_u32 as i32;
    pub const DISP_E_BADINDEX: i32 = 0x8002_000B_u32 as i32;
    pub const DISP_E_ARRAYISLOCKED: i32 = 0x8002_000D_u32 as i32;
}

/// Centralized error enum for SafeArray conversion.
///
/// One case per external query the converter makes, each carrying the
/// `HRESULT` the external layer reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SafeArrayError {
    /// Lower or upper bound query failed for a dimension.
    #[error("Bound query failed for dimension {dim}: {}", format_hresult(*.code))]
    Bound { dim: u32, code: i32 },

    /// The array's declared variant type could not be read.
    #[error("Vartype query failed: {}", format_hresult(*.code))]
    VarType { code: i32 },

    /// The array's dimension count could not be read.
    #[error("Dimension query failed: {}", format_hresult(*.code))]
    Dimensions { code: i32 },

    /// The array's element size could not be read.
    #[error("Element size query failed: {}", format_hresult(*.code))]
    ElementSize { code: i32 },

    /// A single element could not be read.
    #[error("Element read at {indices:?} failed: {}", format_hresult(*.code))]
    Element { indices: Vec<i32>, code: i32 },

    /// The array could not be destroyed.
    #[error("Destroy failed: {}", format_hresult(*.code))]
    Destroy { code: i32 },

    /// The element buffer is narrower than the array's declared element size.
    #[error("Element buffer holds {actual} bytes but the array declares {expected}")]
    BufferSize { expected: u32, actual: usize },
}

impl SafeArrayError {
    /// The `HRESULT` behind this error, if the external layer reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Bound { code, .. }
            | Self::VarType { code }
            | Self::Dimensions { code }
            | Self::ElementSize { code }
            | Self::Element { code, .. }
            | Self::Destroy { code } => Some(*code),
            Self::BufferSize { .. } => None,
        }
    }
}

/// Helper to format an `HRESULT` with a friendly hint.
#[allow(clippy::cast_sign_loss)]
pub fn format_hresult(hr: i32) -> String {
    let hex = format!("0x{:08X}", hr as u32);
    match friendly_hresult_hint(hr) {
        Some(hint) => format!("{hex}: {hint}"),
        None => hex,
    }
}

/// Maps SafeArray-related `HRESULT` codes to actionable hints.
///
/// # Examples
/// ```
/// use safearray_convert::errors::{friendly_hresult_hint, hresult};
///
/// assert_eq!(
///     friendly_hresult_hint(hresult::DISP_E_BADINDEX),
///     Some("Index is outside the array bounds (DISP_E_BADINDEX)"),
/// );
/// assert_eq!(friendly_hresult_hint(0), None);
/// ```
pub fn friendly_hresult_hint(hr: i32) -> Option<&'static str> {
    match hr {
        hresult::DISP_E_BADINDEX => Some("Index is outside the array bounds (DISP_E_BADINDEX)"),
        hresult::DISP_E_BADVARTYPE => {
            Some("Array element type is not a valid variant type (DISP_E_BADVARTYPE)")
        }
        hresult::DISP_E_ARRAYISLOCKED => Some("Array is locked (DISP_E_ARRAYISLOCKED)"),
        hresult::DISP_E_TYPEMISMATCH => {
            Some("Element type does not match the requested type (DISP_E_TYPEMISMATCH)")
        }
        hresult::E_INVALIDARG => Some("Invalid array handle or argument (E_INVALIDARG)"),
        hresult::E_OUTOFMEMORY => Some("Out of memory while copying element (E_OUTOFMEMORY)"),
        hresult::E_UNEXPECTED => Some("Unexpected failure (E_UNEXPECTED)"),
        _ => None,
    }
}

/// Maps a [`SafeArrayError`] to a friendly hint if it carries an `HRESULT`.
pub fn friendly_error_hint(error: &SafeArrayError) -> Option<&'static str> {
    error.code().and_then(friendly_hresult_hint)
}
