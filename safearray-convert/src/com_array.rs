//! SafeArray access through the OLE Automation runtime.
//!
//! [`ComSafeArray`] borrows a raw `SAFEARRAY` pointer. It never destroys the
//! array on its own; ownership stays with whoever created it until
//! [`SafeArrayAccess::destroy`] is called explicitly.

use std::cell::OnceCell;
use std::marker::PhantomData;

use windows::Win32::System::Com::SAFEARRAY;
use windows::Win32::System::Ole::{
    SafeArrayDestroy, SafeArrayGetDim, SafeArrayGetElement, SafeArrayGetElemsize,
    SafeArrayGetLBound, SafeArrayGetUBound, SafeArrayGetVartype,
};
use windows::Win32::System::Variant::{VARIANT, VariantClear};
use windows::core::BSTR;

use crate::access::{SafeArrayAccess, VariantElement};
use crate::errors::{SafeArrayError, SafeArrayResult, hresult};
use crate::value::Value;
use crate::vartype::VarType;

/// Non-owning handle to a COM `SAFEARRAY`.
///
/// `ComSafeArray` is `!Send` and `!Sync`: the OLE array functions give no
/// thread-safety guarantee, so access must stay on one thread.
///
/// Dimension count, element type and element size are fixed when a
/// `SAFEARRAY` is created, so the per-element reads query each of them once
/// and reuse the answer. The public metadata queries always ask the runtime.
#[derive(Debug)]
pub struct ComSafeArray {
    raw: *mut SAFEARRAY,
    dims: OnceCell<u32>,
    vartype: OnceCell<VarType>,
    element_size: OnceCell<u32>,
    _not_send: PhantomData<*mut ()>,
}

impl ComSafeArray {
    /// Wrap a raw `SAFEARRAY` pointer.
    ///
    /// # Safety
    ///
    /// `raw` must be null or point to a valid `SAFEARRAY` that stays alive
    /// (not destroyed by anyone else) for as long as this handle is used.
    pub unsafe fn from_raw(raw: *mut SAFEARRAY) -> Self {
        Self {
            raw,
            dims: OnceCell::new(),
            vartype: OnceCell::new(),
            element_size: OnceCell::new(),
            _not_send: PhantomData,
        }
    }

    pub const fn as_raw(&self) -> *mut SAFEARRAY {
        self.raw
    }

    fn check_handle<F>(&self, err: F) -> SafeArrayResult<()>
    where
        F: FnOnce(i32) -> SafeArrayError,
    {
        if self.raw.is_null() {
            return Err(err(hresult::E_INVALIDARG));
        }
        Ok(())
    }

    fn cached<T: Copy>(
        cell: &OnceCell<T>,
        query: impl FnOnce() -> SafeArrayResult<T>,
    ) -> SafeArrayResult<T> {
        if let Some(value) = cell.get() {
            return Ok(*value);
        }
        let value = query()?;
        Ok(*cell.get_or_init(|| value))
    }

    /// Reverse dimension-ordered indices into the OLE layout, where
    /// `rgIndices[0]` addresses the right-most dimension.
    fn native_indices(&self, indices: &[i32]) -> SafeArrayResult<Vec<i32>> {
        let dims = Self::cached(&self.dims, || self.dimensions())?;
        if usize::try_from(dims).ok() != Some(indices.len()) {
            return Err(SafeArrayError::Element {
                indices: indices.to_vec(),
                code: hresult::DISP_E_BADINDEX,
            });
        }
        Ok(indices.iter().rev().copied().collect())
    }

    fn expect_vartype(&self, indices: &[i32], expected: VarType) -> SafeArrayResult<()> {
        if Self::cached(&self.vartype, || self.vartype())? != expected {
            return Err(SafeArrayError::Element {
                indices: indices.to_vec(),
                code: hresult::DISP_E_TYPEMISMATCH,
            });
        }
        Ok(())
    }
}

impl SafeArrayAccess for ComSafeArray {
    type Variant = OwnedVariant;

    fn lower_bound(&self, dim: u32) -> SafeArrayResult<i32> {
        self.check_handle(|code| SafeArrayError::Bound { dim, code })?;
        tracing::trace!(dim, "SafeArrayGetLBound");
        // SAFETY: `raw` is non-null and valid per the `from_raw` contract.
        unsafe { SafeArrayGetLBound(self.raw, dim) }.map_err(|e| SafeArrayError::Bound {
            dim,
            code: e.code().0,
        })
    }

    fn upper_bound(&self, dim: u32) -> SafeArrayResult<i32> {
        self.check_handle(|code| SafeArrayError::Bound { dim, code })?;
        tracing::trace!(dim, "SafeArrayGetUBound");
        // SAFETY: `raw` is non-null and valid per the `from_raw` contract.
        unsafe { SafeArrayGetUBound(self.raw, dim) }.map_err(|e| SafeArrayError::Bound {
            dim,
            code: e.code().0,
        })
    }

    fn vartype(&self) -> SafeArrayResult<VarType> {
        self.check_handle(|code| SafeArrayError::VarType { code })?;
        // SAFETY: `raw` is non-null and valid per the `from_raw` contract.
        unsafe { SafeArrayGetVartype(self.raw) }
            .map(|vt| VarType::from_raw(vt.0))
            .map_err(|e| SafeArrayError::VarType { code: e.code().0 })
    }

    fn dimensions(&self) -> SafeArrayResult<u32> {
        self.check_handle(|code| SafeArrayError::Dimensions { code })?;
        // SAFETY: `raw` is non-null and valid per the `from_raw` contract.
        Ok(unsafe { SafeArrayGetDim(self.raw) })
    }

    fn element_size(&self) -> SafeArrayResult<u32> {
        self.check_handle(|code| SafeArrayError::ElementSize { code })?;
        // SAFETY: `raw` is non-null and valid per the `from_raw` contract.
        match unsafe { SafeArrayGetElemsize(self.raw) } {
            0 => Err(SafeArrayError::ElementSize {
                code: hresult::E_UNEXPECTED,
            }),
            size => Ok(size),
        }
    }

    fn read_element(&self, indices: &[i32], buf: &mut [u8]) -> SafeArrayResult<()> {
        let native = self.native_indices(indices)?;
        let expected = Self::cached(&self.element_size, || self.element_size())?;
        if usize::try_from(expected).is_none_or(|width| buf.len() < width) {
            return Err(SafeArrayError::BufferSize {
                expected,
                actual: buf.len(),
            });
        }
        // SAFETY: `native` holds one index per dimension and `buf` is at least
        // `element_size` bytes, which is all `SafeArrayGetElement` writes.
        unsafe { SafeArrayGetElement(self.raw, native.as_ptr(), buf.as_mut_ptr().cast()) }.map_err(
            |e| SafeArrayError::Element {
                indices: indices.to_vec(),
                code: e.code().0,
            },
        )
    }

    fn read_string(&self, indices: &[i32]) -> SafeArrayResult<String> {
        let native = self.native_indices(indices)?;
        self.expect_vartype(indices, VarType::Bstr)?;
        let mut bstr = BSTR::default();
        // SAFETY: the array holds BSTRs, so the runtime writes one freshly
        // allocated BSTR into `bstr`, which frees it on drop.
        unsafe { SafeArrayGetElement(self.raw, native.as_ptr(), (&raw mut bstr).cast()) }
            .map_err(|e| SafeArrayError::Element {
                indices: indices.to_vec(),
                code: e.code().0,
            })?;
        Ok(bstr.to_string())
    }

    fn read_variant(&self, indices: &[i32]) -> SafeArrayResult<OwnedVariant> {
        let native = self.native_indices(indices)?;
        self.expect_vartype(indices, VarType::Variant)?;
        let mut variant = OwnedVariant(VARIANT::default());
        // SAFETY: the array holds VARIANTs, so the runtime `VariantCopy`s one
        // element into `variant`, which now owns the copy.
        unsafe {
            SafeArrayGetElement(self.raw, native.as_ptr(), (&raw mut variant.0).cast())
        }
        .map_err(|e| SafeArrayError::Element {
            indices: indices.to_vec(),
            code: e.code().0,
        })?;
        Ok(variant)
    }

    fn destroy(&self) -> SafeArrayResult<()> {
        self.check_handle(|code| SafeArrayError::Destroy { code })?;
        tracing::debug!("SafeArrayDestroy");
        // SAFETY: `raw` is non-null and valid per the `from_raw` contract.
        // Using the handle afterwards is the caller's contract violation.
        unsafe { SafeArrayDestroy(self.raw) }
            .map_err(|e| SafeArrayError::Destroy { code: e.code().0 })
    }
}

/// A `VARIANT` copied out of a SafeArray.
///
/// Cleared with `VariantClear` on [`clear`](VariantElement::clear) and on drop.
pub struct OwnedVariant(VARIANT);

impl OwnedVariant {
    pub const fn as_raw(&self) -> &VARIANT {
        &self.0
    }
}

impl std::fmt::Debug for OwnedVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedVariant")
            .field("vartype", &self.vartype())
            .finish()
    }
}

impl VariantElement for OwnedVariant {
    fn vartype(&self) -> VarType {
        // SAFETY: `vt` is valid in every VARIANT, including the default one.
        VarType::from_raw(unsafe { self.0.Anonymous.Anonymous.vt.0 })
    }

    fn value(&self) -> Option<Value> {
        // SAFETY: the union arm read in each branch is the one `vt` names.
        unsafe {
            let inner = &self.0.Anonymous.Anonymous.Anonymous;
            Some(match self.vartype() {
                VarType::Bool => Value::Bool(inner.boolVal.as_bool()),
                #[allow(clippy::cast_possible_wrap)]
                VarType::I1 => Value::I8(inner.bVal as i8),
                VarType::I2 => Value::I16(inner.iVal),
                VarType::I4 => Value::I32(inner.lVal),
                VarType::I8 => Value::I64(inner.llVal),
                VarType::UI1 => Value::U8(inner.bVal),
                VarType::UI2 => Value::U16(inner.uiVal),
                VarType::UI4 => Value::U32(inner.ulVal),
                VarType::UI8 => Value::U64(inner.ullVal),
                VarType::R4 => Value::F32(inner.fltVal),
                VarType::R8 => Value::F64(inner.dblVal),
                VarType::Bstr => Value::String(inner.bstrVal.to_string()),
                _ => return None,
            })
        }
    }

    fn clear(&mut self) {
        // SAFETY: the VARIANT is owned by this wrapper; clearing an already
        // empty VARIANT is a no-op.
        if let Err(e) = unsafe { VariantClear(&raw mut self.0) } {
            tracing::warn!(error = ?e, "VariantClear failed");
        }
    }
}

impl Drop for OwnedVariant {
    fn drop(&mut self) {
        self.clear();
    }
}
