//! In-process SafeArray backend.
//!
//! [`MemorySafeArray`] describes an array with Rust-owned storage and answers
//! the [`SafeArrayAccess`] queries the way the OLE runtime does. It backs the
//! converter on hosts without COM and lets tests inject per-element failures
//! and observe how many transient variants are alive.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::access::{Bounds, SafeArrayAccess, VariantElement};
use crate::codec::encode_fixed;
use crate::errors::{SafeArrayError, SafeArrayResult, hresult};
use crate::value::Value;
use crate::vartype::VarType;

/// An owned, possibly multi-dimensional SafeArray.
///
/// Elements are stored row-major: the last dimension varies fastest.
/// Variant arrays may hold `None` elements (`VT_EMPTY`); typed arrays hold
/// values matching their tag.
#[derive(Debug)]
pub struct MemorySafeArray {
    vartype: VarType,
    bounds: Vec<Bounds>,
    elements: Vec<Option<Value>>,
    destroyed: Cell<bool>,
    failing: HashSet<usize>,
    live_variants: Rc<Cell<usize>>,
}

impl MemorySafeArray {
    /// Create an array with the given per-dimension bounds.
    ///
    /// # Panics
    ///
    /// Panics if `elements` does not hold exactly as many entries as the
    /// bounds describe.
    pub fn new(vartype: VarType, bounds: Vec<Bounds>, elements: Vec<Option<Value>>) -> Self {
        let expected: usize = bounds.iter().map(|b| b.len()).product();
        assert_eq!(
            expected,
            elements.len(),
            "bounds describe {expected} elements but {} were given",
            elements.len()
        );
        Self {
            vartype,
            bounds,
            elements,
            destroyed: Cell::new(false),
            failing: HashSet::new(),
            live_variants: Rc::new(Cell::new(0)),
        }
    }

    /// Create a one-dimensional array starting at `lower`.
    pub fn vector<I, V>(vartype: VarType, lower: i32, elements: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let elements: Vec<Option<Value>> = elements.into_iter().map(|v| Some(v.into())).collect();
        Self::new(vartype, vec![Bounds::with_len(lower, elements.len())], elements)
    }

    /// Make reads of the element at row-major position `offset` fail with
    /// `E_UNEXPECTED`.
    #[must_use]
    pub fn with_failing_element(mut self, offset: usize) -> Self {
        self.failing.insert(offset);
        self
    }

    /// Number of [`MemoryVariant`]s read out of this array and not yet cleared.
    pub fn live_variants(&self) -> usize {
        self.live_variants.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn ensure_alive<F>(&self, err: F) -> SafeArrayResult<()>
    where
        F: FnOnce(i32) -> SafeArrayError,
    {
        if self.destroyed.get() {
            tracing::trace!("query on destroyed memory array");
            return Err(err(hresult::E_INVALIDARG));
        }
        Ok(())
    }

    fn dimension(&self, dim: u32) -> SafeArrayResult<Bounds> {
        self.ensure_alive(|code| SafeArrayError::Bound { dim, code })?;
        let position = usize::try_from(dim)
            .ok()
            .and_then(|d| d.checked_sub(1))
            .and_then(|d| self.bounds.get(d));
        position.copied().ok_or(SafeArrayError::Bound {
            dim,
            code: hresult::DISP_E_BADINDEX,
        })
    }

    /// Row-major offset of `indices`, checking each against its bounds.
    fn offset(&self, indices: &[i32]) -> SafeArrayResult<usize> {
        let bad_index = || SafeArrayError::Element {
            indices: indices.to_vec(),
            code: hresult::DISP_E_BADINDEX,
        };
        self.ensure_alive(|code| SafeArrayError::Element {
            indices: indices.to_vec(),
            code,
        })?;
        if indices.len() != self.bounds.len() {
            return Err(bad_index());
        }

        let mut offset = 0usize;
        for (index, bounds) in indices.iter().zip(&self.bounds) {
            if !bounds.contains(*index) {
                return Err(bad_index());
            }
            let relative = usize::try_from(index - bounds.lower).map_err(|_| bad_index())?;
            offset = offset * bounds.len() + relative;
        }

        if self.failing.contains(&offset) {
            return Err(SafeArrayError::Element {
                indices: indices.to_vec(),
                code: hresult::E_UNEXPECTED,
            });
        }
        Ok(offset)
    }

    fn element(&self, indices: &[i32], expected: VarType) -> SafeArrayResult<Option<&Value>> {
        let offset = self.offset(indices)?;
        if self.vartype != expected {
            return Err(SafeArrayError::Element {
                indices: indices.to_vec(),
                code: hresult::DISP_E_TYPEMISMATCH,
            });
        }
        Ok(self.elements.get(offset).and_then(Option::as_ref))
    }
}

impl SafeArrayAccess for MemorySafeArray {
    type Variant = MemoryVariant;

    fn lower_bound(&self, dim: u32) -> SafeArrayResult<i32> {
        Ok(self.dimension(dim)?.lower)
    }

    fn upper_bound(&self, dim: u32) -> SafeArrayResult<i32> {
        Ok(self.dimension(dim)?.upper)
    }

    fn vartype(&self) -> SafeArrayResult<VarType> {
        self.ensure_alive(|code| SafeArrayError::VarType { code })?;
        Ok(self.vartype)
    }

    fn dimensions(&self) -> SafeArrayResult<u32> {
        self.ensure_alive(|code| SafeArrayError::Dimensions { code })?;
        u32::try_from(self.bounds.len()).map_err(|_| SafeArrayError::Dimensions {
            code: hresult::E_UNEXPECTED,
        })
    }

    fn element_size(&self) -> SafeArrayResult<u32> {
        self.ensure_alive(|code| SafeArrayError::ElementSize { code })?;
        self.vartype
            .element_width()
            .ok_or(SafeArrayError::ElementSize {
                code: hresult::DISP_E_BADVARTYPE,
            })
    }

    fn read_element(&self, indices: &[i32], buf: &mut [u8]) -> SafeArrayResult<()> {
        let offset = self.offset(indices)?;
        let expected = self.element_size()?;
        let width = usize::try_from(expected).unwrap_or(usize::MAX);
        if buf.len() < width {
            return Err(SafeArrayError::BufferSize {
                expected,
                actual: buf.len(),
            });
        }

        let bytes = self
            .elements
            .get(offset)
            .and_then(Option::as_ref)
            .and_then(encode_fixed)
            .filter(|bytes| bytes.len() == width)
            .ok_or_else(|| SafeArrayError::Element {
                indices: indices.to_vec(),
                code: hresult::DISP_E_TYPEMISMATCH,
            })?;
        buf[..width].copy_from_slice(&bytes);
        Ok(())
    }

    fn read_string(&self, indices: &[i32]) -> SafeArrayResult<String> {
        match self.element(indices, VarType::Bstr)? {
            Some(Value::String(s)) => Ok(s.clone()),
            None => Ok(String::new()),
            Some(_) => Err(SafeArrayError::Element {
                indices: indices.to_vec(),
                code: hresult::DISP_E_TYPEMISMATCH,
            }),
        }
    }

    fn read_variant(&self, indices: &[i32]) -> SafeArrayResult<MemoryVariant> {
        let value = self.element(indices, VarType::Variant)?.cloned();
        Ok(MemoryVariant::tracked(value, Rc::clone(&self.live_variants)))
    }

    fn destroy(&self) -> SafeArrayResult<()> {
        self.ensure_alive(|code| SafeArrayError::Destroy { code })?;
        tracing::debug!(vartype = %self.vartype, "destroying memory array");
        self.destroyed.set(true);
        Ok(())
    }
}

/// A variant element copied out of a [`MemorySafeArray`].
///
/// Counts as live against its source array until cleared or dropped.
#[derive(Debug)]
pub struct MemoryVariant {
    value: Option<Value>,
    live: Option<Rc<Cell<usize>>>,
}

impl MemoryVariant {
    /// A standalone variant not tracked by any array.
    pub const fn new(value: Option<Value>) -> Self {
        Self { value, live: None }
    }

    fn tracked(value: Option<Value>, live: Rc<Cell<usize>>) -> Self {
        live.set(live.get() + 1);
        Self {
            value,
            live: Some(live),
        }
    }
}

impl VariantElement for MemoryVariant {
    fn vartype(&self) -> VarType {
        self.value.as_ref().map_or(VarType::Empty, Value::vartype)
    }

    fn value(&self) -> Option<Value> {
        self.value.clone()
    }

    fn clear(&mut self) {
        self.value = None;
        if let Some(live) = self.live.take() {
            live.set(live.get().saturating_sub(1));
        }
    }
}

impl Drop for MemoryVariant {
    fn drop(&mut self) {
        self.clear();
    }
}
