//! Typed extraction of SafeArray elements into owned Rust containers.

use crate::access::{Bounds, SafeArrayAccess, VariantElement};
use crate::codec::{ElementCodec, FixedKind};
use crate::errors::SafeArrayResult;
use crate::value::Value;
use crate::vartype::VarType;

/// What bulk extraction does when a single element cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Leave the slot at its default (`""`, `0`, `false`, or unset) and
    /// continue with the next element. The failure is logged.
    #[default]
    BestEffort,
    /// Stop at the first failed element and return its error.
    Strict,
}

/// Converts the elements of a borrowed SafeArray into owned containers.
///
/// The converter does not own the array. Dropping it leaves the array
/// untouched; only [`release`](Self::release) destroys it.
///
/// Elements of dimension 1 are read at `lower_bound(1) + i` for
/// `i in 0..total_elements(1)`.
///
/// # Examples
///
/// ```
/// use safearray_convert::{MemorySafeArray, SafeArrayConverter, Value, VarType};
///
/// let array = MemorySafeArray::vector(VarType::I4, 0, [1i32, -2, 3]);
/// let converter = SafeArrayConverter::new(&array);
///
/// let values = converter.to_value_array()?;
/// assert_eq!(values, vec![Some(Value::I32(1)), Some(Value::I32(-2)), Some(Value::I32(3))]);
/// # Ok::<(), safearray_convert::SafeArrayError>(())
/// ```
#[derive(Debug)]
pub struct SafeArrayConverter<'a, A: SafeArrayAccess> {
    array: &'a A,
    policy: ReadPolicy,
}

impl<'a, A: SafeArrayAccess> SafeArrayConverter<'a, A> {
    /// Borrow `array` with the [`ReadPolicy::BestEffort`] policy.
    pub const fn new(array: &'a A) -> Self {
        Self {
            array,
            policy: ReadPolicy::BestEffort,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn policy(&self) -> ReadPolicy {
        self.policy
    }

    /// Declared variant type of the array elements.
    pub fn get_type(&self) -> SafeArrayResult<VarType> {
        self.array.vartype()
    }

    /// Declared dimension count.
    pub fn get_dimensions(&self) -> SafeArrayResult<u32> {
        self.array.dimensions()
    }

    /// Declared byte width of one element.
    pub fn get_size(&self) -> SafeArrayResult<u32> {
        self.array.element_size()
    }

    /// Bounds of a 1-indexed dimension. Dimension 0 is treated as 1.
    pub fn bounds(&self, dimension: u32) -> SafeArrayResult<Bounds> {
        let dim = dimension.max(1);
        let lower = self.array.lower_bound(dim)?;
        let upper = self.array.upper_bound(dim)?;
        Ok(Bounds::new(lower, upper))
    }

    /// Element count of a 1-indexed dimension, `upper - lower + 1`.
    /// Dimension 0 is treated as 1.
    pub fn total_elements(&self, dimension: u32) -> SafeArrayResult<i32> {
        Ok(self.bounds(dimension)?.count())
    }

    /// Destroy the underlying array.
    ///
    /// Consumes the converter. Any other handle or converter still pointing
    /// at the array must not be used afterwards.
    pub fn release(self) -> SafeArrayResult<()> {
        tracing::debug!("releasing SafeArray");
        self.array.destroy()
    }

    /// Read every element of dimension 1 as text.
    pub fn to_string_array(&self) -> SafeArrayResult<Vec<String>> {
        let bounds = self.bounds(1)?;
        let mut strings = vec![String::new(); bounds.len()];

        for (slot, index) in strings.iter_mut().zip(bounds.lower..=bounds.upper) {
            if let Some(s) = self.settle(index, self.array.read_string(&[index]))? {
                *slot = s;
            }
        }

        tracing::debug!(count = strings.len(), "converted string array");
        Ok(strings)
    }

    /// Read every element of dimension 1 as one byte.
    ///
    /// Intended for `VT_UI1`/`VT_I1` arrays. For wider elements every read
    /// fails with a buffer-size error and is handled by the policy.
    pub fn to_byte_array(&self) -> SafeArrayResult<Vec<u8>> {
        let bounds = self.bounds(1)?;
        let mut bytes = vec![0u8; bounds.len()];

        for (slot, index) in bytes.iter_mut().zip(bounds.lower..=bounds.upper) {
            let mut buf = [0u8; 1];
            let read = self.array.read_element(&[index], &mut buf);
            if self.settle(index, read)?.is_some() {
                *slot = buf[0];
            }
        }

        tracing::debug!(count = bytes.len(), "converted byte array");
        Ok(bytes)
    }

    /// Decode every element of dimension 1 according to the declared type.
    ///
    /// Nested variants yield their inner primitive value and are cleared
    /// before the next element is read. Element types without a decoder
    /// (currency, date, decimal, interfaces, ...) leave their slots `None`.
    pub fn to_value_array(&self) -> SafeArrayResult<Vec<Option<Value>>> {
        let bounds = self.bounds(1)?;
        let vartype = self.array.vartype()?;
        let codec = ElementCodec::from(vartype);
        let mut values = vec![None; bounds.len()];

        if let ElementCodec::Unsupported(vt) = codec {
            tracing::warn!(vartype = %vt, "no decoder for element type, leaving values unset");
            return Ok(values);
        }

        for (slot, index) in values.iter_mut().zip(bounds.lower..=bounds.upper) {
            *slot = match codec {
                ElementCodec::Fixed(kind) => self.read_fixed(kind, index)?,
                ElementCodec::Text => Some(Value::String(
                    self.settle(index, self.array.read_string(&[index]))?
                        .unwrap_or_default(),
                )),
                ElementCodec::Variant => self.read_variant_value(index)?,
                ElementCodec::Unsupported(_) => None,
            };
        }

        tracing::debug!(count = values.len(), vartype = %vartype, "converted value array");
        Ok(values)
    }

    /// Copy every element of dimension 1 out as a variant.
    ///
    /// Returns `None` unless the array is declared `VT_VARIANT`. The
    /// returned variants are owned by the caller. A failed element copy is
    /// returned as an error under either read policy.
    pub fn to_variant_array(&self) -> SafeArrayResult<Option<Vec<A::Variant>>> {
        if self.array.vartype()? != VarType::Variant {
            return Ok(None);
        }

        let bounds = self.bounds(1)?;
        let mut variants = Vec::with_capacity(bounds.len());
        for index in bounds.lower..=bounds.upper {
            variants.push(self.array.read_variant(&[index])?);
        }
        Ok(Some(variants))
    }

    /// Copy every element of a two-dimensional variant array out as rows.
    ///
    /// The outer vector follows dimension 1 and each row follows dimension 2,
    /// each dimension read with its own bounds. Returns `None` unless the
    /// array is declared `VT_VARIANT` with exactly two dimensions.
    pub fn to_2d_variant_array(&self) -> SafeArrayResult<Option<Vec<Vec<A::Variant>>>> {
        if self.array.vartype()? != VarType::Variant {
            return Ok(None);
        }
        let dims = self.array.dimensions()?;
        if dims != 2 {
            tracing::debug!(dims, "not a two-dimensional array");
            return Ok(None);
        }

        let rows = self.bounds(1)?;
        let columns = self.bounds(2)?;
        let mut values = Vec::with_capacity(rows.len());
        for i in rows.lower..=rows.upper {
            let mut row = Vec::with_capacity(columns.len());
            for j in columns.lower..=columns.upper {
                row.push(self.array.read_variant(&[i, j])?);
            }
            values.push(row);
        }
        Ok(Some(values))
    }

    fn read_fixed(&self, kind: FixedKind, index: i32) -> SafeArrayResult<Option<Value>> {
        let mut buf = [0u8; 8];
        let width = kind.width();
        let read = self.array.read_element(&[index], &mut buf[..width]);
        Ok(Some(match self.settle(index, read)? {
            Some(()) => kind.decode(&buf[..width]).unwrap_or_else(|| kind.zero()),
            None => kind.zero(),
        }))
    }

    fn read_variant_value(&self, index: i32) -> SafeArrayResult<Option<Value>> {
        let Some(mut variant) = self.settle(index, self.array.read_variant(&[index]))? else {
            return Ok(None);
        };
        let value = variant.value();
        if value.is_none() {
            tracing::trace!(index, vartype = %variant.vartype(), "variant has no primitive value");
        }
        variant.clear();
        Ok(value)
    }

    /// Apply the read policy to one element read.
    fn settle<T>(&self, index: i32, read: SafeArrayResult<T>) -> SafeArrayResult<Option<T>> {
        match read {
            Ok(v) => Ok(Some(v)),
            Err(e) => match self.policy {
                ReadPolicy::Strict => Err(e),
                ReadPolicy::BestEffort => {
                    tracing::warn!(index, error = %e, "element read failed, keeping default");
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::MockSafeArrayAccess;
    use crate::errors::{SafeArrayError, hresult};
    use crate::memory::{MemorySafeArray, MemoryVariant};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_value_array_i4() {
        let array = MemorySafeArray::vector(VarType::I4, 0, [1i32, -2, 3]);
        let values = SafeArrayConverter::new(&array).to_value_array().unwrap();
        assert_eq!(values.len(), 3);
        let natives: Vec<i32> = values
            .into_iter()
            .map(|v| i32::try_from(v.unwrap()).unwrap())
            .collect();
        assert_eq!(natives, vec![1, -2, 3]);
    }

    #[test]
    fn test_value_array_each_fixed_type() {
        let cases: Vec<(VarType, Value)> = vec![
            (VarType::Bool, Value::Bool(true)),
            (VarType::I1, Value::I8(-5)),
            (VarType::I2, Value::I16(-300)),
            (VarType::I8, Value::I64(-1 << 40)),
            (VarType::UI1, Value::U8(200)),
            (VarType::UI2, Value::U16(60_000)),
            (VarType::UI4, Value::U32(4_000_000_000)),
            (VarType::UI8, Value::U64(u64::MAX)),
            (VarType::R4, Value::F32(1.5)),
            (VarType::R8, Value::F64(-2.25)),
            (VarType::Bstr, Value::from("text")),
        ];
        for (vt, value) in cases {
            let array = MemorySafeArray::vector(vt, 0, [value.clone()]);
            let values = SafeArrayConverter::new(&array).to_value_array().unwrap();
            assert_eq!(values, vec![Some(value)], "decoding {vt}");
        }
    }

    #[test]
    fn test_value_array_unsupported_tag_leaves_slots_unset() {
        let array = MemorySafeArray::new(
            VarType::Date,
            vec![Bounds::new(0, 1)],
            vec![Some(Value::F64(1.0)), Some(Value::F64(2.0))],
        );
        let values = SafeArrayConverter::new(&array).to_value_array().unwrap();
        assert_eq!(values, vec![None, None]);
    }

    #[test]
    fn test_value_array_nested_variants() {
        let array = MemorySafeArray::new(
            VarType::Variant,
            vec![Bounds::new(0, 2)],
            vec![Some(Value::I32(5)), None, Some(Value::from("x"))],
        );
        let values = SafeArrayConverter::new(&array).to_value_array().unwrap();
        assert_eq!(values, vec![Some(Value::I32(5)), None, Some(Value::from("x"))]);
        assert_eq!(array.live_variants(), 0);
    }

    #[test]
    fn test_value_array_clears_each_variant_before_next() {
        let mut mock = MockSafeArrayAccess::new();
        mock.expect_lower_bound().returning(|_| Ok(0));
        mock.expect_upper_bound().returning(|_| Ok(9_999));
        mock.expect_vartype().times(1).returning(|| Ok(VarType::Variant));

        let source = Rc::new(MemorySafeArray::vector(
            VarType::Variant,
            0,
            (0..10_000).map(Value::I32),
        ));
        let peak = Rc::new(Cell::new(0usize));
        let (tracker, observed) = (Rc::clone(&source), Rc::clone(&peak));
        mock.expect_read_variant()
            .times(10_000)
            .returning_st(move |indices| {
                let variant = tracker.read_variant(indices)?;
                observed.set(observed.get().max(tracker.live_variants()));
                Ok(variant)
            });

        let values = SafeArrayConverter::new(&mock).to_value_array().unwrap();
        assert_eq!(values.len(), 10_000);
        assert_eq!(values[9_999], Some(Value::I32(9_999)));
        assert_eq!(source.live_variants(), 0);
        assert_eq!(peak.get(), 1);
    }

    #[test]
    fn test_total_elements() {
        let array = MemorySafeArray::vector(VarType::UI1, 3, [1u8, 2, 3, 4]);
        let converter = SafeArrayConverter::new(&array);
        assert_eq!(converter.total_elements(1), Ok(4));
        assert_eq!(converter.total_elements(0), converter.total_elements(1));
        assert_eq!(converter.bounds(1), Ok(Bounds::new(3, 6)));
    }

    #[test]
    fn test_total_elements_per_dimension() {
        let array = MemorySafeArray::new(
            VarType::I2,
            vec![Bounds::new(1, 2), Bounds::new(-1, 3)],
            (0..10).map(|v| Some(Value::I16(v))).collect(),
        );
        let converter = SafeArrayConverter::new(&array);
        assert_eq!(converter.total_elements(1), Ok(2));
        assert_eq!(converter.total_elements(2), Ok(5));
        assert_eq!(
            converter.total_elements(3),
            Err(SafeArrayError::Bound {
                dim: 3,
                code: hresult::DISP_E_BADINDEX
            })
        );
    }

    #[test]
    fn test_total_elements_propagates_upper_bound_error() {
        let mut mock = MockSafeArrayAccess::new();
        mock.expect_lower_bound().returning(|_| Ok(0));
        mock.expect_upper_bound().returning(|dim| {
            Err(SafeArrayError::Bound {
                dim,
                code: hresult::DISP_E_BADINDEX,
            })
        });
        let converter = SafeArrayConverter::new(&mock);
        assert_eq!(
            converter.total_elements(0),
            Err(SafeArrayError::Bound {
                dim: 1,
                code: hresult::DISP_E_BADINDEX
            })
        );
    }

    #[test]
    fn test_lengths_match_total_elements() {
        let strings = MemorySafeArray::vector(VarType::Bstr, 1, ["a", "b", "c", "d"]);
        let bytes = MemorySafeArray::vector(VarType::UI1, -2, [9u8, 8, 7]);
        let variants = MemorySafeArray::vector(VarType::Variant, 0, [true, false]);

        let converter = SafeArrayConverter::new(&strings);
        assert_eq!(converter.to_string_array().unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(converter.to_value_array().unwrap().len(), 4);

        let converter = SafeArrayConverter::new(&bytes);
        assert_eq!(converter.to_byte_array().unwrap(), vec![9, 8, 7]);
        assert_eq!(converter.to_value_array().unwrap().len(), 3);

        let converter = SafeArrayConverter::new(&variants);
        let copied = converter.to_variant_array().unwrap().unwrap();
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0].value(), Some(Value::Bool(true)));
        assert_eq!(variants.live_variants(), 2);
        drop(copied);
        assert_eq!(variants.live_variants(), 0);
    }

    #[test]
    fn test_best_effort_keeps_defaults_for_failed_elements() {
        let array =
            MemorySafeArray::vector(VarType::Bstr, 0, ["a", "b", "c"]).with_failing_element(1);
        let strings = SafeArrayConverter::new(&array).to_string_array().unwrap();
        assert_eq!(strings, vec!["a", "", "c"]);

        let array = MemorySafeArray::vector(VarType::UI1, 0, [1u8, 2, 3]).with_failing_element(0);
        assert_eq!(
            SafeArrayConverter::new(&array).to_byte_array().unwrap(),
            vec![0, 2, 3]
        );

        let array = MemorySafeArray::vector(VarType::I4, 0, [4i32, 5]).with_failing_element(1);
        assert_eq!(
            SafeArrayConverter::new(&array).to_value_array().unwrap(),
            vec![Some(Value::I32(4)), Some(Value::I32(0))]
        );

        let array = MemorySafeArray::vector(VarType::Variant, 0, [4i32, 5]).with_failing_element(0);
        assert_eq!(
            SafeArrayConverter::new(&array).to_value_array().unwrap(),
            vec![None, Some(Value::I32(5))]
        );
    }

    #[test]
    fn test_strict_reports_failed_element() {
        let array =
            MemorySafeArray::vector(VarType::Bstr, 0, ["a", "b", "c"]).with_failing_element(1);
        let converter = SafeArrayConverter::new(&array).with_policy(ReadPolicy::Strict);
        assert_eq!(converter.policy(), ReadPolicy::Strict);
        assert_eq!(
            converter.to_string_array(),
            Err(SafeArrayError::Element {
                indices: vec![1],
                code: hresult::E_UNEXPECTED
            })
        );
    }

    #[test]
    fn test_byte_array_on_wide_elements() {
        let array = MemorySafeArray::vector(VarType::I4, 0, [1i32, 2]);
        let converter = SafeArrayConverter::new(&array);
        assert_eq!(converter.to_byte_array().unwrap(), vec![0, 0]);
        assert_eq!(
            converter.with_policy(ReadPolicy::Strict).to_byte_array(),
            Err(SafeArrayError::BufferSize {
                expected: 4,
                actual: 1
            })
        );
    }

    #[test]
    fn test_variant_array_requires_variant_tag() {
        let array = MemorySafeArray::vector(VarType::I4, 0, [1i32]);
        let converter = SafeArrayConverter::new(&array);
        assert!(converter.to_variant_array().unwrap().is_none());
        assert!(converter.to_2d_variant_array().unwrap().is_none());
    }

    #[test]
    fn test_2d_variant_array_uses_each_dimension() {
        let array = MemorySafeArray::new(
            VarType::Variant,
            vec![Bounds::new(1, 2), Bounds::new(5, 7)],
            (0..6).map(|v| Some(Value::I32(v))).collect(),
        );
        let converter = SafeArrayConverter::new(&array);
        let rows = converter.to_2d_variant_array().unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 3));
        let values: Vec<Vec<Option<Value>>> = rows
            .iter()
            .map(|row| row.iter().map(VariantElement::value).collect())
            .collect();
        assert_eq!(
            values,
            vec![
                vec![Some(Value::I32(0)), Some(Value::I32(1)), Some(Value::I32(2))],
                vec![Some(Value::I32(3)), Some(Value::I32(4)), Some(Value::I32(5))],
            ]
        );
    }

    #[test]
    fn test_2d_variant_array_rejects_other_ranks() {
        let array = MemorySafeArray::vector(VarType::Variant, 0, [1i32, 2]);
        assert!(
            SafeArrayConverter::new(&array)
                .to_2d_variant_array()
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_metadata_queries_propagate_errors() {
        let mut mock = MockSafeArrayAccess::new();
        mock.expect_vartype().returning(|| {
            Err(SafeArrayError::VarType {
                code: hresult::E_INVALIDARG,
            })
        });
        mock.expect_dimensions().returning(|| {
            Err(SafeArrayError::Dimensions {
                code: hresult::E_INVALIDARG,
            })
        });
        mock.expect_element_size().returning(|| {
            Err(SafeArrayError::ElementSize {
                code: hresult::E_INVALIDARG,
            })
        });

        let converter = SafeArrayConverter::new(&mock);
        assert!(matches!(converter.get_type(), Err(SafeArrayError::VarType { .. })));
        assert!(matches!(
            converter.get_dimensions(),
            Err(SafeArrayError::Dimensions { .. })
        ));
        assert!(matches!(
            converter.get_size(),
            Err(SafeArrayError::ElementSize { .. })
        ));
    }

    #[test]
    fn test_release_destroys_once_and_converter_is_consumed() {
        let mut mock = MockSafeArrayAccess::new();
        mock.expect_destroy().times(1).returning(|| Ok(()));
        SafeArrayConverter::new(&mock).release().unwrap();
    }

    #[test]
    fn test_upper_bound_at_index_limit() {
        let strings = MemorySafeArray::new(
            VarType::Bstr,
            vec![Bounds::new(i32::MAX, i32::MAX)],
            vec![Some("x".into())],
        );
        let converter = SafeArrayConverter::new(&strings);
        assert_eq!(converter.total_elements(1), Ok(1));
        assert_eq!(converter.to_string_array().unwrap(), vec!["x"]);
        assert_eq!(
            converter.to_value_array().unwrap(),
            vec![Some(Value::from("x"))]
        );

        let bytes = MemorySafeArray::vector(VarType::UI1, i32::MAX, [7u8]);
        assert_eq!(SafeArrayConverter::new(&bytes).to_byte_array().unwrap(), vec![7]);

        let variants = MemorySafeArray::vector(VarType::Variant, i32::MAX, [3i32]);
        let converter = SafeArrayConverter::new(&variants);
        assert_eq!(converter.to_value_array().unwrap(), vec![Some(Value::I32(3))]);
        assert_eq!(converter.to_variant_array().unwrap().map(|v| v.len()), Some(1));
    }

    #[test]
    fn test_empty_array_yields_empty_outputs() {
        let empty = |vt| MemorySafeArray::new(vt, vec![Bounds::new(0, -1)], Vec::new());

        let strings = empty(VarType::Bstr);
        let converter = SafeArrayConverter::new(&strings);
        assert_eq!(converter.total_elements(1), Ok(0));
        assert!(converter.to_string_array().unwrap().is_empty());
        assert!(converter.to_value_array().unwrap().is_empty());

        let bytes = empty(VarType::UI1);
        let converter = SafeArrayConverter::new(&bytes);
        assert!(converter.to_byte_array().unwrap().is_empty());
        assert!(converter.to_value_array().unwrap().is_empty());

        let variants = empty(VarType::Variant);
        let converter = SafeArrayConverter::new(&variants);
        assert_eq!(converter.total_elements(0), Ok(0));
        assert!(converter.to_value_array().unwrap().is_empty());
        assert!(converter.to_variant_array().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_dropping_converter_does_not_destroy() {
        let array = MemorySafeArray::vector(VarType::I4, 0, [1i32]);
        {
            let _converter = SafeArrayConverter::new(&array);
        }
        assert!(!array.is_destroyed());
    }

    #[test]
    fn test_extraction_after_release_fails() {
        // Real COM handles are undefined after destruction; the memory
        // backend reports every query as E_INVALIDARG instead.
        let array = MemorySafeArray::vector(VarType::I4, 0, [1i32, 2, 3]);
        SafeArrayConverter::new(&array).release().unwrap();

        let converter = SafeArrayConverter::new(&array);
        assert!(converter.to_string_array().is_err());
        assert!(converter.to_byte_array().is_err());
        assert!(converter.to_value_array().is_err());
        assert!(converter.to_variant_array().is_err());
        assert!(converter.get_type().is_err());
    }

    #[test]
    fn test_standalone_variant_is_untracked() {
        let mut v = MemoryVariant::new(Some(Value::U16(3)));
        assert_eq!(v.vartype(), VarType::UI2);
        v.clear();
        assert_eq!(v.vartype(), VarType::Empty);
    }
}
