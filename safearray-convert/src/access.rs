//! The element-access contract between the converter and a SafeArray backend.

#[cfg(any(test, feature = "test-support"))]
use mockall::automock;

use crate::errors::SafeArrayResult;
use crate::value::Value;
use crate::vartype::VarType;

/// Inclusive index range of one array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub lower: i32,
    pub upper: i32,
}

impl Bounds {
    pub const fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Bounds of a dimension holding `len` elements starting at `lower`.
    ///
    /// # Panics
    ///
    /// Panics if the last index does not fit in the `i32` index space.
    pub fn with_len(lower: i32, len: usize) -> Self {
        let len = i64::try_from(len).expect("dimension length exceeds i64");
        let upper = i32::try_from(i64::from(lower) + len - 1)
            .expect("dimension upper bound exceeds i32");
        Self { lower, upper }
    }

    fn wide_count(self) -> i64 {
        i64::from(self.upper) - i64::from(self.lower) + 1
    }

    /// Element count, `upper - lower + 1`. Negative for inverted bounds;
    /// saturates at the `i32` range.
    pub fn count(self) -> i32 {
        let wide = self.wide_count();
        i32::try_from(wide).unwrap_or(if wide > 0 { i32::MAX } else { i32::MIN })
    }

    /// Element count as a length; inverted bounds count as empty.
    pub fn len(self) -> usize {
        usize::try_from(self.wide_count()).unwrap_or(0)
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub const fn contains(self, index: i32) -> bool {
        self.lower <= index && index <= self.upper
    }
}

/// A variant element copied out of an array.
///
/// The element owns transient resources (strings, interface references)
/// until [`clear`](VariantElement::clear) is called.
pub trait VariantElement {
    /// Dynamic type carried by the element.
    fn vartype(&self) -> VarType;

    /// Primitive payload, or `None` for empty, null, and non-primitive types.
    fn value(&self) -> Option<Value>;

    /// Release held resources, leaving the element empty.
    fn clear(&mut self);
}

/// Access to an externally owned SafeArray.
///
/// Dimensions are 1-indexed. Multi-dimensional `indices` are ordered by
/// dimension number: `indices[0]` addresses dimension 1.
#[cfg_attr(
    any(test, feature = "test-support"),
    automock(type Variant = crate::memory::MemoryVariant;)
)]
pub trait SafeArrayAccess {
    type Variant: VariantElement;

    fn lower_bound(&self, dim: u32) -> SafeArrayResult<i32>;

    fn upper_bound(&self, dim: u32) -> SafeArrayResult<i32>;

    /// Declared element type of the array.
    fn vartype(&self) -> SafeArrayResult<VarType>;

    /// Declared dimension count.
    fn dimensions(&self) -> SafeArrayResult<u32>;

    /// Declared byte width of one element.
    fn element_size(&self) -> SafeArrayResult<u32>;

    /// Copy the raw bytes of one element into `buf`.
    ///
    /// # Errors
    /// Fails with [`SafeArrayError::BufferSize`](crate::errors::SafeArrayError::BufferSize)
    /// if `buf` is narrower than the declared element size, and with an
    /// element error if `indices` is out of bounds or has the wrong length.
    fn read_element(&self, indices: &[i32], buf: &mut [u8]) -> SafeArrayResult<()>;

    /// Read one `VT_BSTR` element as text.
    fn read_string(&self, indices: &[i32]) -> SafeArrayResult<String>;

    /// Copy one `VT_VARIANT` element out of the array.
    fn read_variant(&self, indices: &[i32]) -> SafeArrayResult<Self::Variant>;

    /// Destroy the array, releasing its OS-level resources.
    fn destroy(&self) -> SafeArrayResult<()>;
}
