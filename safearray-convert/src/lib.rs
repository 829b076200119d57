//! # safearray-convert
//!
//! Extracts the elements of a COM SafeArray into owned Rust containers.
//!
//! [`SafeArrayConverter`] borrows any [`SafeArrayAccess`] backend:
//! - [`ComSafeArray`] (Windows only) over a raw `SAFEARRAY` pointer
//! - [`MemorySafeArray`] over Rust-owned storage
//!
//! ## Features
//! - `test-support`: Enables `MockSafeArrayAccess` via `mockall`

pub mod access;
pub mod codec;
pub mod converter;
pub mod errors;
pub mod memory;
pub mod value;
pub mod vartype;

#[cfg(windows)]
pub mod com_array;

// Stable public API
pub use access::{Bounds, SafeArrayAccess, VariantElement};
pub use converter::{ReadPolicy, SafeArrayConverter};
pub use errors::{SafeArrayError, SafeArrayResult};
pub use memory::{MemorySafeArray, MemoryVariant};
pub use value::Value;
pub use vartype::VarType;

#[cfg(windows)]
pub use com_array::{ComSafeArray, OwnedVariant};

// Test support re-export
#[cfg(feature = "test-support")]
pub use access::MockSafeArrayAccess;
