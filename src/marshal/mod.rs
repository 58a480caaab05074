//! Managed <-> native structure marshalling.
//!
//! Every native structure kind implements [`NativeStruct`]: a `load` that
//! copies managed fields into the native value and a `store` that copies
//! them back. Conversions are plain width casts; no range checks.
//!
//! - **cache**: per-kind field resolution, published once per process
//! - **posix**: `termios` / `winsize` (Unix only)
//! - **console**: Windows console structures and input records
//! - **pin**: scoped access to managed arrays during a native call
//!
//! Nested objects follow one rule: an absent (null) managed sub-object is
//! skipped in both directions, leaving the other side's bytes untouched.

pub mod cache;
pub mod console;
pub mod pin;
#[cfg(unix)]
pub mod posix;

pub use cache::{accessors, registry, AccessorSet, FieldCache, FieldSpec, StructKind};
pub use console::input_record_from_raw;
pub use pin::{Pinned, Release};

use crate::error::Result;
use crate::managed::{FieldId, Object};

/// A fixed-layout native structure with a managed counterpart.
pub trait NativeStruct: Copy + 'static {
    const KIND: StructKind;

    /// All-zero value, as a fresh stack buffer before a native call.
    fn zeroed() -> Self;

    /// Copy every managed field of `obj` into `out`.
    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()>;

    /// Copy every field of `src` into `obj`.
    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()>;
}

/// Build a native value from a managed object, starting from zero.
pub fn read_into_native<T: NativeStruct>(obj: &Object) -> Result<T> {
    let mut out = T::zeroed();
    load_into(obj, &mut out)?;
    Ok(out)
}

/// Overwrite `out` with the managed fields of `obj`. Bytes the object has
/// no value for (absent sub-objects) keep their current contents.
pub fn load_into<T: NativeStruct>(obj: &Object, out: &mut T) -> Result<()> {
    let fields = accessors(T::KIND, obj)?;
    T::load(fields, obj, out)
}

/// Copy a native value into a managed object.
pub fn write_from_native<T: NativeStruct>(src: &T, obj: &Object) -> Result<()> {
    let fields = accessors(T::KIND, obj)?;
    T::store(fields, src, obj)
}

/// Load the sub-object held in `field` into `out`. Returns false without
/// touching `out` when the field is null.
pub(crate) fn load_nested<T: NativeStruct>(
    obj: &Object,
    field: FieldId,
    out: &mut T,
) -> Result<bool> {
    match obj.get_object(field)? {
        Some(nested) => {
            load_into(&nested, out)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Store `src` into the sub-object held in `field`, if there is one.
pub(crate) fn store_nested<T: NativeStruct>(
    src: &T,
    obj: &Object,
    field: FieldId,
) -> Result<bool> {
    match obj.get_object(field)? {
        Some(nested) => {
            write_from_native(src, &nested)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[inline]
pub(crate) fn to_bool(native: i32) -> bool {
    native != 0
}

#[inline]
pub(crate) fn from_bool(managed: bool) -> i32 {
    i32::from(managed)
}
