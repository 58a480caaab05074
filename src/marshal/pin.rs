//! Scoped native access to managed arrays.
//!
//! A [`Pinned`] guard copies a managed array into a buffer native code can
//! write through, and copies it back when dropped (for [`Release::Commit`]).
//! Guards taken for one native call are plain locals, so they are released
//! in reverse acquisition order and every guard taken before a failure is
//! still released on the way out.

use std::fmt;

use tracing::trace;

use crate::error::Result;
use crate::managed::{Array, ArrayRef, Element};

/// What happens to the native buffer when the guard is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Copy the buffer back into the managed array.
    Commit,
    /// Discard it; the call only read from the array.
    Abort,
}

pub struct Pinned<'a, T: Element> {
    array: &'a Array,
    buf: Vec<T>,
    len: usize,
    release: Release,
}

impl<'a, T: Element> Pinned<'a, T> {
    pub fn acquire(array: &'a Array, release: Release) -> Result<Self> {
        Self::with_capacity(array, release, 0)
    }

    /// Pin with at least `min_capacity` writable elements. Native calls
    /// that write an unbounded string get a buffer at least this large;
    /// only the array's own length is copied back.
    pub fn with_capacity(array: &'a Array, release: Release, min_capacity: usize) -> Result<Self> {
        let mut buf = array.to_vec::<T>()?;
        let len = buf.len();
        if buf.len() < min_capacity {
            buf.resize(min_capacity, T::default());
        }
        trace!("Pinned {} array of {} elements ({:?})", T::ARRAY_TYPE, len, release);
        Ok(Pinned {
            array,
            buf,
            len,
            release,
        })
    }

    pub fn as_ptr(&self) -> *const T {
        self.buf.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buf.as_mut_ptr()
    }

    /// Elements backed by the managed array.
    pub fn as_slice(&self) -> &[T] {
        &self.buf[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.buf[..self.len]
    }

    /// Writable elements, including any padding past the array's length.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<T: Element> Drop for Pinned<'_, T> {
    fn drop(&mut self) {
        if self.release == Release::Commit {
            // Same element type and length as when pinned; cannot fail
            let _ = self.array.set_region(0, &self.buf[..self.len]);
        }
    }
}

impl<T: Element> fmt::Debug for Pinned<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pinned")
            .field("len", &self.len)
            .field("capacity", &self.buf.len())
            .field("release", &self.release)
            .finish()
    }
}

/// Pin an optional array. A null array pins to nothing.
pub fn pin_optional<T: Element>(
    array: Option<&ArrayRef>,
    release: Release,
    min_capacity: usize,
) -> Result<Option<Pinned<'_, T>>> {
    array
        .map(|array| Pinned::with_capacity(array, release, min_capacity))
        .transpose()
}

/// Native pointer for an optional pin; null when nothing was pinned.
pub fn ptr_or_null<T: Element>(pinned: &mut Option<Pinned<'_, T>>) -> *mut T {
    pinned
        .as_mut()
        .map_or(std::ptr::null_mut(), Pinned::as_mut_ptr)
}
