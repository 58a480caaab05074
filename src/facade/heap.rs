//! Raw native scratch memory.
//!
//! `alloc`/`free` are the C heap, handed to callers that batch native I/O
//! through their own buffers. The caller owns the block and frees it
//! exactly once. [`ScratchBuffer`] is the owned form used internally.

use std::ptr::NonNull;

use crate::error::{BridgeError, Result};

/// `malloc(size)`. Null on failure.
pub fn alloc(size: usize) -> *mut u8 {
    // SAFETY: malloc has no preconditions; zero-size requests get one byte
    // so success always yields a unique non-null block.
    unsafe { libc::malloc(size.max(1)) as *mut u8 }
}

/// `free(ptr)`.
///
/// # Safety
///
/// `ptr` must be null or a block returned by [`alloc`] that has not been
/// freed yet.
pub unsafe fn free(ptr: *mut u8) {
    libc::free(ptr as *mut libc::c_void)
}

/// A C heap block freed on drop.
#[derive(Debug)]
pub struct ScratchBuffer {
    ptr: NonNull<u8>,
    size: usize,
}

impl ScratchBuffer {
    pub fn new(size: usize) -> Result<Self> {
        let ptr = NonNull::new(alloc(size)).ok_or(BridgeError::Alloc(size))?;
        Ok(ScratchBuffer { ptr, size })
    }

    /// Room for `count` values of `T`.
    pub fn for_items<T>(count: usize) -> Result<Self> {
        let size = std::mem::size_of::<T>()
            .checked_mul(count)
            .ok_or(BridgeError::Alloc(usize::MAX))?;
        Self::new(size)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_ptr<T>(&self) -> *const T {
        self.ptr.as_ptr() as *const T
    }

    pub fn as_mut_ptr<T>(&mut self) -> *mut T {
        self.ptr.as_ptr() as *mut T
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated by `alloc` in `new`, freed only here.
        unsafe { free(self.ptr.as_ptr()) }
    }
}
