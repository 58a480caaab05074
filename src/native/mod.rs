//! Native fixed-layout structures and platform constants.
//!
//! - **console**: Windows console layouts (compiled everywhere)
//! - **posix**: termios / winsize (Unix only)

pub mod console;
#[cfg(unix)]
pub mod posix;

/// `sizeof` of a native structure, as the managed side's `SIZEOF` constants.
pub const fn native_size<T>() -> usize {
    std::mem::size_of::<T>()
}
