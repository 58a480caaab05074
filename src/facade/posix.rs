//! POSIX terminal facade: termios, window size, pty pairs.
//!
//! Every call returns the libc status verbatim (`0` on success, `-1` with
//! `errno` set on failure). Structured arguments are managed objects;
//! marshalling failures are the only errors.

use std::ffi::CStr;
use std::ptr;
use std::sync::Arc;

use tracing::trace;

use crate::error::Result;
use crate::managed::{Array, ArrayRef, Object, Runtime};
use crate::marshal::pin::{pin_optional, ptr_or_null, Pinned, Release};
use crate::marshal::{load_into, read_into_native, write_from_native, NativeStruct};
use crate::native::posix::{SetWhen, Termios, WinSize, TIOCGWINSZ, TIOCSWINSZ};

use super::{Platform, TerminalFacade};

/// Name buffer size for `ttyname_r`.
pub const TTY_NAME_MAX: usize = 256;

/// Native room given to `openpty`'s name argument, which has no length.
pub const PTY_NAME_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct PosixFacade {
    runtime: Arc<Runtime>,
}

impl PosixFacade {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        PosixFacade { runtime }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// `tcgetattr`. The managed attributes are written only on success.
    pub fn get_attributes(&self, fd: i32, attrs: Option<&Object>) -> Result<i32> {
        // libc dereferences the pointer itself, so an absent argument still
        // gets a scratch buffer
        let mut native = <Termios as NativeStruct>::zeroed();
        // SAFETY: `native` is a valid termios for the duration of the call.
        let rc = unsafe { libc::tcgetattr(fd, &mut native) };
        trace!("tcgetattr({}) = {}", fd, rc);
        if rc == 0 {
            if let Some(attrs) = attrs {
                write_from_native(&native, attrs)?;
            }
        }
        Ok(rc)
    }

    /// `tcsetattr`.
    pub fn set_attributes(&self, fd: i32, when: SetWhen, attrs: &Object) -> Result<i32> {
        let native: Termios = read_into_native(attrs)?;
        // SAFETY: `native` is a valid termios for the duration of the call.
        let rc = unsafe { libc::tcsetattr(fd, when.raw(), &native) };
        trace!("tcsetattr({}, {:?}) = {}", fd, when, rc);
        Ok(rc)
    }

    /// `ioctl` with a `winsize` argument. An absent argument passes null.
    pub fn ioctl_winsize(&self, fd: i32, request: u64, ws: Option<&Object>) -> Result<i32> {
        let mut native = <WinSize as NativeStruct>::zeroed();
        let arg: *mut WinSize = match ws {
            Some(ws) => {
                load_into(ws, &mut native)?;
                &mut native
            }
            None => ptr::null_mut(),
        };
        // SAFETY: `arg` is null or points at a live winsize; the kernel
        // reports EFAULT for null rather than dereferencing it.
        let rc = unsafe { libc::ioctl(fd, request as _, arg) };
        trace!("ioctl({}, {:#x}, winsize) = {}", fd, request, rc);
        if rc == 0 {
            if let Some(ws) = ws {
                write_from_native(&native, ws)?;
            }
        }
        Ok(rc)
    }

    /// `ioctl` with an `int[]` argument, copied back after the call.
    pub fn ioctl_ints(&self, fd: i32, request: u64, ints: Option<&ArrayRef>) -> Result<i32> {
        let mut params = pin_optional::<i32>(ints, Release::Commit, 0)?;
        let arg = ptr_or_null(&mut params);
        // SAFETY: `arg` is null or points into the pinned buffer, which
        // outlives the call.
        let rc = unsafe { libc::ioctl(fd, request as _, arg) };
        trace!("ioctl({}, {:#x}, int[]) = {}", fd, request, rc);
        Ok(rc)
    }

    pub fn get_window_size(&self, fd: i32, ws: Option<&Object>) -> Result<i32> {
        self.ioctl_winsize(fd, TIOCGWINSZ, ws)
    }

    pub fn set_window_size(&self, fd: i32, ws: &Object) -> Result<i32> {
        self.ioctl_winsize(fd, TIOCSWINSZ, Some(ws))
    }

    /// Columns of the terminal on `fd`, 0 when it has no size.
    pub fn terminal_width(&self, fd: i32) -> Result<i16> {
        let ws = self.runtime.new_object(crate::managed::types::WIN_SIZE)?;
        self.get_window_size(fd, Some(&ws))?;
        let native: WinSize = read_into_native(&ws)?;
        Ok(native.ws_col as i16)
    }

    /// `openpty`. `master` and `slave` receive the descriptors in element 0;
    /// `name`, when present, receives the NUL-terminated slave path
    /// (truncated to the array). Absent `attrs`/`ws` pass null.
    pub fn open_pty(
        &self,
        master: &Array,
        slave: &Array,
        name: Option<&ArrayRef>,
        attrs: Option<&Object>,
        ws: Option<&Object>,
    ) -> Result<i32> {
        // Acquired in argument order, released in reverse on every path
        let mut master_fd = Pinned::<i32>::with_capacity(master, Release::Commit, 1)?;
        let mut slave_fd = Pinned::<i32>::with_capacity(slave, Release::Commit, 1)?;
        let mut name_buf = pin_optional::<u8>(name, Release::Commit, PTY_NAME_CAPACITY)?;

        let mut termp = <Termios as NativeStruct>::zeroed();
        let termp_arg: *mut Termios = match attrs {
            Some(attrs) => {
                load_into(attrs, &mut termp)?;
                &mut termp
            }
            None => ptr::null_mut(),
        };
        let mut winp = <WinSize as NativeStruct>::zeroed();
        let winp_arg: *mut WinSize = match ws {
            Some(ws) => {
                load_into(ws, &mut winp)?;
                &mut winp
            }
            None => ptr::null_mut(),
        };

        // SAFETY: every pointer is null (where openpty allows it) or points
        // at a buffer that outlives the call; the name buffer has at least
        // PTY_NAME_CAPACITY bytes.
        let rc = unsafe {
            libc::openpty(
                master_fd.as_mut_ptr(),
                slave_fd.as_mut_ptr(),
                ptr_or_null(&mut name_buf) as *mut libc::c_char,
                termp_arg as _,
                winp_arg as _,
            )
        };
        trace!("openpty() = {}", rc);
        Ok(rc)
    }

    pub fn is_tty(&self, fd: i32) -> bool {
        // SAFETY: isatty accepts any integer.
        unsafe { libc::isatty(fd) == 1 }
    }

    /// `ttyname_r` into a 256-byte buffer. `None` when the name cannot be
    /// resolved.
    pub fn tty_name(&self, fd: i32) -> Option<String> {
        let mut buf = [0 as libc::c_char; TTY_NAME_MAX];
        // SAFETY: the buffer length is passed alongside the buffer.
        let rc = unsafe { libc::ttyname_r(fd, buf.as_mut_ptr(), buf.len()) };
        if rc != 0 {
            trace!("ttyname_r({}) = {}", fd, rc);
            return None;
        }
        // SAFETY: on success ttyname_r wrote a NUL-terminated string into buf.
        let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Some(name.to_string_lossy().into_owned())
    }
}

impl TerminalFacade for PosixFacade {
    fn platform(&self) -> Platform {
        Platform::Posix
    }

    fn is_tty(&self, fd: i32) -> bool {
        PosixFacade::is_tty(self, fd)
    }

    fn as_posix(&self) -> Option<&PosixFacade> {
        Some(self)
    }
}
