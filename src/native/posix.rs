//! POSIX terminal structures.
//!
//! The native structures are libc's own `termios` and `winsize`, so the
//! layout is whatever the platform headers say.

pub use libc::{termios as Termios, winsize as WinSize};

/// Length of the native control-character array.
pub const NCCS: usize = libc::NCCS;

pub const TIOCGWINSZ: u64 = libc::TIOCGWINSZ as u64;
pub const TIOCSWINSZ: u64 = libc::TIOCSWINSZ as u64;

/// When `tcsetattr` applies a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetWhen {
    /// `TCSANOW`
    Now,
    /// `TCSADRAIN`: after pending output has been written
    Drain,
    /// `TCSAFLUSH`: after output drains, discarding pending input
    Flush,
}

impl SetWhen {
    pub fn raw(self) -> libc::c_int {
        match self {
            SetWhen::Now => libc::TCSANOW,
            SetWhen::Drain => libc::TCSADRAIN,
            SetWhen::Flush => libc::TCSAFLUSH,
        }
    }
}

// glibc and the BSDs expose the speeds as plain fields; musl prefixes them.
#[cfg(not(target_env = "musl"))]
pub(crate) fn speeds(t: &Termios) -> (libc::speed_t, libc::speed_t) {
    (t.c_ispeed, t.c_ospeed)
}

#[cfg(not(target_env = "musl"))]
pub(crate) fn set_speeds(t: &mut Termios, ispeed: libc::speed_t, ospeed: libc::speed_t) {
    t.c_ispeed = ispeed;
    t.c_ospeed = ospeed;
}

#[cfg(target_env = "musl")]
pub(crate) fn speeds(t: &Termios) -> (libc::speed_t, libc::speed_t) {
    (t.__c_ispeed, t.__c_ospeed)
}

#[cfg(target_env = "musl")]
pub(crate) fn set_speeds(t: &mut Termios, ispeed: libc::speed_t, ospeed: libc::speed_t) {
    t.__c_ispeed = ispeed;
    t.__c_ospeed = ospeed;
}
