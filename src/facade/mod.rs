//! Platform terminal facade.
//!
//! Exactly one implementation is compiled per target: [`PosixFacade`] on
//! Unix, [`WindowsFacade`] on Windows. Callers pick it up once through
//! [`platform_facade`] and reach the platform surface with `as_posix` /
//! `as_windows`.
//!
//! - **posix**: termios, window size, pty pairs
//! - **win32**: console handles, screen buffer, input records
//! - **tty**: the Windows tty decision procedure (portable)
//! - **input**: input record collection and key filtering (portable)
//! - **heap**: raw native scratch memory

pub mod heap;
pub mod input;
pub mod tty;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod win32;

use std::sync::Arc;

#[cfg(unix)]
pub use posix::{PosixFacade, PTY_NAME_CAPACITY, TTY_NAME_MAX};
#[cfg(windows)]
pub use win32::{RawHandle, WindowsFacade};

use crate::config::BridgeConfig;
use crate::managed::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

/// Operations common to both platforms, plus access to the concrete one.
pub trait TerminalFacade: Send + Sync {
    fn platform(&self) -> Platform;

    fn is_tty(&self, fd: i32) -> bool;

    #[cfg(unix)]
    fn as_posix(&self) -> Option<&PosixFacade> {
        None
    }

    #[cfg(windows)]
    fn as_windows(&self) -> Option<&WindowsFacade> {
        None
    }
}

/// The facade compiled for this target.
#[cfg(unix)]
pub fn platform_facade(runtime: Arc<Runtime>) -> Box<dyn TerminalFacade> {
    Box::new(PosixFacade::new(runtime))
}

/// The facade compiled for this target.
#[cfg(windows)]
pub fn platform_facade(runtime: Arc<Runtime>) -> Box<dyn TerminalFacade> {
    Box::new(WindowsFacade::new(runtime))
}

/// The facade compiled for this target, tuned by `config`.
#[cfg(unix)]
pub fn configured_facade(runtime: Arc<Runtime>, _config: &BridgeConfig) -> Box<dyn TerminalFacade> {
    platform_facade(runtime)
}

/// The facade compiled for this target, tuned by `config`.
#[cfg(windows)]
pub fn configured_facade(runtime: Arc<Runtime>, config: &BridgeConfig) -> Box<dyn TerminalFacade> {
    Box::new(WindowsFacade::with_input_batch(
        runtime,
        config.console.input_batch,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_facade_matches_target() {
        let facade = platform_facade(Arc::new(Runtime::with_standard_classes()));
        #[cfg(unix)]
        {
            assert_eq!(facade.platform(), Platform::Posix);
            assert!(facade.as_posix().is_some());
            assert!(!facade.is_tty(-1));
        }
        #[cfg(windows)]
        {
            assert_eq!(facade.platform(), Platform::Windows);
            assert!(facade.as_windows().is_some());
        }
    }

    #[test]
    fn test_configured_facade() {
        let mut config = BridgeConfig::default();
        config.console.input_batch = 0;
        let facade = configured_facade(Arc::new(Runtime::with_standard_classes()), &config);
        #[cfg(unix)]
        assert!(facade.as_posix().is_some());
        #[cfg(windows)]
        assert_eq!(facade.as_windows().map(WindowsFacade::input_batch), Some(1));
    }
}
