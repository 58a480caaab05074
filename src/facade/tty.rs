//! Console tty detection.
//!
//! On Windows a character-device handle is either a real console or a
//! `NUL`-style device, and the pty layers of MSYS2 and Cygwin hand out
//! named pipes instead of consoles. The decision procedure:
//!
//! 1. Resolve the OS handle. A character device whose console mode can be
//!    read is a console.
//! 2. Otherwise ask the kernel for the handle's object name.
//! 3. A name following the emulated-pty convention is a tty.
//! 4. Anything else, including every failure along the way, is not.
//!
//! The OS queries sit behind [`HandleProbe`] so the procedure itself runs
//! and is tested on every target.

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleFileType {
    Char,
    Pipe,
    Disk,
    Unknown,
}

/// Why an object-name query produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameQueryError {
    /// The name-query entry point could not be loaded.
    Unavailable,
    /// The query itself failed.
    Failed(i32),
    /// The query succeeded but the object has no name.
    Unnamed,
}

/// OS queries the decision procedure needs.
pub trait HandleProbe {
    type Handle: Copy;

    /// OS handle behind a C runtime descriptor.
    fn os_handle(&self, fd: i32) -> Option<Self::Handle>;

    fn file_type(&self, handle: Self::Handle) -> HandleFileType;

    /// Console mode, if the handle is a console.
    fn console_mode(&self, handle: Self::Handle) -> Option<u32>;

    /// Kernel object name of the handle.
    fn object_name(&self, handle: Self::Handle) -> Result<String, NameQueryError>;
}

/// `msys-XXXX-ptyN-XX` or `cygwin-XXXX-ptyN-XX`.
pub fn is_emulated_pty_name(name: &str) -> bool {
    (name.contains("msys-") || name.contains("cygwin-")) && name.contains("-pty")
}

/// Run the decision procedure for `fd`. Never fails; unknown is "not a tty".
pub fn classify<P: HandleProbe>(probe: &P, fd: i32) -> bool {
    let Some(handle) = probe.os_handle(fd) else {
        debug!("fd {} has no OS handle", fd);
        return false;
    };

    if probe.file_type(handle) == HandleFileType::Char {
        // NUL and friends are character devices too
        return probe.console_mode(handle).is_some();
    }

    match probe.object_name(handle) {
        Ok(name) => {
            let tty = is_emulated_pty_name(&name);
            debug!("fd {} object name {:?}: tty={}", fd, name, tty);
            tty
        }
        Err(NameQueryError::Unavailable) => {
            warn!("Object name query unavailable, treating fd {} as not a tty", fd);
            false
        }
        Err(e) => {
            debug!("fd {} object name query: {:?}", fd, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FakeProbe {
        handle: Option<usize>,
        file_type: HandleFileType,
        console_mode: Option<u32>,
        name: Result<&'static str, NameQueryError>,
        name_queries: Cell<usize>,
    }

    impl FakeProbe {
        fn pipe(name: Result<&'static str, NameQueryError>) -> Self {
            FakeProbe {
                handle: Some(0x44),
                file_type: HandleFileType::Pipe,
                console_mode: None,
                name,
                name_queries: Cell::new(0),
            }
        }
    }

    impl HandleProbe for FakeProbe {
        type Handle = usize;

        fn os_handle(&self, _fd: i32) -> Option<usize> {
            self.handle
        }

        fn file_type(&self, _handle: usize) -> HandleFileType {
            self.file_type
        }

        fn console_mode(&self, _handle: usize) -> Option<u32> {
            self.console_mode
        }

        fn object_name(&self, _handle: usize) -> Result<String, NameQueryError> {
            self.name_queries.set(self.name_queries.get() + 1);
            self.name.map(str::to_string)
        }
    }

    #[test]
    fn test_pty_name_convention() {
        assert!(is_emulated_pty_name("msys-1234-pty5-rd"));
        assert!(is_emulated_pty_name(
            r"\Device\NamedPipe\cygwin-e022582115c10879-pty0-from-master"
        ));
        assert!(!is_emulated_pty_name("msys-1234-pipe"));
        assert!(!is_emulated_pty_name(r"\Device\NamedPipe\mojo.1234-pty"));
        assert!(!is_emulated_pty_name(""));
    }

    #[test]
    fn test_msys_pipe_is_tty() {
        let probe = FakeProbe::pipe(Ok(r"\Device\NamedPipe\msys-1234-pty5-rd"));
        assert!(classify(&probe, 0));
    }

    #[test]
    fn test_real_console_is_tty() {
        let probe = FakeProbe {
            file_type: HandleFileType::Char,
            console_mode: Some(0x1F7),
            ..FakeProbe::pipe(Err(NameQueryError::Unavailable))
        };
        assert!(classify(&probe, 1));
        assert_eq!(probe.name_queries.get(), 0);
    }

    #[test]
    fn test_nul_device_is_not_tty() {
        let probe = FakeProbe {
            file_type: HandleFileType::Char,
            console_mode: None,
            ..FakeProbe::pipe(Ok("msys-1234-pty5-rd"))
        };
        assert!(!classify(&probe, 1));
        // Character devices never fall through to the name query
        assert_eq!(probe.name_queries.get(), 0);
    }

    #[test]
    fn test_failures_are_not_tty() {
        for err in [
            NameQueryError::Unavailable,
            NameQueryError::Failed(-1073741820),
            NameQueryError::Unnamed,
        ] {
            assert!(!classify(&FakeProbe::pipe(Err(err)), 2));
        }

        let orphan = FakeProbe {
            handle: None,
            ..FakeProbe::pipe(Ok("msys-1234-pty5-rd"))
        };
        assert!(!classify(&orphan, 9));
    }

    #[test]
    fn test_plain_pipe_and_disk_are_not_tty() {
        assert!(!classify(&FakeProbe::pipe(Ok(r"\Device\NamedPipe\build-log")), 0));

        let disk = FakeProbe {
            file_type: HandleFileType::Disk,
            ..FakeProbe::pipe(Ok(r"\Device\HarddiskVolume3\tmp\out.txt"))
        };
        assert!(!classify(&disk, 1));
    }
}
