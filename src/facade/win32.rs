//! Windows console facade.
//!
//! Handles travel as raw `isize` values, the way a managed caller stores
//! them. Calls return the Win32 `BOOL` (non-zero on success) or the raw
//! value the API returns; `GetLastError` is left for the caller to read.
//!
//! Out-arguments the API always writes (modes, counts) get scratch storage
//! when the managed argument is absent. In-arguments the API accepts as
//! optional pass null.

use std::ffi::c_void;
use std::sync::{Arc, OnceLock};

use tracing::{trace, warn};
use windows::core::{s, w, PCWSTR, PWSTR};
use windows::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows::Win32::Storage::FileSystem::{
    GetFileType, FILE_TYPE_CHAR, FILE_TYPE_DISK, FILE_TYPE_PIPE,
};
use windows::Win32::System::Console::{
    FillConsoleOutputAttribute, FillConsoleOutputCharacterW, FlushConsoleInputBuffer,
    GetConsoleMode, GetConsoleOutputCP, GetConsoleScreenBufferInfo,
    GetNumberOfConsoleInputEvents, GetStdHandle, PeekConsoleInputW, ReadConsoleInputW,
    ScrollConsoleScreenBufferW, SetConsoleCursorPosition, SetConsoleMode, SetConsoleOutputCP,
    SetConsoleTextAttribute, SetConsoleTitleW, WriteConsoleW, CHAR_INFO,
    CONSOLE_CHARACTER_ATTRIBUTES, CONSOLE_MODE, CONSOLE_SCREEN_BUFFER_INFO, COORD, INPUT_RECORD,
    SMALL_RECT, STD_HANDLE,
};
use windows::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_IGNORE_INSERTS, FORMAT_MESSAGE_OPTIONS,
};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::Win32::System::Threading::WaitForSingleObject;

use crate::error::Result;
use crate::managed::{ArrayRef, Object, ObjectRef, Runtime};
use crate::marshal::pin::{pin_optional, Pinned, Release};
use crate::marshal::{load_into, read_into_native, write_from_native, NativeStruct};
use crate::native::console::{
    CharInfo, ConsoleScreenBufferInfo, Coord, InputRecord, SmallRect, FORMAT_MESSAGE_FROM_SYSTEM,
    INVALID_HANDLE_VALUE,
};

use super::heap::{self, ScratchBuffer};
use super::input::{
    decode_message, input_call, read_failure, read_until_key_events, records_from_native,
};
use super::tty::{classify, HandleFileType, HandleProbe, NameQueryError};
use super::{Platform, TerminalFacade};

/// A Win32 handle as a managed caller stores it.
pub type RawHandle = isize;

/// UTF-16 units `last_error_message` reads (a 160-byte buffer).
const LAST_ERROR_MESSAGE_UNITS: usize = 80;

extern "C" {
    fn _getch() -> libc::c_int;
}

fn handle(raw: RawHandle) -> HANDLE {
    HANDLE(raw as *mut c_void)
}

fn status(result: windows::core::Result<()>) -> i32 {
    i32::from(result.is_ok())
}

fn coord(c: Coord) -> COORD {
    COORD { X: c.x, Y: c.y }
}

/// Pinned element 0, or `scratch` when the managed array is absent.
fn out_slot(pinned: &mut Option<Pinned<'_, i32>>, scratch: &mut i32) -> *mut i32 {
    pinned.as_mut().map_or(scratch as *mut i32, |p| p.as_mut_ptr())
}

#[derive(Debug)]
pub struct WindowsFacade {
    runtime: Arc<Runtime>,
    input_batch: usize,
}

impl WindowsFacade {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self::with_input_batch(runtime, crate::config::DEFAULT_INPUT_BATCH)
    }

    pub fn with_input_batch(runtime: Arc<Runtime>, input_batch: usize) -> Self {
        WindowsFacade {
            runtime,
            input_batch: input_batch.max(1),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Records requested per batch by [`read_console_key_input`](Self::read_console_key_input)
    /// callers that have no count of their own.
    pub fn input_batch(&self) -> usize {
        self.input_batch
    }

    pub fn get_std_handle(&self, std_handle: u32) -> RawHandle {
        // SAFETY: no pointer arguments.
        match unsafe { GetStdHandle(STD_HANDLE(std_handle)) } {
            Ok(h) => h.0 as RawHandle,
            Err(_) => INVALID_HANDLE_VALUE,
        }
    }

    pub fn close_handle(&self, h: RawHandle) -> i32 {
        // SAFETY: closing an arbitrary value is reported, not undefined.
        status(unsafe { CloseHandle(handle(h)) })
    }

    /// `WaitForSingleObject`; the raw `WAIT_*` value.
    pub fn wait_for_single_object(&self, h: RawHandle, millis: u32) -> u32 {
        // SAFETY: no pointer arguments.
        unsafe { WaitForSingleObject(handle(h), millis) }.0
    }

    /// `GetConsoleMode`. `mode[0]` receives the mode.
    pub fn get_console_mode(&self, h: RawHandle, mode: Option<&ArrayRef>) -> Result<i32> {
        let mut pinned = pin_optional::<i32>(mode, Release::Commit, 1)?;
        let mut scratch = 0i32;
        let out = out_slot(&mut pinned, &mut scratch);
        // SAFETY: `out` points at a writable i32 for the duration of the
        // call; CONSOLE_MODE is a transparent u32.
        let rc = status(unsafe { GetConsoleMode(handle(h), out as *mut CONSOLE_MODE) });
        trace!("GetConsoleMode({:#x}) = {}", h, rc);
        Ok(rc)
    }

    pub fn set_console_mode(&self, h: RawHandle, mode: u32) -> i32 {
        // SAFETY: no pointer arguments.
        status(unsafe { SetConsoleMode(handle(h), CONSOLE_MODE(mode)) })
    }

    /// `GetConsoleScreenBufferInfo`. The managed info is written only on
    /// success.
    pub fn get_screen_buffer_info(&self, h: RawHandle, info: Option<&Object>) -> Result<i32> {
        let mut native = <ConsoleScreenBufferInfo as NativeStruct>::zeroed();
        // SAFETY: the mirror has the layout of CONSOLE_SCREEN_BUFFER_INFO.
        let rc = status(unsafe {
            GetConsoleScreenBufferInfo(
                handle(h),
                &mut native as *mut ConsoleScreenBufferInfo as *mut CONSOLE_SCREEN_BUFFER_INFO,
            )
        });
        trace!("GetConsoleScreenBufferInfo({:#x}) = {}", h, rc);
        if rc != 0 {
            if let Some(info) = info {
                write_from_native(&native, info)?;
            }
        }
        Ok(rc)
    }

    pub fn set_cursor_position(&self, h: RawHandle, position: &Object) -> Result<i32> {
        let position: Coord = read_into_native(position)?;
        // SAFETY: no pointer arguments.
        Ok(status(unsafe { SetConsoleCursorPosition(handle(h), coord(position)) }))
    }

    pub fn set_text_attribute(&self, h: RawHandle, attributes: u16) -> i32 {
        // SAFETY: no pointer arguments.
        status(unsafe {
            SetConsoleTextAttribute(handle(h), CONSOLE_CHARACTER_ATTRIBUTES(attributes))
        })
    }

    /// `FillConsoleOutputCharacterW`. `written[0]` receives the count.
    pub fn fill_output_character(
        &self,
        h: RawHandle,
        ch: u16,
        length: u32,
        at: &Object,
        written: Option<&ArrayRef>,
    ) -> Result<i32> {
        let at: Coord = read_into_native(at)?;
        let mut pinned = pin_optional::<i32>(written, Release::Commit, 1)?;
        let mut scratch = 0i32;
        let out = out_slot(&mut pinned, &mut scratch);
        // SAFETY: `out` points at a writable u32-sized slot.
        Ok(status(unsafe {
            FillConsoleOutputCharacterW(handle(h), ch, length, coord(at), out as *mut u32)
        }))
    }

    /// `FillConsoleOutputAttribute`. `written[0]` receives the count.
    pub fn fill_output_attribute(
        &self,
        h: RawHandle,
        attribute: u16,
        length: u32,
        at: &Object,
        written: Option<&ArrayRef>,
    ) -> Result<i32> {
        let at: Coord = read_into_native(at)?;
        let mut pinned = pin_optional::<i32>(written, Release::Commit, 1)?;
        let mut scratch = 0i32;
        let out = out_slot(&mut pinned, &mut scratch);
        // SAFETY: `out` points at a writable u32-sized slot.
        Ok(status(unsafe {
            FillConsoleOutputAttribute(handle(h), attribute, length, coord(at), out as *mut u32)
        }))
    }

    /// `ScrollConsoleScreenBufferW`. An absent clip rectangle passes null.
    pub fn scroll_screen_buffer(
        &self,
        h: RawHandle,
        scroll: &Object,
        clip: Option<&Object>,
        origin: &Object,
        fill: &Object,
    ) -> Result<i32> {
        let scroll: SmallRect = read_into_native(scroll)?;
        let mut clip_rect = <SmallRect as NativeStruct>::zeroed();
        let clip_arg = match clip {
            Some(clip) => {
                load_into(clip, &mut clip_rect)?;
                Some(&clip_rect as *const SmallRect as *const SMALL_RECT)
            }
            None => None,
        };
        let origin: Coord = read_into_native(origin)?;
        let fill: CharInfo = read_into_native(fill)?;
        // SAFETY: the mirrors have the layouts of SMALL_RECT and CHAR_INFO
        // and outlive the call.
        Ok(status(unsafe {
            ScrollConsoleScreenBufferW(
                handle(h),
                &scroll as *const SmallRect as *const SMALL_RECT,
                clip_arg,
                coord(origin),
                &fill as *const CharInfo as *const CHAR_INFO,
            )
        }))
    }

    /// `ReadConsoleInputW` into caller-owned native memory.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes of `length` records.
    pub unsafe fn read_console_input(
        &self,
        h: RawHandle,
        buffer: *mut InputRecord,
        length: u32,
        count: Option<&ArrayRef>,
    ) -> Result<i32> {
        self.console_input(h, buffer, length, count, false)
    }

    /// `PeekConsoleInputW`; as [`read_console_input`](Self::read_console_input)
    /// without removing the records.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes of `length` records.
    pub unsafe fn peek_console_input(
        &self,
        h: RawHandle,
        buffer: *mut InputRecord,
        length: u32,
        count: Option<&ArrayRef>,
    ) -> Result<i32> {
        self.console_input(h, buffer, length, count, true)
    }

    unsafe fn console_input(
        &self,
        h: RawHandle,
        buffer: *mut InputRecord,
        length: u32,
        count: Option<&ArrayRef>,
        peek: bool,
    ) -> Result<i32> {
        let mut pinned = pin_optional::<i32>(count, Release::Commit, 1)?;
        let mut scratch = 0i32;
        let out = out_slot(&mut pinned, &mut scratch);
        Ok(self.console_input_raw(h, buffer, length, out as *mut u32, peek))
    }

    unsafe fn console_input_raw(
        &self,
        h: RawHandle,
        buffer: *mut InputRecord,
        length: u32,
        read: *mut u32,
        peek: bool,
    ) -> i32 {
        let records = std::slice::from_raw_parts_mut(buffer as *mut INPUT_RECORD, length as usize);
        let rc = if peek {
            status(PeekConsoleInputW(handle(h), records, read))
        } else {
            status(ReadConsoleInputW(handle(h), records, read))
        };
        trace!("{}({:#x}, {}) = {}", input_call(peek), h, length, rc);
        rc
    }

    /// Read (or peek) up to `count` records into new managed records.
    ///
    /// The native batch lives in a scratch heap block for the duration of
    /// the call. A failed read is an I/O error carrying the system message.
    pub fn read_console_input_records(
        &self,
        h: RawHandle,
        count: usize,
        peek: bool,
    ) -> Result<Vec<ObjectRef>> {
        let count = count.max(1);
        let mut scratch = ScratchBuffer::for_items::<InputRecord>(count)?;
        let base = scratch.as_mut_ptr::<InputRecord>();
        let mut read = 0u32;
        // SAFETY: the block holds `count` records; it is zeroed first so the
        // slice handed to the API is initialised.
        let rc = unsafe {
            std::ptr::write_bytes(base, 0, count);
            self.console_input_raw(h, base, count as u32, &mut read, peek)
        };
        if rc == 0 {
            let code = self.get_last_error();
            warn!("{} failed: {}", input_call(peek), self.last_error_message());
            return Err(read_failure(peek, code));
        }
        let read = (read as usize).min(count);
        // SAFETY: the API initialised the first `read` records.
        unsafe { records_from_native(&self.runtime, base, read) }
    }

    /// Read until at least one key event arrives; other events are dropped.
    pub fn read_console_key_input(
        &self,
        h: RawHandle,
        count: usize,
        peek: bool,
    ) -> Result<Vec<ObjectRef>> {
        read_until_key_events(|| self.read_console_input_records(h, count, peek))
    }

    /// `WriteConsoleW`. At most `length` units of `buffer` are written;
    /// `written[0]` receives the count.
    pub fn write_console(
        &self,
        h: RawHandle,
        buffer: Option<&ArrayRef>,
        length: u32,
        written: Option<&ArrayRef>,
        reserved: isize,
    ) -> Result<i32> {
        // The payload is only read: discarded on release
        let chars = pin_optional::<u16>(buffer, Release::Abort, 0)?;
        let mut count = pin_optional::<i32>(written, Release::Commit, 1)?;

        let payload = chars.as_ref().map_or(&[][..], |p| p.as_slice());
        let payload = &payload[..payload.len().min(length as usize)];
        let out = count.as_mut().map(|p| p.as_mut_ptr() as *mut u32);
        let reserved = (reserved != 0).then_some(reserved as *const c_void);
        // SAFETY: `payload` and `out` stay pinned until the guards drop.
        let rc = status(unsafe { WriteConsoleW(handle(h), payload, out, reserved) });
        trace!("WriteConsoleW({:#x}, {}) = {}", h, payload.len(), rc);
        Ok(rc)
    }

    pub fn get_number_of_console_input_events(
        &self,
        h: RawHandle,
        count: Option<&ArrayRef>,
    ) -> Result<i32> {
        let mut pinned = pin_optional::<i32>(count, Release::Commit, 1)?;
        let mut scratch = 0i32;
        let out = out_slot(&mut pinned, &mut scratch);
        // SAFETY: `out` points at a writable u32-sized slot.
        Ok(status(unsafe { GetNumberOfConsoleInputEvents(handle(h), out as *mut u32) }))
    }

    pub fn flush_console_input_buffer(&self, h: RawHandle) -> i32 {
        // SAFETY: no pointer arguments.
        status(unsafe { FlushConsoleInputBuffer(handle(h)) })
    }

    pub fn get_console_output_cp(&self) -> u32 {
        // SAFETY: no arguments.
        unsafe { GetConsoleOutputCP() }
    }

    pub fn set_console_output_cp(&self, code_page: u32) -> i32 {
        // SAFETY: no pointer arguments.
        status(unsafe { SetConsoleOutputCP(code_page) })
    }

    pub fn set_console_title(&self, title: &str) -> i32 {
        let wide: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        status(unsafe { SetConsoleTitleW(PCWSTR(wide.as_ptr())) })
    }

    /// `_getch`: one keystroke, no echo.
    pub fn getch(&self) -> i32 {
        // SAFETY: no arguments.
        unsafe { _getch() }
    }

    pub fn get_last_error(&self) -> u32 {
        // SAFETY: no arguments.
        unsafe { GetLastError() }.0
    }

    /// `FormatMessageW` into `buffer`; returns the units written.
    pub fn format_message(
        &self,
        flags: u32,
        message_id: u32,
        language_id: u32,
        buffer: &mut [u16],
    ) -> u32 {
        // SAFETY: the buffer length is passed alongside the buffer.
        unsafe {
            FormatMessageW(
                FORMAT_MESSAGE_OPTIONS(flags),
                None,
                message_id,
                language_id,
                PWSTR(buffer.as_mut_ptr()),
                buffer.len() as u32,
                None,
            )
        }
    }

    /// System message for the calling thread's last error, trimmed.
    pub fn last_error_message(&self) -> String {
        let code = self.get_last_error();
        let mut buf = [0u16; LAST_ERROR_MESSAGE_UNITS];
        self.format_message(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS.0,
            code,
            0,
            &mut buf,
        );
        decode_message(&buf)
    }

    /// Scratch native memory; see [`heap`].
    pub fn alloc(&self, size: usize) -> *mut u8 {
        heap::alloc(size)
    }

    /// # Safety
    ///
    /// As [`heap::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        heap::free(ptr)
    }

    pub fn is_tty(&self, fd: i32) -> bool {
        classify(&Win32Probe, fd)
    }
}

impl TerminalFacade for WindowsFacade {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn is_tty(&self, fd: i32) -> bool {
        WindowsFacade::is_tty(self, fd)
    }

    fn as_windows(&self) -> Option<&WindowsFacade> {
        Some(self)
    }
}

type NtQueryObjectFn =
    unsafe extern "system" fn(HANDLE, i32, *mut c_void, u32, *mut u32) -> i32;

const OBJECT_NAME_INFORMATION: i32 = 1;
const NAME_BUFFER_SIZE: usize = 1024;

/// `UNICODE_STRING`, the head of `OBJECT_NAME_INFORMATION`.
#[repr(C)]
struct UnicodeString {
    length: u16,
    maximum_length: u16,
    buffer: *mut u16,
}

#[repr(C, align(8))]
struct NameBuffer([u8; NAME_BUFFER_SIZE]);

static NT_QUERY_OBJECT: OnceLock<Option<NtQueryObjectFn>> = OnceLock::new();

/// `ntdll!NtQueryObject`, loaded on first use.
fn nt_query_object() -> Option<NtQueryObjectFn> {
    *NT_QUERY_OBJECT.get_or_init(|| {
        // SAFETY: loading a system library by name and looking up an export.
        let proc = unsafe {
            let module = LoadLibraryW(w!("ntdll.dll")).ok()?;
            GetProcAddress(module, s!("NtQueryObject"))?
        };
        // SAFETY: NtQueryObject has exactly this signature.
        Some(unsafe {
            std::mem::transmute::<unsafe extern "system" fn() -> isize, NtQueryObjectFn>(proc)
        })
    })
}

struct Win32Probe;

impl HandleProbe for Win32Probe {
    type Handle = HANDLE;

    fn os_handle(&self, fd: i32) -> Option<HANDLE> {
        if fd < 0 {
            return None;
        }
        // SAFETY: an invalid descriptor yields -1, not undefined behaviour.
        let raw = unsafe { libc::get_osfhandle(fd) };
        (raw != 0 && raw != INVALID_HANDLE_VALUE).then(|| handle(raw))
    }

    fn file_type(&self, h: HANDLE) -> HandleFileType {
        // SAFETY: no pointer arguments.
        match unsafe { GetFileType(h) } {
            FILE_TYPE_CHAR => HandleFileType::Char,
            FILE_TYPE_PIPE => HandleFileType::Pipe,
            FILE_TYPE_DISK => HandleFileType::Disk,
            _ => HandleFileType::Unknown,
        }
    }

    fn console_mode(&self, h: HANDLE) -> Option<u32> {
        let mut mode = CONSOLE_MODE(0);
        // SAFETY: `mode` is writable for the duration of the call.
        unsafe { GetConsoleMode(h, &mut mode) }.ok().map(|_| mode.0)
    }

    fn object_name(&self, h: HANDLE) -> std::result::Result<String, NameQueryError> {
        let query = nt_query_object().ok_or(NameQueryError::Unavailable)?;
        let mut buf = NameBuffer([0; NAME_BUFFER_SIZE]);
        let mut returned = 0u32;
        // SAFETY: two bytes are held back so the name always fits with room
        // to spare, as the API expects.
        let rc = unsafe {
            query(
                h,
                OBJECT_NAME_INFORMATION,
                buf.0.as_mut_ptr() as *mut c_void,
                (NAME_BUFFER_SIZE - 2) as u32,
                &mut returned,
            )
        };
        if rc != 0 {
            return Err(NameQueryError::Failed(rc));
        }
        // SAFETY: on success the buffer starts with an initialised
        // UNICODE_STRING whose Buffer points inside `buf`.
        let name = unsafe {
            let info = &*(buf.0.as_ptr() as *const UnicodeString);
            if info.buffer.is_null() {
                return Err(NameQueryError::Unnamed);
            }
            std::slice::from_raw_parts(info.buffer, usize::from(info.length / 2))
        };
        Ok(String::from_utf16_lossy(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::managed::{types, Array, Value};
    use crate::native::console::STD_OUTPUT_HANDLE;

    fn facade() -> WindowsFacade {
        WindowsFacade::new(Arc::new(Runtime::with_standard_classes()))
    }

    #[test]
    fn test_invalid_handle_reports_failure() {
        let facade = facade();
        let mode = Array::zeroed::<i32>(1);
        assert_eq!(facade.get_console_mode(INVALID_HANDLE_VALUE, Some(&mode)).unwrap(), 0);

        let info = facade.runtime().new_object(types::CONSOLE_SCREEN_BUFFER_INFO).unwrap();
        assert_eq!(facade.get_screen_buffer_info(INVALID_HANDLE_VALUE, Some(&info)).unwrap(), 0);
        assert!(!facade.last_error_message().is_empty());
    }

    #[test]
    fn test_failed_read_is_native_call_error() {
        let facade = facade();
        let err = facade
            .read_console_input_records(INVALID_HANDLE_VALUE, 4, true)
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::NativeCall { call: "PeekConsoleInputW", status } if status != 0
        ));
    }

    #[test]
    fn test_std_output_when_attached() {
        let facade = facade();
        let out = facade.get_std_handle(STD_OUTPUT_HANDLE);
        let info = facade.runtime().new_object(types::CONSOLE_SCREEN_BUFFER_INFO).unwrap();
        // Only meaningful with a real console attached (not under CI pipes)
        if facade.get_screen_buffer_info(out, Some(&info)).unwrap() != 0 {
            let Some(Value::Object(Some(size))) = info.field("size") else {
                panic!("size missing");
            };
            assert!(matches!(size.field("x"), Some(Value::Short(x)) if x > 0));
        }
    }
}
