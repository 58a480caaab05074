//! Windows console structure layouts.
//!
//! `#[repr(C)]` mirrors of the `wincon.h` structures. They are defined on
//! every target so the marshaller can be exercised anywhere; only the
//! console calls themselves are Windows-only. On Windows the sizes are
//! checked against the `windows` crate's definitions at compile time, and
//! the facade converts between the two by pointer cast.

use std::fmt;
use std::mem::size_of;

use bitflags::bitflags;

/// `COORD`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coord {
    pub x: i16,
    pub y: i16,
}

/// `SMALL_RECT`. Right/bottom are kept exactly as the console reports them.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmallRect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

impl SmallRect {
    pub fn width(&self) -> i16 {
        self.right.wrapping_sub(self.left)
    }

    pub fn height(&self) -> i16 {
        self.bottom.wrapping_sub(self.top)
    }
}

/// `CHAR_INFO` with the `UnicodeChar` arm of its character union.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharInfo {
    pub unicode_char: u16,
    pub attributes: u16,
}

/// `CONSOLE_SCREEN_BUFFER_INFO`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsoleScreenBufferInfo {
    pub size: Coord,
    pub cursor_position: Coord,
    pub attributes: u16,
    pub window: SmallRect,
    pub maximum_window_size: Coord,
}

impl ConsoleScreenBufferInfo {
    /// Visible columns; the window rectangle is inclusive.
    pub fn window_width(&self) -> i32 {
        i32::from(self.window.width()) + 1
    }

    /// Visible rows; the window rectangle is inclusive.
    pub fn window_height(&self) -> i32 {
        i32::from(self.window.height()) + 1
    }
}

/// `KEY_EVENT_RECORD`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyEventRecord {
    /// Win32 `BOOL`
    pub key_down: i32,
    pub repeat_count: u16,
    pub virtual_key_code: u16,
    pub virtual_scan_code: u16,
    pub unicode_char: u16,
    pub control_key_state: u32,
}

/// `MOUSE_EVENT_RECORD`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseEventRecord {
    pub mouse_position: Coord,
    pub button_state: u32,
    pub control_key_state: u32,
    pub event_flags: u32,
}

/// `WINDOW_BUFFER_SIZE_RECORD`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowBufferSizeRecord {
    pub size: Coord,
}

/// `MENU_EVENT_RECORD`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuEventRecord {
    pub command_id: u32,
}

/// `FOCUS_EVENT_RECORD`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusEventRecord {
    /// Win32 `BOOL`
    pub set_focus: i32,
}

/// The `Event` union of `INPUT_RECORD`. All five arms alias the same bytes.
#[repr(C)]
#[derive(Clone, Copy)]
union InputEvent {
    key: KeyEventRecord,
    mouse: MouseEventRecord,
    window_buffer_size: WindowBufferSizeRecord,
    menu: MenuEventRecord,
    focus: FocusEventRecord,
}

/// `INPUT_RECORD`
///
/// The union is private: every constructor starts from a fully written
/// 16-byte arm, and every arm is plain integers, so any arm can be read
/// back whatever the discriminant says.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct InputRecord {
    pub event_type: u16,
    event: InputEvent,
}

impl Default for InputRecord {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InputRecord {
    pub fn new(event_type: u16) -> Self {
        InputRecord {
            event_type,
            event: InputEvent {
                key: KeyEventRecord::default(),
            },
        }
    }

    pub fn key(&self) -> KeyEventRecord {
        // SAFETY: all union bytes are initialised (see type docs) and every
        // bit pattern is a valid KeyEventRecord.
        unsafe { self.event.key }
    }

    pub fn mouse(&self) -> MouseEventRecord {
        // SAFETY: as for `key`.
        unsafe { self.event.mouse }
    }

    pub fn window_buffer_size(&self) -> WindowBufferSizeRecord {
        // SAFETY: as for `key`.
        unsafe { self.event.window_buffer_size }
    }

    pub fn menu(&self) -> MenuEventRecord {
        // SAFETY: as for `key`.
        unsafe { self.event.menu }
    }

    pub fn focus(&self) -> FocusEventRecord {
        // SAFETY: as for `key`.
        unsafe { self.event.focus }
    }

    pub fn set_key(&mut self, value: KeyEventRecord) {
        self.event.key = value;
    }

    pub fn set_mouse(&mut self, value: MouseEventRecord) {
        self.event.mouse = value;
    }

    pub fn set_window_buffer_size(&mut self, value: WindowBufferSizeRecord) {
        self.event.window_buffer_size = value;
    }

    pub fn set_menu(&mut self, value: MenuEventRecord) {
        self.event.menu = value;
    }

    pub fn set_focus(&mut self, value: FocusEventRecord) {
        self.event.focus = value;
    }

    pub fn kind(&self) -> Option<EventType> {
        EventType::from_raw(self.event_type)
    }
}

impl fmt::Debug for InputRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("InputRecord");
        s.field("event_type", &self.event_type);
        match self.kind() {
            Some(EventType::Key) => s.field("key", &self.key()),
            Some(EventType::Mouse) => s.field("mouse", &self.mouse()),
            Some(EventType::WindowBufferSize) => {
                s.field("window_buffer_size", &self.window_buffer_size())
            }
            Some(EventType::Menu) => s.field("menu", &self.menu()),
            Some(EventType::Focus) => s.field("focus", &self.focus()),
            None => s.field("raw", &self.key()),
        };
        s.finish()
    }
}

/// `INPUT_RECORD::EventType` discriminants.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Key = 0x0001,
    Mouse = 0x0002,
    WindowBufferSize = 0x0004,
    Menu = 0x0008,
    Focus = 0x0010,
}

impl EventType {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0x0001 => Some(EventType::Key),
            0x0002 => Some(EventType::Mouse),
            0x0004 => Some(EventType::WindowBufferSize),
            0x0008 => Some(EventType::Menu),
            0x0010 => Some(EventType::Focus),
            _ => None,
        }
    }

    pub fn raw(self) -> u16 {
        self as u16
    }
}

bitflags! {
    /// Character attributes (`FOREGROUND_*`, `BACKGROUND_*`, `COMMON_LVB_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConsoleAttributes: u16 {
        const FOREGROUND_BLUE = 0x0001;
        const FOREGROUND_GREEN = 0x0002;
        const FOREGROUND_RED = 0x0004;
        const FOREGROUND_INTENSITY = 0x0008;
        const BACKGROUND_BLUE = 0x0010;
        const BACKGROUND_GREEN = 0x0020;
        const BACKGROUND_RED = 0x0040;
        const BACKGROUND_INTENSITY = 0x0080;
        const COMMON_LVB_LEADING_BYTE = 0x0100;
        const COMMON_LVB_TRAILING_BYTE = 0x0200;
        const COMMON_LVB_GRID_HORIZONTAL = 0x0400;
        const COMMON_LVB_GRID_LVERTICAL = 0x0800;
        const COMMON_LVB_GRID_RVERTICAL = 0x1000;
        const COMMON_LVB_REVERSE_VIDEO = 0x4000;
        const COMMON_LVB_UNDERSCORE = 0x8000;
    }
}

bitflags! {
    /// `dwControlKeyState` of key and mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlKeyState: u32 {
        const RIGHT_ALT_PRESSED = 0x0001;
        const LEFT_ALT_PRESSED = 0x0002;
        const RIGHT_CTRL_PRESSED = 0x0004;
        const LEFT_CTRL_PRESSED = 0x0008;
        const SHIFT_PRESSED = 0x0010;
        const NUMLOCK_ON = 0x0020;
        const SCROLLLOCK_ON = 0x0040;
        const CAPSLOCK_ON = 0x0080;
        const ENHANCED_KEY = 0x0100;
    }
}

bitflags! {
    /// `dwButtonState` of mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MouseButtons: u32 {
        const FROM_LEFT_1ST_BUTTON_PRESSED = 0x0001;
        const RIGHTMOST_BUTTON_PRESSED = 0x0002;
        const FROM_LEFT_2ND_BUTTON_PRESSED = 0x0004;
        const FROM_LEFT_3RD_BUTTON_PRESSED = 0x0008;
        const FROM_LEFT_4TH_BUTTON_PRESSED = 0x0010;
    }
}

bitflags! {
    /// `dwEventFlags` of mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MouseEventFlags: u32 {
        const MOUSE_MOVED = 0x0001;
        const DOUBLE_CLICK = 0x0002;
        const MOUSE_WHEELED = 0x0004;
        const MOUSE_HWHEELED = 0x0008;
    }
}

/// `GetStdHandle` selectors.
pub const STD_INPUT_HANDLE: u32 = -10i32 as u32;
pub const STD_OUTPUT_HANDLE: u32 = -11i32 as u32;
pub const STD_ERROR_HANDLE: u32 = -12i32 as u32;

pub const INVALID_HANDLE_VALUE: isize = -1;

pub const FORMAT_MESSAGE_FROM_SYSTEM: u32 = 0x0000_1000;

/// `WaitForSingleObject` timeout meaning "no timeout".
pub const INFINITE: u32 = 0xFFFF_FFFF;

const _: () = assert!(size_of::<Coord>() == 4);
const _: () = assert!(size_of::<SmallRect>() == 8);
const _: () = assert!(size_of::<CharInfo>() == 4);
const _: () = assert!(size_of::<ConsoleScreenBufferInfo>() == 22);
const _: () = assert!(size_of::<KeyEventRecord>() == 16);
const _: () = assert!(size_of::<MouseEventRecord>() == 16);
const _: () = assert!(size_of::<WindowBufferSizeRecord>() == 4);
const _: () = assert!(size_of::<MenuEventRecord>() == 4);
const _: () = assert!(size_of::<FocusEventRecord>() == 4);
const _: () = assert!(size_of::<InputRecord>() == 20);

#[cfg(windows)]
mod abi {
    use std::mem::size_of;

    use windows::Win32::System::Console::{
        CHAR_INFO, CONSOLE_SCREEN_BUFFER_INFO, COORD, INPUT_RECORD, KEY_EVENT_RECORD,
        MOUSE_EVENT_RECORD, SMALL_RECT,
    };

    const _: () = assert!(size_of::<super::Coord>() == size_of::<COORD>());
    const _: () = assert!(size_of::<super::SmallRect>() == size_of::<SMALL_RECT>());
    const _: () = assert!(size_of::<super::CharInfo>() == size_of::<CHAR_INFO>());
    const _: () = assert!(
        size_of::<super::ConsoleScreenBufferInfo>() == size_of::<CONSOLE_SCREEN_BUFFER_INFO>()
    );
    const _: () = assert!(size_of::<super::KeyEventRecord>() == size_of::<KEY_EVENT_RECORD>());
    const _: () = assert!(size_of::<super::MouseEventRecord>() == size_of::<MOUSE_EVENT_RECORD>());
    const _: () = assert!(size_of::<super::InputRecord>() == size_of::<INPUT_RECORD>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_arms_alias() {
        let mut record = InputRecord::new(EventType::Focus.raw());
        record.set_key(KeyEventRecord {
            key_down: 1,
            repeat_count: 2,
            ..Default::default()
        });
        record.set_focus(FocusEventRecord { set_focus: 0 });

        // Focus overwrote the first four bytes only
        let key = record.key();
        assert_eq!(key.key_down, 0);
        assert_eq!(key.repeat_count, 2);
    }

    #[test]
    fn test_window_dimensions_are_inclusive() {
        let info = ConsoleScreenBufferInfo {
            window: SmallRect {
                left: 0,
                top: 0,
                right: 79,
                bottom: 24,
            },
            ..Default::default()
        };
        assert_eq!(info.window_width(), 80);
        assert_eq!(info.window_height(), 25);
    }

    #[test]
    fn test_event_type_round_trip() {
        for kind in [
            EventType::Key,
            EventType::Mouse,
            EventType::WindowBufferSize,
            EventType::Menu,
            EventType::Focus,
        ] {
            assert_eq!(EventType::from_raw(kind.raw()), Some(kind));
        }
        assert_eq!(EventType::from_raw(0x20), None);
    }
}
