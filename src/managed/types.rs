//! Standard managed class shapes.
//!
//! These are the types a line-editing application exchanges with the
//! bridge. Field names and widths are the managed half of the contract;
//! the marshaller's schemas in [`crate::marshal::StructKind`] are the
//! native half, and the two are matched by reflective lookup at first use.

use super::class::{Class, ClassRef, FieldType};
use super::Runtime;

pub const TERMIOS: &str = "Termios";
pub const WIN_SIZE: &str = "WinSize";
pub const COORD: &str = "Coord";
pub const SMALL_RECT: &str = "SmallRect";
pub const CHAR_INFO: &str = "CharInfo";
pub const CONSOLE_SCREEN_BUFFER_INFO: &str = "ConsoleScreenBufferInfo";
pub const KEY_EVENT_RECORD: &str = "KeyEventRecord";
pub const MOUSE_EVENT_RECORD: &str = "MouseEventRecord";
pub const WINDOW_BUFFER_SIZE_RECORD: &str = "WindowBufferSizeRecord";
pub const MENU_EVENT_RECORD: &str = "MenuEventRecord";
pub const FOCUS_EVENT_RECORD: &str = "FocusEventRecord";
pub const INPUT_RECORD: &str = "InputRecord";
pub const FILE_DESCRIPTOR: &str = "FileDescriptor";
pub const REDIRECT_PIPE: &str = "RedirectPipe";

/// Name of the control-character array field of [`TERMIOS`].
pub const TERMIOS_CC_FIELD: &str = "c_cc";

/// Length of the control-character array a new managed Termios carries.
/// Independent of the platform `NCCS`; the marshaller truncates.
pub const MANAGED_NCCS: usize = 32;

pub fn termios() -> ClassRef {
    Class::builder(TERMIOS)
        .field("c_iflag", FieldType::Long)
        .field("c_oflag", FieldType::Long)
        .field("c_cflag", FieldType::Long)
        .field("c_lflag", FieldType::Long)
        .field(TERMIOS_CC_FIELD, FieldType::ByteArray)
        .field("c_ispeed", FieldType::Long)
        .field("c_ospeed", FieldType::Long)
        .build()
}

pub fn win_size() -> ClassRef {
    Class::builder(WIN_SIZE)
        .field("ws_row", FieldType::Short)
        .field("ws_col", FieldType::Short)
        .field("ws_xpixel", FieldType::Short)
        .field("ws_ypixel", FieldType::Short)
        .build()
}

pub fn coord() -> ClassRef {
    Class::builder(COORD)
        .field("x", FieldType::Short)
        .field("y", FieldType::Short)
        .build()
}

pub fn small_rect() -> ClassRef {
    Class::builder(SMALL_RECT)
        .field("left", FieldType::Short)
        .field("top", FieldType::Short)
        .field("right", FieldType::Short)
        .field("bottom", FieldType::Short)
        .build()
}

pub fn char_info() -> ClassRef {
    Class::builder(CHAR_INFO)
        .field("attributes", FieldType::Short)
        .field("unicodeChar", FieldType::Char)
        .build()
}

pub fn console_screen_buffer_info() -> ClassRef {
    Class::builder(CONSOLE_SCREEN_BUFFER_INFO)
        .field("size", FieldType::Object(COORD))
        .field("cursorPosition", FieldType::Object(COORD))
        .field("attributes", FieldType::Short)
        .field("window", FieldType::Object(SMALL_RECT))
        .field("maximumWindowSize", FieldType::Object(COORD))
        .build()
}

pub fn key_event_record() -> ClassRef {
    Class::builder(KEY_EVENT_RECORD)
        .field("keyDown", FieldType::Boolean)
        .field("repeatCount", FieldType::Short)
        .field("keyCode", FieldType::Short)
        .field("scanCode", FieldType::Short)
        .field("uchar", FieldType::Char)
        .field("controlKeyState", FieldType::Int)
        .build()
}

pub fn mouse_event_record() -> ClassRef {
    Class::builder(MOUSE_EVENT_RECORD)
        .field("mousePosition", FieldType::Object(COORD))
        .field("buttonState", FieldType::Int)
        .field("controlKeyState", FieldType::Int)
        .field("eventFlags", FieldType::Int)
        .build()
}

pub fn window_buffer_size_record() -> ClassRef {
    Class::builder(WINDOW_BUFFER_SIZE_RECORD)
        .field("size", FieldType::Object(COORD))
        .build()
}

pub fn menu_event_record() -> ClassRef {
    Class::builder(MENU_EVENT_RECORD)
        .field("commandId", FieldType::Int)
        .build()
}

pub fn focus_event_record() -> ClassRef {
    Class::builder(FOCUS_EVENT_RECORD)
        .field("setFocus", FieldType::Boolean)
        .build()
}

pub fn input_record() -> ClassRef {
    Class::builder(INPUT_RECORD)
        .field("eventType", FieldType::Short)
        .field("keyEvent", FieldType::Object(KEY_EVENT_RECORD))
        .field("mouseEvent", FieldType::Object(MOUSE_EVENT_RECORD))
        .field("windowBufferSizeEvent", FieldType::Object(WINDOW_BUFFER_SIZE_RECORD))
        .field("menuEvent", FieldType::Object(MENU_EVENT_RECORD))
        .field("focusEvent", FieldType::Object(FOCUS_EVENT_RECORD))
        .build()
}

pub fn file_descriptor() -> ClassRef {
    Class::builder(FILE_DESCRIPTOR)
        .field("fd", FieldType::Int)
        .build()
}

pub fn redirect_pipe() -> ClassRef {
    Class::builder(REDIRECT_PIPE)
        .field("fd", FieldType::Object(FILE_DESCRIPTOR))
        .build()
}

/// Register every standard class with `runtime`.
pub fn install(runtime: &Runtime) {
    for class in [
        termios(),
        win_size(),
        coord(),
        small_rect(),
        char_info(),
        console_screen_buffer_info(),
        key_event_record(),
        mouse_event_record(),
        window_buffer_size_record(),
        menu_event_record(),
        focus_event_record(),
        input_record(),
        file_descriptor(),
        redirect_pipe(),
    ] {
        runtime.define(class);
    }
}
