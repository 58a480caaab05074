//! Console structure marshalling.
//!
//! Composite structures marshal their sub-objects through the same
//! [`NativeStruct`] path as top-level ones, so a `CONSOLE_SCREEN_BUFFER_INFO`
//! resolves `Coord` and `SmallRect` bindings on first use too.
//!
//! `INPUT_RECORD` is the odd one out: its five event arms share storage.
//! Loading writes the four inactive arms first and the arm named by
//! `eventType` last, so the active payload is what ends up in the union.

use crate::error::Result;
use crate::managed::Object;
use crate::native::console::{
    CharInfo, ConsoleScreenBufferInfo, Coord, EventType, FocusEventRecord, InputRecord,
    KeyEventRecord, MenuEventRecord, MouseEventRecord, SmallRect, WindowBufferSizeRecord,
};

use super::cache::{AccessorSet, StructKind};
use super::{from_bool, load_nested, store_nested, to_bool, write_from_native, NativeStruct};

impl NativeStruct for Coord {
    const KIND: StructKind = StructKind::Coord;

    fn zeroed() -> Self {
        Coord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [x, y] = fields.fields()?;
        out.x = obj.get_short(x)?;
        out.y = obj.get_short(y)?;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [x, y] = fields.fields()?;
        obj.set_short(x, src.x)?;
        obj.set_short(y, src.y)?;
        Ok(())
    }
}

impl NativeStruct for SmallRect {
    const KIND: StructKind = StructKind::SmallRect;

    fn zeroed() -> Self {
        SmallRect::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [left, top, right, bottom] = fields.fields()?;
        out.left = obj.get_short(left)?;
        out.top = obj.get_short(top)?;
        out.right = obj.get_short(right)?;
        out.bottom = obj.get_short(bottom)?;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [left, top, right, bottom] = fields.fields()?;
        obj.set_short(left, src.left)?;
        obj.set_short(top, src.top)?;
        obj.set_short(right, src.right)?;
        obj.set_short(bottom, src.bottom)?;
        Ok(())
    }
}

impl NativeStruct for CharInfo {
    const KIND: StructKind = StructKind::CharInfo;

    fn zeroed() -> Self {
        CharInfo::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [attributes, unicode_char] = fields.fields()?;
        out.attributes = obj.get_short(attributes)? as u16;
        out.unicode_char = obj.get_char(unicode_char)?;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [attributes, unicode_char] = fields.fields()?;
        obj.set_short(attributes, src.attributes as i16)?;
        obj.set_char(unicode_char, src.unicode_char)?;
        Ok(())
    }
}

impl NativeStruct for ConsoleScreenBufferInfo {
    const KIND: StructKind = StructKind::ConsoleScreenBufferInfo;

    fn zeroed() -> Self {
        ConsoleScreenBufferInfo::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [size, cursor, attributes, window, max_size] = fields.fields()?;
        load_nested(obj, size, &mut out.size)?;
        load_nested(obj, cursor, &mut out.cursor_position)?;
        out.attributes = obj.get_short(attributes)? as u16;
        load_nested(obj, window, &mut out.window)?;
        load_nested(obj, max_size, &mut out.maximum_window_size)?;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [size, cursor, attributes, window, max_size] = fields.fields()?;
        store_nested(&src.size, obj, size)?;
        store_nested(&src.cursor_position, obj, cursor)?;
        obj.set_short(attributes, src.attributes as i16)?;
        store_nested(&src.window, obj, window)?;
        store_nested(&src.maximum_window_size, obj, max_size)?;
        Ok(())
    }
}

impl NativeStruct for KeyEventRecord {
    const KIND: StructKind = StructKind::KeyEventRecord;

    fn zeroed() -> Self {
        KeyEventRecord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [key_down, repeat_count, key_code, scan_code, uchar, control_key_state] =
            fields.fields()?;
        out.key_down = from_bool(obj.get_boolean(key_down)?);
        out.repeat_count = obj.get_short(repeat_count)? as u16;
        out.virtual_key_code = obj.get_short(key_code)? as u16;
        out.virtual_scan_code = obj.get_short(scan_code)? as u16;
        out.unicode_char = obj.get_char(uchar)?;
        out.control_key_state = obj.get_int(control_key_state)? as u32;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [key_down, repeat_count, key_code, scan_code, uchar, control_key_state] =
            fields.fields()?;
        obj.set_boolean(key_down, to_bool(src.key_down))?;
        obj.set_short(repeat_count, src.repeat_count as i16)?;
        obj.set_short(key_code, src.virtual_key_code as i16)?;
        obj.set_short(scan_code, src.virtual_scan_code as i16)?;
        obj.set_char(uchar, src.unicode_char)?;
        obj.set_int(control_key_state, src.control_key_state as i32)?;
        Ok(())
    }
}

impl NativeStruct for MouseEventRecord {
    const KIND: StructKind = StructKind::MouseEventRecord;

    fn zeroed() -> Self {
        MouseEventRecord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [position, button_state, control_key_state, event_flags] = fields.fields()?;
        load_nested(obj, position, &mut out.mouse_position)?;
        out.button_state = obj.get_int(button_state)? as u32;
        out.control_key_state = obj.get_int(control_key_state)? as u32;
        out.event_flags = obj.get_int(event_flags)? as u32;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [position, button_state, control_key_state, event_flags] = fields.fields()?;
        store_nested(&src.mouse_position, obj, position)?;
        obj.set_int(button_state, src.button_state as i32)?;
        obj.set_int(control_key_state, src.control_key_state as i32)?;
        obj.set_int(event_flags, src.event_flags as i32)?;
        Ok(())
    }
}

impl NativeStruct for WindowBufferSizeRecord {
    const KIND: StructKind = StructKind::WindowBufferSizeRecord;

    fn zeroed() -> Self {
        WindowBufferSizeRecord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [size] = fields.fields()?;
        load_nested(obj, size, &mut out.size)?;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [size] = fields.fields()?;
        store_nested(&src.size, obj, size)?;
        Ok(())
    }
}

impl NativeStruct for MenuEventRecord {
    const KIND: StructKind = StructKind::MenuEventRecord;

    fn zeroed() -> Self {
        MenuEventRecord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [command_id] = fields.fields()?;
        out.command_id = obj.get_int(command_id)? as u32;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [command_id] = fields.fields()?;
        obj.set_int(command_id, src.command_id as i32)?;
        Ok(())
    }
}

impl NativeStruct for FocusEventRecord {
    const KIND: StructKind = StructKind::FocusEventRecord;

    fn zeroed() -> Self {
        FocusEventRecord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [set_focus] = fields.fields()?;
        out.set_focus = from_bool(obj.get_boolean(set_focus)?);
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [set_focus] = fields.fields()?;
        obj.set_boolean(set_focus, to_bool(src.set_focus))?;
        Ok(())
    }
}

const ARM_ORDER: [EventType; 5] = [
    EventType::Key,
    EventType::Mouse,
    EventType::WindowBufferSize,
    EventType::Menu,
    EventType::Focus,
];

/// Arms in load order: the active one, if any, moves to the end.
fn load_order(active: Option<EventType>) -> [EventType; 5] {
    let mut order = ARM_ORDER;
    if let Some(active) = active {
        order.sort_by_key(|arm| *arm == active);
    }
    order
}

impl NativeStruct for InputRecord {
    const KIND: StructKind = StructKind::InputRecord;

    fn zeroed() -> Self {
        InputRecord::default()
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [event_type, key, mouse, window_buffer_size, menu, focus] = fields.fields()?;
        out.event_type = obj.get_short(event_type)? as u16;

        for arm in load_order(out.kind()) {
            match arm {
                EventType::Key => {
                    let mut value = out.key();
                    if load_nested(obj, key, &mut value)? {
                        out.set_key(value);
                    }
                }
                EventType::Mouse => {
                    let mut value = out.mouse();
                    if load_nested(obj, mouse, &mut value)? {
                        out.set_mouse(value);
                    }
                }
                EventType::WindowBufferSize => {
                    let mut value = out.window_buffer_size();
                    if load_nested(obj, window_buffer_size, &mut value)? {
                        out.set_window_buffer_size(value);
                    }
                }
                EventType::Menu => {
                    let mut value = out.menu();
                    if load_nested(obj, menu, &mut value)? {
                        out.set_menu(value);
                    }
                }
                EventType::Focus => {
                    let mut value = out.focus();
                    if load_nested(obj, focus, &mut value)? {
                        out.set_focus(value);
                    }
                }
            }
        }
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [event_type, key, mouse, window_buffer_size, menu, focus] = fields.fields()?;
        obj.set_short(event_type, src.event_type as i16)?;
        // Every arm is a view of the same bytes; all of them are written back
        store_nested(&src.key(), obj, key)?;
        store_nested(&src.mouse(), obj, mouse)?;
        store_nested(&src.window_buffer_size(), obj, window_buffer_size)?;
        store_nested(&src.menu(), obj, menu)?;
        store_nested(&src.focus(), obj, focus)?;
        Ok(())
    }
}

/// Copy the native record at `record` into `obj`.
///
/// # Safety
///
/// `record` must point to readable memory holding at least
/// `size_of::<InputRecord>()` bytes. No alignment is required.
pub unsafe fn input_record_from_raw(record: *const InputRecord, obj: &Object) -> Result<()> {
    let native = std::ptr::read_unaligned(record);
    write_from_native(&native, obj)
}
