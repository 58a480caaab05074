//! Console input record collection.
//!
//! Batched console reads land in a native scratch buffer; these helpers
//! turn that buffer into managed records and filter key events. None of
//! this touches the console itself, so it runs everywhere.

use crate::error::{BridgeError, Result};
use crate::managed::{types, ObjectRef, Runtime};
use crate::marshal::{accessors, input_record_from_raw, StructKind};
use crate::native::console::{EventType, InputRecord};

/// Marshal `count` consecutive native records starting at `base` into new
/// managed input records.
///
/// # Safety
///
/// `base` must point to `count` readable, initialised `InputRecord`s.
pub unsafe fn records_from_native(
    runtime: &Runtime,
    base: *const InputRecord,
    count: usize,
) -> Result<Vec<ObjectRef>> {
    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let record = runtime.new_object(types::INPUT_RECORD)?;
        input_record_from_raw(base.add(i), &record)?;
        records.push(record);
    }
    Ok(records)
}

/// True when the managed record's discriminant is `KEY_EVENT`.
pub fn is_key_event(record: &ObjectRef) -> Result<bool> {
    let fields = accessors(StructKind::InputRecord, record)?;
    let [event_type, ..] = fields.fields::<6>()?;
    Ok(record.get_short(event_type)? as u16 == EventType::Key.raw())
}

/// Keep only key events, in order.
pub fn key_events(records: Vec<ObjectRef>) -> Result<Vec<ObjectRef>> {
    let mut keys = Vec::with_capacity(records.len());
    for record in records {
        if is_key_event(&record)? {
            keys.push(record);
        }
    }
    Ok(keys)
}

/// Call `read` until a batch contains at least one key event and return
/// just those. The queue may be full of mouse or focus events; they are
/// consumed and dropped.
pub fn read_until_key_events<F>(mut read: F) -> Result<Vec<ObjectRef>>
where
    F: FnMut() -> Result<Vec<ObjectRef>>,
{
    loop {
        let keys = key_events(read()?)?;
        if !keys.is_empty() {
            return Ok(keys);
        }
    }
}

/// Win32 call name used by a batched console read.
pub fn input_call(peek: bool) -> &'static str {
    if peek {
        "PeekConsoleInputW"
    } else {
        "ReadConsoleInputW"
    }
}

/// Error for a failed batched read; `code` is the `GetLastError` value.
pub fn read_failure(peek: bool, code: u32) -> BridgeError {
    BridgeError::NativeCall {
        call: input_call(peek),
        status: i64::from(code),
    }
}

/// Decode a `FormatMessageW` buffer: UTF-16LE up to the first NUL, trimmed.
pub fn decode_message(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::managed::Value;
    use crate::native::console::{FocusEventRecord, KeyEventRecord, MouseEventRecord};

    fn native_batch() -> Vec<InputRecord> {
        let mut mouse = InputRecord::new(EventType::Mouse.raw());
        mouse.set_mouse(MouseEventRecord {
            button_state: 1,
            ..Default::default()
        });

        let mut key = InputRecord::new(EventType::Key.raw());
        key.set_key(KeyEventRecord {
            key_down: 1,
            repeat_count: 1,
            unicode_char: u16::from(b'q'),
            ..Default::default()
        });

        let mut focus = InputRecord::new(EventType::Focus.raw());
        focus.set_focus(FocusEventRecord { set_focus: 1 });

        vec![mouse, key, focus]
    }

    #[test]
    fn test_records_from_native() {
        let runtime = Runtime::with_standard_classes();
        let batch = native_batch();
        // SAFETY: three initialised records.
        let records =
            unsafe { records_from_native(&runtime, batch.as_ptr(), batch.len()) }.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].field("eventType"), Some(Value::Short(2)));
        assert_eq!(records[1].field("eventType"), Some(Value::Short(1)));
        assert_eq!(records[2].field("eventType"), Some(Value::Short(0x10)));
    }

    #[test]
    fn test_key_events_filter() {
        let runtime = Runtime::with_standard_classes();
        let batch = native_batch();
        // SAFETY: three initialised records.
        let records =
            unsafe { records_from_native(&runtime, batch.as_ptr(), batch.len()) }.unwrap();

        let keys = key_events(records).unwrap();
        assert_eq!(keys.len(), 1);
        let Some(Value::Object(Some(key))) = keys[0].field("keyEvent") else {
            panic!("key payload missing");
        };
        assert_eq!(key.field("uchar"), Some(Value::Char(u16::from(b'q'))));
    }

    #[test]
    fn test_read_until_key_events_skips_empty_batches() {
        let runtime = Runtime::with_standard_classes();
        let batch = native_batch();

        let mut mouse_only = InputRecord::new(EventType::Mouse.raw());
        mouse_only.set_mouse(MouseEventRecord::default());

        let mut batches: VecDeque<Vec<InputRecord>> =
            VecDeque::from(vec![vec![mouse_only], Vec::new(), batch]);
        let mut reads = 0;

        let keys = read_until_key_events(|| {
            reads += 1;
            let next = batches.pop_front().unwrap_or_default();
            // SAFETY: `next` holds next.len() initialised records.
            unsafe { records_from_native(&runtime, next.as_ptr(), next.len()) }
        })
        .unwrap();

        assert_eq!(reads, 3);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_read_until_key_events_propagates_errors() {
        let result = read_until_key_events(|| Err(read_failure(false, 6)));
        assert!(matches!(
            result,
            Err(BridgeError::NativeCall { call: "ReadConsoleInputW", status: 6 })
        ));
    }

    #[test]
    fn test_read_failure_names_the_call() {
        let err = read_failure(true, 5);
        assert_eq!(err.to_string(), "PeekConsoleInputW failed with status 5");
        assert!(!err.is_schema_mismatch());
    }

    #[test]
    fn test_decode_message() {
        let mut buf: Vec<u16> = "The handle is invalid.\r\n".encode_utf16().collect();
        buf.resize(80, 0);
        assert_eq!(decode_message(&buf), "The handle is invalid.");
        assert_eq!(decode_message(&[]), "");
    }
}
