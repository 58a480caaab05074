//! Field descriptor cache.
//!
//! Resolving the fields of a managed class is a reflective scan, so it is
//! done once per structure kind and the resulting [`AccessorSet`] is kept
//! for the life of the process. Publication is a single compare-exchange
//! on an `AtomicPtr`: the set is fully built before the pointer becomes
//! visible, so a reader that sees the pointer sees every accessor. Two
//! threads racing on first use may both resolve; the loser frees its copy
//! and adopts the winner's.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use tracing::{debug, trace};

use crate::error::{BridgeError, Result};
use crate::managed::types;
use crate::managed::{Class, ClassRef, FieldId, FieldType, Object};

/// Native structure kinds with a cached field binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    Termios,
    WinSize,
    Coord,
    SmallRect,
    CharInfo,
    ConsoleScreenBufferInfo,
    KeyEventRecord,
    MouseEventRecord,
    WindowBufferSizeRecord,
    MenuEventRecord,
    FocusEventRecord,
    InputRecord,
}

/// One expected managed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn spec(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty }
}

static TERMIOS_SCHEMA: [FieldSpec; 7] = [
    spec("c_iflag", FieldType::Long),
    spec("c_oflag", FieldType::Long),
    spec("c_cflag", FieldType::Long),
    spec("c_lflag", FieldType::Long),
    spec("c_cc", FieldType::ByteArray),
    spec("c_ispeed", FieldType::Long),
    spec("c_ospeed", FieldType::Long),
];

static WIN_SIZE_SCHEMA: [FieldSpec; 4] = [
    spec("ws_row", FieldType::Short),
    spec("ws_col", FieldType::Short),
    spec("ws_xpixel", FieldType::Short),
    spec("ws_ypixel", FieldType::Short),
];

static COORD_SCHEMA: [FieldSpec; 2] = [
    spec("x", FieldType::Short),
    spec("y", FieldType::Short),
];

static SMALL_RECT_SCHEMA: [FieldSpec; 4] = [
    spec("left", FieldType::Short),
    spec("top", FieldType::Short),
    spec("right", FieldType::Short),
    spec("bottom", FieldType::Short),
];

static CHAR_INFO_SCHEMA: [FieldSpec; 2] = [
    spec("attributes", FieldType::Short),
    spec("unicodeChar", FieldType::Char),
];

static CONSOLE_SCREEN_BUFFER_INFO_SCHEMA: [FieldSpec; 5] = [
    spec("size", FieldType::Object(types::COORD)),
    spec("cursorPosition", FieldType::Object(types::COORD)),
    spec("attributes", FieldType::Short),
    spec("window", FieldType::Object(types::SMALL_RECT)),
    spec("maximumWindowSize", FieldType::Object(types::COORD)),
];

static KEY_EVENT_RECORD_SCHEMA: [FieldSpec; 6] = [
    spec("keyDown", FieldType::Boolean),
    spec("repeatCount", FieldType::Short),
    spec("keyCode", FieldType::Short),
    spec("scanCode", FieldType::Short),
    spec("uchar", FieldType::Char),
    spec("controlKeyState", FieldType::Int),
];

static MOUSE_EVENT_RECORD_SCHEMA: [FieldSpec; 4] = [
    spec("mousePosition", FieldType::Object(types::COORD)),
    spec("buttonState", FieldType::Int),
    spec("controlKeyState", FieldType::Int),
    spec("eventFlags", FieldType::Int),
];

static WINDOW_BUFFER_SIZE_RECORD_SCHEMA: [FieldSpec; 1] =
    [spec("size", FieldType::Object(types::COORD))];

static MENU_EVENT_RECORD_SCHEMA: [FieldSpec; 1] = [spec("commandId", FieldType::Int)];

static FOCUS_EVENT_RECORD_SCHEMA: [FieldSpec; 1] = [spec("setFocus", FieldType::Boolean)];

static INPUT_RECORD_SCHEMA: [FieldSpec; 6] = [
    spec("eventType", FieldType::Short),
    spec("keyEvent", FieldType::Object(types::KEY_EVENT_RECORD)),
    spec("mouseEvent", FieldType::Object(types::MOUSE_EVENT_RECORD)),
    spec(
        "windowBufferSizeEvent",
        FieldType::Object(types::WINDOW_BUFFER_SIZE_RECORD),
    ),
    spec("menuEvent", FieldType::Object(types::MENU_EVENT_RECORD)),
    spec("focusEvent", FieldType::Object(types::FOCUS_EVENT_RECORD)),
];

impl StructKind {
    pub const COUNT: usize = 12;

    pub const ALL: [StructKind; StructKind::COUNT] = [
        StructKind::Termios,
        StructKind::WinSize,
        StructKind::Coord,
        StructKind::SmallRect,
        StructKind::CharInfo,
        StructKind::ConsoleScreenBufferInfo,
        StructKind::KeyEventRecord,
        StructKind::MouseEventRecord,
        StructKind::WindowBufferSizeRecord,
        StructKind::MenuEventRecord,
        StructKind::FocusEventRecord,
        StructKind::InputRecord,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Fields the native side expects, in marshalling order.
    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            StructKind::Termios => &TERMIOS_SCHEMA,
            StructKind::WinSize => &WIN_SIZE_SCHEMA,
            StructKind::Coord => &COORD_SCHEMA,
            StructKind::SmallRect => &SMALL_RECT_SCHEMA,
            StructKind::CharInfo => &CHAR_INFO_SCHEMA,
            StructKind::ConsoleScreenBufferInfo => &CONSOLE_SCREEN_BUFFER_INFO_SCHEMA,
            StructKind::KeyEventRecord => &KEY_EVENT_RECORD_SCHEMA,
            StructKind::MouseEventRecord => &MOUSE_EVENT_RECORD_SCHEMA,
            StructKind::WindowBufferSizeRecord => &WINDOW_BUFFER_SIZE_RECORD_SCHEMA,
            StructKind::MenuEventRecord => &MENU_EVENT_RECORD_SCHEMA,
            StructKind::FocusEventRecord => &FOCUS_EVENT_RECORD_SCHEMA,
            StructKind::InputRecord => &INPUT_RECORD_SCHEMA,
        }
    }
}

/// Resolved field handles for one structure kind, in schema order.
pub struct AccessorSet {
    kind: StructKind,
    class: ClassRef,
    ids: Box<[FieldId]>,
}

impl AccessorSet {
    /// Look up every schema field on `class`. Any absent field fails the
    /// whole resolution.
    pub fn resolve(kind: StructKind, class: &ClassRef) -> Result<Self> {
        let ids = kind
            .schema()
            .iter()
            .map(|spec| {
                class.field_id(spec.name, spec.ty).ok_or_else(|| {
                    BridgeError::schema(
                        class.name(),
                        format!("no field `{}` of type {} for {:?}", spec.name, spec.ty, kind),
                    )
                })
            })
            .collect::<Result<Box<[FieldId]>>>()?;
        Ok(AccessorSet {
            kind,
            class: class.clone(),
            ids,
        })
    }

    pub fn kind(&self) -> StructKind {
        self.kind
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Handle of a field by schema name.
    pub fn get(&self, name: &str) -> Option<FieldId> {
        self.kind
            .schema()
            .iter()
            .position(|spec| spec.name == name)
            .map(|i| self.ids[i])
    }

    /// All handles as a fixed-size array, for destructuring in schema order.
    pub fn fields<const N: usize>(&self) -> Result<[FieldId; N]> {
        <[FieldId; N]>::try_from(&*self.ids).map_err(|_| {
            BridgeError::schema(
                self.class.name(),
                format!(
                    "{:?} binds {} fields, marshaller expects {}",
                    self.kind,
                    self.ids.len(),
                    N
                ),
            )
        })
    }

    /// Refuse objects whose class differs from the one this set was
    /// resolved against.
    pub fn check(&self, obj: &Object) -> Result<()> {
        if Class::same_shape(&self.class, obj.class()) {
            Ok(())
        } else {
            Err(BridgeError::schema(
                obj.class().name(),
                format!(
                    "{:?} is bound to class `{}`, which has a different shape",
                    self.kind,
                    self.class.name()
                ),
            ))
        }
    }

    pub fn same_bindings(&self, other: &AccessorSet) -> bool {
        self.kind == other.kind
            && self.ids == other.ids
            && Class::same_shape(&self.class, &other.class)
    }
}

impl fmt::Debug for AccessorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorSet")
            .field("kind", &self.kind)
            .field("class", &self.class.name())
            .field("ids", &self.ids)
            .finish()
    }
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicPtr<AccessorSet> = AtomicPtr::new(ptr::null_mut());

/// One lazily published accessor set per structure kind.
pub struct FieldCache {
    slots: [AtomicPtr<AccessorSet>; StructKind::COUNT],
}

impl FieldCache {
    pub const fn new() -> Self {
        FieldCache {
            slots: [EMPTY_SLOT; StructKind::COUNT],
        }
    }

    pub fn is_resolved(&self, kind: StructKind) -> bool {
        !self.slots[kind.index()].load(Ordering::Acquire).is_null()
    }

    pub fn get(&self, kind: StructKind) -> Option<&AccessorSet> {
        let published = self.slots[kind.index()].load(Ordering::Acquire);
        // SAFETY: a non-null pointer was published by `resolve` from a live
        // Box and is only freed when the cache itself is dropped.
        unsafe { published.as_ref() }
    }

    /// Cached set for `kind`, resolving against `class` on first use.
    pub fn resolve(&self, kind: StructKind, class: &ClassRef) -> Result<&AccessorSet> {
        if let Some(set) = self.get(kind) {
            return Ok(set);
        }

        let fresh = Box::into_raw(Box::new(AccessorSet::resolve(kind, class)?));
        match self.slots[kind.index()].compare_exchange(
            ptr::null_mut(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!("Resolved {:?} field bindings against `{}`", kind, class.name());
                // SAFETY: just published; lives as long as the cache.
                Ok(unsafe { &*fresh })
            }
            Err(winner) => {
                trace!("Lost {:?} resolution race, adopting published set", kind);
                // SAFETY: `fresh` was never shared.
                drop(unsafe { Box::from_raw(fresh) });
                // SAFETY: the winner is non-null and lives as long as the cache.
                Ok(unsafe { &*winner })
            }
        }
    }
}

impl Default for FieldCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FieldCache {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            let published = *slot.get_mut();
            if !published.is_null() {
                // SAFETY: exclusive access; the pointer came from Box::into_raw.
                drop(unsafe { Box::from_raw(published) });
            }
        }
    }
}

static REGISTRY: FieldCache = FieldCache::new();

/// The process-wide cache.
pub fn registry() -> &'static FieldCache {
    &REGISTRY
}

/// Process-wide accessor set for `kind`, checked against `obj`'s class.
pub fn accessors(kind: StructKind, obj: &Object) -> Result<&'static AccessorSet> {
    let set = REGISTRY.resolve(kind, obj.class())?;
    set.check(obj)?;
    Ok(set)
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::managed::{types, Runtime};

    #[test]
    fn test_resolves_once() {
        let cache = FieldCache::new();
        let class = types::coord();
        assert!(!cache.is_resolved(StructKind::Coord));

        let first = cache.resolve(StructKind::Coord, &class).unwrap() as *const AccessorSet;
        assert!(cache.is_resolved(StructKind::Coord));
        let second = cache.resolve(StructKind::Coord, &class).unwrap() as *const AccessorSet;
        assert!(ptr::eq(first, second));
        assert!(!cache.is_resolved(StructKind::SmallRect));
    }

    #[test]
    fn test_missing_field_is_schema_mismatch_and_not_cached() {
        let cache = FieldCache::new();
        let broken = Class::builder(types::COORD)
            .field("x", FieldType::Short)
            .build();

        let err = cache.resolve(StructKind::Coord, &broken).unwrap_err();
        assert!(err.is_schema_mismatch());
        assert!(!cache.is_resolved(StructKind::Coord));

        // A correct class can still resolve afterwards
        assert!(cache.resolve(StructKind::Coord, &types::coord()).is_ok());
    }

    #[test]
    fn test_wrong_field_width_is_schema_mismatch() {
        let cache = FieldCache::new();
        let widened = Class::builder(types::WIN_SIZE)
            .field("ws_row", FieldType::Int)
            .field("ws_col", FieldType::Short)
            .field("ws_xpixel", FieldType::Short)
            .field("ws_ypixel", FieldType::Short)
            .build();
        assert!(cache
            .resolve(StructKind::WinSize, &widened)
            .unwrap_err()
            .is_schema_mismatch());
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        const THREADS: usize = 16;
        let cache = FieldCache::new();
        let barrier = Barrier::new(THREADS);

        let published: Vec<usize> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        // Every thread brings its own class instance
                        let class = types::input_record();
                        barrier.wait();
                        let set = cache.resolve(StructKind::InputRecord, &class).unwrap();
                        assert_eq!(set.ids.len(), StructKind::InputRecord.schema().len());
                        set as *const AccessorSet as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(published.windows(2).all(|w| w[0] == w[1]));
        let final_set = cache.get(StructKind::InputRecord).unwrap();
        assert_eq!(final_set as *const AccessorSet as usize, published[0]);
    }

    #[test]
    fn test_independent_resolutions_bind_identically() {
        let kind = StructKind::KeyEventRecord;
        let a = AccessorSet::resolve(kind, &types::key_event_record()).unwrap();
        let b = AccessorSet::resolve(kind, &types::key_event_record()).unwrap();
        assert!(a.same_bindings(&b));
        assert_eq!(a.get("uchar"), b.get("uchar"));
        assert_eq!(a.get("nope"), None);
    }

    #[test]
    fn test_check_rejects_foreign_class() {
        let runtime = Runtime::with_standard_classes();
        let coord = runtime.new_object(types::COORD).unwrap();
        let set = accessors(StructKind::Coord, &coord).unwrap();

        let impostor = Object::new(
            Class::builder("Point")
                .field("x", FieldType::Short)
                .field("y", FieldType::Short)
                .build(),
        );
        assert!(set.check(&impostor).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_fields_arity() {
        let set = AccessorSet::resolve(StructKind::Coord, &types::coord()).unwrap();
        let [x, y] = set.fields().unwrap();
        assert_ne!(x, y);
        assert!(set.fields::<3>().is_err());
    }
}
