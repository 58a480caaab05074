//! Managed object instances and their typed field slots.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::array::ArrayRef;
use super::class::{ClassRef, FieldId, FieldType};
use crate::error::{BridgeError, Result};

/// Contents of one field slot.
#[derive(Clone)]
pub enum Value {
    Boolean(bool),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Array(Option<ArrayRef>),
    Object(Option<ObjectRef>),
}

impl Value {
    /// Zero value of a declared type; references start out absent.
    pub fn default_for(ty: FieldType) -> Value {
        match ty {
            FieldType::Boolean => Value::Boolean(false),
            FieldType::Char => Value::Char(0),
            FieldType::Short => Value::Short(0),
            FieldType::Int => Value::Int(0),
            FieldType::Long => Value::Long(0),
            FieldType::ByteArray | FieldType::CharArray | FieldType::IntArray => Value::Array(None),
            FieldType::Object(_) => Value::Object(None),
        }
    }

    /// Whether this value may be stored in a slot declared as `ty`.
    pub fn fits(&self, ty: FieldType) -> bool {
        match (self, ty) {
            (Value::Boolean(_), FieldType::Boolean)
            | (Value::Char(_), FieldType::Char)
            | (Value::Short(_), FieldType::Short)
            | (Value::Int(_), FieldType::Int)
            | (Value::Long(_), FieldType::Long) => true,
            (
                Value::Array(None),
                FieldType::ByteArray | FieldType::CharArray | FieldType::IntArray,
            ) => true,
            (Value::Array(Some(array)), ty) => array.array_type() == ty,
            (Value::Object(None), FieldType::Object(_)) => true,
            (Value::Object(Some(obj)), FieldType::Object(name)) => obj.class().name() == name,
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (Value::Object(a), Value::Object(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Char(v) => write!(f, "Char({:#06x})", v),
            Value::Short(v) => write!(f, "Short({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Long(v) => write!(f, "Long({})", v),
            Value::Array(Some(a)) => write!(f, "Array({}; {})", a.array_type(), a.len()),
            Value::Array(None) => f.write_str("Array(null)"),
            // Class name only, nested objects may be shared
            Value::Object(Some(o)) => write!(f, "Object({})", o.class().name()),
            Value::Object(None) => f.write_str("Object(null)"),
        }
    }
}

/// An instance of a managed class.
pub struct Object {
    class: ClassRef,
    slots: Mutex<Vec<Value>>,
}

pub type ObjectRef = Arc<Object>;

macro_rules! primitive_accessors {
    ($($get:ident, $set:ident, $variant:ident, $ty:ty;)*) => {
        $(
            pub fn $get(&self, id: FieldId) -> Result<$ty> {
                match self.get(id)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(self.slot_mismatch(id, &other)),
                }
            }

            pub fn $set(&self, id: FieldId, value: $ty) -> Result<()> {
                self.set(id, Value::$variant(value))
            }
        )*
    };
}

impl Object {
    /// Allocate an instance with every slot at its zero value.
    pub fn new(class: ClassRef) -> ObjectRef {
        let slots = class
            .fields()
            .iter()
            .map(|f| Value::default_for(f.ty()))
            .collect();
        Arc::new(Object {
            class,
            slots: Mutex::new(slots),
        })
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn get(&self, id: FieldId) -> Result<Value> {
        self.lock()
            .get(id.index())
            .cloned()
            .ok_or_else(|| self.unknown_slot(id))
    }

    pub fn set(&self, id: FieldId, value: Value) -> Result<()> {
        let decl = self.class.decl(id).ok_or_else(|| self.unknown_slot(id))?;
        if !value.fits(decl.ty()) {
            return Err(self.slot_mismatch(id, &value));
        }
        let mut slots = self.lock();
        match slots.get_mut(id.index()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.unknown_slot(id)),
        }
    }

    primitive_accessors! {
        get_boolean, set_boolean, Boolean, bool;
        get_char, set_char, Char, u16;
        get_short, set_short, Short, i16;
        get_int, set_int, Int, i32;
        get_long, set_long, Long, i64;
    }

    pub fn get_array(&self, id: FieldId) -> Result<Option<ArrayRef>> {
        match self.get(id)? {
            Value::Array(v) => Ok(v),
            other => Err(self.slot_mismatch(id, &other)),
        }
    }

    pub fn get_object(&self, id: FieldId) -> Result<Option<ObjectRef>> {
        match self.get(id)? {
            Value::Object(v) => Ok(v),
            other => Err(self.slot_mismatch(id, &other)),
        }
    }

    pub fn set_object(&self, id: FieldId, value: Option<ObjectRef>) -> Result<()> {
        self.set(id, Value::Object(value))
    }

    pub fn set_array(&self, id: FieldId, value: Option<ArrayRef>) -> Result<()> {
        self.set(id, Value::Array(value))
    }

    /// Read a field by name. Resolves on every call.
    pub fn field(&self, name: &str) -> Option<Value> {
        let (id, _) = self.class.field_named(name)?;
        self.get(id).ok()
    }

    /// Write a field by name. Resolves on every call.
    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        let (id, _) = self
            .class
            .field_named(name)
            .ok_or_else(|| BridgeError::schema(self.class.name(), format!("no field `{}`", name)))?;
        self.set(id, value)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unknown_slot(&self, id: FieldId) -> BridgeError {
        BridgeError::schema(self.class.name(), format!("no field slot #{}", id.index()))
    }

    fn slot_mismatch(&self, id: FieldId, value: &Value) -> BridgeError {
        let declared = self
            .class
            .decl(id)
            .map(|d| format!("`{}` is declared {}", d.name(), d.ty()))
            .unwrap_or_else(|| format!("slot #{}", id.index()));
        BridgeError::schema(self.class.name(), format!("{} but holds {:?}", declared, value))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.lock();
        let mut s = f.debug_struct(self.class.name());
        for (decl, value) in self.class.fields().iter().zip(slots.iter()) {
            s.field(decl.name(), value);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::{Array, Class};

    fn coord_class() -> ClassRef {
        Class::builder("Coord")
            .field("x", FieldType::Short)
            .field("y", FieldType::Short)
            .build()
    }

    #[test]
    fn test_new_object_is_zeroed() {
        let obj = Object::new(coord_class());
        assert_eq!(obj.field("x"), Some(Value::Short(0)));
        assert_eq!(obj.field("y"), Some(Value::Short(0)));
        assert_eq!(obj.field("z"), None);
    }

    #[test]
    fn test_typed_accessors() {
        let class = coord_class();
        let x = class.field_id("x", FieldType::Short).unwrap();
        let obj = Object::new(class);

        obj.set_short(x, -7).unwrap();
        assert_eq!(obj.get_short(x).unwrap(), -7);
        assert!(obj.get_int(x).unwrap_err().is_schema_mismatch());
        assert!(obj.set_int(x, 1).unwrap_err().is_schema_mismatch());
    }

    #[test]
    fn test_reference_slots_check_type() {
        let holder = Class::builder("Holder")
            .field("pos", FieldType::Object("Coord"))
            .field("bytes", FieldType::ByteArray)
            .build();
        let obj = Object::new(holder);

        obj.set_field("pos", Value::Object(Some(Object::new(coord_class()))))
            .unwrap();
        let other = Object::new(Class::builder("Other").build());
        assert!(obj.set_field("pos", Value::Object(Some(other))).is_err());

        obj.set_field("bytes", Value::Array(Some(Array::zeroed::<u8>(4))))
            .unwrap();
        assert!(obj
            .set_field("bytes", Value::Array(Some(Array::zeroed::<i32>(4))))
            .is_err());
        obj.set_field("bytes", Value::Array(None)).unwrap();
    }
}
