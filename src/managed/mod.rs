//! Managed object model.
//!
//! This is the reflection-visible side of the bridge. The marshaller never
//! defines the shape of these types; it only looks up the fields it
//! expects on whatever class an object carries and fails with a schema
//! mismatch when one is missing.
//!
//! - **class**: class shapes, field types and reflective lookup
//! - **object**: instances with typed slots
//! - **array**: shared primitive arrays (`byte[]`, `char[]`, `int[]`)
//! - **types**: the standard class shapes for every native structure kind

mod array;
mod class;
mod object;
pub mod types;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub use array::{Array, ArrayData, ArrayRef, Element};
pub use class::{Class, ClassBuilder, ClassRef, FieldDecl, FieldId, FieldType};
pub use object::{Object, ObjectRef, Value};

use crate::error::{BridgeError, Result};

/// Process-scoped class registry.
#[derive(Debug, Default)]
pub struct Runtime {
    classes: RwLock<HashMap<String, ClassRef>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime with every class in [`types`] registered.
    pub fn with_standard_classes() -> Self {
        let runtime = Self::new();
        types::install(&runtime);
        runtime
    }

    /// Register a class, replacing any previous class of the same name.
    pub fn define(&self, class: ClassRef) -> ClassRef {
        self.classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class.name().to_string(), class.clone());
        class
    }

    pub fn find_class(&self, name: &str) -> Option<ClassRef> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Allocate a bare instance: primitives zeroed, references absent.
    pub fn alloc_object(&self, name: &str) -> Result<ObjectRef> {
        let class = self
            .find_class(name)
            .ok_or_else(|| BridgeError::schema(name, "class not found"))?;
        Ok(Object::new(class))
    }

    /// Construct an instance the way the managed constructors do: nested
    /// structure fields get a fresh default instance and `c_cc` gets its
    /// control-character array. A field whose class is already being built
    /// further up (a self-referencing type) is left absent.
    pub fn new_object(&self, name: &str) -> Result<ObjectRef> {
        self.construct(name, &mut Vec::new())
    }

    fn construct(&self, name: &str, building: &mut Vec<String>) -> Result<ObjectRef> {
        let obj = self.alloc_object(name)?;
        building.push(name.to_string());
        for decl in obj.class().fields() {
            let value = match decl.ty() {
                FieldType::Object(child) if building.iter().any(|b| b == child) => continue,
                FieldType::Object(child) => {
                    Value::Object(Some(self.construct(child, building)?))
                }
                FieldType::ByteArray if decl.name() == types::TERMIOS_CC_FIELD => {
                    Value::Array(Some(Array::zeroed::<u8>(types::MANAGED_NCCS)))
                }
                _ => continue,
            };
            obj.set_field(decl.name(), value)?;
        }
        building.pop();
        Ok(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_class_is_schema_mismatch() {
        let runtime = Runtime::new();
        let err = runtime.new_object("Nope").unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn test_new_object_builds_nested_defaults() {
        let runtime = Runtime::with_standard_classes();
        let info = runtime.new_object(types::CONSOLE_SCREEN_BUFFER_INFO).unwrap();
        for name in ["size", "cursorPosition", "window", "maximumWindowSize"] {
            assert!(matches!(info.field(name), Some(Value::Object(Some(_)))), "{}", name);
        }

        let termios = runtime.new_object(types::TERMIOS).unwrap();
        match termios.field("c_cc") {
            Some(Value::Array(Some(cc))) => assert_eq!(cc.len(), types::MANAGED_NCCS),
            other => panic!("unexpected c_cc: {:?}", other),
        }
    }

    #[test]
    fn test_self_referencing_class_leaves_cycle_absent() {
        let runtime = Runtime::new();
        runtime.define(
            Class::builder("Node")
                .field("value", FieldType::Int)
                .field("next", FieldType::Object("Node"))
                .build(),
        );
        let node = runtime.new_object("Node").unwrap();
        assert_eq!(node.field("next"), Some(Value::Object(None)));

        // Indirect cycle: Parent -> Child -> Parent
        runtime.define(
            Class::builder("Parent")
                .field("child", FieldType::Object("Child"))
                .build(),
        );
        runtime.define(
            Class::builder("Child")
                .field("parent", FieldType::Object("Parent"))
                .field("sibling", FieldType::Object("Node"))
                .build(),
        );
        let parent = runtime.new_object("Parent").unwrap();
        let Some(Value::Object(Some(child))) = parent.field("child") else {
            panic!("child not built");
        };
        assert_eq!(child.field("parent"), Some(Value::Object(None)));
        assert!(matches!(child.field("sibling"), Some(Value::Object(Some(_)))));
    }

    #[test]
    fn test_alloc_object_leaves_references_absent() {
        let runtime = Runtime::with_standard_classes();
        let record = runtime.alloc_object(types::INPUT_RECORD).unwrap();
        assert_eq!(record.field("keyEvent"), Some(Value::Object(None)));
    }
}
