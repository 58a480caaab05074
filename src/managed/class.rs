//! Class shapes and reflective field lookup.

use std::fmt;
use std::sync::Arc;

/// Declared type of a managed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    /// One UTF-16 code unit
    Char,
    Short,
    Int,
    Long,
    ByteArray,
    CharArray,
    IntArray,
    /// Reference to an instance of the named class
    Object(&'static str),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Char => f.write_str("C"),
            FieldType::Short => f.write_str("S"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::ByteArray => f.write_str("[B"),
            FieldType::CharArray => f.write_str("[C"),
            FieldType::IntArray => f.write_str("[I"),
            FieldType::Object(name) => write!(f, "L{};", name),
        }
    }
}

/// Opaque handle to a resolved field slot.
///
/// Only meaningful together with the class it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(u32);

impl FieldId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    name: String,
    ty: FieldType,
}

impl FieldDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }
}

/// A managed type: a name and an ordered list of fields.
///
/// Two classes are interchangeable for marshalling when their names and
/// field declarations are equal, which is what `PartialEq` compares.
#[derive(Debug, PartialEq, Eq)]
pub struct Class {
    name: String,
    fields: Vec<FieldDecl>,
}

pub type ClassRef = Arc<Class>;

impl Class {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Reflective lookup: both the name and the declared type must match.
    pub fn field_id(&self, name: &str, ty: FieldType) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.name == name && f.ty == ty)
            .map(|i| FieldId(i as u32))
    }

    /// Lookup by name only (slow path used by `Object::field`).
    pub fn field_named(&self, name: &str) -> Option<(FieldId, FieldType)> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| (FieldId(i as u32), self.fields[i].ty))
    }

    pub(crate) fn decl(&self, id: FieldId) -> Option<&FieldDecl> {
        self.fields.get(id.index())
    }

    pub fn same_shape(this: &ClassRef, other: &ClassRef) -> bool {
        Arc::ptr_eq(this, other) || **this == **other
    }
}

/// Builder for [`Class`].
pub struct ClassBuilder {
    name: String,
    fields: Vec<FieldDecl>,
}

impl ClassBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn build(self) -> ClassRef {
        Arc::new(Class {
            name: self.name,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup_requires_matching_type() {
        let class = Class::builder("Coord")
            .field("x", FieldType::Short)
            .field("y", FieldType::Short)
            .build();

        assert!(class.field_id("x", FieldType::Short).is_some());
        assert_eq!(class.field_id("x", FieldType::Int), None);
        assert_eq!(class.field_id("z", FieldType::Short), None);
        assert_ne!(
            class.field_id("x", FieldType::Short),
            class.field_id("y", FieldType::Short)
        );
    }

    #[test]
    fn test_signatures() {
        assert_eq!(FieldType::Long.to_string(), "J");
        assert_eq!(FieldType::ByteArray.to_string(), "[B");
        assert_eq!(FieldType::Object("Coord").to_string(), "LCoord;");
    }

    #[test]
    fn test_same_shape_is_structural() {
        let a = Class::builder("Menu").field("commandId", FieldType::Int).build();
        let b = Class::builder("Menu").field("commandId", FieldType::Int).build();
        let c = Class::builder("Menu").field("commandId", FieldType::Long).build();

        assert!(Class::same_shape(&a, &b));
        assert!(!Class::same_shape(&a, &c));
    }
}
