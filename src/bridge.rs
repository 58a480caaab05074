//! Descriptor bridge.
//!
//! Wraps raw OS descriptors in managed descriptor objects, and descriptor
//! objects in redirect-pipe objects a process launcher can consume. The
//! classes and fields are looked up once when the bridge is built; a
//! missing type or field fails construction with a schema mismatch.

use std::sync::Arc;

use tracing::debug;

use crate::config::DescriptorConfig;
use crate::error::{BridgeError, Result};
use crate::managed::{Class, ClassRef, FieldId, FieldType, Object, ObjectRef, Runtime};

#[derive(Debug)]
pub struct DescriptorBridge {
    runtime: Arc<Runtime>,
    descriptor_class: ClassRef,
    fd_field: FieldId,
    redirect_class: ClassRef,
    redirect_field: FieldId,
}

impl DescriptorBridge {
    pub fn new(runtime: Arc<Runtime>, config: &DescriptorConfig) -> Result<Self> {
        let descriptor_class = find_class(&runtime, &config.class)?;
        let fd_field = descriptor_class
            .field_id(&config.field, FieldType::Int)
            .ok_or_else(|| {
                BridgeError::schema(
                    descriptor_class.name(),
                    format!("no int field `{}`", config.field),
                )
            })?;

        let redirect_class = find_class(&runtime, &config.redirect_class)?;
        let redirect_field = match redirect_class.field_named(&config.redirect_field) {
            Some((id, FieldType::Object(target))) if target == descriptor_class.name() => id,
            _ => {
                return Err(BridgeError::schema(
                    redirect_class.name(),
                    format!(
                        "no field `{}` of type {}",
                        config.redirect_field,
                        descriptor_class.name()
                    ),
                ))
            }
        };

        debug!(
            "Descriptor bridge bound to {}.{} and {}.{}",
            descriptor_class.name(),
            config.field,
            redirect_class.name(),
            config.redirect_field
        );
        Ok(DescriptorBridge {
            runtime,
            descriptor_class,
            fd_field,
            redirect_class,
            redirect_field,
        })
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// A new descriptor object holding `raw_fd`. Ownership of the OS
    /// descriptor moves to the object.
    pub fn wrap_descriptor(&self, raw_fd: i32) -> Result<ObjectRef> {
        let descriptor = Object::new(self.descriptor_class.clone());
        descriptor.set_int(self.fd_field, raw_fd)?;
        Ok(descriptor)
    }

    /// A new redirect-pipe object embedding `descriptor`.
    pub fn wrap_redirect_pipe(&self, descriptor: &ObjectRef) -> Result<ObjectRef> {
        if !Class::same_shape(descriptor.class(), &self.descriptor_class) {
            return Err(BridgeError::schema(
                descriptor.class().name(),
                format!("expected a `{}`", self.descriptor_class.name()),
            ));
        }
        let pipe = Object::new(self.redirect_class.clone());
        pipe.set_object(self.redirect_field, Some(descriptor.clone()))?;
        Ok(pipe)
    }

    /// Raw descriptor held by a descriptor object.
    pub fn raw_descriptor(&self, descriptor: &Object) -> Result<i32> {
        descriptor.get_int(self.fd_field)
    }
}

fn find_class(runtime: &Runtime, name: &str) -> Result<ClassRef> {
    runtime
        .find_class(name)
        .ok_or_else(|| BridgeError::schema(name, "class not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::{types, Value};

    fn bridge() -> DescriptorBridge {
        DescriptorBridge::new(
            Arc::new(Runtime::with_standard_classes()),
            &DescriptorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_wrap_descriptor() {
        let bridge = bridge();
        let fd = bridge.wrap_descriptor(7).unwrap();
        assert_eq!(fd.class().name(), types::FILE_DESCRIPTOR);
        assert_eq!(fd.field("fd"), Some(Value::Int(7)));
        assert_eq!(bridge.raw_descriptor(&fd).unwrap(), 7);
    }

    #[test]
    fn test_wrap_redirect_pipe_embeds_descriptor() {
        let bridge = bridge();
        let fd = bridge.wrap_descriptor(3).unwrap();
        let pipe = bridge.wrap_redirect_pipe(&fd).unwrap();
        assert_eq!(pipe.class().name(), types::REDIRECT_PIPE);
        let Some(Value::Object(Some(inner))) = pipe.field("fd") else {
            panic!("descriptor not embedded");
        };
        assert!(Arc::ptr_eq(&inner, &fd));
    }

    #[test]
    fn test_redirect_pipe_rejects_foreign_object() {
        let bridge = bridge();
        let coord = bridge.runtime().new_object(types::COORD).unwrap();
        assert!(bridge
            .wrap_redirect_pipe(&coord)
            .unwrap_err()
            .is_schema_mismatch());
    }

    #[test]
    fn test_missing_class_or_field_fails_construction() {
        let runtime = Arc::new(Runtime::with_standard_classes());

        let missing_class = DescriptorConfig {
            class: "NoSuchDescriptor".to_string(),
            ..Default::default()
        };
        assert!(DescriptorBridge::new(runtime.clone(), &missing_class)
            .unwrap_err()
            .is_schema_mismatch());

        let missing_field = DescriptorConfig {
            field: "handle".to_string(),
            ..Default::default()
        };
        assert!(DescriptorBridge::new(runtime.clone(), &missing_field)
            .unwrap_err()
            .is_schema_mismatch());

        // The redirect field must hold the configured descriptor type
        runtime.define(
            Class::builder("LooseRedirect")
                .field("fd", FieldType::Int)
                .build(),
        );
        let wrong_type = DescriptorConfig {
            redirect_class: "LooseRedirect".to_string(),
            ..Default::default()
        };
        assert!(DescriptorBridge::new(runtime, &wrong_type)
            .unwrap_err()
            .is_schema_mismatch());
    }

    #[test]
    fn test_custom_descriptor_type() {
        let runtime = Arc::new(Runtime::new());
        runtime.define(
            Class::builder("Handle")
                .field("value", FieldType::Int)
                .build(),
        );
        runtime.define(
            Class::builder("Inherit")
                .field("target", FieldType::Object("Handle"))
                .build(),
        );
        let config = DescriptorConfig {
            class: "Handle".to_string(),
            field: "value".to_string(),
            redirect_class: "Inherit".to_string(),
            redirect_field: "target".to_string(),
        };
        let bridge = DescriptorBridge::new(runtime, &config).unwrap();
        let handle = bridge.wrap_descriptor(0x1F4).unwrap();
        let inherit = bridge.wrap_redirect_pipe(&handle).unwrap();
        assert!(matches!(inherit.field("target"), Some(Value::Object(Some(_)))));
    }
}
