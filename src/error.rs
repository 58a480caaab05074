//! Error types shared by the marshalling layer, the facades and the bridge.
//!
//! Two failure classes leave this crate as errors:
//!
//! - **Schema mismatches**: the managed side no longer exposes a type or
//!   field the marshaller was built against. Not retryable.
//! - **Range violations**: a managed array is shorter than the native
//!   fixed-width region it has to fill.
//!
//! Native call failures are normally *not* errors: facade calls hand the
//! OS status code back verbatim. `NativeCall` is only used by the
//! helpers that already have to turn a status into a value, such as the
//! batched console reads.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("schema mismatch on `{class}`: {reason}")]
    SchemaMismatch { class: String, reason: String },

    #[error("array region out of range: need {required} elements, array holds {len}")]
    OutOfRange { required: usize, len: usize },

    #[error("{call} failed with status {status}")]
    NativeCall { call: &'static str, status: i64 },

    #[error("failed to allocate {0} bytes of native memory")]
    Alloc(usize),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BridgeError {
    pub(crate) fn schema(class: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::SchemaMismatch {
            class: class.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that mean the managed and native schemas disagree.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, BridgeError::SchemaMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
