//! termbridge - terminal and console marshalling between a managed object
//! model and the native OS terminal APIs.
//!
//! A line-editing runtime keeps terminal state in reflective managed
//! objects (`Termios`, `WinSize`, console records); the OS wants fixed
//! native layouts. termbridge sits between the two.
//!
//! # Layers
//!
//! - **managed**: the reflective object model (classes, objects, arrays)
//! - **native**: native structure layouts and platform constants
//! - **marshal**: the field descriptor cache and managed <-> native copies
//! - **facade**: the POSIX or Windows terminal surface, one per target
//! - **bridge**: wrapping raw descriptors in managed descriptor objects
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use termbridge::facade::platform_facade;
//! use termbridge::managed::Runtime;
//!
//! let runtime = Arc::new(Runtime::with_standard_classes());
//! let facade = platform_facade(runtime);
//! println!("stdin is a tty: {}", facade.is_tty(0));
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod facade;
pub mod managed;
pub mod marshal;
pub mod native;

pub use bridge::DescriptorBridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use facade::{configured_facade, platform_facade, Platform, TerminalFacade};
pub use managed::Runtime;
pub use marshal::{load_into, read_into_native, write_from_native, NativeStruct, StructKind};
