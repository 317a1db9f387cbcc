#![forbid(unsafe_code)]

//! Binds a [`databind_model::Model`] into a document tree.
//!
//! The binder is a plain consumer of the model's public interface: it reads
//! values with `Model::get` and writes them into elements found through the
//! [`dom`] traits. [`memory`] provides a headless document for tests.

pub mod binder;
pub mod convert;
pub mod dom;
pub mod error;
pub mod memory;

pub use binder::{
    BindReport, Binder, BinderConfig, ElementKind, FailurePolicy, SkippedBinding, apply,
};
pub use convert::{is_truthy, to_js_string};
pub use dom::{Document, Element, attribute_selector};
pub use error::{BindError, Result};
pub use memory::{MemoryDocument, MemoryElement};
