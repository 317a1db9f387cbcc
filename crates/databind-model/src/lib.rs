#![forbid(unsafe_code)]

//! Reactive attribute model.
//!
//! A [`Model`] stores JSON values under top-level attribute names, resolves
//! dotted and indexed [paths](Path) into them, evaluates [computed
//! properties](Model::computed) with automatic dependency tracking, and tells
//! a single observer about every path whose value changed.
//!
//! ```
//! use databind_model::{Model, json};
//!
//! let model = Model::new("profile");
//! model.attr("user", json!({"first": "Ada", "last": "Lovelace"})).unwrap();
//! model
//!     .computed("full", |m, _| {
//!         let first = m.get("user.first")?;
//!         let last = m.get("user.last")?;
//!         Ok(json!(format!("{} {}", first.as_str().unwrap_or(""), last.as_str().unwrap_or(""))))
//!     })
//!     .unwrap();
//! assert_eq!(model.get("full").unwrap(), json!("Ada Lovelace"));
//! ```

pub mod array;
pub mod computed;
pub mod error;
pub mod graph;
pub mod model;
pub mod path;

pub use array::ObservableArray;
pub use computed::Evaluator;
pub use error::{ModelError, Result};
pub use graph::ValueGraph;
pub use model::{Model, ModelConfig, Observer};
pub use path::{Key, Path, PathError, ResolutionFailure, ResolvedPath, Step};
pub use serde_json::{Value, json};
