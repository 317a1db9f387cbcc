#![forbid(unsafe_code)]

//! Databind public facade crate.
//!
//! Re-exports the reactive model and the document binder.
//!
//! ```
//! use databind::prelude::*;
//!
//! let model = Model::new("profile");
//! model.attr("name", "Ada").unwrap();
//!
//! let title = MemoryElement::new("h1").with_attribute("data-bind", "name");
//! let scope = MemoryElement::new("div")
//!     .with_attribute("data-scope", "profile")
//!     .with_child(title.clone());
//! let binder = Binder::new(model, MemoryDocument::new().with_root(scope));
//! binder.bind().unwrap();
//! assert_eq!(title.inner_html(), "Ada");
//! ```

pub use databind_binder as binder;
pub use databind_model as model;

pub mod prelude {
    pub use databind_binder::{
        BindError, BindReport, Binder, BinderConfig, Document, Element, FailurePolicy,
        MemoryDocument, MemoryElement,
    };
    pub use databind_model::{
        Model, ModelConfig, ModelError, ObservableArray, Path, PathError, Value, json,
    };
}
