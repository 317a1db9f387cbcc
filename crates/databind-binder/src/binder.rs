#![forbid(unsafe_code)]

//! One-way binding from a [`Model`] into a [`Document`].
//!
//! # Design
//!
//! [`Binder::bind`] locates the scope container (`[data-scope=<scope>]`),
//! reads `model.get(path)` for every descendant carrying `data-bind`, and
//! writes the value into the element according to its [`ElementKind`]:
//!
//! | Kind       | Property written                                      |
//! |------------|-------------------------------------------------------|
//! | `Checkbox` | `checked = Boolean(value)`                             |
//! | `Radio`    | `checked = (value === element.value)`                  |
//! | `Value`    | `value = String(value)` (`SELECT` or value-bearing)    |
//! | `Html`     | `innerHTML = String(value)`                            |
//!
//! Elements carrying `data-click` or `data-class` are located and counted in
//! the [`BindReport`]; no behavior is attached to them.
//!
//! # Failure Modes
//!
//! A path that fails to read either aborts the pass with
//! [`BindError::Model`] ([`FailurePolicy::Abort`], the default) or is logged,
//! recorded in [`BindReport::skipped`] and left untouched
//! ([`FailurePolicy::Skip`]). Elements bound before an abort keep their new
//! values.

use databind_model::{Model, ModelError, Value};
use tracing::{debug, warn};

use crate::convert::{is_truthy, to_js_string};
use crate::dom::{Document, Element, attribute_selector};
use crate::error::{BindError, Result};

/// What `bind` does when a bound path cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing element and return its error.
    #[default]
    Abort,
    /// Leave the failing element untouched and continue.
    Skip,
}

/// Attribute names and failure handling for a [`Binder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    pub bind_attribute: String,
    pub scope_attribute: String,
    pub click_attribute: String,
    pub class_attribute: String,
    pub failure_policy: FailurePolicy,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            bind_attribute: "data-bind".to_string(),
            scope_attribute: "data-scope".to_string(),
            click_attribute: "data-click".to_string(),
            class_attribute: "data-class".to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl BinderConfig {
    #[must_use]
    pub fn with_bind_attribute(mut self, name: impl Into<String>) -> Self {
        self.bind_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_scope_attribute(mut self, name: impl Into<String>) -> Self {
        self.scope_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_click_attribute(mut self, name: impl Into<String>) -> Self {
        self.click_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_class_attribute(mut self, name: impl Into<String>) -> Self {
        self.class_attribute = name.into();
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// How a bound element receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Checkbox,
    Radio,
    Value,
    Html,
}

impl ElementKind {
    /// Classify `element`. Input type wins over tag, tag over the generic
    /// `value` property.
    #[must_use]
    pub fn of<E: Element>(element: &E) -> Self {
        match element.input_type().as_deref() {
            Some("checkbox") => return Self::Checkbox,
            Some("radio") => return Self::Radio,
            _ => {}
        }
        if element.tag_name().eq_ignore_ascii_case("SELECT") || element.has_value_property() {
            Self::Value
        } else {
            Self::Html
        }
    }
}

/// A bound element left untouched under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBinding {
    pub path: String,
    pub error: ModelError,
}

/// Outcome of one [`Binder::bind`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Elements whose property was written.
    pub bound: usize,
    pub skipped: Vec<SkippedBinding>,
    pub click_targets: usize,
    pub class_targets: usize,
}

/// Pushes values of one [`Model`] into the matching scope of a [`Document`].
#[derive(Debug)]
pub struct Binder<D> {
    model: Model,
    document: D,
    config: BinderConfig,
}

impl<D: Document> Binder<D> {
    #[must_use]
    pub fn new(model: Model, document: D) -> Self {
        Self::with_config(model, document, BinderConfig::default())
    }

    #[must_use]
    pub fn with_config(model: Model, document: D, config: BinderConfig) -> Self {
        Self {
            model,
            document,
            config,
        }
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// The container element for the model's scope.
    pub fn scope_element(&self) -> Result<D::Element> {
        let scope = self.model.scope();
        let selector = attribute_selector(&self.config.scope_attribute, Some(scope));
        self.document
            .query_selector(&selector)
            .ok_or_else(|| BindError::ScopeNotFound {
                scope: scope.to_string(),
                selector,
            })
    }

    /// Write the current model values into every bound element of the scope.
    pub fn bind(&self) -> Result<BindReport> {
        let scope = self.scope_element()?;
        let elements = scope.query_selector_all(&attribute_selector(&self.config.bind_attribute, None));

        let span = tracing::debug_span!(
            "binder.bind",
            scope = self.model.scope(),
            elements = elements.len(),
            bound = tracing::field::Empty,
            skipped = tracing::field::Empty
        );
        let _span_guard = span.enter();

        let mut report = BindReport {
            click_targets: scope
                .query_selector_all(&attribute_selector(&self.config.click_attribute, None))
                .len(),
            class_targets: scope
                .query_selector_all(&attribute_selector(&self.config.class_attribute, None))
                .len(),
            ..BindReport::default()
        };

        for element in &elements {
            let Some(path) = element.attribute(&self.config.bind_attribute) else {
                continue;
            };
            match self.model.get(&path) {
                Ok(value) => {
                    apply(element, &value);
                    report.bound += 1;
                }
                Err(error) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        debug!(message = "binder.abort", path = path.as_str(), error = %error);
                        return Err(BindError::Model {
                            path,
                            source: error,
                        });
                    }
                    FailurePolicy::Skip => {
                        warn!(message = "binder.skip", path = path.as_str(), error = %error);
                        report.skipped.push(SkippedBinding { path, error });
                    }
                },
            }
        }

        span.record("bound", report.bound);
        span.record("skipped", report.skipped.len());
        Ok(report)
    }
}

/// Write `value` into `element` according to its kind.
pub fn apply<E: Element>(element: &E, value: &Value) {
    match ElementKind::of(element) {
        ElementKind::Checkbox => element.set_checked(is_truthy(value)),
        ElementKind::Radio => {
            let own = element.value();
            let checked = matches!((value, own), (Value::String(bound), Some(own)) if *bound == own);
            element.set_checked(checked);
        }
        ElementKind::Value => element.set_value(&to_js_string(value)),
        ElementKind::Html => element.set_inner_html(&to_js_string(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryElement;
    use serde_json::json;

    #[test]
    fn kind_dispatch_order() {
        assert_eq!(
            ElementKind::of(&MemoryElement::input("checkbox")),
            ElementKind::Checkbox
        );
        assert_eq!(
            ElementKind::of(&MemoryElement::input("radio").with_value("x")),
            ElementKind::Radio
        );
        assert_eq!(ElementKind::of(&MemoryElement::new("select")), ElementKind::Value);
        assert_eq!(ElementKind::of(&MemoryElement::input("text")), ElementKind::Value);
        assert_eq!(
            ElementKind::of(&MemoryElement::new("span").with_value("")),
            ElementKind::Value
        );
        assert_eq!(ElementKind::of(&MemoryElement::new("div")), ElementKind::Html);
    }

    #[test]
    fn radio_uses_strict_string_equality() {
        let radio = MemoryElement::input("radio").with_value("1").with_checked(true);
        apply(&radio, &json!(1));
        assert!(!radio.checked());
        apply(&radio, &json!("1"));
        assert!(radio.checked());
    }

    #[test]
    fn checkbox_uses_truthiness() {
        let checkbox = MemoryElement::input("checkbox");
        apply(&checkbox, &json!("yes"));
        assert!(checkbox.checked());
        apply(&checkbox, &json!(0));
        assert!(!checkbox.checked());
    }

    #[test]
    fn value_and_html_use_string_conversion() {
        let input = MemoryElement::input("text");
        apply(&input, &json!(3.0));
        assert_eq!(input.value().as_deref(), Some("3"));

        let div = MemoryElement::new("div");
        apply(&div, &json!(["a", "b"]));
        assert_eq!(div.inner_html(), "a,b");
    }

    #[test]
    fn config_builders() {
        let config = BinderConfig::default()
            .with_bind_attribute("x-bind")
            .with_scope_attribute("x-scope")
            .with_click_attribute("x-click")
            .with_class_attribute("x-class")
            .with_failure_policy(FailurePolicy::Skip);
        assert_eq!(config.bind_attribute, "x-bind");
        assert_eq!(config.scope_attribute, "x-scope");
        assert_eq!(config.click_attribute, "x-click");
        assert_eq!(config.class_attribute, "x-class");
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(BinderConfig::default().failure_policy, FailurePolicy::Abort);
    }
}
