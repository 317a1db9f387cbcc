#![forbid(unsafe_code)]

//! Abstract document interface the binder writes into.
//!
//! The binder never touches a concrete DOM. Hosts implement [`Document`] and
//! [`Element`] over whatever tree they own (a browser DOM through bindings,
//! a server-side template tree, or [`crate::memory`] in tests).
//!
//! Element handles follow DOM semantics: they are cheap to clone, every clone
//! refers to the same node, and setters take `&self`.

/// A tree that can be searched for a scope container.
pub trait Document {
    type Element: Element;

    /// The first element matching `selector`, in document order.
    fn query_selector(&self, selector: &str) -> Option<Self::Element>;
}

/// A handle to one node of a [`Document`].
pub trait Element: Clone {
    /// Every descendant matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<Self>;

    fn attribute(&self, name: &str) -> Option<String>;

    /// Upper-case tag name (`INPUT`, `SELECT`, `DIV`, ...).
    fn tag_name(&self) -> String;

    /// The `type` of an input element, if it has one.
    fn input_type(&self) -> Option<String>;

    /// Whether the element exposes a settable `value` property.
    fn has_value_property(&self) -> bool;

    fn value(&self) -> Option<String>;

    fn set_value(&self, value: &str);

    fn set_checked(&self, checked: bool);

    fn set_inner_html(&self, html: &str);
}

/// Attribute selector for `name`, optionally requiring `value`.
///
/// Values made only of identifier characters are written bare
/// (`[data-scope=scope]`); anything else is double-quoted.
#[must_use]
pub fn attribute_selector(name: &str, value: Option<&str>) -> String {
    match value {
        None => format!("[{name}]"),
        Some(value) if is_bare(value) => format!("[{name}={value}]"),
        Some(value) => {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            format!("[{name}=\"{escaped}\"]")
        }
    }
}

fn is_bare(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '-')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
