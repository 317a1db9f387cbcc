#![forbid(unsafe_code)]

//! Headless in-memory document.
//!
//! A small element tree implementing [`Document`] and [`Element`] for tests
//! and for hosts that render markup without a browser. Only attribute
//! selectors are understood: `[attr]`, `[attr=value]`, `[attr="value"]` and
//! `[attr='value']`. Any other selector matches nothing.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::dom::{Document, Element};

/// Tags whose elements carry a `value` property.
const VALUE_TAGS: &[&str] = &["INPUT", "SELECT", "TEXTAREA", "BUTTON", "OPTION"];

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    input_type: Option<String>,
    value: Option<String>,
    checked: bool,
    inner_html: String,
    children: Vec<MemoryElement>,
}

/// A node of a [`MemoryDocument`]. Clones share the node.
#[derive(Clone, Default)]
pub struct MemoryElement {
    data: Rc<RefCell<ElementData>>,
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.borrow();
        f.debug_struct("MemoryElement")
            .field("tag", &data.tag)
            .field("attributes", &data.attributes)
            .field("children", &data.children.len())
            .finish()
    }
}

impl PartialEq for MemoryElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl MemoryElement {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            data: Rc::new(RefCell::new(ElementData {
                tag: tag.to_ascii_uppercase(),
                ..ElementData::default()
            })),
        }
    }

    /// An `INPUT` element of the given `type`.
    #[must_use]
    pub fn input(input_type: &str) -> Self {
        Self::new("input").with_type(input_type)
    }

    #[must_use]
    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.data
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_type(self, input_type: &str) -> Self {
        self.data.borrow_mut().input_type = Some(input_type.to_string());
        self
    }

    /// Give the element a `value` property, whatever its tag.
    #[must_use]
    pub fn with_value(self, value: &str) -> Self {
        self.data.borrow_mut().value = Some(value.to_string());
        self
    }

    #[must_use]
    pub fn with_checked(self, checked: bool) -> Self {
        self.data.borrow_mut().checked = checked;
        self
    }

    #[must_use]
    pub fn with_child(self, child: MemoryElement) -> Self {
        self.append(child);
        self
    }

    pub fn append(&self, child: MemoryElement) {
        self.data.borrow_mut().children.push(child);
    }

    #[must_use]
    pub fn checked(&self) -> bool {
        self.data.borrow().checked
    }

    #[must_use]
    pub fn inner_html(&self) -> String {
        self.data.borrow().inner_html.clone()
    }

    #[must_use]
    pub fn children(&self) -> Vec<MemoryElement> {
        self.data.borrow().children.clone()
    }

    fn matches(&self, selector: &Selector) -> bool {
        let data = self.data.borrow();
        match (data.attributes.get(&selector.name), &selector.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }

    fn collect_descendants(&self, selector: &Selector, out: &mut Vec<MemoryElement>) {
        for child in self.children() {
            if child.matches(selector) {
                out.push(child.clone());
            }
            child.collect_descendants(selector, out);
        }
    }
}

impl Element for MemoryElement {
    fn query_selector_all(&self, selector: &str) -> Vec<Self> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        self.collect_descendants(&selector, &mut out);
        out
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.data.borrow().attributes.get(name).cloned()
    }

    fn tag_name(&self) -> String {
        self.data.borrow().tag.clone()
    }

    fn input_type(&self) -> Option<String> {
        self.data.borrow().input_type.clone()
    }

    fn has_value_property(&self) -> bool {
        let data = self.data.borrow();
        data.value.is_some() || VALUE_TAGS.contains(&data.tag.as_str())
    }

    fn value(&self) -> Option<String> {
        self.data.borrow().value.clone()
    }

    fn set_value(&self, value: &str) {
        self.data.borrow_mut().value = Some(value.to_string());
    }

    fn set_checked(&self, checked: bool) {
        self.data.borrow_mut().checked = checked;
    }

    fn set_inner_html(&self, html: &str) {
        self.data.borrow_mut().inner_html = html.to_string();
    }
}

/// A forest of [`MemoryElement`]s searched in document order.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    roots: Vec<MemoryElement>,
}

impl MemoryDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_root(mut self, element: MemoryElement) -> Self {
        self.roots.push(element);
        self
    }
}

impl Document for MemoryDocument {
    type Element = MemoryElement;

    fn query_selector(&self, selector: &str) -> Option<MemoryElement> {
        let selector = Selector::parse(selector)?;
        for root in &self.roots {
            if root.matches(&selector) {
                return Some(root.clone());
            }
            let mut found = Vec::new();
            root.collect_descendants(&selector, &mut found);
            if let Some(first) = found.into_iter().next() {
                return Some(first);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
struct Selector {
    name: String,
    value: Option<String>,
}

impl Selector {
    fn parse(source: &str) -> Option<Self> {
        let inner = source.trim().strip_prefix('[')?.strip_suffix(']')?;
        let Some((name, value)) = inner.split_once('=') else {
            let name = inner.trim();
            return (!name.is_empty()).then(|| Self {
                name: name.to_string(),
                value: None,
            });
        };
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = match value.chars().next() {
            Some(quote @ ('"' | '\'')) => unquote(value, quote)?,
            _ => value.to_string(),
        };
        Some(Self {
            name: name.to_string(),
            value: Some(value),
        })
    }
}

fn unquote(value: &str, quote: char) -> Option<String> {
    let body = value.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(c);
        }
    }
    Some(out)
}
