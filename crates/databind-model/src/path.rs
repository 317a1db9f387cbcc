#![forbid(unsafe_code)]

//! Path expressions addressing values inside a [`Model`](crate::Model).
//!
//! A path is parsed once into a sequence of [`Step`]s and then resolved
//! against the attribute graph. Dynamic indices (`items[index]`) are kept as
//! nested paths until resolution, which turns a [`Path`] into a concrete
//! [`ResolvedPath`] made only of field names and integer indices.
//!
//! # Grammar
//!
//! ```text
//! path    := segment ('.' segment)*
//! segment := ident ('[' index ']')*
//!          | ident '(' [path (',' path)*] ')'     -- final segment only
//! index   := digits | path
//! ident   := [A-Za-z_$][A-Za-z0-9_$]*
//! ```
//!
//! Whitespace is accepted around a path, around index expressions and around
//! call arguments (`func(arg1, arg2)`), but not inside identifiers.
//!
//! # Invariants
//!
//! 1. A parsed [`Path`] is never empty and always starts with a named step.
//! 2. A [`Step::Call`] only ever appears as the last step.
//! 3. `Path::parse(&path.to_string())` yields an equal path.

use core::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One access step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Property lookup by name (`object.name`).
    Field(String),
    /// Literal array index (`items[0]`).
    Index(usize),
    /// Index produced by reading another path (`items[index]`).
    IndexByPath(Path),
    /// Direct function invocation with argument paths (`func(a, b)`).
    Call { name: String, args: Vec<Path> },
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    /// Parse a path expression.
    pub fn parse(source: &str) -> Result<Self, PathError> {
        let mut parser = Parser::new(source);
        let path = parser.path()?;
        if let Some(byte) = parser.peek() {
            return Err(parser.error(format!("unexpected character `{}`", byte as char)));
        }
        Ok(path)
    }

    /// The access steps, in traversal order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Name of the top-level attribute this path starts at.
    #[must_use]
    pub fn root_name(&self) -> &str {
        match &self.steps[0] {
            Step::Field(name) | Step::Call { name, .. } => name,
            // The parser never produces a path that starts with an index.
            Step::Index(_) | Step::IndexByPath(_) => "",
        }
    }

    /// Whether the final step is a function call.
    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(self.steps.last(), Some(Step::Call { .. }))
    }

    /// Whether this path is a single plain identifier.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        matches!(self.steps.as_slice(), [Step::Field(_)])
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Step::Index(index) => write!(f, "[{index}]")?,
                Step::IndexByPath(path) => write!(f, "[{path}]")?,
                Step::Call { name, args } => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    write!(f, "{name}(")?;
                    for (n, arg) in args.iter().enumerate() {
                        if n > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(")")?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolved paths
// ---------------------------------------------------------------------------

/// A concrete step of a [`ResolvedPath`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Field(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A path whose dynamic indices have all been evaluated.
///
/// This is the unit of dependency tracking: computed properties record the
/// resolved paths they read, and writes are matched against them with
/// [`ResolvedPath::relates_to`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResolvedPath {
    keys: Vec<Key>,
}

impl ResolvedPath {
    /// A path addressing a top-level attribute.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            keys: vec![Key::Field(name.into())],
        }
    }

    #[must_use]
    pub fn from_keys(keys: Vec<Key>) -> Self {
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn push(&mut self, key: Key) {
        self.keys.push(key);
    }

    /// Name of the top-level attribute, if the path starts with a field.
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        match self.keys.first() {
            Some(Key::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// The first `len` keys of this path.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            keys: self.keys[..len.min(self.keys.len())].to_vec(),
        }
    }

    /// Strict ancestors, nearest first, ending at the top-level attribute.
    pub fn ancestors(&self) -> impl Iterator<Item = ResolvedPath> + '_ {
        (1..self.keys.len()).rev().map(|len| self.prefix(len))
    }

    /// Whether `self` equals `other` or addresses one of its ancestors.
    ///
    /// Comparison is segment-wise, so `a` is a prefix of `a.b` and `a[0]` but
    /// not of `ab`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &ResolvedPath) -> bool {
        other.keys.starts_with(&self.keys)
    }

    /// Whether a change at one path can affect a value read at the other.
    #[must_use]
    pub fn relates_to(&self, other: &ResolvedPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 && matches!(key, Key::Field(_)) {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single segment could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The object has no such property.
    MissingKey,
    /// A field lookup was attempted on a scalar or array.
    NotAnObject,
    /// An index was applied to a value that is not a sequence.
    NotIndexable,
    /// The index is past the end of the sequence.
    OutOfRange { index: usize, len: usize },
    /// A dynamic index did not evaluate to a non-negative integer.
    NonIntegerIndex,
    /// The call target is not a computed property.
    NotCallable,
    /// Call syntax used where a storage location is required.
    CallNotAllowed,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey => f.write_str("no such key"),
            Self::NotAnObject => f.write_str("value is not an object"),
            Self::NotIndexable => f.write_str("value is not indexable"),
            Self::OutOfRange { index, len } => {
                write!(f, "index {index} out of range (length {len})")
            }
            Self::NonIntegerIndex => f.write_str("index is not a non-negative integer"),
            Self::NotCallable => f.write_str("not a computed property"),
            Self::CallNotAllowed => f.write_str("call syntax is not allowed here"),
        }
    }
}

/// Errors produced while parsing or resolving a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path `{path}` at byte {position}: {message}")]
    Syntax {
        path: String,
        position: usize,
        message: String,
    },

    #[error("cannot resolve `{segment}`{}: {reason}", after_partial(.partial))]
    Resolution {
        /// The offending segment (`name`, `[3]`, `func(..)`).
        segment: String,
        /// The portion of the path resolved before the failure.
        partial: String,
        reason: ResolutionFailure,
    },
}

fn after_partial(partial: &str) -> String {
    if partial.is_empty() {
        String::new()
    } else {
        format!(" in `{partial}`")
    }
}

impl PathError {
    #[must_use]
    pub fn resolution(
        segment: impl fmt::Display,
        partial: &ResolvedPath,
        reason: ResolutionFailure,
    ) -> Self {
        Self::Resolution {
            segment: segment.to_string(),
            partial: partial.to_string(),
            reason,
        }
    }

    /// The resolution failure, if this is a resolution error.
    #[must_use]
    pub fn failure(&self) -> Option<&ResolutionFailure> {
        match self {
            Self::Resolution { reason, .. } => Some(reason),
            Self::Syntax { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Deepest nesting of bracketed index paths and call arguments.
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::Syntax {
            path: self.source.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), PathError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.bump();
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected `{}`, found `{}`",
                byte as char, b as char
            ))),
            None => Err(self.error(format!("expected `{}`, found end of path", byte as char))),
        }
    }

    fn path(&mut self) -> Result<Path, PathError> {
        self.skip_ws();
        let mut steps = Vec::new();
        loop {
            let name = self.ident()?;
            if self.peek() == Some(b'(') {
                self.bump();
                let args = self.args()?;
                steps.push(Step::Call { name, args });
                if matches!(self.peek(), Some(b'.' | b'[' | b'(')) {
                    return Err(self.error("a call must be the final segment"));
                }
                break;
            }
            steps.push(Step::Field(name));
            while self.peek() == Some(b'[') {
                self.bump();
                steps.push(self.index()?);
                self.expect(b']')?;
            }
            if self.peek() == Some(b'.') {
                self.bump();
                continue;
            }
            break;
        }
        self.skip_ws();
        Ok(Path { steps })
    }

    /// Parse a path nested inside an index or an argument list.
    fn nested_path(&mut self) -> Result<Path, PathError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let path = self.path();
        self.depth -= 1;
        path
    }

    fn ident(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b'$' => self.bump(),
            Some(b) => {
                return Err(self.error(format!("expected identifier, found `{}`", b as char)));
            }
            None => return Err(self.error("expected identifier, found end of path")),
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
        {
            self.bump();
        }
        Ok(self.source[start..self.pos].to_string())
    }

    fn index(&mut self) -> Result<Step, PathError> {
        self.skip_ws();
        if !self.peek().is_some_and(|b| b.is_ascii_digit()) {
            return Ok(Step::IndexByPath(self.nested_path()?));
        }
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        let digits = &self.source[start..self.pos];
        let index = digits
            .parse::<usize>()
            .map_err(|_| self.error(format!("index `{digits}` is too large")))?;
        self.skip_ws();
        Ok(Step::Index(index))
    }

    fn args(&mut self) -> Result<Vec<Path>, PathError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b')') {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.nested_path()?);
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b')') => {
                    self.bump();
                    return Ok(args);
                }
                Some(b) => {
                    return Err(self.error(format!("expected `,` or `)`, found `{}`", b as char)));
                }
                None => return Err(self.error("unterminated argument list")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Step {
        Step::Field(name.to_string())
    }

    fn parse(source: &str) -> Path {
        Path::parse(source).expect("valid path")
    }

    #[test]
    fn parses_dotted_fields() {
        let path = parse("object.prop.prop2");
        assert_eq!(
            path.steps(),
            &[field("object"), field("prop"), field("prop2")]
        );
        assert_eq!(path.root_name(), "object");
        assert!(!path.is_call());
    }

    #[test]
    fn parses_literal_and_dynamic_indices() {
        let path = parse("object.items[0].firstName");
        assert_eq!(
            path.steps(),
            &[
                field("object"),
                field("items"),
                Step::Index(0),
                field("firstName")
            ]
        );

        let dynamic = parse("items[index]");
        assert_eq!(
            dynamic.steps(),
            &[field("items"), Step::IndexByPath(parse("index"))]
        );
    }

    #[test]
    fn parses_nested_and_repeated_brackets() {
        let path = parse("grid[rows[0]][ 2 ]");
        assert_eq!(
            path.steps(),
            &[
                field("grid"),
                Step::IndexByPath(parse("rows[0]")),
                Step::Index(2)
            ]
        );
    }

    #[test]
    fn parses_call_with_arguments() {
        let path = parse("func(arg1, arg2)");
        assert!(path.is_call());
        assert_eq!(
            path.steps(),
            &[Step::Call {
                name: "func".to_string(),
                args: vec![parse("arg1"), parse("arg2")],
            }]
        );

        let empty = parse("now()");
        assert_eq!(
            empty.steps(),
            &[Step::Call {
                name: "now".to_string(),
                args: vec![],
            }]
        );
    }

    #[test]
    fn call_must_be_final() {
        let err = Path::parse("func(a).b").unwrap_err();
        assert!(matches!(err, PathError::Syntax { .. }));
        assert!(err.to_string().contains("final segment"));
    }

    #[test]
    fn rejects_malformed_paths() {
        for source in [
            "", ".a", "a.", "a[", "a[]", "a[1", "a[1x]", "1a", "a..b", "f(a", "f(a b)", "a b",
        ] {
            assert!(Path::parse(source).is_err(), "{source:?} should not parse");
        }

        let deep_index = "a[".repeat(50_000);
        assert!(matches!(
            Path::parse(&deep_index),
            Err(PathError::Syntax { ref message, .. }) if message.contains("nesting")
        ));
        let deep_call = "f(".repeat(50_000);
        assert!(matches!(
            Path::parse(&deep_call),
            Err(PathError::Syntax { ref message, .. }) if message.contains("nesting")
        ));
    }

    #[test]
    fn nesting_limit_is_inclusive() {
        let nested = |levels: usize| format!("{}a{}", "a[".repeat(levels), "]".repeat(levels));
        assert!(Path::parse(&nested(MAX_NESTING)).is_ok());
        assert!(Path::parse(&nested(MAX_NESTING + 1)).is_err());
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = Path::parse("items[0]#").unwrap_err();
        assert_eq!(
            err,
            PathError::Syntax {
                path: "items[0]#".to_string(),
                position: 8,
                message: "unexpected character `#`".to_string(),
            }
        );
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(parse(" a.b[ 1 ].c ").to_string(), "a.b[1].c");
        assert_eq!(parse("f( x ,y[i] )").to_string(), "f(x, y[i])");
    }

    #[test]
    fn resolved_path_display_and_ancestors() {
        let path = ResolvedPath::from_keys(vec![
            Key::Field("object".into()),
            Key::Field("items".into()),
            Key::Index(0),
            Key::Field("firstName".into()),
        ]);
        assert_eq!(path.to_string(), "object.items[0].firstName");
        let ancestors: Vec<String> = path.ancestors().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, ["object.items[0]", "object.items", "object"]);
        assert_eq!(ResolvedPath::root("arr").ancestors().count(), 0);
    }

    #[test]
    fn prefix_relation_is_segment_wise() {
        let a = ResolvedPath::root("a");
        let ab = ResolvedPath::root("ab");
        let mut a_b = ResolvedPath::root("a");
        a_b.push(Key::Field("b".into()));
        let mut a_0 = ResolvedPath::root("a");
        a_0.push(Key::Index(0));

        assert!(a.is_prefix_of(&a_b));
        assert!(a.is_prefix_of(&a_0));
        assert!(a.is_prefix_of(&a));
        assert!(!a.is_prefix_of(&ab));
        assert!(a_b.relates_to(&a));
        assert!(!a_b.relates_to(&a_0));
    }

    #[test]
    fn resolution_error_message() {
        let err = PathError::resolution(
            "missing",
            &ResolvedPath::root("object"),
            ResolutionFailure::MissingKey,
        );
        assert_eq!(
            err.to_string(),
            "cannot resolve `missing` in `object`: no such key"
        );
        let root = PathError::resolution(
            "nope",
            &ResolvedPath::default(),
            ResolutionFailure::MissingKey,
        );
        assert_eq!(root.to_string(), "cannot resolve `nope`: no such key");
    }
}
