#![forbid(unsafe_code)]

//! The reactive attribute model.
//!
//! A [`Model`] maps top-level attribute names to either a stored JSON value
//! or a computed property. Values are read and written by [path](crate::path)
//! and a single change observer is told about every path whose value
//! changed, including computed properties that transitively depend on it.
//!
//! # Architecture
//!
//! `Model` is a cheap, cloneable handle over `Rc` shared state with interior
//! mutability, so evaluators and the observer can call back into the same
//! model. No `RefCell` borrow is held while user code runs.
//!
//! Writes (through [`Model::attr`] or an [`ObservableArray`]) all end in one
//! propagation routine: it walks computed properties breadth-first, marking
//! every one whose recorded dependencies relate to a changed path (or to an
//! already affected computed) as dirty, then reports the written paths
//! followed by each affected computed name to the observer.
//!
//! # Invariants
//!
//! 1. `get` never returns a stale computed value.
//! 2. Every path and computed name is reported at most once per write.
//! 3. Reads made by the observer are never attributed to an evaluation that
//!    happens to be in progress.
//! 4. A failed write or read leaves no notification behind.

use std::cell::RefCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::array::ObservableArray;
use crate::computed::{ComputedCell, Evaluator, Tracker};
use crate::error::{ModelError, Result};
use crate::graph::{self, ValueGraph};
use crate::path::{Key, Path, PathError, ResolutionFailure, ResolvedPath, Step};

/// Change observer callback. Receives the changed path.
pub type Observer = Rc<dyn Fn(&str)>;

/// Configuration for model behavior.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Maximum number of nested computed evaluations before failing.
    pub max_evaluation_depth: usize,
    /// Treat computed properties that have never evaluated successfully as
    /// affected by every write.
    pub notify_undiscovered: bool,
    /// Create an empty object or array for an unknown top-level name when a
    /// nested path below it is written.
    pub create_missing_roots: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_evaluation_depth: 64,
            notify_undiscovered: true,
            create_missing_roots: true,
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn with_max_evaluation_depth(mut self, depth: usize) -> Self {
        self.max_evaluation_depth = depth;
        self
    }

    #[must_use]
    pub fn with_notify_undiscovered(mut self, notify: bool) -> Self {
        self.notify_undiscovered = notify;
        self
    }

    #[must_use]
    pub fn with_create_missing_roots(mut self, create: bool) -> Self {
        self.create_missing_roots = create;
        self
    }
}

enum Node {
    Value(Value),
    Computed(Rc<ComputedCell>),
}

struct ModelInner {
    scope: String,
    config: ModelConfig,
    root: RefCell<BTreeMap<String, Node>>,
    observer: RefCell<Option<Observer>>,
    tracker: Tracker,
}

/// A reactive attribute graph bound to one scope.
///
/// Cloning a `Model` creates a new handle to the **same** state.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.inner.root.borrow();
        let attributes: Vec<&String> = root.keys().collect();
        f.debug_struct("Model")
            .field("scope", &self.inner.scope)
            .field("attributes", &attributes)
            .field("observer", &self.inner.observer.borrow().is_some())
            .finish()
    }
}

impl Model {
    /// Create an empty model for `scope`.
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self::with_config(scope, ModelConfig::default())
    }

    #[must_use]
    pub fn with_config(scope: impl Into<String>, config: ModelConfig) -> Self {
        Self {
            inner: Rc::new(ModelInner {
                scope: scope.into(),
                config,
                root: RefCell::new(BTreeMap::new()),
                observer: RefCell::new(None),
                tracker: Tracker::default(),
            }),
        }
    }

    /// The scope identifier this model was created with.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.inner.config
    }

    /// Install the change observer, replacing any previous one.
    pub fn set_value_changed(&self, observer: impl Fn(&str) + 'static) {
        *self.inner.observer.borrow_mut() = Some(Rc::new(observer));
    }

    /// Remove the change observer.
    pub fn clear_value_changed(&self) {
        *self.inner.observer.borrow_mut() = None;
    }

    /// Register a computed property under `name`.
    ///
    /// The property starts dirty with no dependencies and replaces whatever
    /// was stored under `name`. Computed properties that read `name` are
    /// invalidated (without notification).
    pub fn computed(
        &self,
        name: &str,
        evaluator: impl Fn(&Model, &[Value]) -> Result<Value> + 'static,
    ) -> Result<()> {
        let path = Path::parse(name)?;
        if !path.is_identifier() {
            return Err(ModelError::InvalidName {
                name: name.to_string(),
            });
        }
        let name = path.root_name().to_string();
        let evaluator: Evaluator = Rc::new(evaluator);
        self.inner
            .root
            .borrow_mut()
            .insert(name.clone(), Node::Computed(Rc::new(ComputedCell::new(evaluator))));
        debug!(message = "model.computed.register", name = name.as_str());
        self.invalidate(vec![ResolvedPath::root(name)]);
        Ok(())
    }

    /// Write `value` at `path` and notify.
    ///
    /// The path must address a storage location: call syntax is rejected and
    /// nothing below a computed property can be written. Writing a top-level
    /// name always succeeds and replaces a computed property of that name.
    pub fn attr(&self, path: &str, value: impl Into<Value>) -> Result<()> {
        let parsed = Path::parse(path)?;
        reject_call(&parsed)?;
        let resolved = self.resolve(&parsed)?;
        self.store(&resolved, value.into())?;
        debug!(message = "model.attr", path, resolved = %resolved);
        self.propagate(vec![(path.trim().to_string(), resolved)]);
        Ok(())
    }

    /// Read the value at `path`.
    ///
    /// Computed properties along the way are evaluated (or served from
    /// cache). A trailing call segment invokes the computed evaluator
    /// directly with the argument values.
    pub fn get(&self, path: &str) -> Result<Value> {
        let parsed = Path::parse(path)?;
        self.read(&parsed)
    }

    /// Read a pre-parsed path.
    pub fn read(&self, path: &Path) -> Result<Value> {
        if let Some(Step::Call { name, args }) = path.steps().last() {
            if path.steps().len() > 1 {
                return Err(PathError::resolution(
                    format!("{name}(..)"),
                    &ResolvedPath::default(),
                    ResolutionFailure::NotCallable,
                )
                .into());
            }
            return self.invoke(name, args);
        }
        let resolved = self.resolve(path)?;
        self.inner.tracker.record(&resolved);
        self.read_resolved(&resolved)
    }

    /// An observable handle to the array stored at `path`.
    pub fn array(&self, path: &str) -> Result<ObservableArray> {
        let parsed = Path::parse(path)?;
        reject_call(&parsed)?;
        let resolved = self.resolve(&parsed)?;
        self.inner.tracker.record(&resolved);
        self.with_stored_array(&resolved, |_| Ok(()))?;
        Ok(ObservableArray::new(self.clone(), resolved))
    }

    /// Whether a top-level attribute or computed property named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.root.borrow().contains_key(name)
    }

    #[must_use]
    pub fn is_computed(&self, name: &str) -> bool {
        self.computed_cell(name).is_some()
    }

    /// Whether computed `name` needs re-evaluation. `None` if `name` is not a
    /// computed property.
    #[must_use]
    pub fn is_dirty(&self, name: &str) -> Option<bool> {
        self.computed_cell(name).map(|cell| cell.is_dirty())
    }

    /// Number of successful evaluations of computed `name`.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.computed_cell(name).map(|cell| cell.version())
    }

    /// The dependencies recorded by the last successful evaluation of
    /// computed `name`, as canonical path strings in sorted order.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> Option<Vec<String>> {
        self.computed_cell(name).map(|cell| {
            cell.dependencies()
                .iter()
                .map(ResolvedPath::to_string)
                .collect()
        })
    }

    fn computed_cell(&self, name: &str) -> Option<Rc<ComputedCell>> {
        match self.inner.root.borrow().get(name) {
            Some(Node::Computed(cell)) => Some(Rc::clone(cell)),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Turn a parsed path into a concrete location, evaluating dynamic
    /// indices against the model.
    fn resolve(&self, path: &Path) -> Result<ResolvedPath> {
        let mut resolved = ResolvedPath::default();
        for step in path.steps() {
            match step {
                Step::Field(name) => resolved.push(Key::Field(name.clone())),
                Step::Index(index) => resolved.push(Key::Index(*index)),
                Step::IndexByPath(index_path) => {
                    let value = self.read(index_path)?;
                    let index = value.as_index().ok_or_else(|| {
                        PathError::resolution(
                            format!("[{index_path}]"),
                            &resolved,
                            ResolutionFailure::NonIntegerIndex,
                        )
                    })?;
                    resolved.push(Key::Index(index));
                }
                Step::Call { name, .. } => {
                    return Err(PathError::resolution(
                        format!("{name}(..)"),
                        &resolved,
                        ResolutionFailure::CallNotAllowed,
                    )
                    .into());
                }
            }
        }
        Ok(resolved)
    }

    fn read_resolved(&self, resolved: &ResolvedPath) -> Result<Value> {
        let name = root_name(resolved);
        let cell = {
            let root = self.inner.root.borrow();
            match root.get(name) {
                None => return Err(missing_root(name).into()),
                Some(Node::Value(value)) => return Ok(graph::read(value, resolved, 1)?.clone()),
                Some(Node::Computed(cell)) => Rc::clone(cell),
            }
        };
        let value = self.evaluate(name, &cell)?;
        Ok(graph::read(&value, resolved, 1)?.clone())
    }

    /// Evaluate computed `name` with dependency tracking, or serve its cache.
    fn evaluate(&self, name: &str, cell: &ComputedCell) -> Result<Value> {
        if let Some(value) = cell.fresh_value() {
            return Ok(value);
        }
        self.check_nesting(name)?;
        let tracker = &self.inner.tracker;

        let span = tracing::debug_span!(
            "model.computed.evaluate",
            name,
            dependency_count = tracing::field::Empty
        );
        let _span_guard = span.enter();

        let evaluator = cell.evaluator();
        let frame = tracker.enter(name);
        let result = evaluator(self, &[]);
        let dependencies = frame.finish();

        match result {
            Ok(value) => {
                span.record("dependency_count", dependencies.len());
                cell.store(value.clone(), dependencies);
                Ok(value)
            }
            Err(err) => {
                debug!(message = "model.computed.failed", name, error = %err);
                Err(ModelError::evaluation(name, err))
            }
        }
    }

    /// Call computed `name` directly with resolved argument values.
    fn invoke(&self, name: &str, args: &[Path]) -> Result<Value> {
        let cell = self.computed_cell(name).ok_or_else(|| {
            let reason = if self.contains(name) {
                ResolutionFailure::NotCallable
            } else {
                ResolutionFailure::MissingKey
            };
            PathError::resolution(format!("{name}(..)"), &ResolvedPath::default(), reason)
        })?;
        let tracker = &self.inner.tracker;
        self.check_nesting(name)?;
        let values = args
            .iter()
            .map(|arg| self.read(arg))
            .collect::<Result<Vec<_>>>()?;
        tracker.record(&ResolvedPath::root(name));
        trace!(message = "model.invoke", name, argc = values.len());
        let evaluator = cell.evaluator();
        let _frame = tracker.invoke(name);
        evaluator(self, &values).map_err(|err| ModelError::evaluation(name, err))
    }

    /// Fail if entering `name` would close a cycle or exceed the nesting cap.
    fn check_nesting(&self, name: &str) -> Result<()> {
        let tracker = &self.inner.tracker;
        if let Some(chain) = tracker.cycle_through(name) {
            return Err(ModelError::CyclicDependency { chain });
        }
        let depth = self.inner.config.max_evaluation_depth;
        if tracker.depth() >= depth {
            return Err(ModelError::EvaluationDepthExceeded { depth });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    fn store(&self, resolved: &ResolvedPath, value: Value) -> Result<()> {
        let name = root_name(resolved);
        let mut root = self.inner.root.borrow_mut();
        if resolved.len() == 1 {
            root.insert(name.to_string(), Node::Value(value));
            return Ok(());
        }
        let created = match root.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) if self.inner.config.create_missing_roots => {
                entry.insert(Node::Value(graph::container_for(&resolved.keys()[1])));
                true
            }
            Entry::Vacant(_) => return Err(missing_root(name).into()),
        };
        let result = match root.get_mut(name) {
            Some(Node::Value(stored)) => {
                graph::assign(stored, resolved, 1, value).map_err(ModelError::from)
            }
            Some(Node::Computed(_)) => Err(ModelError::NotWritable {
                path: resolved.to_string(),
            }),
            None => Err(missing_root(name).into()),
        };
        if result.is_err() && created {
            root.remove(name);
        }
        result
    }

    /// Run `f` on the array stored at `resolved`.
    ///
    /// The root map stays mutably borrowed while `f` runs, so `f` must not
    /// call back into the model.
    pub(crate) fn with_stored_array<R>(
        &self,
        resolved: &ResolvedPath,
        f: impl FnOnce(&mut Vec<Value>) -> Result<R>,
    ) -> Result<R> {
        let name = root_name(resolved);
        let mut root = self.inner.root.borrow_mut();
        let stored = match root.get_mut(name) {
            None => return Err(missing_root(name).into()),
            Some(Node::Computed(_)) => {
                return Err(ModelError::NotWritable {
                    path: resolved.to_string(),
                });
            }
            Some(Node::Value(value)) => graph::traverse_mut(value, resolved, 1, resolved.len())?,
        };
        match stored {
            Value::Array(items) => f(items),
            _ => Err(ModelError::NotAnArray {
                path: resolved.to_string(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    /// Notify after a structural change to the array at `owner`: the owner
    /// itself, then every strict ancestor.
    pub(crate) fn propagate_array_change(&self, owner: &ResolvedPath) {
        let changes = std::iter::once(owner.clone())
            .chain(owner.ancestors())
            .map(|path| (path.to_string(), path))
            .collect();
        self.propagate(changes);
    }

    /// Invalidate dependents of `changes` and report everything affected.
    fn propagate(&self, changes: Vec<(String, ResolvedPath)>) {
        let affected = self.invalidate(changes.iter().map(|(_, path)| path.clone()).collect());
        trace!(
            message = "model.propagate",
            changed = changes.len(),
            affected = affected.len()
        );

        let observer = self.inner.observer.borrow().clone();
        let Some(observer) = observer else {
            return;
        };
        let _suspended = self.inner.tracker.suspend();
        for (path, _) in &changes {
            observer(path);
        }
        for name in &affected {
            observer(name);
        }
    }

    /// Mark every computed transitively affected by `seeds` dirty and return
    /// their names in discovery order.
    fn invalidate(&self, seeds: Vec<ResolvedPath>) -> Vec<String> {
        let computeds: Vec<(String, Rc<ComputedCell>)> = self
            .inner
            .root
            .borrow()
            .iter()
            .filter_map(|(name, node)| match node {
                Node::Computed(cell) => Some((name.clone(), Rc::clone(cell))),
                Node::Value(_) => None,
            })
            .collect();
        let assume_undiscovered = self.inner.config.notify_undiscovered;

        let mut visited = BTreeSet::new();
        let mut affected = Vec::new();
        let mut queue: VecDeque<ResolvedPath> = seeds.into();
        while let Some(changed) = queue.pop_front() {
            for (name, cell) in &computeds {
                if visited.contains(name) || !cell.depends_on(&changed, assume_undiscovered) {
                    continue;
                }
                visited.insert(name.clone());
                cell.invalidate();
                affected.push(name.clone());
                queue.push_back(ResolvedPath::root(name.clone()));
            }
        }
        affected
    }
}

fn root_name(resolved: &ResolvedPath) -> &str {
    resolved.root_name().unwrap_or_default()
}

fn missing_root(name: &str) -> PathError {
    PathError::resolution(name, &ResolvedPath::default(), ResolutionFailure::MissingKey)
}

fn reject_call(path: &Path) -> Result<()> {
    match path.steps().last() {
        Some(Step::Call { name, .. }) => Err(PathError::resolution(
            format!("{name}(..)"),
            &ResolvedPath::default(),
            ResolutionFailure::CallNotAllowed,
        )
        .into()),
        _ => Ok(()),
    }
}
