#![forbid(unsafe_code)]

//! Lazily evaluated computed properties and dependency tracking.
//!
//! # Design
//!
//! A [`ComputedCell`] holds an evaluator and its cached result. The cell
//! starts dirty; the first read evaluates it and caches the result. Unlike a
//! statically wired derived value, the cell does not know its sources up
//! front: while the evaluator runs, every read it performs through the model
//! is recorded on the innermost frame of the [`Tracker`] stack, and the
//! recorded set replaces the cell's dependencies once evaluation succeeds.
//!
//! # Invariants
//!
//! 1. A dirty cell never hands out its cached value.
//! 2. Dependencies are replaced wholesale on each successful evaluation.
//! 3. Reads are attributed to the innermost evaluation only; a nested
//!    computed records its own reads, its caller records the nested name.
//! 4. `version` increments by exactly 1 per successful evaluation.
//!
//! # Failure Modes
//!
//! - **Evaluator fails**: the cell stays dirty, keeps no partial result and
//!   keeps its previous dependency set; the next read retries.
//! - **Evaluator panics**: the frame guard pops the tracking frame during
//!   unwinding so the stack stays balanced.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use serde_json::Value;

use crate::error::Result;
use crate::model::Model;
use crate::path::ResolvedPath;

/// Evaluator of a computed property.
///
/// Receives the model (for tracked reads) and, when invoked with call syntax,
/// the positional argument values. Tracked evaluation passes no arguments.
pub type Evaluator = Rc<dyn Fn(&Model, &[Value]) -> Result<Value>>;

/// Shared state of one registered computed property.
pub(crate) struct ComputedCell {
    evaluator: Evaluator,
    /// Cached result of the last successful evaluation.
    cached: RefCell<Option<Value>>,
    /// Whether the cached value is stale.
    dirty: Cell<bool>,
    /// Whether `dependencies` reflects at least one successful evaluation.
    discovered: Cell<bool>,
    dependencies: RefCell<BTreeSet<ResolvedPath>>,
    /// Monotonically increasing version, bumped on each evaluation.
    version: Cell<u64>,
}

impl ComputedCell {
    pub(crate) fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
            cached: RefCell::new(None),
            dirty: Cell::new(true),
            discovered: Cell::new(false),
            dependencies: RefCell::new(BTreeSet::new()),
            version: Cell::new(0),
        }
    }

    pub(crate) fn evaluator(&self) -> Evaluator {
        Rc::clone(&self.evaluator)
    }

    /// The cached value, if it is still valid.
    pub(crate) fn fresh_value(&self) -> Option<Value> {
        if self.dirty.get() {
            return None;
        }
        self.cached.borrow().clone()
    }

    /// Record a successful evaluation.
    pub(crate) fn store(&self, value: Value, dependencies: BTreeSet<ResolvedPath>) {
        *self.cached.borrow_mut() = Some(value);
        *self.dependencies.borrow_mut() = dependencies;
        self.discovered.set(true);
        self.dirty.set(false);
        self.version.set(self.version.get() + 1);
    }

    pub(crate) fn invalidate(&self) {
        self.dirty.set(true);
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    pub(crate) fn dependencies(&self) -> Vec<ResolvedPath> {
        self.dependencies.borrow().iter().cloned().collect()
    }

    /// Whether a change at `changed` can affect this cell.
    ///
    /// Cells that have never evaluated successfully have unknown
    /// dependencies; `assume_undiscovered` decides how those are treated.
    pub(crate) fn depends_on(&self, changed: &ResolvedPath, assume_undiscovered: bool) -> bool {
        if !self.discovered.get() {
            return assume_undiscovered;
        }
        self.dependencies
            .borrow()
            .iter()
            .any(|dependency| dependency.relates_to(changed))
    }
}

impl std::fmt::Debug for ComputedCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedCell")
            .field("cached", &self.cached.borrow())
            .field("dirty", &self.dirty.get())
            .field("dependencies", &self.dependencies.borrow().len())
            .field("version", &self.version.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

enum Frame {
    /// An evaluation in progress; reads are recorded here.
    Evaluation {
        name: String,
        dependencies: BTreeSet<ResolvedPath>,
    },
    /// A direct call through `name(args)`. Reads pass through to the
    /// enclosing evaluation.
    Invocation { name: String },
    /// Reads performed while this frame is on top are not attributed to any
    /// evaluation (observer dispatch).
    Suspended,
}

impl Frame {
    fn name(&self) -> Option<&str> {
        match self {
            Self::Evaluation { name, .. } | Self::Invocation { name } => Some(name),
            Self::Suspended => None,
        }
    }
}

/// Stack of in-progress evaluations.
#[derive(Default)]
pub(crate) struct Tracker {
    frames: RefCell<Vec<Frame>>,
}

impl Tracker {
    /// Attribute a read of `path` to the innermost evaluation, if any.
    pub(crate) fn record(&self, path: &ResolvedPath) {
        for frame in self.frames.borrow_mut().iter_mut().rev() {
            match frame {
                Frame::Evaluation { dependencies, .. } => {
                    dependencies.insert(path.clone());
                    return;
                }
                Frame::Invocation { .. } => {}
                Frame::Suspended => return,
            }
        }
    }

    /// Number of evaluations and invocations currently in progress.
    pub(crate) fn depth(&self) -> usize {
        self.frames
            .borrow()
            .iter()
            .filter(|frame| frame.name().is_some())
            .count()
    }

    /// The chain of in-progress evaluations that would close a cycle at
    /// `name`, or `None` if `name` is not being evaluated.
    pub(crate) fn cycle_through(&self, name: &str) -> Option<Vec<String>> {
        let frames = self.frames.borrow();
        let names: Vec<&str> = frames.iter().filter_map(Frame::name).collect();
        let start = names.iter().position(|evaluating| *evaluating == name)?;
        let mut chain: Vec<String> = names[start..].iter().map(|n| n.to_string()).collect();
        chain.push(name.to_string());
        Some(chain)
    }

    /// Push an evaluation frame for `name`.
    pub(crate) fn enter(&self, name: &str) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame::Evaluation {
            name: name.to_string(),
            dependencies: BTreeSet::new(),
        });
        FrameGuard {
            tracker: self,
            popped: false,
        }
    }

    /// Push a non-recording frame for a direct call of `name`.
    pub(crate) fn invoke(&self, name: &str) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame::Invocation {
            name: name.to_string(),
        });
        FrameGuard {
            tracker: self,
            popped: false,
        }
    }

    /// Push a frame that stops reads from reaching enclosing evaluations.
    pub(crate) fn suspend(&self) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame::Suspended);
        FrameGuard {
            tracker: self,
            popped: false,
        }
    }
}

/// RAII guard for one tracker frame. Pops the frame on drop.
pub(crate) struct FrameGuard<'a> {
    tracker: &'a Tracker,
    popped: bool,
}

impl FrameGuard<'_> {
    /// Pop the frame and return the reads it collected.
    pub(crate) fn finish(mut self) -> BTreeSet<ResolvedPath> {
        self.popped = true;
        match self.tracker.frames.borrow_mut().pop() {
            Some(Frame::Evaluation { dependencies, .. }) => dependencies,
            _ => BTreeSet::new(),
        }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.tracker.frames.borrow_mut().pop();
        }
    }
}
