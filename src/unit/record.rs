//! Unit records: one per registered identifier.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{Object, UnitId, Value};
use crate::error::{LoadError, SharedError};
use crate::hot::Signature;
use crate::loader::UnitContext;

/// The callable body of a unit.
pub type Factory = Rc<dyn Fn(&mut UnitContext<'_>) -> anyhow::Result<()>>;

/// Accept/dispose handler registered by a unit from inside its factory.
pub type HotCallback = Rc<dyn Fn() -> anyhow::Result<()>>;

/// Identifiers a factory may reference positionally.
pub type DependencyMap = SmallVec<[UnitId; 4]>;

// =============================================================================
// UnitState
// =============================================================================

/// Evaluation state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Unevaluated,
    /// Factory is on the loading stack; re-entrant loads see partial exports.
    Evaluating,
    Evaluated,
    /// Factory threw; the stored error is replayed on every later load.
    Errored,
}

// =============================================================================
// Acceptance
// =============================================================================

/// Hot-update metadata of the unit's current instance.
#[derive(Clone, Default)]
pub struct Acceptance {
    /// The factory called `accept` during its last run.
    pub(crate) self_accepted: bool,
    pub(crate) accept_callback: Option<HotCallback>,
    pub(crate) dispose_callback: Option<HotCallback>,
    /// Classifier output after the last successful run.
    pub(crate) boundary_signature: Option<Signature>,
}

impl Acceptance {
    /// A boundary the planner may stop at without executing anything.
    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.self_accepted || self.boundary_signature.is_some()
    }

    #[inline]
    pub fn self_accepted(&self) -> bool {
        self.self_accepted
    }

    #[inline]
    pub fn boundary_signature(&self) -> Option<&Signature> {
        self.boundary_signature.as_ref()
    }
}

impl fmt::Debug for Acceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptance")
            .field("self_accepted", &self.self_accepted)
            .field("accept_callback", &self.accept_callback.is_some())
            .field("dispose_callback", &self.dispose_callback.is_some())
            .field("boundary_signature", &self.boundary_signature)
            .finish()
    }
}

// =============================================================================
// UnitDef
// =============================================================================

/// A unit definition as handed to `define` or `accept_update`.
///
/// ```ignore
/// runtime.define(
///     UnitDef::new(1, |ctx| {
///         let dep = ctx.require(0)?;
///         ctx.export("value", dep.get("value"));
///         Ok(())
///     })
///     .deps([2])
///     .label("app.js"),
/// );
/// ```
#[derive(Clone)]
pub struct UnitDef {
    pub(crate) id: UnitId,
    pub(crate) factory: Factory,
    pub(crate) dependency_map: DependencyMap,
    pub(crate) label: Option<String>,
}

impl UnitDef {
    pub fn new<F>(id: impl Into<UnitId>, factory: F) -> Self
    where
        F: Fn(&mut UnitContext<'_>) -> anyhow::Result<()> + 'static,
    {
        Self {
            id: id.into(),
            factory: Rc::new(factory),
            dependency_map: DependencyMap::new(),
            label: None,
        }
    }

    pub fn deps<I>(mut self, deps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<UnitId>,
    {
        self.dependency_map = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[inline]
    pub fn id(&self) -> &UnitId {
        &self.id
    }
}

impl fmt::Debug for UnitDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDef")
            .field("id", &self.id)
            .field("dependency_map", &self.dependency_map)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// UnitRecord
// =============================================================================

/// The registry's view of one unit.
pub struct UnitRecord {
    pub(crate) id: UnitId,
    pub(crate) factory: Factory,
    pub(crate) dependency_map: DependencyMap,
    pub(crate) label: Option<String>,
    pub(crate) exports: Value,
    pub(crate) state: UnitState,
    pub(crate) stored_error: Option<SharedError>,
    pub(crate) imported_default: Option<Value>,
    pub(crate) imported_all: Option<Value>,
    pub(crate) acceptance: Acceptance,
    /// Bumped on every redefinition and every hot re-run.
    pub(crate) version: u32,
}

impl UnitRecord {
    pub(crate) fn new(def: UnitDef) -> Self {
        Self {
            id: def.id,
            factory: def.factory,
            dependency_map: def.dependency_map,
            label: def.label,
            exports: Value::Object(Object::new()),
            state: UnitState::Unevaluated,
            stored_error: None,
            imported_default: None,
            imported_all: None,
            acceptance: Acceptance::default(),
            version: 0,
        }
    }

    /// Swap in a new definition without running it.
    pub(crate) fn redefine(&mut self, def: UnitDef) {
        self.factory = def.factory;
        self.dependency_map = def.dependency_map;
        if def.label.is_some() {
            self.label = def.label;
        }
        self.version += 1;
    }

    /// Forget the current instance so the next load runs the factory.
    pub(crate) fn reset_instance(&mut self) {
        self.exports = Value::Object(Object::new());
        self.state = UnitState::Unevaluated;
        self.stored_error = None;
        self.imported_default = None;
        self.imported_all = None;
    }

    /// Replay the stored error of an errored unit.
    pub(crate) fn replay_error(&self) -> Option<LoadError> {
        self.stored_error.as_ref().map(|error| LoadError::Factory {
            unit: self.id.clone(),
            error: error.clone(),
        })
    }

    /// Label for diagnostics, falling back to the id.
    pub fn display_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.id.to_string())
    }

    #[inline]
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    #[inline]
    pub fn state(&self) -> UnitState {
        self.state
    }

    #[inline]
    pub fn exports(&self) -> &Value {
        &self.exports
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[inline]
    pub fn dependency_map(&self) -> &[UnitId] {
        &self.dependency_map
    }

    #[inline]
    pub fn is_es_module(&self) -> bool {
        self.exports.is_es_module()
    }

    #[inline]
    pub fn acceptance(&self) -> &Acceptance {
        &self.acceptance
    }

    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Debug for UnitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitRecord")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("version", &self.version)
            .field("acceptance", &self.acceptance)
            .finish_non_exhaustive()
    }
}
