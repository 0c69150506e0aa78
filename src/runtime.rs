//! The runtime instance.
//!
//! One `Runtime` owns one unit table. There is no ambient global state:
//! independent runtimes coexist, and `reset` returns a runtime to empty.
//!
//! All state sits behind `RefCell`s because factories re-enter the runtime
//! (nested loads, segment definers calling `define`). Borrows are never held
//! across a call into embedder code.

use std::cell::RefCell;

use rustc_hash::FxHashSet;

use crate::config::{ConfigError, RuntimeConfig, Settings};
use crate::hot::{BoundaryClassifier, HotListener, LogListener};
use crate::logger;
use crate::registry::{DefineOutcome, Registry};
use crate::segment::SegmentTable;
use crate::unit::{UnitDef, UnitId, UnitRecord, UnitState, Value};

/// Dependency-aware unit loader with hot updates.
pub struct Runtime {
    pub(crate) registry: RefCell<Registry>,
    pub(crate) segments: RefCell<SegmentTable>,
    /// Units whose factories are currently executing, outermost first.
    pub(crate) loading: RefCell<Vec<UnitId>>,
    /// Cycle chains already reported.
    pub(crate) reported_cycles: RefCell<FxHashSet<Vec<UnitId>>>,
    pub(crate) settings: Settings,
    pub(crate) classifier: Option<Box<dyn BoundaryClassifier>>,
    pub(crate) listener: Box<dyn HotListener>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Runtime with default settings, no boundary classifier, and a
    /// listener that logs.
    pub fn new() -> Self {
        Self::from_parts(Settings::default(), None, Box::new(LogListener))
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    fn from_parts(
        settings: Settings,
        classifier: Option<Box<dyn BoundaryClassifier>>,
        listener: Box<dyn HotListener>,
    ) -> Self {
        Self {
            registry: RefCell::new(Registry::new()),
            segments: RefCell::new(SegmentTable::default()),
            loading: RefCell::new(Vec::new()),
            reported_cycles: RefCell::new(FxHashSet::default()),
            settings,
            classifier,
            listener,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register or overwrite a unit without evaluating it.
    pub fn define(&self, def: UnitDef) -> DefineOutcome {
        let id = def.id.clone();
        let outcome = self.registry.borrow_mut().define(def);
        crate::debug!("define"; "{:?} unit {}", outcome, id);
        outcome
    }

    /// Drop every unit, segment, and reported cycle.
    ///
    /// Exports handed out before the reset stay valid as values but are no
    /// longer reachable through the runtime.
    pub fn reset(&self) {
        self.registry.borrow_mut().reset();
        self.segments.borrow_mut().reset();
        self.reported_cycles.borrow_mut().clear();
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn contains(&self, id: impl Into<UnitId>) -> bool {
        self.registry.borrow().contains(&id.into())
    }

    pub fn state(&self, id: impl Into<UnitId>) -> Option<UnitState> {
        self.registry.borrow().get(&id.into()).map(UnitRecord::state)
    }

    pub fn version(&self, id: impl Into<UnitId>) -> Option<u32> {
        self.registry.borrow().get(&id.into()).map(UnitRecord::version)
    }

    pub fn label(&self, id: impl Into<UnitId>) -> Option<String> {
        self.registry
            .borrow()
            .get(&id.into())
            .and_then(|unit| unit.label().map(str::to_string))
    }

    /// Current exports without triggering evaluation.
    pub fn peek(&self, id: impl Into<UnitId>) -> Option<Value> {
        self.registry
            .borrow()
            .get(&id.into())
            .map(|unit| unit.exports().clone())
    }

    /// Run `f` against a unit record.
    ///
    /// The registry is borrowed for the duration of `f`; do not call back
    /// into the runtime from it.
    pub fn inspect<R>(&self, id: impl Into<UnitId>, f: impl FnOnce(&UnitRecord) -> R) -> Option<R> {
        self.registry.borrow().get(&id.into()).map(f)
    }

    /// Registered ids, sorted.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.registry.borrow().ids().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn display_name(&self, id: &UnitId) -> String {
        self.registry.borrow().display_name(id)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Configures a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    classifier: Option<Box<dyn BoundaryClassifier>>,
    listener: Option<Box<dyn HotListener>>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the pluggable boundary classifier.
    pub fn classifier(mut self, classifier: impl BoundaryClassifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    /// Install the update-event and fatal-error collaborator.
    pub fn listener(mut self, listener: impl HotListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn build(self) -> Result<Runtime, ConfigError> {
        let settings = self.config.validate()?;
        logger::set_verbose(settings.verbose);
        let listener = self.listener.unwrap_or_else(|| Box::new(LogListener));
        Ok(Runtime::from_parts(settings, self.classifier, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_introspect() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new(2, |_| Ok(())).label("b.js"));
        runtime.define(UnitDef::new(1, |_| Ok(())));

        assert_eq!(runtime.len(), 2);
        assert!(runtime.contains(1));
        assert_eq!(runtime.state(1), Some(UnitState::Unevaluated));
        assert_eq!(runtime.label(2).as_deref(), Some("b.js"));
        assert_eq!(runtime.label(1), None);
        assert_eq!(runtime.unit_ids(), [UnitId::from(1), UnitId::from(2)]);
        assert!(runtime.peek(1).unwrap().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_runtimes_are_independent() {
        let a = Runtime::new();
        let b = Runtime::new();
        a.define(UnitDef::new(1, |_| Ok(())));

        assert!(a.contains(1));
        assert!(!b.contains(1));
    }

    #[test]
    fn test_reset_clears_units() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new(1, |_| Ok(())));
        runtime.load(1).unwrap();

        runtime.reset();

        assert!(runtime.is_empty());
        assert!(runtime.load(1).is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = RuntimeConfig::from_str("[cycles]\nignore = ['[']").unwrap();
        assert!(Runtime::builder().config(config).build().is_err());
    }

    #[test]
    fn test_builder_verbose_flag_follows_config() {
        let verbose = RuntimeConfig::from_str("verbose = true").unwrap();
        Runtime::builder().config(verbose).build().unwrap();

        Runtime::builder().build().unwrap();
        assert!(!logger::is_verbose());
    }

    #[test]
    fn test_builder_applies_config() {
        let config = RuntimeConfig::from_str("[hot]\nenabled = false").unwrap();
        let runtime = Runtime::builder().config(config).build().unwrap();
        assert!(!runtime.settings().hot_enabled);
    }
}
