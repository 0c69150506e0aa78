//! On-demand evaluation of units.
//!
//! # State machine
//!
//! ```text
//! Unevaluated ──load──▶ Evaluating ──ok──▶ Evaluated
//!                           │
//!                           └──err──▶ Errored (error stored, replayed)
//! ```
//!
//! A load that finds its target `Evaluating` is a require cycle: it gets
//! the partially-populated exports and a (deduplicated) cycle warning.
//!
//! # Modules
//!
//! - `context` - The execution context handed to factories
//! - `cycle` - Require-cycle detection and reporting
//! - `interop` - `import_default` / `import_all` helpers

mod context;
mod cycle;
mod interop;

pub use context::UnitContext;
pub use cycle::RequireCycle;

use crate::error::{LoadError, SharedError};
use crate::runtime::Runtime;
use crate::unit::{UnitId, UnitState, Value};

impl Runtime {
    /// Load a unit, evaluating it on first use.
    pub fn load(&self, id: impl Into<UnitId>) -> Result<Value, LoadError> {
        self.load_unit(&id.into())
    }

    /// Load an entry unit, routing failures to the fatal-error sink.
    pub fn run_entry(&self, id: impl Into<UnitId>) -> Option<Value> {
        match self.load(id) {
            Ok(exports) => Some(exports),
            Err(error) => {
                self.listener.report_fatal_error(&error);
                None
            }
        }
    }

    pub(crate) fn load_unit(&self, id: &UnitId) -> Result<Value, LoadError> {
        if !self.registry.borrow().contains(id) {
            self.define_from_segment(id);
        }

        let state = {
            let registry = self.registry.borrow();
            let unit = registry
                .get(id)
                .ok_or_else(|| LoadError::UnknownUnit { id: id.clone() })?;
            match unit.state {
                UnitState::Evaluated => return Ok(unit.exports.clone()),
                UnitState::Errored => {
                    if let Some(error) = unit.replay_error() {
                        return Err(error);
                    }
                }
                UnitState::Evaluating | UnitState::Unevaluated => {}
            }
            unit.state
        };

        if state == UnitState::Evaluating {
            self.report_cycle(id);
            return self
                .registry
                .borrow()
                .get(id)
                .map(|unit| unit.exports.clone())
                .ok_or_else(|| LoadError::UnknownUnit { id: id.clone() });
        }

        self.evaluate(id)
    }

    /// Run the factory of an unevaluated unit.
    fn evaluate(&self, id: &UnitId) -> Result<Value, LoadError> {
        let (factory, dependency_map) = {
            let mut registry = self.registry.borrow_mut();
            let unit = registry
                .get_mut(id)
                .ok_or_else(|| LoadError::UnknownUnit { id: id.clone() })?;
            unit.state = UnitState::Evaluating;
            (unit.factory.clone(), unit.dependency_map.clone())
        };

        self.loading.borrow_mut().push(id.clone());
        let result = {
            let mut ctx = UnitContext::new(self, id.clone(), dependency_map);
            factory(&mut ctx)
        };
        let popped = self.loading.borrow_mut().pop();
        debug_assert_eq!(popped.as_ref(), Some(id), "loading stack is corrupt");

        let mut registry = self.registry.borrow_mut();
        // A factory may have reset the runtime underneath us
        let unit = registry
            .get_mut(id)
            .ok_or_else(|| LoadError::UnknownUnit { id: id.clone() })?;

        match result {
            Ok(()) => {
                unit.state = UnitState::Evaluated;
                let exports = unit.exports.clone();
                drop(registry);
                self.record_boundary(id, &exports);
                Ok(exports)
            }
            Err(error) => {
                let error = SharedError::new(error);
                unit.state = UnitState::Errored;
                unit.stored_error = Some(error.clone());
                crate::debug!("load"; "unit {} failed: {}", id, error);
                Err(LoadError::Factory {
                    unit: id.clone(),
                    error,
                })
            }
        }
    }

    /// Remember the classifier's verdict on fresh exports.
    fn record_boundary(&self, id: &UnitId, exports: &Value) {
        let Some(classifier) = &self.classifier else {
            return;
        };
        let signature = classifier.classify(exports);
        if let Some(unit) = self.registry.borrow_mut().get_mut(id) {
            unit.acceptance.boundary_signature = signature;
        }
    }
}
