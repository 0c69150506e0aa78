//! Execution context handed to factories.

use std::rc::Rc;

use crate::error::LoadError;
use crate::runtime::Runtime;
use crate::unit::{DependencyMap, Object, UnitId, Value};

/// What a factory sees while it runs.
///
/// Writes to the exports binding and to hot metadata go straight to the
/// unit's record, so a cyclic dependent loading this unit mid-factory
/// observes everything assigned so far.
pub struct UnitContext<'rt> {
    runtime: &'rt Runtime,
    id: UnitId,
    dependency_map: DependencyMap,
}

impl<'rt> UnitContext<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, id: UnitId, dependency_map: DependencyMap) -> Self {
        Self {
            runtime,
            id,
            dependency_map,
        }
    }

    #[inline]
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    #[inline]
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    // =========================================================================
    // Exports
    // =========================================================================

    /// The current exports binding.
    pub fn exports(&self) -> Value {
        self.runtime.peek(&self.id).unwrap_or_default()
    }

    /// Replace the exports binding wholesale.
    pub fn set_exports(&mut self, value: impl Into<Value>) {
        let value = value.into();
        if let Some(unit) = self.runtime.registry.borrow_mut().get_mut(&self.id) {
            unit.exports = value;
        }
    }

    /// Assign one named export.
    ///
    /// If the binding is not an object (it was replaced by a primitive or a
    /// native value), it is replaced by a fresh object first.
    pub fn export(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.exports_object().set(key, value);
    }

    /// Mark the exports as namespace-shaped (`default` is a binding).
    pub fn mark_es_module(&mut self) {
        self.exports_object().set_es_module(true);
    }

    fn exports_object(&mut self) -> Object {
        if let Value::Object(obj) = self.exports() {
            return obj;
        }
        let obj = Object::new();
        self.set_exports(obj.clone());
        obj
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Resolve a positional dependency to its id.
    pub fn dependency(&self, index: usize) -> Result<UnitId, LoadError> {
        self.dependency_map
            .get(index)
            .cloned()
            .ok_or_else(|| LoadError::DependencyIndex {
                unit: self.id.clone(),
                index,
            })
    }

    /// Load the dependency at `index` of this unit's dependency map.
    pub fn require(&self, index: usize) -> Result<Value, LoadError> {
        let id = self.dependency(index)?;
        self.runtime.load_unit(&id)
    }

    /// Default-import the dependency at `index`.
    pub fn import_default(&self, index: usize) -> Result<Value, LoadError> {
        let id = self.dependency(index)?;
        self.runtime.import_default(id)
    }

    /// Namespace-import the dependency at `index`.
    pub fn import_all(&self, index: usize) -> Result<Value, LoadError> {
        let id = self.dependency(index)?;
        self.runtime.import_all(id)
    }

    /// Load any unit by id, bypassing the dependency map.
    pub fn load(&self, id: impl Into<UnitId>) -> Result<Value, LoadError> {
        self.runtime.load_unit(&id.into())
    }

    // =========================================================================
    // Hot metadata
    // =========================================================================

    /// Declare that this unit absorbs updates to itself.
    pub fn accept(&mut self) {
        if let Some(unit) = self.runtime.registry.borrow_mut().get_mut(&self.id) {
            unit.acceptance.self_accepted = true;
            unit.acceptance.accept_callback = None;
        }
    }

    /// Like [`accept`](Self::accept), running `callback` after each
    /// successful re-run of a new version.
    pub fn accept_with<F>(&mut self, callback: F)
    where
        F: Fn() -> anyhow::Result<()> + 'static,
    {
        if let Some(unit) = self.runtime.registry.borrow_mut().get_mut(&self.id) {
            unit.acceptance.self_accepted = true;
            unit.acceptance.accept_callback = Some(Rc::new(callback));
        }
    }

    /// Register teardown for this instance, run before it is replaced.
    pub fn dispose<F>(&mut self, callback: F)
    where
        F: Fn() -> anyhow::Result<()> + 'static,
    {
        if let Some(unit) = self.runtime.registry.borrow_mut().get_mut(&self.id) {
            unit.acceptance.dispose_callback = Some(Rc::new(callback));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{UnitDef, UnitState};

    #[test]
    fn test_context_exposes_id_and_dependencies() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new(2, |_| Ok(())));
        runtime.define(
            UnitDef::new(1, |ctx| {
                assert_eq!(ctx.id(), &UnitId::from(1));
                assert_eq!(ctx.dependency(0)?, UnitId::from(2));
                assert!(ctx.dependency(1).is_err());
                Ok(())
            })
            .deps([2]),
        );

        runtime.load(1).unwrap();
    }

    #[test]
    fn test_export_after_primitive_replacement_creates_object() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new(1, |ctx| {
            ctx.set_exports(7);
            ctx.export("x", 1);
            Ok(())
        }));

        let exports = runtime.load(1).unwrap();
        assert_eq!(exports.get("x"), Value::from(1));
    }

    #[test]
    fn test_mark_es_module() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new(1, |ctx| {
            ctx.mark_es_module();
            ctx.export("default", "value");
            Ok(())
        }));

        runtime.load(1).unwrap();
        assert_eq!(runtime.inspect(1, |unit| unit.is_es_module()), Some(true));
    }

    #[test]
    fn test_hot_metadata_recorded() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new(1, |ctx| {
            ctx.accept_with(|| Ok(()));
            ctx.dispose(|| Ok(()));
            Ok(())
        }));
        runtime.define(UnitDef::new(2, |_| Ok(())));

        runtime.load(1).unwrap();
        runtime.load(2).unwrap();

        let accepted = runtime
            .inspect(1, |unit| {
                let acceptance = unit.acceptance();
                (
                    acceptance.self_accepted(),
                    acceptance.accept_callback.is_some(),
                    acceptance.dispose_callback.is_some(),
                )
            })
            .unwrap();
        assert_eq!(accepted, (true, true, true));
        assert_eq!(runtime.inspect(2, |unit| unit.acceptance().self_accepted()), Some(false));
        assert_eq!(runtime.state(1), Some(UnitState::Evaluated));
    }

    #[test]
    fn test_direct_load_bypasses_dependency_map() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new("helper", |ctx| {
            ctx.export("ok", true);
            Ok(())
        }));
        runtime.define(UnitDef::new("main", |ctx| {
            let helper = ctx.load("helper")?;
            ctx.set_exports(helper.get("ok"));
            Ok(())
        }));

        assert_eq!(runtime.load("main").unwrap(), Value::from(true));
    }
}
