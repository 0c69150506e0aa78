//! Default/namespace import interop.
//!
//! Namespace-shaped exports (flagged `es_module`) keep `default` as an
//! ordinary binding. Anything else is treated as a plain exports value:
//! its default import is the whole value, and its namespace import is a
//! synthesized object that forwards the own keys and adds `default`.
//!
//! Results are memoized per unit once it is evaluated and dropped whenever
//! the unit is re-run.

use crate::error::LoadError;
use crate::runtime::Runtime;
use crate::unit::{Object, UnitId, UnitState, Value};

/// Which memoized view to read or write.
#[derive(Clone, Copy)]
enum View {
    Default,
    All,
}

impl Runtime {
    /// Load `id` and return its default import.
    pub fn import_default(&self, id: impl Into<UnitId>) -> Result<Value, LoadError> {
        let id = id.into();
        if let Some(cached) = self.cached_view(&id, View::Default) {
            return Ok(cached);
        }

        let exports = self.load_unit(&id)?;
        let imported = match exports.as_object() {
            Some(obj) if obj.is_es_module() => obj.get("default").unwrap_or_default(),
            _ => exports,
        };

        self.store_view(&id, View::Default, &imported);
        Ok(imported)
    }

    /// Load `id` and return its namespace import.
    pub fn import_all(&self, id: impl Into<UnitId>) -> Result<Value, LoadError> {
        let id = id.into();
        if let Some(cached) = self.cached_view(&id, View::All) {
            return Ok(cached);
        }

        let exports = self.load_unit(&id)?;
        let imported = if exports.is_es_module() {
            exports
        } else {
            let namespace = Object::new();
            if let Some(obj) = exports.as_object() {
                for (key, value) in obj.entries() {
                    namespace.set(key, value);
                }
            }
            namespace.set("default", exports);
            Value::Object(namespace)
        };

        self.store_view(&id, View::All, &imported);
        Ok(imported)
    }

    fn cached_view(&self, id: &UnitId, view: View) -> Option<Value> {
        let registry = self.registry.borrow();
        let unit = registry.get(id)?;
        match view {
            View::Default => unit.imported_default.clone(),
            View::All => unit.imported_all.clone(),
        }
    }

    // Partial exports seen through a cycle are not memoized
    fn store_view(&self, id: &UnitId, view: View, value: &Value) {
        let mut registry = self.registry.borrow_mut();
        let Some(unit) = registry.get_mut(id) else {
            return;
        };
        if unit.state != UnitState::Evaluated {
            return;
        }
        let slot = match view {
            View::Default => &mut unit.imported_default,
            View::All => &mut unit.imported_all,
        };
        *slot = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitDef;

    fn es_module(runtime: &Runtime) {
        runtime.define(UnitDef::new("esm", |ctx| {
            ctx.mark_es_module();
            ctx.export("default", "the default");
            ctx.export("named", 1);
            Ok(())
        }));
    }

    fn commonjs(runtime: &Runtime) {
        runtime.define(UnitDef::new("cjs", |ctx| {
            ctx.export("named", 2);
            Ok(())
        }));
    }

    #[test]
    fn test_default_import_from_es_module() {
        let runtime = Runtime::new();
        es_module(&runtime);

        assert_eq!(runtime.import_default("esm").unwrap(), Value::from("the default"));
    }

    #[test]
    fn test_default_import_from_plain_exports() {
        let runtime = Runtime::new();
        commonjs(&runtime);

        let imported = runtime.import_default("cjs").unwrap();
        assert_eq!(imported, runtime.load("cjs").unwrap());
        assert_eq!(imported.get("named"), Value::from(2));
    }

    #[test]
    fn test_default_import_of_primitive_exports() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new("str", |ctx| {
            ctx.set_exports("plain");
            Ok(())
        }));

        assert_eq!(runtime.import_default("str").unwrap(), Value::from("plain"));
    }

    #[test]
    fn test_namespace_import_from_es_module_is_exports() {
        let runtime = Runtime::new();
        es_module(&runtime);

        let namespace = runtime.import_all("esm").unwrap();
        assert_eq!(namespace, runtime.load("esm").unwrap());
    }

    #[test]
    fn test_namespace_import_from_plain_exports() {
        let runtime = Runtime::new();
        commonjs(&runtime);

        let exports = runtime.load("cjs").unwrap();
        let namespace = runtime.import_all("cjs").unwrap();

        assert_ne!(namespace, exports);
        assert_eq!(namespace.get("named"), Value::from(2));
        assert_eq!(namespace.get("default"), exports);
        // Memoized: the synthesized namespace keeps its identity
        assert_eq!(runtime.import_all("cjs").unwrap(), namespace);
    }

    #[test]
    fn test_namespace_import_of_primitive_exports() {
        let runtime = Runtime::new();
        runtime.define(UnitDef::new("num", |ctx| {
            ctx.set_exports(5);
            Ok(())
        }));

        let namespace = runtime.import_all("num").unwrap();
        assert_eq!(namespace.as_object().unwrap().keys(), ["default"]);
        assert_eq!(namespace.get("default"), Value::from(5));
    }

    #[test]
    fn test_imports_through_context() {
        let runtime = Runtime::new();
        es_module(&runtime);
        commonjs(&runtime);
        runtime.define(
            UnitDef::new("app", |ctx| {
                let esm_default = ctx.import_default(0)?;
                let cjs_all = ctx.import_all(1)?;
                ctx.export("esm_default", esm_default);
                ctx.export("cjs_named", cjs_all.get("named"));
                Ok(())
            })
            .deps(["esm", "cjs"]),
        );

        let app = runtime.load("app").unwrap();
        assert_eq!(app.get("esm_default"), Value::from("the default"));
        assert_eq!(app.get("cjs_named"), Value::from(2));
    }

    #[test]
    fn test_import_unknown_unit() {
        let runtime = Runtime::new();
        assert!(matches!(
            runtime.import_default("missing"),
            Err(LoadError::UnknownUnit { .. })
        ));
        assert!(matches!(
            runtime.import_all("missing"),
            Err(LoadError::UnknownUnit { .. })
        ));
    }
}
