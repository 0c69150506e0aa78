//! Dynamically-typed export values.
//!
//! A unit's exports is a [`Value`]. Most units export an [`Object`]: a
//! shared, insertion-ordered namespace that factories mutate in place.
//! A factory may also replace its exports wholesale with any other value.
//!
//! Identity matters: two loads of the same unit must observe the same
//! object, so `Object` and `Native` compare by reference.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

// =============================================================================
// Value
// =============================================================================

/// An exported value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(Object),
    Native(Native),
}

impl Value {
    /// Wrap an arbitrary host value (function, component, handle, ...).
    pub fn native<T: Any>(value: T) -> Self {
        Self::Native(Native::new(value))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_native(&self) -> Option<&Native> {
        match self {
            Self::Native(native) => Some(native),
            _ => None,
        }
    }

    /// Property lookup; `Undefined` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Value {
        self.as_object()
            .and_then(|obj| obj.get(key))
            .unwrap_or_default()
    }

    /// Whether this value is an object flagged as namespace-shaped.
    #[inline]
    pub fn is_es_module(&self) -> bool {
        self.as_object().is_some_and(Object::is_es_module)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Native(a), Self::Native(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Object(obj) => obj.fmt(f),
            Self::Native(native) => native.fmt(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Self::Object(obj)
    }
}

impl From<Native> for Value {
    fn from(native: Native) -> Self {
        Self::Native(native)
    }
}

// =============================================================================
// Object
// =============================================================================

#[derive(Default)]
struct ObjectData {
    es_module: bool,
    props: IndexMap<String, Value>,
}

/// Shared, mutable, insertion-ordered namespace.
///
/// Cloning an `Object` clones the handle, not the contents.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an object from key/value pairs.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let obj = Self::new();
        for (key, value) in entries {
            obj.set(key, value);
        }
        obj
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().props.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().props.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().props.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().props.contains_key(key)
    }

    /// Own keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().props.keys().cloned().collect()
    }

    /// Snapshot of own entries in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .props
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().props.is_empty()
    }

    /// Namespace-shaped exports: `default` is a binding, not the object.
    pub fn is_es_module(&self) -> bool {
        self.0.borrow().es_module
    }

    pub fn set_es_module(&self, es_module: bool) {
        self.0.borrow_mut().es_module = es_module;
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// Keys only: objects may reference each other (namespaces hold their
// `default` exports), so printing values could recurse.
impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Object")
            .field("es_module", &data.es_module)
            .field("keys", &data.props.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Native
// =============================================================================

/// Opaque host value, compared by identity.
#[derive(Clone)]
pub struct Native(Rc<dyn Any>);

impl Native {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Native) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({:p})", Rc::as_ptr(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_identity() {
        let a = Object::new();
        let b = a.clone();
        b.set("x", 1);

        assert!(a.ptr_eq(&b));
        assert_eq!(a.get("x"), Some(Value::from(1)));
        assert_ne!(Value::from(a), Value::from(Object::new()));
    }

    #[test]
    fn test_object_preserves_insertion_order() {
        let obj = Object::from_entries([("b", 1), ("a", 2), ("c", 3)]);
        assert_eq!(obj.keys(), ["b", "a", "c"]);

        obj.remove("a");
        assert_eq!(obj.keys(), ["b", "c"]);
    }

    #[test]
    fn test_value_get_on_non_object() {
        assert!(Value::from("str").get("length").is_undefined());
        assert!(Value::Null.get("x").is_undefined());
    }

    #[test]
    fn test_native_downcast_and_identity() {
        struct Component(&'static str);

        let native = Native::new(Component("Button"));
        assert!(native.is::<Component>());
        assert_eq!(native.downcast_ref::<Component>().unwrap().0, "Button");
        assert!(native.downcast_ref::<u32>().is_none());

        let other = Native::new(Component("Button"));
        assert_ne!(Value::from(native.clone()), Value::from(other));
        assert_eq!(Value::from(native.clone()), Value::from(native));
    }

    #[test]
    fn test_es_module_flag() {
        let obj = Object::new();
        assert!(!Value::from(obj.clone()).is_es_module());
        obj.set_es_module(true);
        assert!(Value::from(obj).is_es_module());
    }
}
