//! Hierarchical node context
//!
//! Every node sees a [`Context`] derived from its parent's. Lookups walk up
//! the chain, so values set near the root (the event dispatcher, app-wide
//! settings) are visible everywhere while a subtree can shadow them locally.
//!
//! Values are keyed by name and type together; `set::<u32>("depth", ..)` and
//! `set::<String>("depth", ..)` are independent entries.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHasher};

/// Key for a typed context value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextKey {
    /// Hash of the value name
    name_hash: u64,
    /// Type of the stored value
    type_id: TypeId,
}

impl ContextKey {
    pub fn new<T: 'static>(name: &str) -> Self {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        Self {
            name_hash: hasher.finish(),
            type_id: TypeId::of::<T>(),
        }
    }
}

struct ContextInner {
    parent: Option<Context>,
    values: RefCell<FxHashMap<ContextKey, Rc<dyn Any>>>,
}

/// A scope of named values with a parent chain
///
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Context {
    /// Create a root context
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Context>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent,
                values: RefCell::new(FxHashMap::default()),
            }),
        }
    }

    /// Create a child scope that falls back to this one
    pub fn derive(&self) -> Self {
        Self::with_parent(Some(self.clone()))
    }

    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    /// The outermost scope of this chain
    pub fn root(&self) -> Context {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// Set a value in this scope, shadowing any ancestor value
    pub fn set<T: 'static>(&self, name: &str, value: T) {
        self.inner
            .values
            .borrow_mut()
            .insert(ContextKey::new::<T>(name), Rc::new(value));
    }

    /// Look up a value here or in the nearest ancestor that has it
    pub fn get<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        let key = ContextKey::new::<T>(name);
        let mut scope = Some(self);
        while let Some(context) = scope {
            let found = context.inner.values.borrow().get(&key).cloned();
            if let Some(value) = found {
                return value.downcast_ref::<T>().cloned();
            }
            scope = context.parent();
        }
        None
    }

    pub fn get_or<T: Clone + 'static>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    /// Whether this scope or an ancestor has the value
    pub fn contains<T: Clone + 'static>(&self, name: &str) -> bool {
        self.get::<T>(name).is_some()
    }

    /// Remove a value from this scope only
    pub fn remove<T: 'static>(&self, name: &str) -> bool {
        self.inner
            .values
            .borrow_mut()
            .remove(&ContextKey::new::<T>(name))
            .is_some()
    }

    /// Remove every value set in this scope
    pub fn reset(&self) {
        let old = std::mem::take(&mut *self.inner.values.borrow_mut());
        drop(old);
    }

    pub fn is_same(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.inner.values.borrow().len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
