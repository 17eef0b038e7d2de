//! Concurrent name-to-handler tables
//!
//! One table per handler kind; the query and index namespaces are
//! independent. Updates are last-write-wins and atomic with respect to
//! lookups, so readers never observe a torn table.

use std::sync::Arc;

use dashmap::DashMap;

/// Thread-safe mapping from handler name to a shared handler reference
pub struct HandlerTable<H: ?Sized> {
    inner: DashMap<String, Arc<H>>,
}

impl<H: ?Sized> HandlerTable<H> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Bind a handler to a name, returning the previous binding if any
    pub fn register(&self, name: impl Into<String>, handler: Arc<H>) -> Option<Arc<H>> {
        self.inner.insert(name.into(), handler)
    }

    /// Remove the binding for a name, returning it if any
    pub fn unregister(&self, name: &str) -> Option<Arc<H>> {
        self.inner.remove(name).map(|(_, handler)| handler)
    }

    /// Look up the handler bound to a name
    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        self.inner.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// A point-in-time copy of all bindings
    ///
    /// Taken before broadcast iterations so concurrent updates (or a
    /// faulting handler) cannot disturb the iteration.
    pub fn snapshot(&self) -> Vec<(String, Arc<H>)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the table has no bindings
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<H: ?Sized> Default for HandlerTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
