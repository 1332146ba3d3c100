//! Facet handler registry and load ordering.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::engine::IndexReader;
use crate::error::Result;
use crate::facet::data::FacetDataMap;
use crate::facet::handler::FacetHandler;

/// Named facet handlers of a browser.
///
/// Registering a name twice replaces the earlier handler: the last
/// registration wins, so a handler added at runtime can override one defined
/// with the index.
#[derive(Clone, Default)]
pub struct FacetHandlerRegistry {
    handlers: AHashMap<String, Arc<dyn FacetHandler>>,
    order: Vec<String>,
}

impl FacetHandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any handler of the same name.
    pub fn register(&mut self, handler: Arc<dyn FacetHandler>) {
        let name = handler.name().to_string();
        if self.handlers.insert(name.clone(), handler).is_some() {
            log::debug!("Facet handler '{name}' replaced by a later registration");
            self.order.retain(|n| n != &name);
        }
        self.order.push(name);
    }

    /// Handler registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FacetHandler>> {
        self.handlers.get(name)
    }

    /// Whether a handler named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Every registered handler name.
    pub fn resolve_all_names(&self) -> BTreeSet<String> {
        self.order.iter().cloned().collect()
    }

    /// Names in an order where every handler follows the registered handlers
    /// it depends on.
    ///
    /// Dependencies that are not registered are skipped. A dependency that is
    /// still being resolved when it is reached again (itself, or a cycle) is
    /// treated the same way, so resolution never fails.
    pub fn load_order(&self) -> Vec<String> {
        let mut resolved = Vec::with_capacity(self.order.len());
        let mut done = AHashSet::new();
        let mut visiting = AHashSet::new();
        for name in &self.order {
            self.visit(name, &mut visiting, &mut done, &mut resolved);
        }
        resolved
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        visiting: &mut AHashSet<&'a str>,
        done: &mut AHashSet<&'a str>,
        resolved: &mut Vec<String>,
    ) {
        if done.contains(name) || visiting.contains(name) {
            return;
        }
        let Some(handler) = self.handlers.get(name) else {
            return;
        };
        visiting.insert(name);
        for dep in handler.depends_on() {
            if !self.handlers.contains_key(dep.as_str()) {
                log::debug!("Facet handler '{name}' depends on unregistered '{dep}'");
                continue;
            }
            self.visit(dep, visiting, done, resolved);
        }
        visiting.remove(name);
        done.insert(name);
        resolved.push(name.to_string());
    }

    /// Load every handler against one partition, dependencies first.
    ///
    /// Each handler sees the data of the handlers loaded before it. The first
    /// failing load aborts.
    pub fn load_all(&self, reader: &dyn IndexReader) -> Result<FacetDataMap> {
        let mut data = FacetDataMap::with_capacity(self.handlers.len());
        for name in self.load_order() {
            let Some(handler) = self.handlers.get(&name) else {
                continue;
            };
            let loaded = handler.load(reader, &data)?;
            data.insert(name, loaded);
        }
        Ok(data)
    }
}

impl fmt::Debug for FacetHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetHandlerRegistry")
            .field("handlers", &self.order)
            .finish()
    }
}
