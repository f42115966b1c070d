//! Substitution scopes.
//!
//! Each loop iteration and macro call pushes a fresh [`Layer`] of bindings
//! over the run-wide [`Settings`].  Lookups walk the layers innermost first;
//! nothing ever writes through a layer into the one below it.

use std::collections::HashMap;

use super::expr::VarLookup;
use super::records::Record;
use crate::settings::Settings;

/// One set of bindings.
#[derive(Debug, Default, Clone)]
pub struct Layer {
    vars: HashMap<String, String>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Bindings for one loop iteration.
    ///
    /// `variable.index` / `variable.count` are bound first so a record field
    /// of the same name wins; every field is reachable both qualified
    /// (`row.name`) and bare (`name`).
    pub fn for_record(variable: &str, record: &Record, index: usize, count: usize) -> Self {
        let mut layer = Layer::new();
        layer.bind(format!("{variable}.index"), index.to_string());
        layer.bind(format!("{variable}.count"), count.to_string());
        if let Some(v) = record.scalar_value() {
            layer.bind(variable, v);
        }
        for (name, value) in record.fields() {
            layer.bind(format!("{variable}.{name}"), value);
            layer.bind(name, value);
        }
        layer
    }
}

/// The stack of active layers.
#[derive(Debug, Default)]
pub struct ScopeStack {
    layers: Vec<Layer>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn pop(&mut self) -> Option<Layer> {
        self.layers.pop()
    }

    /// Innermost binding of `name`, if any layer has one.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.layers.iter().rev().find_map(|l| l.get(name))
    }
}

/// Read-only view combining the layers with the settings store.
pub struct ScopeView<'a> {
    pub scopes: &'a ScopeStack,
    pub settings: &'a Settings,
    /// Meta indicator; a reference written `_name` inside a condition is
    /// looked up as `name` when `_name` itself is unbound.
    pub meta: &'a str,
}

impl ScopeView<'_> {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.scopes.lookup(name).or_else(|| self.settings.get(name))
    }
}

impl VarLookup for ScopeView<'_> {
    fn get_var(&self, name: &str) -> Option<String> {
        self.get(name)
            .or_else(|| name.strip_prefix(self.meta).and_then(|bare| self.get(bare)))
            .map(str::to_owned)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
