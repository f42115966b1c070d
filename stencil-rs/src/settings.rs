//! Run-wide settings scope.
//!
//! Holds the plain string-valued variables visible to every template line:
//! values loaded from the settings file, `-D` overrides, and `DEFINE`
//! directives executed during the run.  Loop and macro bindings are layered
//! over this store by [`crate::template::scope::ScopeStack`] and never write to it.

use std::collections::{HashMap, HashSet};

/// Key/value settings store.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    vars: HashMap<String, String>,
    /// Names introduced by a `DEFINE` directive (tested by `IF_DEF`).
    defined: HashSet<String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Set a variable through a `DEFINE` directive.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.defined.insert(name.clone());
        self.vars.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Returns `true` if `name` was introduced by `DEFINE`.
    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.contains(name)
    }

    /// All bindings, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
