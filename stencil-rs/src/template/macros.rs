//! Macro definitions and call-site argument binding.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use super::args::{self, Args, Item};
use super::capture::CapturedLine;
use super::scope::Layer;
use crate::error::{ErrorKind, Location};

/// One formal parameter: `name` or `name=default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formal {
    pub name: String,
    pub default: Option<String>,
}

/// Parse the formal list of a `MACRO` line, in declaration order.
pub fn parse_formals(text: &str) -> Result<Vec<Formal>, ErrorKind> {
    args::parse_items(text)?
        .into_iter()
        .map(|item| match item {
            Item::Positional(name) if args::is_name(&name) => Ok(Formal { name, default: None }),
            Item::Positional(name) => Err(ErrorKind::Syntax(format!("bad macro parameter name: {name}"))),
            Item::Named(name, default) => Ok(Formal { name, default: Some(default) }),
        })
        .collect()
}

/// A registered macro.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub formals: Vec<Formal>,
    pub body: Vec<CapturedLine>,
    pub defined_at: Location,
}

impl MacroDef {
    /// Bind call arguments to formals.
    ///
    /// Positional arguments fill formals in order, named arguments override,
    /// and defaults fill whatever is still unbound.  Formals left without a
    /// value stay undefined.
    pub fn bind(&self, call: &Args) -> Layer {
        let mut values: Vec<Option<String>> = vec![None; self.formals.len()];
        for (slot, value) in values.iter_mut().zip(&call.positional) {
            *slot = Some(value.clone());
        }
        if call.positional.len() > self.formals.len() {
            warn!(
                macro_name = %self.name,
                extra = call.positional.len() - self.formals.len(),
                "extra positional arguments ignored"
            );
        }
        for (name, value) in &call.named {
            match self.formals.iter().position(|f| &f.name == name) {
                Some(i) => values[i] = Some(value.clone()),
                None => warn!(macro_name = %self.name, arg = %name, "unknown named argument ignored"),
            }
        }

        let mut layer = Layer::new();
        for (formal, value) in self.formals.iter().zip(values) {
            if let Some(v) = value.or_else(|| formal.default.clone()) {
                layer.bind(formal.name.as_str(), v);
            }
        }
        layer
    }
}

/// Name → definition.  Redefinition replaces the previous entry.
#[derive(Debug, Default)]
pub struct MacroTable {
    defs: HashMap<String, Rc<MacroDef>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: MacroDef) {
        debug!(name = %def.name, lines = def.body.len(), at = %def.defined_at, "macro registered");
        self.defs.insert(def.name.clone(), Rc::new(def));
    }

    /// Shared handle, so a running call survives redefinition of its macro.
    pub fn get(&self, name: &str) -> Option<Rc<MacroDef>> {
        self.defs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
