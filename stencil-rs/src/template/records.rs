//! Record tables: the iteration sources of `LOOP`.
//!
//! A record is an ordered list of named string fields.  Sources are resolved
//! in this order:
//!
//! 1. an inline JSON array literal (`[{"n":"a"},{"n":"b"}]`, or scalars `["a","b"]`);
//! 2. a table registered with the interpreter through [`RecordTables`];
//! 3. a variable whose value is such a JSON array, looked up through the
//!    active scope (loop fields, macro parameters) and then the settings;
//! 4. otherwise the source is absent and the loop runs zero times.

use std::collections::HashMap;

use serde_json::Value as Json;

use super::expr::VarLookup;
use crate::error::ErrorKind;

/// One row of a record table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
    /// Set when the row is a bare scalar rather than an object.
    scalar: Option<String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(name, value)` pairs, keeping their order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            scalar: None,
        }
    }

    /// A single-value row; the loop variable itself is bound to `value`.
    pub fn scalar(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            fields: vec![("value".to_owned(), value.clone())],
            scalar: Some(value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn scalar_value(&self) -> Option<&str> {
        self.scalar.as_deref()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Named record tables supplied by the embedding application.
pub trait RecordTables {
    fn table(&self, name: &str) -> Option<Vec<Record>>;
}

impl RecordTables for HashMap<String, Vec<Record>> {
    fn table(&self, name: &str) -> Option<Vec<Record>> {
        self.get(name).cloned()
    }
}

/// No tables at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTables;

impl RecordTables for NoTables {
    fn table(&self, _name: &str) -> Option<Vec<Record>> {
        None
    }
}

/// Parse a JSON array into records.
pub fn parse_json_records(text: &str) -> Result<Vec<Record>, ErrorKind> {
    let json: Json = serde_json::from_str(text)
        .map_err(|e| ErrorKind::Syntax(format!("bad record literal: {e}")))?;
    let Json::Array(rows) = json else {
        return Err(ErrorKind::Syntax("record literal must be a JSON array".into()));
    };
    Ok(rows.into_iter().map(record_from_json).collect())
}

fn record_from_json(row: Json) -> Record {
    match row {
        Json::Object(map) => Record::from_pairs(map.into_iter().map(|(k, v)| (k, json_text(v)))),
        other => Record::scalar(json_text(other)),
    }
}

/// Render a JSON value as template text: strings unquoted, null empty.
fn json_text(v: Json) -> String {
    match v {
        Json::Null => String::new(),
        Json::String(s) => s,
        other => other.to_string(),
    }
}

/// Resolve the source part of a `LOOP` directive.
///
/// `None` means the source is absent; the loop then runs zero times.
pub fn resolve_source(
    source: &str,
    tables: &dyn RecordTables,
    vars: &dyn VarLookup,
) -> Result<Option<Vec<Record>>, ErrorKind> {
    let source = source.trim();
    if source.is_empty() {
        return Ok(None);
    }
    if source.starts_with('[') {
        return parse_json_records(source).map(Some);
    }
    if let Some(rows) = tables.table(source) {
        return Ok(Some(rows));
    }
    match vars.get_var(source) {
        Some(text) if text.trim_start().starts_with('[') => parse_json_records(&text).map(Some),
        _ => Ok(None),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
