//! Error taxonomy for template interpretation.
//!
//! Every failure is fatal to the current run.  Low-level components return a
//! bare [`ErrorKind`]; the orchestrator attaches the [`Location`] of the line
//! being processed and surfaces an [`Error`].

use std::fmt;

use thiserror::Error;

/// Result type used throughout the interpreter.
pub type Result<T> = std::result::Result<T, Error>;

/// Where in the input an error was raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Resolved path (or display name) of the source.
    pub path: String,
    /// 1-based line number; 0 when no line has been read yet.
    pub line: usize,
}

impl Location {
    pub fn new(path: impl Into<String>, line: usize) -> Self {
        Self { path: path.into(), line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// What went wrong.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Unrecognised `_#` keyword, malformed quoting, bad record literal.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A close directive without its opener, or an opener never closed.
    #[error("unmatched block: {0}")]
    UnmatchedBlock(String),

    /// Call of a macro name that was never registered.
    #[error("undefined macro: {0}")]
    UndefinedMacro(String),

    /// Include of a path already present in the active include chain.
    #[error("circular include of {path} (chain: {chain})")]
    CircularInclude { path: String, chain: String },

    /// Macro or include nesting passed the configured ceiling.
    #[error("recursion limit of {0} exceeded")]
    RecursionLimitExceeded(usize),

    /// Reference to an undefined variable in strict mode.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// The expression evaluator rejected a condition.
    #[error("expression error: {0}")]
    Expression(String),

    /// A line source could not be opened or read.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorKind {
    /// Attach a location, producing a reportable [`Error`].
    pub fn at(self, location: Location) -> Error {
        Error { kind: self, location }
    }
}

/// A fatal interpretation error with the offending file and line.
#[derive(Debug, Error)]
#[error("{location}: {kind}")]
pub struct Error {
    #[source]
    pub kind: ErrorKind,
    pub location: Location,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
