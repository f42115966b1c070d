//! Template directive engine.
//!
//! A template is a line-oriented document: literal text interspersed with
//! directive lines.  This module covers:
//!
//! - Conditionals: `_#IF` … `_#ELSE_IF` … `_#ELSE` … `_#END_IF`, plus
//!   `IF_SET`, `IF_NOT_SET`, `IF_DEF`, `IF_NOT_DEF`
//! - Loops over record tables: `_#LOOP row over source` … `_#END_LOOP`
//! - Macros: `_#MACRO name formals` … `_#END_MACRO`, called as `_#CALL name`,
//!   `_#name` or `_name`
//! - File inclusion: `_#INCLUDE path`
//! - Output cursors: `_{name`, `_}`, `_?name`, `_:name`
//! - Variable substitution in literal lines (`_name`, `_row.field`)
//!
//! # Quick start
//!
//! ```rust
//! use stencil::template::Interpreter;
//!
//! let mut interp = Interpreter::default();
//! let out = interp
//!     .render_str("demo", "_#MACRO greet name\nHi _name\n_#END_MACRO\n_greet name=Bob")
//!     .unwrap();
//! assert_eq!(out.lines(), ["Hi Bob"]);
//! ```

pub mod args;
pub mod capture;
pub mod cond;
pub mod cursor;
pub mod directive;
pub mod expand;
pub mod expr;
pub mod files;
pub mod interp;
pub mod macros;
pub mod records;
pub mod scope;
pub mod statement;
pub mod value;

// Re-exports for convenience.
pub use cursor::Output;
pub use expr::{Evaluator, ExprEvaluator, VarLookup};
pub use files::{FsLoader, LineSource, MemoryLoader, SourceLoader};
pub use interp::Interpreter;
pub use records::{Record, RecordTables};
pub use value::Value;
