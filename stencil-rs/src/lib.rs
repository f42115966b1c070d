//! stencil: a line-oriented template directive interpreter.

pub mod cli;
pub mod config;
pub mod error;
pub mod settings;
pub mod template;

pub use error::{Error, ErrorKind, Location, Result};
pub use template::{Interpreter, Output};
