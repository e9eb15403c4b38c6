// Parser module for extracting structural facts from source files

pub mod ast;
mod python;

pub use ast::*;
pub use python::{ParserSettings, PythonParser};
