//! Front-end for the loft transformation engine: a parser for the supported
//! Fortran dialect and the surface AST it produces.
pub mod ast;
mod common;
mod parser;

pub use common::{BinOp, Dialect, Intent, Intrinsic, ScalarKind, UnOp};
pub use parser::LoftParser;
