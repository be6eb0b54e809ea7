//! The intermediate representation of the loft transformation engine: an
//! arena-backed tree of nodes with scoped symbol tables, plus the lowering
//! from the front-end AST and the source-form printer.
mod builder;
mod common;
mod from_ast;
mod node;
mod printer;
mod symbol;
mod tree;

pub use builder::Builder;
pub use common::{NodeId, ScopeId, SymbolId};
pub use from_ast::ast_to_ir;
pub use node::{Member, Node, NodeKind};
pub use printer::Printer;
pub use symbol::{
    ArrayBound, Interface, Symbol, SymbolKind, SymbolTable, Type,
};
pub use tree::Tree;

// Vocabulary shared with the front-end.
pub use loft_frontend::{
    BinOp, Dialect, Intent, Intrinsic, ScalarKind, UnOp,
};

use loft_utils::LoftResult;
use std::path::Path;

/// Parse a source string straight into an IR tree.
pub fn parse_source(
    src: &str,
    name: &str,
    dialect: &Dialect,
) -> LoftResult<Tree> {
    ast_to_ir(loft_frontend::LoftParser::parse_source(src, name, dialect)?)
}

/// Parse a file from disk into an IR tree.
pub fn parse_path(path: &Path, dialect: &Dialect) -> LoftResult<Tree> {
    ast_to_ir(loft_frontend::LoftParser::parse_path(path, dialect)?)
}
