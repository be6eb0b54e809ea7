//! Abstract syntax tree produced by the front-end parser. The AST is a plain
//! surface-level structure; name resolution and shape checking happen when it
//! is converted into the IR.
use crate::{BinOp, Intent, ScalarKind, UnOp};
use loft_utils::{GPosIdx, Id, WithPos};

/// A parsed source file: either a module or a sequence of bare routines.
#[derive(Debug)]
pub struct SourceFile {
    pub module: Option<ModuleDef>,
    pub routines: Vec<RoutineDef>,
}

#[derive(Debug)]
pub struct ModuleDef {
    pub name: Id,
    pub routines: Vec<RoutineDef>,
    pub span: GPosIdx,
}

#[derive(Debug)]
pub struct RoutineDef {
    pub name: Id,
    /// Dummy argument names, in declaration order.
    pub params: Vec<Id>,
    pub uses: Vec<UseStmt>,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub span: GPosIdx,
}

/// A `use <container>, only: <names>` import statement.
#[derive(Debug)]
pub struct UseStmt {
    pub container: Id,
    pub names: Vec<Id>,
    pub span: GPosIdx,
}

/// A type declaration statement, covering one or more entities.
#[derive(Debug)]
pub struct Decl {
    pub kind: ScalarKind,
    pub intent: Option<Intent>,
    /// Shape given via the `dimension` attribute, applying to every entity.
    pub dims: Option<Vec<Extent>>,
    pub entities: Vec<Entity>,
    pub span: GPosIdx,
}

#[derive(Debug)]
pub struct Entity {
    pub name: Id,
    /// Shape given directly on the entity, e.g. `a(100, n)`.
    pub dims: Option<Vec<Extent>>,
}

/// An array extent: a literal size or the name of a scalar bound variable.
#[derive(Debug, Clone)]
pub enum Extent {
    Literal(i64),
    Name(Id),
}

#[derive(Debug)]
pub enum Stmt {
    Assign {
        target: Expr,
        value: Expr,
        span: GPosIdx,
    },
    Do {
        var: Id,
        start: Expr,
        stop: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
        span: GPosIdx,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: GPosIdx,
    },
    Call {
        name: Id,
        args: Vec<Expr>,
        span: GPosIdx,
    },
}

impl WithPos for Stmt {
    fn copy_span(&self) -> GPosIdx {
        match self {
            Stmt::Assign { span, .. }
            | Stmt::Do { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Call { span, .. } => *span,
        }
    }
}

/// One segment of a `%`-separated reference path. `args` holds subscripts or
/// call arguments; the distinction is resolved against the symbol table
/// during IR construction.
#[derive(Debug)]
pub struct PathSeg {
    pub name: Id,
    pub args: Option<Vec<Expr>>,
}

#[derive(Debug)]
pub enum Expr {
    Int(String),
    Real(String),
    Bool(bool),
    Path(Vec<PathSeg>),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}
