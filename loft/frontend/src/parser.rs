#![allow(clippy::upper_case_acronyms)]

//! Parser for the loft Fortran dialect.
use crate::ast;
use crate::{BinOp, Dialect, Intent, ScalarKind, UnOp};
use loft_utils::{Error, FileIdx, GPosIdx, GlobalPositionTable, Id, LoftResult};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_consume::Parser;
use std::fs;
use std::path::Path;

type ParseResult<T> = Result<T, pest_consume::Error<Rule>>;

/// Data associated with parsing the file.
#[derive(Clone)]
struct UserData {
    /// Index to the current file.
    file: FileIdx,
    /// Host-dialect configuration for this parse.
    dialect: Dialect,
}

type Node<'i> = pest_consume::Node<'i, Rule, UserData>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("syntax.pest");

// Binary operator precedence, loosest level first. `lazy_static` so that
// this is only ever constructed once.
lazy_static::lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
        .op(Op::infix(Rule::eq_op, Assoc::Left)
            | Op::infix(Rule::ne_op, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left)
            | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::prefix(Rule::neg))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left))
        .op(Op::infix(Rule::pow, Assoc::Right));
}

#[derive(Parser)]
#[grammar = "syntax.pest"]
pub struct LoftParser;

impl LoftParser {
    /// Parse a source string into an AST, registering it with the global
    /// position table under `name`.
    pub fn parse_source(
        src: &str,
        name: &str,
        dialect: &Dialect,
    ) -> LoftResult<ast::SourceFile> {
        let time = std::time::Instant::now();
        let file =
            GlobalPositionTable::add_file(name.to_string(), src.to_string());
        let ud = UserData {
            file,
            dialect: dialect.clone(),
        };
        let inputs = LoftParser::parse_with_userdata(Rule::file, src, ud)
            .map_err(|e| Error::parse_error(e.to_string()))?;
        let input = inputs
            .single()
            .map_err(|e| Error::parse_error(e.to_string()))?;
        let out = Self::file(input)
            .map_err(|e| Error::parse_error(e.to_string()))?;
        log::info!("Parsed {name} in {}ms", time.elapsed().as_millis());
        Ok(out)
    }

    /// Parse a file from disk.
    pub fn parse_path(
        path: &Path,
        dialect: &Dialect,
    ) -> LoftResult<ast::SourceFile> {
        let content = fs::read_to_string(path).map_err(|err| {
            Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy()
            ))
        })?;
        Self::parse_source(&content, &path.to_string_lossy(), dialect)
    }
}

/// The source position of a node, registered in the global table.
fn span(input: &Node) -> GPosIdx {
    GPosIdx(GlobalPositionTable::add_pos(
        input.user_data().file,
        input.as_span().start(),
    ))
}

fn fold_case(s: &str, dialect: &Dialect) -> Id {
    if dialect.case_sensitive {
        Id::new(s)
    } else {
        Id::new(s.to_ascii_lowercase())
    }
}

/// Restructure the flat operator/operand sequence inside an `expr` pair.
fn pratt_expr(pairs: Pairs<Rule>, dialect: &Dialect) -> ast::Expr {
    PRATT
        .map_primary(|p| primary_expr(p, dialect))
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::neg => UnOp::Minus,
                Rule::not_op => UnOp::Not,
                r => unreachable!("unexpected prefix rule {r:?}"),
            };
            ast::Expr::Unary {
                op,
                operand: Box::new(operand),
            }
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add => BinOp::Add,
                Rule::sub => BinOp::Sub,
                Rule::mul => BinOp::Mul,
                Rule::div => BinOp::Div,
                Rule::pow => BinOp::Pow,
                Rule::eq_op => BinOp::Eq,
                Rule::ne_op => BinOp::Ne,
                Rule::lt => BinOp::Lt,
                Rule::le => BinOp::Le,
                Rule::gt => BinOp::Gt,
                Rule::ge => BinOp::Ge,
                Rule::and_op => BinOp::And,
                Rule::or_op => BinOp::Or,
                r => unreachable!("unexpected infix rule {r:?}"),
            };
            ast::Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
        })
        .parse(pairs)
}

fn primary_expr(p: Pair<Rule>, dialect: &Dialect) -> ast::Expr {
    match p.as_rule() {
        Rule::paren_expr => {
            let inner = p.into_inner().next().expect("paren_expr has an expr");
            pratt_expr(inner.into_inner(), dialect)
        }
        Rule::int_lit => ast::Expr::Int(p.as_str().to_string()),
        Rule::real_lit => ast::Expr::Real(p.as_str().to_string()),
        Rule::bool_lit => {
            let lit = p.into_inner().next().expect("bool_lit has a literal");
            ast::Expr::Bool(matches!(lit.as_rule(), Rule::true_lit))
        }
        Rule::path => path_expr(p, dialect),
        r => unreachable!("unexpected primary rule {r:?}"),
    }
}

fn path_expr(p: Pair<Rule>, dialect: &Dialect) -> ast::Expr {
    let mut segs = Vec::new();
    for seg in p.into_inner() {
        let mut name = None;
        let mut args = None;
        for part in seg.into_inner() {
            match part.as_rule() {
                Rule::ident => name = Some(fold_case(part.as_str(), dialect)),
                Rule::seg_args => {
                    args = Some(
                        part.into_inner()
                            .map(|e| pratt_expr(e.into_inner(), dialect))
                            .collect(),
                    )
                }
                _ => {}
            }
        }
        segs.push(ast::PathSeg {
            name: name.expect("path segment has a name"),
            args,
        });
    }
    ast::Expr::Path(segs)
}

#[pest_consume::parser]
impl LoftParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn file(input: Node) -> ParseResult<ast::SourceFile> {
        let mut module = None;
        let mut routines = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::module => module = Some(Self::module(child)?),
                Rule::routine => routines.push(Self::routine(child)?),
                _ => {}
            }
        }
        Ok(ast::SourceFile { module, routines })
    }

    fn module(input: Node) -> ParseResult<ast::ModuleDef> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut name = None;
        let mut routines = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                // the first identifier names the module; a trailing one just
                // closes it
                Rule::ident if name.is_none() => {
                    name = Some(fold_case(child.as_str(), &dialect))
                }
                Rule::routine => routines.push(Self::routine(child)?),
                _ => {}
            }
        }
        Ok(ast::ModuleDef {
            name: name.expect("module has a name"),
            routines,
            span,
        })
    }

    fn routine(input: Node) -> ParseResult<ast::RoutineDef> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut name = None;
        let mut params = Vec::new();
        let mut uses = Vec::new();
        let mut decls = Vec::new();
        let mut body = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::ident if name.is_none() => {
                    name = Some(fold_case(child.as_str(), &dialect))
                }
                Rule::params => {
                    params = child
                        .into_children()
                        .map(|p| fold_case(p.as_str(), &dialect))
                        .collect()
                }
                Rule::use_stmt => uses.push(Self::use_stmt(child)?),
                Rule::decl => decls.push(Self::decl(child)?),
                Rule::stmt => body.push(Self::stmt(child)?),
                _ => {}
            }
        }
        Ok(ast::RoutineDef {
            name: name.expect("routine has a name"),
            params,
            uses,
            decls,
            body,
            span,
        })
    }

    fn use_stmt(input: Node) -> ParseResult<ast::UseStmt> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut idents = input
            .into_children()
            .filter(|c| c.as_rule() == Rule::ident)
            .map(|c| fold_case(c.as_str(), &dialect));
        Ok(ast::UseStmt {
            container: idents.next().expect("use statement names a container"),
            names: idents.collect(),
            span,
        })
    }

    fn decl(input: Node) -> ParseResult<ast::Decl> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut kind = ScalarKind::Integer;
        let mut intent = None;
        let mut dims = None;
        let mut entities = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::type_spec => {
                    kind = match child.into_children().single()?.as_rule() {
                        Rule::kw_integer => ScalarKind::Integer,
                        Rule::kw_real => ScalarKind::Real,
                        Rule::kw_logical => ScalarKind::Boolean,
                        Rule::kw_character => ScalarKind::Character,
                        r => unreachable!("unexpected type rule {r:?}"),
                    }
                }
                Rule::decl_attrs => {
                    for attr in child.into_children() {
                        match attr.as_rule() {
                            Rule::intent_attr => {
                                for mode in attr.into_children() {
                                    if mode.as_rule() != Rule::intent_mode {
                                        continue;
                                    }
                                    intent = Some(
                                        match mode
                                            .into_children()
                                            .single()?
                                            .as_rule()
                                        {
                                            Rule::kw_in => Intent::In,
                                            Rule::kw_out => Intent::Out,
                                            Rule::kw_inout => Intent::InOut,
                                            r => unreachable!(
                                                "unexpected intent rule {r:?}"
                                            ),
                                        },
                                    )
                                }
                            }
                            Rule::dimension_attr => {
                                dims = Some(
                                    attr.into_children()
                                        .filter(|c| {
                                            c.as_rule() == Rule::extent
                                        })
                                        .map(|e| Self::extent(e))
                                        .collect::<ParseResult<Vec<_>>>()?,
                                )
                            }
                            _ => {}
                        }
                    }
                }
                Rule::entity => {
                    let mut name = None;
                    let mut edims = None;
                    for part in child.into_children() {
                        match part.as_rule() {
                            Rule::ident => {
                                name =
                                    Some(fold_case(part.as_str(), &dialect))
                            }
                            Rule::extent => {
                                edims
                                    .get_or_insert_with(Vec::new)
                                    .push(Self::extent(part)?);
                            }
                            _ => {}
                        }
                    }
                    entities.push(ast::Entity {
                        name: name.expect("entity has a name"),
                        dims: edims,
                    });
                }
                _ => {}
            }
        }
        Ok(ast::Decl {
            kind,
            intent,
            dims,
            entities,
            span,
        })
    }

    fn extent(input: Node) -> ParseResult<ast::Extent> {
        let dialect = input.user_data().dialect.clone();
        let child = input.into_children().single()?;
        Ok(match child.as_rule() {
            Rule::int_lit => ast::Extent::Literal(
                child.as_str().parse::<i64>().expect("digits parse as i64"),
            ),
            Rule::ident => {
                ast::Extent::Name(fold_case(child.as_str(), &dialect))
            }
            r => unreachable!("unexpected extent rule {r:?}"),
        })
    }

    fn stmt(input: Node) -> ParseResult<ast::Stmt> {
        let child = input.into_children().single()?;
        match child.as_rule() {
            Rule::do_stmt => Self::do_stmt(child),
            Rule::if_stmt => Self::if_stmt(child),
            Rule::call_stmt => Self::call_stmt(child),
            Rule::assign_stmt => Self::assign_stmt(child),
            r => unreachable!("unexpected statement rule {r:?}"),
        }
    }

    fn do_stmt(input: Node) -> ParseResult<ast::Stmt> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut var = None;
        let mut exprs = Vec::new();
        let mut body = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::ident => var = Some(fold_case(child.as_str(), &dialect)),
                Rule::expr => exprs
                    .push(pratt_expr(child.into_pair().into_inner(), &dialect)),
                Rule::stmt => body.push(Self::stmt(child)?),
                _ => {}
            }
        }
        let mut exprs = exprs.into_iter();
        Ok(ast::Stmt::Do {
            var: var.expect("do statement has a variable"),
            start: exprs.next().expect("do statement has a start"),
            stop: exprs.next().expect("do statement has a stop"),
            step: exprs.next(),
            body,
            span,
        })
    }

    fn if_stmt(input: Node) -> ParseResult<ast::Stmt> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut cond = None;
        let mut then_body = Vec::new();
        let mut else_body = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::expr => {
                    cond = Some(pratt_expr(
                        child.into_pair().into_inner(),
                        &dialect,
                    ))
                }
                Rule::stmt => then_body.push(Self::stmt(child)?),
                Rule::else_part => {
                    for s in child.into_children() {
                        if s.as_rule() == Rule::stmt {
                            else_body.push(Self::stmt(s)?);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(ast::Stmt::If {
            cond: cond.expect("if statement has a condition"),
            then_body,
            else_body,
            span,
        })
    }

    fn call_stmt(input: Node) -> ParseResult<ast::Stmt> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut name = None;
        let mut args = Vec::new();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::ident => name = Some(fold_case(child.as_str(), &dialect)),
                Rule::expr => args
                    .push(pratt_expr(child.into_pair().into_inner(), &dialect)),
                _ => {}
            }
        }
        Ok(ast::Stmt::Call {
            name: name.expect("call statement has a routine name"),
            args,
            span,
        })
    }

    fn assign_stmt(input: Node) -> ParseResult<ast::Stmt> {
        let span = span(&input);
        let dialect = input.user_data().dialect.clone();
        let mut target = None;
        let mut value = None;
        for child in input.into_children() {
            match child.as_rule() {
                Rule::path => target = Some(path_expr(child.into_pair(), &dialect)),
                Rule::expr => {
                    value = Some(pratt_expr(
                        child.into_pair().into_inner(),
                        &dialect,
                    ))
                }
                _ => {}
            }
        }
        Ok(ast::Stmt::Assign {
            target: target.expect("assignment has a target"),
            value: value.expect("assignment has a value"),
            span,
        })
    }
}
