//! Lowering of the front-end AST into the IR tree: name resolution, shape
//! checking, and intrinsic recognition.
use crate::{
    ArrayBound, Interface, Member, NodeId, NodeKind, Symbol, SymbolKind, Tree,
    Type,
};
use loft_frontend::{ast, Intent, Intrinsic};
use loft_utils::{Error, GPosIdx, Id, LoftResult, WithPos};

pub fn ast_to_ir(file: ast::SourceFile) -> LoftResult<Tree> {
    let mut tree = Tree::new();
    let root = tree.root();
    if let Some(module) = file.module {
        let scope = tree.new_scope();
        let container = tree.new_node(
            NodeKind::Container {
                name: module.name,
                scope,
            },
            module.span,
        );
        tree.add_child(root, container)?;
        for routine in module.routines {
            lower_routine(&mut tree, container, routine)?;
        }
    }
    for routine in file.routines {
        lower_routine(&mut tree, root, routine)?;
    }
    Ok(tree)
}

fn lower_routine(
    tree: &mut Tree,
    parent: NodeId,
    def: ast::RoutineDef,
) -> LoftResult<()> {
    let scope = tree.new_scope();
    let routine = tree.new_node(
        NodeKind::Routine {
            name: def.name,
            scope,
        },
        def.span,
    );
    tree.add_child(parent, routine)?;

    // Bind the dummy arguments first, in argument order, so that the
    // regenerated argument list matches the original even when the
    // declarations come in a different order. Declarations below fill in
    // the types.
    for param in &def.params {
        tree.add_symbol(
            scope,
            Symbol::data(*param, Type::Unresolved)
                .with_interface(Interface::Argument(Intent::InOut)),
        )?;
    }

    // Imported names resolve like any other binding but keep their origin,
    // so the printer can regenerate the `use` statements.
    for import in &def.uses {
        for name in &import.names {
            tree.add_symbol(
                scope,
                Symbol::data(*name, Type::Unresolved)
                    .with_interface(Interface::Import(import.container)),
            )
            .map_err(|e| e.with_pos(import.span))?;
        }
    }

    for decl in &def.decls {
        for entity in &decl.entities {
            let dims = entity.dims.as_ref().or(decl.dims.as_ref());
            let ty = match dims {
                None => Type::Scalar(decl.kind),
                Some(dims) => Type::Array {
                    elem: decl.kind,
                    shape: dims
                        .iter()
                        .map(|d| lower_bound(tree, routine, d))
                        .collect::<LoftResult<_>>()?,
                },
            };
            let interface = match decl.intent {
                Some(intent) => Interface::Argument(intent),
                None if def.params.contains(&entity.name) => {
                    Interface::Argument(Intent::InOut)
                }
                None => Interface::Local,
            };
            declare(tree, routine, entity.name, ty, interface)
                .map_err(|e| e.with_pos(decl.span))?;
        }
    }

    for stmt in def.body {
        let s = lower_stmt(tree, routine, stmt)?;
        tree.add_child(routine, s)?;
    }
    Ok(())
}

fn lower_bound(
    tree: &mut Tree,
    routine: NodeId,
    extent: &ast::Extent,
) -> LoftResult<ArrayBound> {
    Ok(match extent {
        ast::Extent::Literal(n) => ArrayBound::Literal(*n),
        ast::Extent::Name(name) => {
            let sym = resolve_data(tree, routine, *name)?;
            // A forward reference is still unresolved here; anything
            // already typed must be a scalar integer.
            let ty = &tree.symbol(sym).ty;
            if *ty != Type::Unresolved && !ty.is_scalar_integer() {
                return Err(Error::parse_error(format!(
                    "array bound '{name}' must be a scalar integer"
                )));
            }
            ArrayBound::Var(sym)
        }
    })
}

/// Bind `name` in the routine's scope, or fill in a placeholder created
/// earlier for a dummy argument or forward reference.
fn declare(
    tree: &mut Tree,
    routine: NodeId,
    name: Id,
    ty: Type,
    interface: Interface,
) -> LoftResult<()> {
    let scope = tree.enclosing_scope(routine);
    match tree.lookup_in(scope, name) {
        Some(existing)
            if tree.symbol(existing).ty == Type::Unresolved
                && !matches!(
                    tree.symbol(existing).interface,
                    Interface::Import(_)
                ) =>
        {
            if !ty.is_scalar_integer() && tree.is_array_bound(existing) {
                return Err(Error::parse_error(format!(
                    "'{name}' bounds an array and must be a scalar integer"
                )));
            }
            let sym = tree.symbol_mut(existing);
            sym.ty = ty;
            sym.kind = SymbolKind::Data;
            // An explicit intent wins over the dummy-argument default.
            if !matches!(interface, Interface::Argument(Intent::InOut))
                || matches!(sym.interface, Interface::Unresolved)
            {
                sym.interface = interface;
            }
            Ok(())
        }
        Some(_) => Err(Error::name_collision(format!(
            "symbol '{name}' is declared twice"
        ))),
        None => {
            tree.add_symbol(
                scope,
                Symbol::data(name, ty).with_interface(interface),
            )?;
            Ok(())
        }
    }
}

/// Find `name` in the scopes visible from `at`, or bind it in the nearest
/// scope as an unresolved symbol assumed to come from elsewhere.
fn resolve_data(
    tree: &mut Tree,
    at: NodeId,
    name: Id,
) -> LoftResult<crate::SymbolId> {
    if let Some(sym) = tree.lookup(at, name) {
        return Ok(sym);
    }
    log::debug!("assuming '{name}' is declared in an outer scope");
    let scope = tree.enclosing_scope(at);
    tree.add_symbol(
        scope,
        Symbol::data(name, Type::Unresolved)
            .with_interface(Interface::Unresolved),
    )
}

fn lower_stmt(
    tree: &mut Tree,
    routine: NodeId,
    stmt: ast::Stmt,
) -> LoftResult<NodeId> {
    let span = stmt.copy_span();
    match stmt {
        ast::Stmt::Assign { target, value, .. } => {
            let node = tree.new_node(NodeKind::Assignment, span);
            let target = lower_expr(tree, routine, target)?;
            let value = lower_expr(tree, routine, value)?;
            tree.add_child(node, target).map_err(|e| e.with_pos(span))?;
            tree.add_child(node, value).map_err(|e| e.with_pos(span))?;
            Ok(node)
        }
        ast::Stmt::Do {
            var,
            start,
            stop,
            step,
            body,
            ..
        } => {
            let variable = match tree.lookup(routine, var) {
                Some(sym) => sym,
                None => {
                    let scope = tree.enclosing_scope(routine);
                    tree.add_symbol(
                        scope,
                        Symbol::data(
                            var,
                            Type::Scalar(loft_frontend::ScalarKind::Integer),
                        ),
                    )?
                }
            };
            let node = tree.new_node(NodeKind::Loop { variable }, span);
            let start = lower_expr(tree, routine, start)?;
            let stop = lower_expr(tree, routine, stop)?;
            let step = match step {
                // A step like `-1` parses as a negation of a literal; fold
                // it so the step stays a compile-time constant.
                Some(ast::Expr::Unary {
                    op: loft_frontend::UnOp::Minus,
                    operand,
                }) if matches!(*operand, ast::Expr::Int(_)) => {
                    let ast::Expr::Int(text) = *operand else {
                        unreachable!()
                    };
                    tree.new_node(
                        NodeKind::Literal {
                            value: Id::new(format!("-{text}")),
                            ty: loft_frontend::ScalarKind::Integer,
                        },
                        GPosIdx::UNKNOWN,
                    )
                }
                Some(step) => lower_expr(tree, routine, step)?,
                None => tree.new_node(
                    NodeKind::Literal {
                        value: Id::new("1"),
                        ty: loft_frontend::ScalarKind::Integer,
                    },
                    GPosIdx::UNKNOWN,
                ),
            };
            tree.add_child(node, start)?;
            tree.add_child(node, stop)?;
            tree.add_child(node, step)?;
            let sched_scope = tree.new_scope();
            let sched = tree.new_node(
                NodeKind::Schedule { scope: sched_scope },
                span,
            );
            tree.add_child(node, sched)?;
            for stmt in body {
                let s = lower_stmt(tree, routine, stmt)?;
                tree.add_child(sched, s)?;
            }
            Ok(node)
        }
        ast::Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            let node = tree.new_node(NodeKind::IfBlock, span);
            let cond = lower_expr(tree, routine, cond)?;
            tree.add_child(node, cond)?;
            let then_scope = tree.new_scope();
            let then =
                tree.new_node(NodeKind::Schedule { scope: then_scope }, span);
            tree.add_child(node, then)?;
            for stmt in then_body {
                let s = lower_stmt(tree, routine, stmt)?;
                tree.add_child(then, s)?;
            }
            if !else_body.is_empty() {
                let else_scope = tree.new_scope();
                let els = tree
                    .new_node(NodeKind::Schedule { scope: else_scope }, span);
                tree.add_child(node, els)?;
                for stmt in else_body {
                    let s = lower_stmt(tree, routine, stmt)?;
                    tree.add_child(els, s)?;
                }
            }
            Ok(node)
        }
        ast::Stmt::Call { name, args, .. } => {
            let sym = match tree.lookup(routine, name) {
                Some(sym) => sym,
                None => {
                    let scope = tree.enclosing_scope(routine);
                    tree.add_symbol(
                        scope,
                        Symbol {
                            name,
                            kind: SymbolKind::Routine,
                            ty: Type::Opaque,
                            interface: Interface::Unresolved,
                            tag: None,
                        },
                    )?
                }
            };
            let node = tree.new_node(NodeKind::Call { routine: sym }, span);
            for arg in args {
                let a = lower_expr(tree, routine, arg)?;
                tree.add_child(node, a)?;
            }
            Ok(node)
        }
    }
}

fn lower_expr(
    tree: &mut Tree,
    routine: NodeId,
    expr: ast::Expr,
) -> LoftResult<NodeId> {
    match expr {
        ast::Expr::Int(text) => Ok(tree.new_node(
            NodeKind::Literal {
                value: Id::new(text),
                ty: loft_frontend::ScalarKind::Integer,
            },
            GPosIdx::UNKNOWN,
        )),
        ast::Expr::Real(text) => Ok(tree.new_node(
            NodeKind::Literal {
                value: Id::new(text),
                ty: loft_frontend::ScalarKind::Real,
            },
            GPosIdx::UNKNOWN,
        )),
        ast::Expr::Bool(b) => Ok(tree.new_node(
            NodeKind::Literal {
                value: Id::new(if b { "true" } else { "false" }),
                ty: loft_frontend::ScalarKind::Boolean,
            },
            GPosIdx::UNKNOWN,
        )),
        ast::Expr::Unary { op, operand } => {
            let node =
                tree.new_node(NodeKind::UnaryOp(op), GPosIdx::UNKNOWN);
            let operand = lower_expr(tree, routine, *operand)?;
            tree.add_child(node, operand)?;
            Ok(node)
        }
        ast::Expr::Binary { op, lhs, rhs } => {
            let node =
                tree.new_node(NodeKind::BinaryOp(op), GPosIdx::UNKNOWN);
            let lhs = lower_expr(tree, routine, *lhs)?;
            let rhs = lower_expr(tree, routine, *rhs)?;
            tree.add_child(node, lhs)?;
            tree.add_child(node, rhs)?;
            Ok(node)
        }
        ast::Expr::Path(segs) => lower_path(tree, routine, segs),
    }
}

fn lower_path(
    tree: &mut Tree,
    routine: NodeId,
    mut segs: Vec<ast::PathSeg>,
) -> LoftResult<NodeId> {
    if segs.len() == 1 {
        let seg = segs.pop().expect("one segment");
        return match seg.args {
            None => {
                let symbol = resolve_data(tree, routine, seg.name)?;
                Ok(tree
                    .new_node(NodeKind::Reference { symbol }, GPosIdx::UNKNOWN))
            }
            Some(args) => {
                // A declared symbol shadows any intrinsic of the same name.
                if let Some(symbol) = tree.lookup(routine, seg.name) {
                    let node = tree.new_node(
                        NodeKind::ArrayRef { symbol },
                        GPosIdx::UNKNOWN,
                    );
                    attach_args(tree, routine, node, args)?;
                    return Ok(node);
                }
                if let Some(intr) = Intrinsic::from_name(seg.name.as_str()) {
                    let (min, max) = intr.arity();
                    let ok = args.len() >= min
                        && max.map_or(true, |max| args.len() <= max);
                    if !ok {
                        return Err(Error::parse_error(format!(
                            "'{}' does not take {} argument(s)",
                            intr.surface(),
                            args.len()
                        )));
                    }
                    let node = tree.new_node(
                        NodeKind::IntrinsicCall(intr),
                        GPosIdx::UNKNOWN,
                    );
                    attach_args(tree, routine, node, args)?;
                    return Ok(node);
                }
                let symbol = resolve_data(tree, routine, seg.name)?;
                let node = tree.new_node(
                    NodeKind::ArrayRef { symbol },
                    GPosIdx::UNKNOWN,
                );
                attach_args(tree, routine, node, args)?;
                Ok(node)
            }
        };
    }

    let mut segs = segs.into_iter();
    let base = segs.next().expect("paths are non-empty");
    if base.args.is_some() {
        return Err(Error::parse_error(format!(
            "subscripts on the structure base '{}' are not supported",
            base.name
        )));
    }
    let symbol = resolve_data(tree, routine, base.name)?;
    let mut members = Vec::new();
    let mut subscripts = Vec::new();
    for seg in segs {
        let args = seg.args.unwrap_or_default();
        members.push(Member {
            name: seg.name,
            args: args.len(),
        });
        subscripts.extend(args);
    }
    let node = tree.new_node(
        NodeKind::StructureRef { symbol, members },
        GPosIdx::UNKNOWN,
    );
    attach_args(tree, routine, node, subscripts)?;
    Ok(node)
}

fn attach_args(
    tree: &mut Tree,
    routine: NodeId,
    node: NodeId,
    args: Vec<ast::Expr>,
) -> LoftResult<()> {
    for arg in args {
        let a = lower_expr(tree, routine, arg)?;
        tree.add_child(node, a)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Printer;
    use loft_frontend::{Dialect, LoftParser};

    fn lower(src: &str) -> Tree {
        let ast = LoftParser::parse_source(src, "test", &Dialect::default())
            .expect("parses");
        ast_to_ir(ast).expect("lowers")
    }

    #[test]
    fn loop_gets_default_step_and_schedule() {
        let tree = lower(
            "subroutine s(n)\ninteger, intent(in) :: n\ninteger :: i\nreal :: x\ndo i = 1, n\n  x = 1.0\nend do\nend subroutine s\n",
        );
        let loops: Vec<_> = tree
            .walk(tree.root())
            .into_iter()
            .filter(|n| matches!(tree.get(*n).kind, NodeKind::Loop { .. }))
            .collect();
        assert_eq!(loops.len(), 1);
        let (_, _, step, body) = tree.loop_parts(loops[0]).unwrap();
        assert!(matches!(
            &tree.get(step).kind,
            NodeKind::Literal { value, .. } if *value == "1"
        ));
        assert!(matches!(tree.get(body).kind, NodeKind::Schedule { .. }));
    }

    #[test]
    fn undeclared_names_become_unresolved_symbols() {
        let tree = lower(
            "subroutine s()\nreal :: x\nx = y + 1.0\nend subroutine s\n",
        );
        let routine = tree.children(tree.root())[0];
        let y = tree.lookup(routine, Id::new("y")).expect("y is bound");
        assert_eq!(tree.symbol(y).ty, Type::Unresolved);
        assert_eq!(tree.symbol(y).interface, Interface::Unresolved);
    }

    #[test]
    fn use_only_binds_imported_symbols() {
        let tree = lower(
            "subroutine s()\nuse params, only: alpha\nreal :: x\nx = x * alpha\nend subroutine s\n",
        );
        let routine = tree.children(tree.root())[0];
        let sym = tree
            .lookup(routine, Id::new("alpha"))
            .expect("alpha is bound");
        assert_eq!(
            tree.symbol(sym).interface,
            Interface::Import(Id::new("params"))
        );
    }

    #[test]
    fn rejects_non_integer_array_bounds() {
        let fwd = "subroutine s()\nreal :: x\nreal, dimension(x) :: a\nend subroutine s\n";
        let ast = LoftParser::parse_source(fwd, "test", &Dialect::default())
            .expect("parses");
        let err = ast_to_ir(ast).unwrap_err();
        assert!(err.to_string().contains("scalar integer"));

        // The declaration may also arrive after the array that uses it.
        let rev = "subroutine s()\nreal, dimension(x) :: a\nreal :: x\nend subroutine s\n";
        let ast = LoftParser::parse_source(rev, "test", &Dialect::default())
            .expect("parses");
        let err = ast_to_ir(ast).unwrap_err();
        assert!(err.to_string().contains("scalar integer"));
    }

    #[test]
    fn declared_array_shadows_intrinsic_name() {
        let tree = lower(
            "subroutine s()\nreal, dimension(3) :: min\nreal :: x\nx = min(2)\nend subroutine s\n",
        );
        let refs: Vec<_> = tree
            .walk(tree.root())
            .into_iter()
            .filter(|n| {
                matches!(tree.get(*n).kind, NodeKind::ArrayRef { .. })
            })
            .collect();
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn intrinsic_arity_is_checked() {
        let src =
            "subroutine s()\nreal :: x\nx = abs(1.0, 2.0)\nend subroutine s\n";
        let ast = LoftParser::parse_source(src, "test", &Dialect::default())
            .expect("parses");
        assert!(ast_to_ir(ast).is_err());
    }

    #[test]
    fn round_trips_a_small_routine() {
        // Declarations follow the argument order so that the regenerated
        // text matches byte for byte.
        let src = "subroutine s(a, n)\n  real, intent(inout) :: a(n)\n  integer, intent(in) :: n\n  integer :: i\n\n  do i = 1, n\n    a(i) = a(i) + 1.0\n  end do\nend subroutine s\n";
        let tree = lower(src);
        let printed = Printer::tree_to_string(&tree);
        assert_eq!(printed, src);
    }
}
