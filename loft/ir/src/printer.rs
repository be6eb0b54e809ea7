//! Rendering of IR trees back into source form. Output is deterministic:
//! declarations follow symbol-table insertion order and expressions are
//! parenthesized from operator precedence alone, so the same tree always
//! prints the same text.
use crate::{ArrayBound, Interface, NodeId, NodeKind, SymbolKind, Tree, Type};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use loft_frontend::{BinOp, ScalarKind, UnOp};
use loft_utils::Id;
use std::io;

/// Precedence levels for the expression printer, tighter is higher.
fn bin_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq
        | BinOp::Ne
        | BinOp::Lt
        | BinOp::Le
        | BinOp::Gt
        | BinOp::Ge => 4,
        BinOp::Add | BinOp::Sub => 5,
        BinOp::Mul | BinOp::Div => 7,
        BinOp::Pow => 9,
    }
}

fn un_prec(op: UnOp) -> u8 {
    match op {
        UnOp::Not => 3,
        UnOp::Minus => 6,
    }
}

pub struct Printer;

impl Printer {
    /// Render a whole tree.
    pub fn write_tree<W: io::Write>(tree: &Tree, f: &mut W) -> io::Result<()> {
        let children = tree.children(tree.root());
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            Self::write_node(tree, *child, 0, f)?;
        }
        Ok(())
    }

    pub fn tree_to_string(tree: &Tree) -> String {
        let mut buf = Vec::new();
        Self::write_tree(tree, &mut buf).expect("writing to a Vec");
        String::from_utf8(buf).expect("printer emits UTF-8")
    }

    /// Render one node (and its subtree) at the given indent.
    pub fn write_node<W: io::Write>(
        tree: &Tree,
        id: NodeId,
        indent: usize,
        f: &mut W,
    ) -> io::Result<()> {
        let pad = " ".repeat(indent);
        let node = tree.get(id);
        match &node.kind {
            NodeKind::FileContainer { .. } => {
                for child in tree.children(id) {
                    Self::write_node(tree, *child, indent, f)?;
                }
                Ok(())
            }
            NodeKind::Container { name, .. } => {
                writeln!(f, "{pad}module {name}")?;
                writeln!(f, "{pad}contains")?;
                for child in tree.children(id) {
                    writeln!(f)?;
                    Self::write_node(tree, *child, indent + 2, f)?;
                }
                writeln!(f, "{pad}end module {name}")
            }
            NodeKind::Routine { name, scope } => {
                let args = tree
                    .scope(*scope)
                    .iter()
                    .filter(|(_, sym)| {
                        matches!(
                            tree.symbol(*sym).interface,
                            Interface::Argument(_)
                        )
                    })
                    .map(|(name, _)| name.to_string())
                    .join(", ");
                writeln!(f, "{pad}subroutine {name}({args})")?;
                let mut wrote_decl = false;
                // Imports first, grouped by container in binding order.
                let mut imports: LinkedHashMap<Id, Vec<Id>> =
                    LinkedHashMap::new();
                for (name, sym) in tree.scope(*scope).iter() {
                    if let Interface::Import(container) =
                        tree.symbol(sym).interface
                    {
                        imports
                            .entry(container)
                            .or_insert_with(Vec::new)
                            .push(name);
                    }
                }
                for (container, names) in &imports {
                    let names = names.iter().join(", ");
                    writeln!(f, "{pad}  use {container}, only: {names}")?;
                    wrote_decl = true;
                }
                for (name, sym) in tree.scope(*scope).iter() {
                    let sym = tree.symbol(sym);
                    if sym.kind != SymbolKind::Data {
                        continue;
                    }
                    let (elem, shape) = match &sym.ty {
                        Type::Scalar(k) => (k, None),
                        Type::Array { elem, shape } => (elem, Some(shape)),
                        // Nothing to declare for symbols of unknown type.
                        Type::Unresolved | Type::Opaque => continue,
                    };
                    write!(f, "{pad}  {elem}")?;
                    if let Interface::Argument(intent) = sym.interface {
                        write!(f, ", intent({intent})")?;
                    }
                    write!(f, " :: {name}")?;
                    if let Some(shape) = shape {
                        let dims = shape
                            .iter()
                            .map(|b| Self::bound(tree, b))
                            .join(", ");
                        write!(f, "({dims})")?;
                    }
                    writeln!(f)?;
                    wrote_decl = true;
                }
                if wrote_decl && !tree.children(id).is_empty() {
                    writeln!(f)?;
                }
                for child in tree.children(id) {
                    Self::write_node(tree, *child, indent + 2, f)?;
                }
                writeln!(f, "{pad}end subroutine {name}")
            }
            NodeKind::Schedule { .. } => {
                for child in tree.children(id) {
                    Self::write_node(tree, *child, indent, f)?;
                }
                Ok(())
            }
            NodeKind::Loop { variable } => {
                let (start, stop, step, body) = tree
                    .loop_parts(id)
                    .map_err(|e| io::Error::other(e.to_string()))?;
                let var = tree.symbol(*variable).name;
                let start = Self::expr_to_string(tree, start);
                let stop = Self::expr_to_string(tree, stop);
                let step_str = Self::expr_to_string(tree, step);
                if step_str == "1" {
                    writeln!(f, "{pad}do {var} = {start}, {stop}")?;
                } else {
                    writeln!(f, "{pad}do {var} = {start}, {stop}, {step_str}")?;
                }
                Self::write_node(tree, body, indent + 2, f)?;
                writeln!(f, "{pad}end do")
            }
            NodeKind::Assignment => {
                let children = tree.children(id);
                let target = Self::expr_to_string(tree, children[0]);
                let value = Self::expr_to_string(tree, children[1]);
                writeln!(f, "{pad}{target} = {value}")
            }
            NodeKind::IfBlock => {
                let children = tree.children(id);
                let cond = Self::expr_to_string(tree, children[0]);
                writeln!(f, "{pad}if ({cond}) then")?;
                Self::write_node(tree, children[1], indent + 2, f)?;
                if let Some(els) = children.get(2) {
                    writeln!(f, "{pad}else")?;
                    Self::write_node(tree, *els, indent + 2, f)?;
                }
                writeln!(f, "{pad}end if")
            }
            NodeKind::Call { routine } => {
                let name = tree.symbol(*routine).name;
                let args = tree
                    .children(id)
                    .iter()
                    .map(|a| Self::expr_to_string(tree, *a))
                    .join(", ");
                writeln!(f, "{pad}call {name}({args})")
            }
            NodeKind::ExtractRegion {
                name,
                inputs,
                outputs,
            } => {
                writeln!(
                    f,
                    "{pad}call extract_start('{name}', {}, {})",
                    inputs.len(),
                    outputs.len()
                )?;
                for var in inputs {
                    writeln!(f, "{pad}call extract_read('{var}')")?;
                }
                Self::write_node(tree, tree.children(id)[0], indent, f)?;
                for var in outputs {
                    writeln!(f, "{pad}call extract_write('{var}')")?;
                }
                writeln!(f, "{pad}call extract_end('{name}')")
            }
            NodeKind::CodeBlock { text } => {
                for line in text.as_str().lines() {
                    writeln!(f, "{pad}{line}")?;
                }
                Ok(())
            }
            kind if kind.is_expression() => {
                writeln!(f, "{pad}{}", Self::expr_to_string(tree, id))
            }
            kind => Err(io::Error::other(format!(
                "cannot print a '{}' node",
                kind.tag()
            ))),
        }
    }

    fn bound(tree: &Tree, bound: &ArrayBound) -> String {
        match bound {
            ArrayBound::Literal(n) => n.to_string(),
            ArrayBound::Var(sym) => tree.symbol(*sym).name.to_string(),
        }
    }

    /// Render an expression subtree.
    pub fn expr_to_string(tree: &Tree, id: NodeId) -> String {
        match &tree.get(id).kind {
            NodeKind::Literal { value, ty } => match ty {
                ScalarKind::Boolean => format!(".{value}."),
                _ => value.to_string(),
            },
            NodeKind::Reference { symbol } => {
                tree.symbol(*symbol).name.to_string()
            }
            NodeKind::ArrayRef { symbol } => {
                let subs = tree
                    .children(id)
                    .iter()
                    .map(|s| Self::expr_to_string(tree, *s))
                    .join(", ");
                format!("{}({subs})", tree.symbol(*symbol).name)
            }
            NodeKind::StructureRef { symbol, members } => {
                let mut out = tree.symbol(*symbol).name.to_string();
                let children = tree.children(id);
                let mut taken = 0;
                for member in members {
                    out.push('%');
                    out.push_str(member.name.as_str());
                    if member.args > 0 {
                        let subs = children[taken..taken + member.args]
                            .iter()
                            .map(|s| Self::expr_to_string(tree, *s))
                            .join(", ");
                        out.push_str(&format!("({subs})"));
                        taken += member.args;
                    }
                }
                out
            }
            NodeKind::IntrinsicCall(intr) => {
                let args = tree
                    .children(id)
                    .iter()
                    .map(|a| Self::expr_to_string(tree, *a))
                    .join(", ");
                format!("{}({args})", intr.surface())
            }
            NodeKind::UnaryOp(op) => {
                let operand = tree.children(id)[0];
                let inner = Self::expr_to_string(tree, operand);
                let needs_parens = match &tree.get(operand).kind {
                    NodeKind::BinaryOp(inner_op) => {
                        bin_prec(*inner_op) < un_prec(*op)
                    }
                    // Two adjacent operators are not valid source.
                    NodeKind::UnaryOp(_) => true,
                    _ => false,
                };
                let space = if *op == UnOp::Not { " " } else { "" };
                if needs_parens {
                    format!("{}{space}({inner})", op.surface())
                } else {
                    format!("{}{space}{inner}", op.surface())
                }
            }
            NodeKind::BinaryOp(op) => {
                let children = tree.children(id);
                let lhs = Self::binary_side(tree, *op, children[0], false);
                let rhs = Self::binary_side(tree, *op, children[1], true);
                format!("{lhs} {} {rhs}", op.surface())
            }
            kind => unreachable!("'{}' is not an expression", kind.tag()),
        }
    }

    /// Render one operand of a binary operator, parenthesizing where the
    /// reparse would otherwise group differently.
    fn binary_side(
        tree: &Tree,
        op: BinOp,
        operand: NodeId,
        is_rhs: bool,
    ) -> String {
        let inner = Self::expr_to_string(tree, operand);
        let my_prec = bin_prec(op);
        let needs_parens = match &tree.get(operand).kind {
            NodeKind::BinaryOp(inner_op) => {
                let inner_prec = bin_prec(*inner_op);
                if inner_prec != my_prec {
                    inner_prec < my_prec
                } else if op == BinOp::Pow {
                    // Right-associative.
                    !is_rhs
                } else {
                    is_rhs
                }
            }
            NodeKind::UnaryOp(inner_op) => un_prec(*inner_op) < my_prec,
            _ => false,
        };
        if needs_parens {
            format!("({inner})")
        } else {
            inner
        }
    }
}
