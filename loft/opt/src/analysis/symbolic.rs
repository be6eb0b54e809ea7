//! A small symbolic equality oracle over integer expressions.
//!
//! Expressions are normalized into polynomials over atoms, where an atom is
//! the rendered text of a reference (`n`, `a(i)`, `fld%lo`) or of a subtree
//! the oracle does not model (calls, divisions, real arithmetic). Two
//! expressions are [`Equality::Equal`] when the difference of their
//! polynomials cancels, [`Equality::NotEqual`] when a fully modeled residue
//! remains, and [`Equality::Unknown`] when the residue involves unmodeled
//! atoms. Atoms are compared by text, so `a(i)` and `a(i + 1)` are simply
//! different atoms; the verdict is about expression identity, not about the
//! runtime values of free variables.
use loft_ir::{BinOp, NodeId, NodeKind, Printer, ScalarKind, Tree, UnOp};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    Equal,
    NotEqual,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Atom {
    /// A reference, compared by its rendered text.
    Var(String),
    /// A subtree the oracle does not model, compared by its rendered text.
    /// Identical opaque atoms still cancel.
    Opaque(String),
}

/// A product of atoms with exponents. The empty monomial is the constant 1.
type Monomial = BTreeMap<Atom, u32>;
/// A sum of monomials with integer coefficients.
type Poly = BTreeMap<Monomial, i64>;

/// Compare two expression subtrees symbolically.
pub fn equal(tree: &Tree, a: NodeId, b: NodeId) -> Equality {
    let mut diff = poly_of(tree, a);
    for (mono, coeff) in poly_of(tree, b) {
        *diff.entry(mono).or_insert(0) -= coeff;
    }
    diff.retain(|_, coeff| *coeff != 0);
    if diff.is_empty() {
        Equality::Equal
    } else if diff
        .keys()
        .flat_map(|mono| mono.keys())
        .any(|atom| matches!(atom, Atom::Opaque(_)))
    {
        Equality::Unknown
    } else {
        Equality::NotEqual
    }
}

fn constant(value: i64) -> Poly {
    let mut poly = Poly::new();
    poly.insert(Monomial::new(), value);
    poly
}

fn atom_poly(atom: Atom) -> Poly {
    let mut mono = Monomial::new();
    mono.insert(atom, 1);
    let mut poly = Poly::new();
    poly.insert(mono, 1);
    poly
}

fn opaque(tree: &Tree, node: NodeId) -> Poly {
    atom_poly(Atom::Opaque(Printer::expr_to_string(tree, node)))
}

fn add_scaled(acc: &mut Poly, other: Poly, scale: i64) {
    for (mono, coeff) in other {
        *acc.entry(mono).or_insert(0) += coeff * scale;
    }
    acc.retain(|_, coeff| *coeff != 0);
}

fn mul(a: &Poly, b: &Poly) -> Poly {
    let mut out = Poly::new();
    for (ma, ca) in a {
        for (mb, cb) in b {
            let mut mono = ma.clone();
            for (atom, exp) in mb {
                *mono.entry(atom.clone()).or_insert(0) += exp;
            }
            *out.entry(mono).or_insert(0) += ca * cb;
        }
    }
    out.retain(|_, coeff| *coeff != 0);
    out
}

fn poly_of(tree: &Tree, node: NodeId) -> Poly {
    match &tree.get(node).kind {
        NodeKind::Literal { value, ty } => match ty {
            ScalarKind::Integer => match value.as_str().parse::<i64>() {
                Ok(v) => constant(v),
                Err(_) => opaque(tree, node),
            },
            // Real and logical arithmetic is not modeled; identical
            // literal text still cancels.
            _ => opaque(tree, node),
        },
        NodeKind::Reference { .. }
        | NodeKind::ArrayRef { .. }
        | NodeKind::StructureRef { .. } => {
            atom_poly(Atom::Var(Printer::expr_to_string(tree, node)))
        }
        NodeKind::UnaryOp(UnOp::Minus) => {
            let mut out = Poly::new();
            let operand = poly_of(tree, tree.children(node)[0]);
            add_scaled(&mut out, operand, -1);
            out
        }
        NodeKind::BinaryOp(op @ (BinOp::Add | BinOp::Sub)) => {
            let children = tree.children(node);
            let mut out = poly_of(tree, children[0]);
            let scale = if *op == BinOp::Add { 1 } else { -1 };
            add_scaled(&mut out, poly_of(tree, children[1]), scale);
            out
        }
        NodeKind::BinaryOp(BinOp::Mul) => {
            let children = tree.children(node);
            mul(
                &poly_of(tree, children[0]),
                &poly_of(tree, children[1]),
            )
        }
        // Division, exponentiation, comparisons, logicals, calls: opaque.
        _ => opaque(tree, node),
    }
}
