//! Tree nodes. Each node is a kind plus an ordered child list; the child
//! shapes each kind accepts are fixed and checked before any mutation.
use crate::{ScopeId, SymbolId};
use loft_frontend::{BinOp, Intrinsic, ScalarKind, UnOp};
use loft_utils::{GPosIdx, Id};
use smallvec::SmallVec;

/// One segment of a structure access beyond the base symbol. `args` is the
/// number of subscript children that belong to this segment; the subscripts
/// of all segments are concatenated in order in the node's child list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: Id,
    pub args: usize,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Root of every tree. Holds the outermost scope.
    FileContainer { scope: ScopeId },
    /// A module; children are routines and nested containers.
    Container { name: Id, scope: ScopeId },
    /// A subroutine; children are its body statements.
    Routine { name: Id, scope: ScopeId },
    /// An ordered block of statements, used as the body of loops, branches
    /// and extraction regions.
    Schedule { scope: ScopeId },
    /// A counted loop. Children are `[start, stop, step, body]` where the
    /// first three are expressions and the body is a [`NodeKind::Schedule`].
    Loop { variable: SymbolId },
    /// Children are `[target, value]`.
    Assignment,
    /// Children are `[condition, then, else?]`; the bodies are schedules.
    IfBlock,
    BinaryOp(BinOp),
    UnaryOp(UnOp),
    /// A call to a known intrinsic; children are its arguments.
    IntrinsicCall(Intrinsic),
    /// A subroutine call; children are its arguments.
    Call { routine: SymbolId },
    /// A whole-symbol reference.
    Reference { symbol: SymbolId },
    /// An array element reference; children are the subscripts.
    ArrayRef { symbol: SymbolId },
    /// A `%`-path into a structure; children are the concatenated member
    /// subscripts described by `members`.
    StructureRef {
        symbol: SymbolId,
        members: Vec<Member>,
    },
    /// A literal, stored as its (canonical) source text.
    Literal { value: Id, ty: ScalarKind },
    /// An instrumented region; the single child is the enclosed schedule.
    /// The capture lists are filled in when the region is created.
    ExtractRegion {
        name: Id,
        inputs: Vec<Id>,
        outputs: Vec<Id>,
    },
    /// Source text the engine does not model. Opaque to all analyses.
    CodeBlock { text: Id },
}

impl NodeKind {
    /// A short tag naming the kind, used in diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::FileContainer { .. } => "FileContainer",
            NodeKind::Container { .. } => "Container",
            NodeKind::Routine { .. } => "Routine",
            NodeKind::Schedule { .. } => "Schedule",
            NodeKind::Loop { .. } => "Loop",
            NodeKind::Assignment => "Assignment",
            NodeKind::IfBlock => "IfBlock",
            NodeKind::BinaryOp(_) => "BinaryOp",
            NodeKind::UnaryOp(_) => "UnaryOp",
            NodeKind::IntrinsicCall(_) => "IntrinsicCall",
            NodeKind::Call { .. } => "Call",
            NodeKind::Reference { .. } => "Reference",
            NodeKind::ArrayRef { .. } => "ArrayRef",
            NodeKind::StructureRef { .. } => "StructureRef",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::ExtractRegion { .. } => "ExtractRegion",
            NodeKind::CodeBlock { .. } => "CodeBlock",
        }
    }

    /// The scope owned by this node, if it is a scoping node.
    pub fn scope(&self) -> Option<ScopeId> {
        match self {
            NodeKind::FileContainer { scope }
            | NodeKind::Container { scope, .. }
            | NodeKind::Routine { scope, .. }
            | NodeKind::Schedule { scope } => Some(*scope),
            _ => None,
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Assignment
                | NodeKind::Loop { .. }
                | NodeKind::IfBlock
                | NodeKind::Call { .. }
                | NodeKind::ExtractRegion { .. }
                | NodeKind::CodeBlock { .. }
        )
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::BinaryOp(_)
                | NodeKind::UnaryOp(_)
                | NodeKind::IntrinsicCall(_)
                | NodeKind::Reference { .. }
                | NodeKind::ArrayRef { .. }
                | NodeKind::StructureRef { .. }
                | NodeKind::Literal { .. }
        )
    }

    /// Whether this kind can be the target of an assignment.
    pub fn is_settable(&self) -> bool {
        matches!(
            self,
            NodeKind::Reference { .. }
                | NodeKind::ArrayRef { .. }
                | NodeKind::StructureRef { .. }
        )
    }

    /// Check that a child of kind `child` may sit at position `at`, given the
    /// node currently has `len` children. Returns a diagnostic on violation.
    ///
    /// Fixed-arity kinds are checked against their upper bound here; whether
    /// a node is *complete* is checked where the full shape matters, e.g.
    /// [`Tree::loop_parts`](crate::Tree::loop_parts).
    pub(crate) fn accepts_child(
        &self,
        at: usize,
        child: &NodeKind,
        len: usize,
    ) -> Result<(), String> {
        let reject = |expected: &str| {
            Err(format!(
                "'{}' does not accept a child of kind '{}' at position {at}: expected {expected}",
                self.tag(),
                child.tag()
            ))
        };
        let full = |max: usize| {
            Err(format!(
                "'{}' accepts at most {max} children, got {}",
                self.tag(),
                len + 1
            ))
        };
        match self {
            NodeKind::FileContainer { .. } | NodeKind::Container { .. } => {
                match child {
                    NodeKind::Container { .. } | NodeKind::Routine { .. } => {
                        Ok(())
                    }
                    _ => reject("a Container or Routine"),
                }
            }
            NodeKind::Routine { .. } | NodeKind::Schedule { .. } => {
                if child.is_statement() {
                    Ok(())
                } else {
                    reject("a statement")
                }
            }
            NodeKind::Loop { .. } => {
                if len >= 4 {
                    return full(4);
                }
                match at {
                    0..=2 => {
                        if child.is_expression() {
                            Ok(())
                        } else {
                            reject("an expression")
                        }
                    }
                    3 => {
                        if matches!(child, NodeKind::Schedule { .. }) {
                            Ok(())
                        } else {
                            reject("a Schedule")
                        }
                    }
                    _ => full(4),
                }
            }
            NodeKind::Assignment => {
                if len >= 2 {
                    return full(2);
                }
                match at {
                    0 => {
                        if child.is_settable() {
                            Ok(())
                        } else {
                            reject("a settable reference")
                        }
                    }
                    1 => {
                        if child.is_expression() {
                            Ok(())
                        } else {
                            reject("an expression")
                        }
                    }
                    _ => full(2),
                }
            }
            NodeKind::IfBlock => {
                if len >= 3 {
                    return full(3);
                }
                match at {
                    0 => {
                        if child.is_expression() {
                            Ok(())
                        } else {
                            reject("an expression")
                        }
                    }
                    1 | 2 => {
                        if matches!(child, NodeKind::Schedule { .. }) {
                            Ok(())
                        } else {
                            reject("a Schedule")
                        }
                    }
                    _ => full(3),
                }
            }
            NodeKind::BinaryOp(_) => {
                if len >= 2 {
                    full(2)
                } else if child.is_expression() {
                    Ok(())
                } else {
                    reject("an expression")
                }
            }
            NodeKind::UnaryOp(_) => {
                if len >= 1 {
                    full(1)
                } else if child.is_expression() {
                    Ok(())
                } else {
                    reject("an expression")
                }
            }
            NodeKind::IntrinsicCall(intr) => {
                let (_, max) = intr.arity();
                if let Some(max) = max {
                    if len >= max {
                        return full(max);
                    }
                }
                if child.is_expression() {
                    Ok(())
                } else {
                    reject("an expression")
                }
            }
            NodeKind::Call { .. }
            | NodeKind::ArrayRef { .. }
            | NodeKind::StructureRef { .. } => {
                if child.is_expression() {
                    Ok(())
                } else {
                    reject("an expression")
                }
            }
            NodeKind::ExtractRegion { .. } => {
                if len >= 1 {
                    full(1)
                } else if matches!(child, NodeKind::Schedule { .. }) {
                    Ok(())
                } else {
                    reject("a Schedule")
                }
            }
            NodeKind::Reference { .. }
            | NodeKind::Literal { .. }
            | NodeKind::CodeBlock { .. } => full(0),
        }
    }
}

/// A node in the tree: a kind, its ordered children, and a link back to its
/// parent. Structural fields are only mutated through [`Tree`](crate::Tree)
/// operations so that parent links, child lists and shape contracts stay
/// consistent.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub(crate) children: SmallVec<[crate::NodeId; 4]>,
    pub(crate) parent: Option<crate::NodeId>,
    pub span: GPosIdx,
    /// Free-form markers left by transformations, e.g. `blocked`.
    pub annotations: SmallVec<[Id; 2]>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, span: GPosIdx) -> Self {
        Node {
            kind,
            children: SmallVec::new(),
            parent: None,
            span,
            annotations: SmallVec::new(),
        }
    }

    pub fn children(&self) -> &[crate::NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<crate::NodeId> {
        self.parent
    }

    pub fn has_annotation(&self, ann: Id) -> bool {
        self.annotations.contains(&ann)
    }

    pub fn annotate(&mut self, ann: Id) {
        if !self.has_annotation(ann) {
            self.annotations.push(ann);
        }
    }
}
