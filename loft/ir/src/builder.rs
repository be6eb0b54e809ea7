//! Convenience layer for constructing well-shaped IR fragments. Transforms
//! use this instead of assembling nodes and children by hand.
use crate::{NodeId, NodeKind, SymbolId, Tree};
use loft_frontend::{BinOp, Intrinsic, ScalarKind, UnOp};
use loft_utils::{GPosIdx, Id, LoftResult};

pub struct Builder<'a> {
    pub tree: &'a mut Tree,
}

impl<'a> Builder<'a> {
    pub fn new(tree: &'a mut Tree) -> Self {
        Builder { tree }
    }

    fn node(&mut self, kind: NodeKind) -> NodeId {
        self.tree.new_node(kind, GPosIdx::UNKNOWN)
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.node(NodeKind::Literal {
            value: Id::new(value.to_string()),
            ty: ScalarKind::Integer,
        })
    }

    pub fn real(&mut self, text: &str) -> NodeId {
        self.node(NodeKind::Literal {
            value: Id::new(text),
            ty: ScalarKind::Real,
        })
    }

    pub fn reference(&mut self, symbol: SymbolId) -> NodeId {
        self.node(NodeKind::Reference { symbol })
    }

    pub fn unary(&mut self, op: UnOp, operand: NodeId) -> LoftResult<NodeId> {
        let n = self.node(NodeKind::UnaryOp(op));
        self.tree.add_child(n, operand)?;
        Ok(n)
    }

    pub fn binary(
        &mut self,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> LoftResult<NodeId> {
        let n = self.node(NodeKind::BinaryOp(op));
        self.tree.add_child(n, lhs)?;
        self.tree.add_child(n, rhs)?;
        Ok(n)
    }

    pub fn intrinsic(
        &mut self,
        intr: Intrinsic,
        args: impl IntoIterator<Item = NodeId>,
    ) -> LoftResult<NodeId> {
        let n = self.node(NodeKind::IntrinsicCall(intr));
        for arg in args {
            self.tree.add_child(n, arg)?;
        }
        Ok(n)
    }

    /// `target = value`, with the target given as a plain symbol reference.
    pub fn assign(
        &mut self,
        target: SymbolId,
        value: NodeId,
    ) -> LoftResult<NodeId> {
        let t = self.reference(target);
        self.assign_to(t, value)
    }

    pub fn assign_to(
        &mut self,
        target: NodeId,
        value: NodeId,
    ) -> LoftResult<NodeId> {
        let n = self.node(NodeKind::Assignment);
        self.tree.add_child(n, target)?;
        self.tree.add_child(n, value)?;
        Ok(n)
    }

    pub fn schedule(&mut self) -> NodeId {
        let scope = self.tree.new_scope();
        self.node(NodeKind::Schedule { scope })
    }

    /// A counted loop over `var`. Returns the loop node and its (empty)
    /// body schedule.
    pub fn loop_over(
        &mut self,
        var: SymbolId,
        start: NodeId,
        stop: NodeId,
        step: NodeId,
    ) -> LoftResult<(NodeId, NodeId)> {
        let l = self.node(NodeKind::Loop { variable: var });
        self.tree.add_child(l, start)?;
        self.tree.add_child(l, stop)?;
        self.tree.add_child(l, step)?;
        let body = self.schedule();
        self.tree.add_child(l, body)?;
        Ok((l, body))
    }

    /// An `if` with an empty then-schedule, which is returned alongside.
    pub fn if_block(&mut self, cond: NodeId) -> LoftResult<(NodeId, NodeId)> {
        let n = self.node(NodeKind::IfBlock);
        self.tree.add_child(n, cond)?;
        let then = self.schedule();
        self.tree.add_child(n, then)?;
        Ok((n, then))
    }

    /// Add an (empty) else-schedule to an `if` built by [`Builder::if_block`].
    pub fn else_of(&mut self, if_block: NodeId) -> LoftResult<NodeId> {
        let els = self.schedule();
        self.tree.add_child(if_block, els)?;
        Ok(els)
    }
}
