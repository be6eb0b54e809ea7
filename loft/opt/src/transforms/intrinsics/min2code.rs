//! Lower an n-ary `MIN` into a chain of compare-and-assign statements.
use super::{lowering_site, Site};
use crate::transform::{single_target, Named, Options, Transformation};
use loft_ir::{
    BinOp, Builder, Intrinsic, NodeId, NodeKind, ScalarKind, Tree, Type,
};
use loft_utils::LoftResult;

/// Replaces `R = MIN(A, B, C)` with
///
/// ```text
/// res_min = A
/// tmp_min = B
/// if (tmp_min < res_min) then
///   res_min = tmp_min
/// end if
/// tmp_min = C
/// if (tmp_min < res_min) then
///   res_min = tmp_min
/// end if
/// R = res_min
/// ```
///
/// One temporary is shared across all comparisons.
#[derive(Default)]
pub struct MinToCode;

impl Named for MinToCode {
    fn name() -> &'static str {
        "min-to-code"
    }

    fn description() -> &'static str {
        "replace a call to MIN with equivalent inline code"
    }
}

impl Transformation for MinToCode {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        lowering_site(tree, Self::name(), target, Intrinsic::Min, 2)?;
        Ok(())
    }

    fn rewrite(
        &self,
        tree: &mut Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        let Site {
            routine,
            parent,
            pos,
            ..
        } = lowering_site(tree, Self::name(), target, Intrinsic::Min, 2)?;
        let ty = Type::Scalar(ScalarKind::Real);
        let res = tree.new_symbol(routine, "res_min", ty.clone())?;
        let tmp = tree.new_symbol(routine, "tmp_min", ty)?;
        let span = tree.get(target).span;

        let args: Vec<NodeId> = tree.children(target).to_vec();
        let mut at = pos;
        for (i, arg) in args.into_iter().enumerate() {
            let arg = tree.detach(arg)?;
            let mut builder = Builder::new(tree);
            if i == 0 {
                let seed = builder.assign(res, arg)?;
                tree.insert_child(parent, at, seed)?;
                at += 1;
                continue;
            }
            let probe = builder.assign(tmp, arg)?;
            let tmp_ref = builder.reference(tmp);
            let res_ref = builder.reference(res);
            let cond = builder.binary(BinOp::Lt, tmp_ref, res_ref)?;
            let (branch, then_body) = builder.if_block(cond)?;
            let tmp_ref = builder.reference(tmp);
            let take = builder.assign(res, tmp_ref)?;
            builder.tree.add_child(then_body, take)?;
            tree.insert_child(parent, at, probe)?;
            tree.insert_child(parent, at + 1, branch)?;
            at += 2;
        }
        let res_ref =
            tree.new_node(NodeKind::Reference { symbol: res }, span);
        tree.replace_with(target, res_ref)?;
        Ok(())
    }
}
