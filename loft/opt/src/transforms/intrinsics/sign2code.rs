//! Lower `SIGN(A, B)` (magnitude of `A`, sign of `B`) into inline code.
use super::{lowering_site, Site};
use crate::transform::{single_target, Named, Options, Transformation};
use crate::transforms::AbsToCode;
use loft_ir::{
    BinOp, Builder, Intrinsic, NodeId, NodeKind, ScalarKind, Tree, Type, UnOp,
};
use loft_utils::{Error, LoftResult};

/// Replaces `R = SIGN(A, B)` with
///
/// ```text
/// res_sign = ABS(A)     ! immediately lowered further by AbsToCode
/// tmp_sign = B
/// if (tmp_sign < 0.0) then
///   res_sign = res_sign * (-1.0)
/// end if
/// R = res_sign
/// ```
///
/// The inner `ABS` is lowered innermost-first so the final tree contains
/// no intrinsic calls introduced by this transformation.
#[derive(Default)]
pub struct SignToCode;

impl Named for SignToCode {
    fn name() -> &'static str {
        "sign-to-code"
    }

    fn description() -> &'static str {
        "replace a call to SIGN with equivalent inline code"
    }
}

impl Transformation for SignToCode {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        lowering_site(tree, Self::name(), target, Intrinsic::Sign, 2)?;
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
            routine, stmt, parent, pos,
        } = lowering_site(tree, Self::name(), target, Intrinsic::Sign, 2)?;
        let ty = Type::Scalar(ScalarKind::Real);
        let res = tree.new_symbol(routine, "res_sign", ty.clone())?;
        let tmp = tree.new_symbol(routine, "tmp_sign", ty)?;
        let span = tree.get(target).span;

        let &[magnitude, sign_source] = tree.children(target) else {
            return Err(Error::internal("arity checked by lowering_site"));
        };
        let magnitude = tree.detach(magnitude)?;
        let sign_source = tree.detach(sign_source)?;

        // res_sign = ABS(A), then lower that ABS in place.
        let (assign_res, abs_call) = {
            let mut builder = Builder::new(tree);
            let abs_call =
                builder.intrinsic(Intrinsic::Abs, [magnitude])?;
            (builder.assign(res, abs_call)?, abs_call)
        };
        tree.insert_child(parent, pos, assign_res)?;
        AbsToCode.apply(tree, &[abs_call], &Options::new())?;

        // tmp_sign = B; if (tmp_sign < 0.0) res_sign = res_sign * (-1.0)
        let (assign_tmp, branch) = {
            let mut builder = Builder::new(tree);
            let assign_tmp = builder.assign(tmp, sign_source)?;
            let tmp_ref = builder.reference(tmp);
            let zero = builder.real("0.0");
            let cond = builder.binary(BinOp::Lt, tmp_ref, zero)?;
            let (branch, then_body) = builder.if_block(cond)?;
            let res_ref = builder.reference(res);
            let one = builder.real("1.0");
            let minus_one = builder.unary(UnOp::Minus, one)?;
            let product =
                builder.binary(BinOp::Mul, res_ref, minus_one)?;
            let flip = builder.assign(res, product)?;
            builder.tree.add_child(then_body, flip)?;
            (assign_tmp, branch)
        };
        // The AbsToCode application above shifted the statement positions.
        let pos = tree
            .position(stmt)
            .ok_or_else(|| Error::internal("corrupt parent link"))?;
        tree.insert_child(parent, pos, assign_tmp)?;
        tree.insert_child(parent, pos + 1, branch)?;

        let res_ref =
            tree.new_node(NodeKind::Reference { symbol: res }, span);
        tree.replace_with(target, res_ref)?;
        Ok(())
    }
}
