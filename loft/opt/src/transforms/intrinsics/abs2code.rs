//! Lower `ABS(X)` into a branch on the sign of `X`.
use super::{lowering_site, Site};
use crate::transform::{single_target, Named, Options, Transformation};
use loft_ir::{
    BinOp, Builder, Intrinsic, NodeId, NodeKind, ScalarKind, Tree, Type, UnOp,
};
use loft_utils::LoftResult;

/// Replaces `R = ABS(X)` with
///
/// ```text
/// tmp_abs = X
/// if (tmp_abs > 0.0) then
///   res_abs = tmp_abs
/// else
///   res_abs = tmp_abs * (-1.0)
/// end if
/// R = res_abs
/// ```
#[derive(Default)]
pub struct AbsToCode;

impl Named for AbsToCode {
    fn name() -> &'static str {
        "abs-to-code"
    }

    fn description() -> &'static str {
        "replace a call to ABS with equivalent inline code"
    }
}

impl Transformation for AbsToCode {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        lowering_site(tree, Self::name(), target, Intrinsic::Abs, 1)?;
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
        } = lowering_site(tree, Self::name(), target, Intrinsic::Abs, 1)?;
        let ty = Type::Scalar(ScalarKind::Real);
        let res = tree.new_symbol(routine, "res_abs", ty.clone())?;
        let tmp = tree.new_symbol(routine, "tmp_abs", ty)?;
        let span = tree.get(target).span;

        let oper = tree.children(target)[0];
        let oper = tree.detach(oper)?;
        let mut builder = Builder::new(tree);
        let assign_tmp = builder.assign(tmp, oper)?;
        let tmp_ref = builder.reference(tmp);
        let zero = builder.real("0.0");
        let cond = builder.binary(BinOp::Gt, tmp_ref, zero)?;
        let (branch, then_body) = builder.if_block(cond)?;
        let kept = builder.reference(tmp);
        let keep = builder.assign(res, kept)?;
        let else_body = builder.else_of(branch)?;
        let flipped_ref = builder.reference(tmp);
        let one = builder.real("1.0");
        let minus_one = builder.unary(UnOp::Minus, one)?;
        let product = builder.binary(BinOp::Mul, flipped_ref, minus_one)?;
        let flip = builder.assign(res, product)?;
        builder.tree.add_child(then_body, keep)?;
        builder.tree.add_child(else_body, flip)?;

        tree.insert_child(parent, pos, assign_tmp)?;
        tree.insert_child(parent, pos + 1, branch)?;
        let res_ref =
            tree.new_node(NodeKind::Reference { symbol: res }, span);
        tree.replace_with(target, res_ref)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_ir::{parse_source, Dialect, Printer};

    #[test]
    fn lowers_abs_into_a_branch() {
        let src = "subroutine sub(x, r)\nreal, intent(in) :: x\nreal, intent(out) :: r\nr = abs(x)\nend subroutine sub\n";
        let mut tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let target = tree
            .walk(tree.root())
            .into_iter()
            .find(|n| {
                matches!(
                    tree.get(*n).kind,
                    NodeKind::IntrinsicCall(Intrinsic::Abs)
                )
            })
            .expect("has an ABS call");
        AbsToCode
            .apply(&mut tree, &[target], &Options::new())
            .unwrap();
        let out = Printer::tree_to_string(&tree);
        assert!(out.contains("tmp_abs = x"));
        assert!(out.contains("if (tmp_abs > 0.0) then"));
        assert!(out.contains("res_abs = tmp_abs * (-1.0)"));
        assert!(out.contains("r = res_abs"));
        assert!(!out.contains("ABS("));
    }

    #[test]
    fn rejects_other_intrinsics() {
        let src = "subroutine sub(x, r)\nreal, intent(in) :: x\nreal, intent(out) :: r\nr = min(x, 0.0)\nend subroutine sub\n";
        let mut tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let target = tree
            .walk(tree.root())
            .into_iter()
            .find(|n| {
                matches!(tree.get(*n).kind, NodeKind::IntrinsicCall(_))
            })
            .unwrap();
        assert!(AbsToCode
            .apply(&mut tree, &[target], &Options::new())
            .unwrap_err()
            .is_transformation());
    }
}
