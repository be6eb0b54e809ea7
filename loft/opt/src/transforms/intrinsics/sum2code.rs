//! Lower `SUM(A)` into an accumulation loop over the array.
use super::{lowering_site, Site};
use crate::transform::{single_target, Named, Options, Transformation};
use loft_ir::{
    ArrayBound, BinOp, Builder, Intrinsic, NodeId, NodeKind, ScalarKind,
    SymbolId, Tree, Type,
};
use loft_utils::{Error, LoftResult};

/// Replaces `R = SUM(A)` for a one-dimensional `A(N)` with
///
/// ```text
/// res_sum = 0.0
/// do i_sum = 1, N
///   res_sum = res_sum + A(i_sum)
/// end do
/// R = res_sum
/// ```
#[derive(Default)]
pub struct SumToCode;

impl Named for SumToCode {
    fn name() -> &'static str {
        "sum-to-code"
    }

    fn description() -> &'static str {
        "replace a call to SUM with an accumulation loop"
    }
}

impl SumToCode {
    fn err<S: ToString>(msg: S) -> Error {
        Error::transformation(Self::name(), msg)
    }

    /// The summed array symbol and its single extent.
    fn array_arg(
        tree: &Tree,
        target: NodeId,
    ) -> LoftResult<(SymbolId, ArrayBound)> {
        let arg = tree.children(target)[0];
        let NodeKind::Reference { symbol } = &tree.get(arg).kind else {
            return Err(Self::err(
                "the argument of SUM must be a whole array",
            ));
        };
        let symbol = *symbol;
        let sym = tree.symbol(symbol);
        let Type::Array { shape, .. } = &sym.ty else {
            return Err(Self::err(format!("'{}' is not an array", sym.name)));
        };
        match shape.as_slice() {
            [extent] => Ok((symbol, extent.clone())),
            shape => Err(Self::err(format!(
                "only one-dimensional arrays can be summed, '{}' has {} \
                 dimensions",
                sym.name,
                shape.len()
            ))),
        }
    }
}

impl Transformation for SumToCode {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        lowering_site(tree, Self::name(), target, Intrinsic::Sum, 1)?;
        Self::array_arg(tree, target)?;
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
        } = lowering_site(tree, Self::name(), target, Intrinsic::Sum, 1)?;
        let (array, extent) = Self::array_arg(tree, target)?;
        let res = tree.new_symbol(
            routine,
            "res_sum",
            Type::Scalar(ScalarKind::Real),
        )?;
        let var = tree.new_symbol(
            routine,
            "i_sum",
            Type::Scalar(ScalarKind::Integer),
        )?;
        let span = tree.get(target).span;

        let mut builder = Builder::new(tree);
        let zero = builder.real("0.0");
        let init = builder.assign(res, zero)?;
        let start = builder.int(1);
        let stop = match extent {
            ArrayBound::Literal(n) => builder.int(n),
            ArrayBound::Var(bound) => builder.reference(bound),
        };
        let step = builder.int(1);
        let (acc_loop, body) = builder.loop_over(var, start, stop, step)?;
        let acc = builder.reference(res);
        let idx = builder.reference(var);
        let elem = builder
            .tree
            .new_node(NodeKind::ArrayRef { symbol: array }, span);
        builder.tree.add_child(elem, idx)?;
        let total = builder.binary(BinOp::Add, acc, elem)?;
        let step_stmt = builder.assign(res, total)?;
        builder.tree.add_child(body, step_stmt)?;

        tree.insert_child(parent, pos, init)?;
        tree.insert_child(parent, pos + 1, acc_loop)?;
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

    fn sum_call(tree: &Tree) -> NodeId {
        tree.walk(tree.root())
            .into_iter()
            .find(|n| {
                matches!(
                    tree.get(*n).kind,
                    NodeKind::IntrinsicCall(Intrinsic::Sum)
                )
            })
            .expect("has a SUM call")
    }

    #[test]
    fn lowers_sum_into_an_accumulation_loop() {
        let src = "subroutine sub(a, n, r)\nreal, intent(in), dimension(n) :: a\ninteger, intent(in) :: n\nreal, intent(out) :: r\nr = sum(a)\nend subroutine sub\n";
        let mut tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let target = sum_call(&tree);
        SumToCode
            .apply(&mut tree, &[target], &Options::new())
            .unwrap();
        let out = Printer::tree_to_string(&tree);
        assert!(out.contains("res_sum = 0.0"));
        assert!(out.contains("do i_sum = 1, n"));
        assert!(out.contains("res_sum = res_sum + a(i_sum)"));
        assert!(out.contains("r = res_sum"));
        assert!(!out.contains("SUM("));
    }

    #[test]
    fn rejects_scalar_arguments() {
        let src = "subroutine sub(x, r)\nreal, intent(in) :: x\nreal, intent(out) :: r\nr = sum(x)\nend subroutine sub\n";
        let mut tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let target = sum_call(&tree);
        let err = SumToCode
            .apply(&mut tree, &[target], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("is not an array"));
    }
}
