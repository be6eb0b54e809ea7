//! Loop blocking: split a counted loop into an outer loop over fixed-size
//! blocks and an inner loop over the elements of each block.
use crate::analysis::{AccessInfo, AccessMode, Signature};
use crate::transform::{single_target, Named, Options, Transformation};
use loft_ir::{
    BinOp, Builder, Intrinsic, NodeId, NodeKind, ScalarKind, Tree, Type,
};
use loft_utils::{Error, LoftResult};

/// Annotation left on both loops of a blocked pair.
pub(crate) const BLOCKED: &str = "blocked";

/// For `do i = 1, 100` with the default block size this produces
///
/// ```text
/// do i_out_var = 1, 100, 32
///   i_el_inner = MIN(i_out_var + 31, 100)
///   do i = i_out_var, i_el_inner
///     ...
///   end do
/// end do
/// ```
///
/// so every original value of `i` is visited exactly once, in order.
/// Negative constant steps block downwards with `MAX` instead of `MIN`.
#[derive(Default)]
pub struct BlockLoop;

impl Named for BlockLoop {
    fn name() -> &'static str {
        "block-loop"
    }

    fn description() -> &'static str {
        "split a counted loop into an outer loop over blocks and an inner \
         loop within each block"
    }
}

impl BlockLoop {
    fn err<S: ToString>(msg: S) -> Error {
        Error::transformation(Self::name(), msg)
    }

    /// The constant integer step of the loop, or why there is none.
    fn step_value(tree: &Tree, step: NodeId) -> LoftResult<i64> {
        match &tree.get(step).kind {
            NodeKind::Literal {
                value,
                ty: ScalarKind::Integer,
            } => value.as_str().parse::<i64>().map_err(|_| {
                Self::err(format!(
                    "step size '{value}' does not fit in an integer"
                ))
            }),
            NodeKind::Literal { .. } => {
                Err(Self::err("cannot block a loop with a non-integer step size"))
            }
            _ => Err(Self::err(
                "cannot block a loop with a non-constant step size",
            )),
        }
    }

    fn block_size(opts: &Options) -> LoftResult<i64> {
        opts.get_positive_int_or(Self::name(), "blocksize", 32)
    }
}

impl Transformation for BlockLoop {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        let NodeKind::Loop { variable } = &tree.get(target).kind else {
            return Err(Self::err(format!(
                "only a Loop can be blocked, found '{}'",
                tree.get(target).kind.tag()
            )));
        };
        let variable = *variable;
        let (start, stop, step, body) = tree.loop_parts(target)?;
        if tree.has_annotation(target, BLOCKED) {
            return Err(Self::err("cannot block an already blocked loop"));
        }
        let step_val = Self::step_value(tree, step)?;
        if step_val == 0 {
            return Err(Self::err(
                "cannot block a loop with a step size of 0",
            ));
        }
        let block_size = Self::block_size(opts)?;
        if step_val.abs() > block_size {
            return Err(Self::err(format!(
                "cannot block a loop with a larger step size ({step_val}) \
                 than the chosen block size ({block_size})"
            )));
        }

        // Nothing the bounds read, and the loop variable itself, may be
        // written inside the body; the blocked form evaluates the bounds
        // once per block.
        let mut bounds = AccessInfo::of_many(tree, [start, stop]);
        bounds.add(
            Signature::scalar(tree.symbol(variable).name),
            AccessMode::ReadWrite,
            target,
        );
        let body_info = AccessInfo::of(tree, body);
        if body_info.has_opaque() {
            return Err(Self::err(
                "the loop body contains statements the access analysis \
                 cannot see into",
            ));
        }
        for sig in bounds.signatures() {
            if body_info.is_written(sig) {
                return Err(Self::err(format!(
                    "the boundary variable '{sig}' is written to inside \
                     the loop body"
                )));
            }
        }
        Ok(())
    }

    fn rewrite(
        &self,
        tree: &mut Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        let target = single_target(Self::name(), targets)?;
        let NodeKind::Loop { variable } = &tree.get(target).kind else {
            return Err(Error::internal("rewrite without validation"));
        };
        let variable = *variable;
        let (start, stop, step, _) = tree.loop_parts(target)?;
        let step_val = Self::step_value(tree, step)?;
        let block_size = Self::block_size(opts)?;
        let positive = step_val > 0;

        let routine = tree
            .ancestor(target, |k| matches!(k, NodeKind::Routine { .. }))
            .unwrap_or_else(|| tree.root());
        let var_name = tree.symbol(variable).name;
        let ty = Type::Scalar(ScalarKind::Integer);
        let el_inner = tree.symbol_from_tag(
            routine,
            &format!("{var_name}_el_inner"),
            &format!("{var_name}_el_inner"),
            ty.clone(),
        )?;
        let out_var = tree.symbol_from_tag(
            routine,
            &format!("{var_name}_out_var"),
            &format!("{var_name}_out_var"),
            ty,
        )?;

        // el_inner = MIN(out_var + (B - 1), stop), or MAX with a
        // subtraction when stepping downwards.
        let stop_copy = tree.copy_subtree(stop);
        let span = tree.get(target).span;
        let mut builder = Builder::new(tree);
        let out_ref = builder.reference(out_var);
        let adjust = builder.int(block_size - 1);
        let edge = builder.binary(
            if positive { BinOp::Add } else { BinOp::Sub },
            out_ref,
            adjust,
        )?;
        let clamp = builder.intrinsic(
            if positive { Intrinsic::Min } else { Intrinsic::Max },
            [edge, stop_copy],
        )?;
        let bound_assign = builder.assign(el_inner, clamp)?;

        // Rewire the original loop to run over one block.
        let start = tree.detach(start)?;
        let stop = tree.detach(stop)?;
        let out_ref = tree
            .new_node(NodeKind::Reference { symbol: out_var }, span);
        let el_ref = tree
            .new_node(NodeKind::Reference { symbol: el_inner }, span);
        tree.insert_child(target, 0, out_ref)?;
        tree.insert_child(target, 1, el_ref)?;

        // Outer loop over blocks, reusing the original bounds.
        let outer =
            tree.new_node(NodeKind::Loop { variable: out_var }, span);
        tree.add_child(outer, start)?;
        tree.add_child(outer, stop)?;
        let outer_step = {
            let mut builder = Builder::new(tree);
            builder.int(if positive { block_size } else { -block_size })
        };
        tree.add_child(outer, outer_step)?;
        let outer_body = {
            let mut builder = Builder::new(tree);
            builder.schedule()
        };
        tree.add_child(outer, outer_body)?;
        tree.add_child(outer_body, bound_assign)?;

        tree.annotate(outer, BLOCKED);
        tree.annotate(target, BLOCKED);
        tree.replace_with(target, outer)?;
        tree.add_child(outer_body, target)?;
        Ok(())
    }
}
