//! Loop interchange for a strictly 2-deep loop nest. The two loops trade
//! control (variable, bounds, step, annotations) while the bodies stay
//! where they are.
use crate::analysis::{AccessInfo, Signature};
use crate::transform::{single_target, Named, Options, Transformation};
use loft_ir::{NodeId, NodeKind, Tree};
use loft_utils::{Error, LoftResult};

#[derive(Default)]
pub struct LoopSwap;

impl Named for LoopSwap {
    fn name() -> &'static str {
        "loop-swap"
    }

    fn description() -> &'static str {
        "interchange the two loops of a strictly nested loop pair"
    }
}

impl LoopSwap {
    fn err<S: ToString>(msg: S) -> Error {
        Error::transformation(Self::name(), msg)
    }

    /// The single loop making up the body of `outer`, if the nest is strict.
    fn nested_loop(tree: &Tree, outer: NodeId) -> LoftResult<NodeId> {
        if !matches!(tree.get(outer).kind, NodeKind::Loop { .. }) {
            return Err(Self::err(format!(
                "only a Loop can be interchanged, found '{}'",
                tree.get(outer).kind.tag()
            )));
        }
        let (_, _, _, body) = tree.loop_parts(outer)?;
        match tree.children(body) {
            [only] if matches!(tree.get(*only).kind, NodeKind::Loop { .. }) => {
                Ok(*only)
            }
            children => Err(Self::err(format!(
                "the loop body must contain exactly one statement, which is \
                 itself a loop; found {} statement(s)",
                children.len()
            ))),
        }
    }
}

impl Transformation for LoopSwap {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let outer = single_target(Self::name(), targets)?;
        let inner = Self::nested_loop(tree, outer)?;
        let NodeKind::Loop { variable } = &tree.get(outer).kind else {
            unreachable!("checked by nested_loop");
        };
        let outer_sig = Signature::scalar(tree.symbol(*variable).name);
        // After the swap the inner bounds are evaluated outside the outer
        // loop, so they must not depend on its variable.
        let (start, stop, step, body) = tree.loop_parts(inner)?;
        let bounds = AccessInfo::of_many(tree, [start, stop, step]);
        if bounds.contains(&outer_sig) {
            return Err(Self::err(format!(
                "the inner loop's bounds depend on the outer loop \
                 variable '{outer_sig}'"
            )));
        }
        // Likewise, a bound written in the body would change value between
        // the outer iterations of the swapped nest.
        let body_writes = AccessInfo::of(tree, body);
        if body_writes.has_opaque() && bounds.signatures().next().is_some() {
            return Err(Self::err(
                "the loop body contains statements the analysis cannot see \
                 into",
            ));
        }
        for sig in bounds.signatures() {
            if body_writes.is_written(sig) {
                return Err(Self::err(format!(
                    "the inner loop's bound '{sig}' is written in the loop \
                     body"
                )));
            }
        }
        Ok(())
    }

    fn rewrite(
        &self,
        tree: &mut Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        let outer = single_target(Self::name(), targets)?;
        let inner = Self::nested_loop(tree, outer)?;

        let (o_start, o_stop, o_step, _) = tree.loop_parts(outer)?;
        let (i_start, i_stop, i_step, _) = tree.loop_parts(inner)?;
        for bound in [o_start, o_stop, o_step, i_start, i_stop, i_step] {
            tree.detach(bound)?;
        }
        tree.insert_child(outer, 0, i_start)?;
        tree.insert_child(outer, 1, i_stop)?;
        tree.insert_child(outer, 2, i_step)?;
        tree.insert_child(inner, 0, o_start)?;
        tree.insert_child(inner, 1, o_stop)?;
        tree.insert_child(inner, 2, o_step)?;

        let NodeKind::Loop { variable: o_var } = &tree.get(outer).kind else {
            return Err(Error::internal("loop kind changed mid-rewrite"));
        };
        let o_var = *o_var;
        let NodeKind::Loop { variable: i_var } = &tree.get(inner).kind else {
            return Err(Error::internal("loop kind changed mid-rewrite"));
        };
        let i_var = *i_var;
        tree.get_mut(outer).kind = NodeKind::Loop { variable: i_var };
        tree.get_mut(inner).kind = NodeKind::Loop { variable: o_var };

        let outer_anns = tree.get(outer).annotations.clone();
        let inner_anns = tree.get(inner).annotations.clone();
        tree.get_mut(outer).annotations = inner_anns;
        tree.get_mut(inner).annotations = outer_anns;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_ir::{parse_source, Dialect, Printer};

    fn nest(body: &str) -> (Tree, NodeId) {
        let src = format!(
            "subroutine sub(a, n, m)\nreal, intent(inout), dimension(n, m) :: a\ninteger, intent(in) :: n\ninteger, intent(in) :: m\ninteger :: i\ninteger :: j\n{body}\nend subroutine sub\n"
        );
        let tree =
            parse_source(&src, "test", &Dialect::default()).expect("parses");
        let outer = tree
            .walk(tree.root())
            .into_iter()
            .find(|n| matches!(tree.get(*n).kind, NodeKind::Loop { .. }))
            .expect("has a loop");
        (tree, outer)
    }

    #[test]
    fn swaps_control_and_keeps_bodies() {
        let (mut tree, outer) = nest(
            "do i = 1, n\n  do j = 1, m\n    a(i, j) = 0.0\n  end do\nend do",
        );
        LoopSwap
            .apply(&mut tree, &[outer], &Options::new())
            .unwrap();
        let out = Printer::tree_to_string(&tree);
        let j_loop = out.find("do j = 1, m").expect("j loop present");
        let i_loop = out.find("do i = 1, n").expect("i loop present");
        assert!(j_loop < i_loop, "j must now be the outer loop:\n{out}");
        assert!(out.contains("a(i, j) = 0.0"));
    }

    #[test]
    fn rejects_loose_nests() {
        let (mut tree, outer) = nest(
            "do i = 1, n\n  a(i, 1) = 0.0\n  do j = 1, m\n    a(i, j) = 0.0\n  end do\nend do",
        );
        let err = LoopSwap
            .apply(&mut tree, &[outer], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("exactly one statement"));
    }

    #[test]
    fn rejects_bounds_written_in_the_body() {
        let (mut tree, outer) = nest(
            "do i = 1, n\n  do j = 1, m\n    m = m + 1\n  end do\nend do",
        );
        let err = LoopSwap
            .apply(&mut tree, &[outer], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("written in the loop body"));
    }

    #[test]
    fn rejects_triangular_bounds() {
        let (mut tree, outer) = nest(
            "do i = 1, n\n  do j = i, m\n    a(i, j) = 0.0\n  end do\nend do",
        );
        let err = LoopSwap
            .apply(&mut tree, &[outer], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("depend on the outer loop"));
    }
}
