//! Lowerings that replace an intrinsic call with equivalent inline code.
//! Each one hoists the computation into statements inserted just before the
//! statement containing the call, then swaps the call for a reference to
//! the result variable.
mod abs2code;
mod min2code;
mod sign2code;
mod sum2code;

pub use abs2code::AbsToCode;
pub use min2code::MinToCode;
pub use sign2code::SignToCode;
pub use sum2code::SumToCode;

use loft_ir::{Intrinsic, NodeId, NodeKind, Tree};
use loft_utils::{Error, LoftResult};

/// Where a lowering hooks into the tree: the enclosing routine (for new
/// symbols), the statement containing the call, and that statement's slot.
pub(crate) struct Site {
    pub routine: NodeId,
    pub stmt: NodeId,
    pub parent: NodeId,
    pub pos: usize,
}

/// Check that `target` is a call to `intr` with at least `min_args`
/// arguments sitting inside a statement, and locate the insertion site.
pub(crate) fn lowering_site(
    tree: &Tree,
    trans: &str,
    target: NodeId,
    intr: Intrinsic,
    min_args: usize,
) -> LoftResult<Site> {
    match &tree.get(target).kind {
        NodeKind::IntrinsicCall(found) if *found == intr => {}
        kind => {
            return Err(Error::transformation(
                trans,
                format!(
                    "expected a call to '{}', found '{}'",
                    intr.surface(),
                    kind.tag()
                ),
            ))
        }
    }
    let args = tree.children(target).len();
    if args < min_args {
        return Err(Error::transformation(
            trans,
            format!(
                "'{}' needs at least {min_args} argument(s), found {args}",
                intr.surface()
            ),
        ));
    }
    let stmt = tree
        .ancestor(target, NodeKind::is_statement)
        .ok_or_else(|| {
            Error::transformation(
                trans,
                "the call must appear inside a statement",
            )
        })?;
    let routine = tree
        .ancestor(target, |k| matches!(k, NodeKind::Routine { .. }))
        .ok_or_else(|| {
            Error::transformation(
                trans,
                "the call must appear inside a routine",
            )
        })?;
    let parent = tree
        .parent(stmt)
        .ok_or_else(|| Error::internal("statement without a parent"))?;
    let pos = tree
        .position(stmt)
        .ok_or_else(|| Error::internal("corrupt parent link"))?;
    Ok(Site {
        routine,
        stmt,
        parent,
        pos,
    })
}
