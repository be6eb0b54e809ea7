//! 2D loop tiling: block both loops of a strict 2-deep nest, then
//! interchange the middle pair so the tile loops come first.
use crate::transform::{
    single_target, Named, Options, OptValue, Transformation,
};
use crate::transforms::{BlockLoop, LoopSwap};
use loft_ir::{NodeId, NodeKind, Tree};
use loft_utils::{Error, LoftResult};

/// For `do i / do j` over an `n x m` iteration space this produces
///
/// ```text
/// do i_out_var = ...      ! tile row
///   i_el_inner = MIN(...)
///   do j_out_var = ...    ! tile column
///     do i = i_out_var, i_el_inner
///       j_el_inner = MIN(...)
///       do j = j_out_var, j_el_inner
/// ```
#[derive(Default)]
pub struct LoopTiling2D;

impl Named for LoopTiling2D {
    fn name() -> &'static str {
        "loop-tiling-2d"
    }

    fn description() -> &'static str {
        "tile a 2-deep loop nest into fixed-size rectangular tiles"
    }
}

impl LoopTiling2D {
    fn err<S: ToString>(msg: S) -> Error {
        Error::transformation(Self::name(), msg)
    }

    fn block_options(opts: &Options) -> LoftResult<Options> {
        let tilesize =
            opts.get_positive_int_or(Self::name(), "tilesize", 32)?;
        Ok(Options::new().with("blocksize", OptValue::Int(tilesize)))
    }

    fn nested_loop(tree: &Tree, outer: NodeId) -> LoftResult<NodeId> {
        if !matches!(tree.get(outer).kind, NodeKind::Loop { .. }) {
            return Err(Self::err(format!(
                "only a Loop can be tiled, found '{}'",
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

impl Transformation for LoopTiling2D {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        let outer = single_target(Self::name(), targets)?;
        let inner = Self::nested_loop(tree, outer)?;
        let block_opts = Self::block_options(opts)?;
        BlockLoop.validate(tree, &[outer], &block_opts)?;
        BlockLoop.validate(tree, &[inner], &block_opts)?;
        // The interchange that follows the two blockings needs the inner
        // bounds to be independent of the outer variable.
        LoopSwap.validate(tree, &[outer], &Options::new())
    }

    fn rewrite(
        &self,
        tree: &mut Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        let outer = single_target(Self::name(), targets)?;
        let inner = Self::nested_loop(tree, outer)?;
        let block_opts = Self::block_options(opts)?;

        // Block both loops. Blocking replaces a loop with a new outer
        // block loop at the same position and pushes the original loop one
        // level down, so `outer` and `inner` stay valid.
        BlockLoop.apply(tree, &[outer], &block_opts)?;
        BlockLoop.apply(tree, &[inner], &block_opts)?;

        // `outer` is now the middle loop, with the inner block loop as its
        // only statement; swapping the two yields tile-major order.
        LoopSwap.apply(tree, &[outer], &Options::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_ir::{parse_source, Dialect, Printer};

    fn nest() -> (Tree, NodeId) {
        let src = "subroutine sub(a, n, m)\nreal, intent(inout), dimension(n, m) :: a\ninteger, intent(in) :: n\ninteger, intent(in) :: m\ninteger :: i\ninteger :: j\ndo i = 1, n\n  do j = 1, m\n    a(i, j) = a(i, j) + 1.0\n  end do\nend do\nend subroutine sub\n";
        let tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let outer = tree
            .walk(tree.root())
            .into_iter()
            .find(|n| matches!(tree.get(*n).kind, NodeKind::Loop { .. }))
            .expect("has a loop");
        (tree, outer)
    }

    #[test]
    fn produces_tile_major_loop_order() {
        let (mut tree, outer) = nest();
        LoopTiling2D
            .apply(&mut tree, &[outer], &Options::new())
            .unwrap();
        let out = Printer::tree_to_string(&tree);
        let pos = |needle: &str| {
            out.find(needle)
                .unwrap_or_else(|| panic!("missing '{needle}' in:\n{out}"))
        };
        let ti = pos("do i_out_var = 1, n, 32");
        let tj = pos("do j_out_var = 1, m, 32");
        let li = pos("do i = i_out_var, i_el_inner");
        let lj = pos("do j = j_out_var, j_el_inner");
        assert!(ti < tj && tj < li && li < lj, "loop order wrong:\n{out}");
    }

    #[test]
    fn respects_the_tilesize_option() {
        let (mut tree, outer) = nest();
        let opts = Options::new().with("tilesize", OptValue::Int(8));
        LoopTiling2D.apply(&mut tree, &[outer], &opts).unwrap();
        let out = Printer::tree_to_string(&tree);
        assert!(out.contains("do i_out_var = 1, n, 8"));
        assert!(out.contains("MIN(j_out_var + 7, m)"));
    }

    #[test]
    fn rejects_non_strict_nests() {
        let src = "subroutine sub(a, n)\nreal, intent(inout), dimension(n) :: a\ninteger, intent(in) :: n\ninteger :: i\ndo i = 1, n\n  a(i) = 0.0\nend do\nend subroutine sub\n";
        let mut tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let outer = tree
            .walk(tree.root())
            .into_iter()
            .find(|n| matches!(tree.get(*n).kind, NodeKind::Loop { .. }))
            .unwrap();
        let err = LoopTiling2D
            .apply(&mut tree, &[outer], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("exactly one statement"));
    }
}
