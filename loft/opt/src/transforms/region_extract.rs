//! Region extraction: wrap a consecutive run of sibling statements in an
//! instrumented region node recording which signatures flow in and out.
use crate::analysis::AccessInfo;
use crate::transform::{Named, Options, Transformation};
use itertools::Itertools;
use loft_ir::{NodeId, NodeKind, Tree};
use loft_utils::{Error, Id, LoftResult};

/// The predicate deciding which node kinds may not appear anywhere inside
/// an extracted region. Injectable so drivers can tighten the rules; the
/// default rejects nested regions and opaque code blocks.
type IllegalKind = fn(&NodeKind) -> bool;

pub struct RegionExtract {
    illegal: IllegalKind,
}

impl Default for RegionExtract {
    fn default() -> Self {
        RegionExtract {
            illegal: |kind| {
                matches!(
                    kind,
                    NodeKind::ExtractRegion { .. } | NodeKind::CodeBlock { .. }
                )
            },
        }
    }
}

impl Named for RegionExtract {
    fn name() -> &'static str {
        "extract-region"
    }

    fn description() -> &'static str {
        "wrap consecutive statements in an instrumented extraction region"
    }
}

impl RegionExtract {
    pub fn with_illegal_kinds(illegal: IllegalKind) -> Self {
        RegionExtract { illegal }
    }

    fn err<S: ToString>(msg: S) -> Error {
        Error::transformation(Self::name(), msg)
    }
}

impl Transformation for RegionExtract {
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        _opts: &Options,
    ) -> LoftResult<()> {
        if targets.is_empty() {
            return Err(Self::err(
                "extraction requires at least one target statement",
            ));
        }
        for target in targets {
            if !tree.get(*target).kind.is_statement() {
                return Err(Self::err(format!(
                    "'{}' is not a statement and cannot be extracted",
                    tree.get(*target).kind.tag()
                )));
            }
        }
        let parents: Vec<_> =
            targets.iter().map(|t| tree.parent(*t)).unique().collect();
        if parents.len() != 1 || parents[0].is_none() {
            return Err(Self::err(
                "target statements must share a single parent",
            ));
        }
        let positions: Vec<usize> = targets
            .iter()
            .map(|t| {
                tree.position(*t)
                    .ok_or_else(|| Error::internal("corrupt parent link"))
            })
            .collect::<LoftResult<_>>()?;
        let consecutive = positions
            .iter()
            .tuple_windows()
            .all(|(a, b)| *b == *a + 1);
        if !consecutive {
            return Err(Self::err(
                "target statements must be consecutive and in order",
            ));
        }
        for target in targets {
            for node in tree.descendants(*target) {
                let kind = &tree.get(node).kind;
                if (self.illegal)(kind) {
                    return Err(Self::err(format!(
                        "the region contains a '{}' node that cannot be \
                         extracted",
                        kind.tag()
                    )));
                }
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
        let parent = tree
            .parent(targets[0])
            .ok_or_else(|| Error::internal("validated target is detached"))?;
        let first_pos = tree
            .position(targets[0])
            .ok_or_else(|| Error::internal("corrupt parent link"))?;

        // Region names count up from r0 across the whole tree.
        let existing = tree
            .descendants(tree.root())
            .filter(|n| {
                matches!(tree.get(*n).kind, NodeKind::ExtractRegion { .. })
            })
            .count();
        let name = Id::new(format!("r{existing}"));

        // Inputs are the signatures whose first access in the region reads
        // them; outputs are everything the region writes.
        let info = AccessInfo::of_many(tree, targets.iter().copied());
        let inputs: Vec<Id> = info
            .signatures()
            .filter(|sig| {
                info.first_mode(sig).is_some_and(|mode| mode.reads())
            })
            .map(|sig| Id::new(sig.to_string()))
            .collect();
        let outputs: Vec<Id> = info
            .signatures()
            .filter(|sig| info.is_written(sig))
            .map(|sig| Id::new(sig.to_string()))
            .collect();

        let span = tree.get(targets[0]).span;
        let region = tree.new_node(
            NodeKind::ExtractRegion {
                name,
                inputs,
                outputs,
            },
            span,
        );
        let scope = tree.new_scope();
        let body = tree.new_node(NodeKind::Schedule { scope }, span);
        tree.add_child(region, body)?;
        for target in targets {
            tree.detach(*target)?;
            tree.add_child(body, *target)?;
        }
        tree.insert_child(parent, first_pos, region)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_ir::{parse_source, Dialect, Printer};

    fn routine_stmts(src: &str) -> (Tree, NodeId, Vec<NodeId>) {
        let tree =
            parse_source(src, "test", &Dialect::default()).expect("parses");
        let routine = tree.children(tree.root())[0];
        let stmts = tree.children(routine).to_vec();
        (tree, routine, stmts)
    }

    const SRC: &str = "subroutine sub(a, b, n)\nreal, intent(inout), dimension(n) :: a\nreal, intent(in), dimension(n) :: b\ninteger, intent(in) :: n\nreal :: s\ns = b(1)\na(1) = s * 2.0\na(2) = a(1) + b(2)\nend subroutine sub\n";

    #[test]
    fn wraps_a_consecutive_run() {
        let (mut tree, routine, stmts) = routine_stmts(SRC);
        RegionExtract::default()
            .apply(&mut tree, &stmts, &Options::new())
            .unwrap();
        // One region at the position of the first statement.
        let children = tree.children(routine);
        assert_eq!(children.len(), 1);
        let NodeKind::ExtractRegion {
            name,
            inputs,
            outputs,
        } = &tree.get(children[0]).kind
        else {
            panic!("expected a region")
        };
        assert_eq!(name.as_str(), "r0");
        let body = tree.children(children[0])[0];
        assert_eq!(tree.children(body).len(), 3);
        // `b` is read first; `s` and `a` are written before any read, so
        // they are outputs only.
        let inputs: Vec<_> = inputs.iter().map(|i| i.as_str()).collect();
        let outputs: Vec<_> = outputs.iter().map(|o| o.as_str()).collect();
        assert!(inputs.contains(&"b"));
        assert!(!inputs.contains(&"s"));
        assert!(!inputs.contains(&"a"));
        assert!(outputs.contains(&"s"));
        assert!(outputs.contains(&"a"));

        let out = Printer::tree_to_string(&tree);
        assert!(out.contains("call extract_start('r0', 1, 2)"));
        assert!(out.contains("call extract_read('b')"));
        assert!(out.contains("call extract_write('a')"));
        assert!(out.contains("call extract_end('r0')"));
    }

    #[test]
    fn rejects_non_consecutive_runs() {
        let (mut tree, _, stmts) = routine_stmts(SRC);
        let err = RegionExtract::default()
            .apply(&mut tree, &[stmts[0], stmts[2]], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("consecutive"));
    }

    #[test]
    fn rejects_nested_regions() {
        let (mut tree, _, stmts) = routine_stmts(SRC);
        RegionExtract::default()
            .apply(&mut tree, &[stmts[0]], &Options::new())
            .unwrap();
        let routine = tree.children(tree.root())[0];
        let region = tree.children(routine)[0];
        let err = RegionExtract::default()
            .apply(&mut tree, &[region], &Options::new())
            .unwrap_err();
        assert!(err.to_string().contains("ExtractRegion"));
    }

    #[test]
    fn region_names_count_up() {
        let (mut tree, routine, stmts) = routine_stmts(SRC);
        RegionExtract::default()
            .apply(&mut tree, &[stmts[0]], &Options::new())
            .unwrap();
        let second = tree.children(routine).to_vec();
        RegionExtract::default()
            .apply(&mut tree, &[second[1]], &Options::new())
            .unwrap();
        let out = Printer::tree_to_string(&tree);
        assert!(out.contains("extract_start('r0'"));
        assert!(out.contains("extract_start('r1'"));
    }
}
