//! The transformation protocol: every transformation validates its targets
//! against the current tree before mutating anything, so a failed
//! application leaves the tree untouched.
mod options;
mod registry;

pub use options::{OptValue, Options};
pub use registry::{default_registry, TransformRegistry, TransformStep};

use loft_ir::{NodeId, Tree};
use loft_utils::{Error, LoftResult};

/// A named thing in the registry.
pub trait Named {
    fn name() -> &'static str;
    fn description() -> &'static str;
}

/// A source-to-source transformation.
pub trait Transformation {
    /// Check that applying to `targets` would be legal. Must not mutate.
    fn validate(
        &self,
        tree: &Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()>;

    /// Mutate the tree. Callers go through [`Transformation::apply`];
    /// `rewrite` may assume `validate` has passed.
    fn rewrite(
        &self,
        tree: &mut Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()>;

    /// Validate, then rewrite.
    fn apply(
        &self,
        tree: &mut Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        self.validate(tree, targets, opts)?;
        self.rewrite(tree, targets, opts)
    }
}

/// Helper for transformations that take exactly one target node.
pub(crate) fn single_target(
    trans: &str,
    targets: &[NodeId],
) -> LoftResult<NodeId> {
    match targets {
        [target] => Ok(*target),
        _ => Err(Error::transformation(
            trans,
            format!("expected exactly one target node, got {}", targets.len()),
        )),
    }
}
