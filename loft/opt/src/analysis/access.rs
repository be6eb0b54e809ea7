//! Variable access analysis: which signatures a subtree reads and writes,
//! in program order. Subscripts are deliberately not part of a signature;
//! `a(i)` and `a(j)` both access `a`.
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;
use loft_ir::{NodeId, NodeKind, Tree};
use loft_utils::Id;

/// The base variable of an access plus any `%`-member names, without
/// subscripts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub var: Id,
    pub members: Vec<Id>,
}

impl Signature {
    pub fn scalar(var: Id) -> Self {
        Signature {
            var,
            members: Vec::new(),
        }
    }

    /// The signature named by a reference node, if it is one.
    pub fn of_node(tree: &Tree, node: NodeId) -> Option<Self> {
        match &tree.get(node).kind {
            NodeKind::Reference { symbol } | NodeKind::ArrayRef { symbol } => {
                Some(Signature::scalar(tree.symbol(*symbol).name))
            }
            NodeKind::StructureRef { symbol, members } => Some(Signature {
                var: tree.symbol(*symbol).name,
                members: members.iter().map(|m| m.name).collect(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.var)?;
        for member in &self.members {
            write!(f, "%{member}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn writes(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }

    pub fn reads(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Access {
    pub mode: AccessMode,
    pub node: NodeId,
}

/// All accesses below one or more nodes, keyed by signature. Signatures and
/// the accesses under them keep program order.
#[derive(Debug, Default)]
pub struct AccessInfo {
    map: LinkedHashMap<Signature, Vec<Access>>,
    /// Set when the region contains a node the analysis cannot see into.
    opaque: bool,
}

impl AccessInfo {
    pub fn of(tree: &Tree, node: NodeId) -> Self {
        Self::of_many(tree, std::iter::once(node))
    }

    pub fn of_many(
        tree: &Tree,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        let mut info = AccessInfo::default();
        for node in nodes {
            info.collect(tree, node);
        }
        info
    }

    pub fn add(&mut self, sig: Signature, mode: AccessMode, node: NodeId) {
        self.map
            .entry(sig)
            .or_insert_with(Vec::new)
            .push(Access { mode, node });
    }

    pub fn merge(&mut self, other: AccessInfo) {
        for (sig, accesses) in other.map {
            self.map
                .entry(sig)
                .or_insert_with(Vec::new)
                .extend(accesses);
        }
        self.opaque |= other.opaque;
    }

    /// Signatures in the order they first appear.
    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.map.keys()
    }

    pub fn accesses(&self, sig: &Signature) -> &[Access] {
        self.map.get(sig).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_written(&self, sig: &Signature) -> bool {
        self.accesses(sig).iter().any(|a| a.mode.writes())
    }

    /// The mode of the first access to `sig` in program order.
    pub fn first_mode(&self, sig: &Signature) -> Option<AccessMode> {
        self.accesses(sig).first().map(|a| a.mode)
    }

    pub fn has_opaque(&self) -> bool {
        self.opaque
    }

    pub fn contains(&self, sig: &Signature) -> bool {
        self.map.contains_key(sig)
    }

    fn collect(&mut self, tree: &Tree, node: NodeId) {
        match &tree.get(node).kind {
            NodeKind::Assignment => {
                let children = tree.children(node);
                let (target, value) = (children[0], children[1]);
                // Value reads come first, then the target's subscript
                // reads, then the write of the target itself.
                self.collect_read(tree, value);
                for sub in tree.children(target) {
                    self.collect_read(tree, *sub);
                }
                if let Some(sig) = Signature::of_node(tree, target) {
                    self.add(sig, AccessMode::Write, target);
                }
            }
            NodeKind::Loop { variable } => {
                let sig = Signature::scalar(tree.symbol(*variable).name);
                self.add(sig, AccessMode::ReadWrite, node);
                let children = tree.children(node);
                for bound in &children[..children.len().min(3)] {
                    self.collect_read(tree, *bound);
                }
                if let Some(body) = children.get(3) {
                    self.collect(tree, *body);
                }
            }
            NodeKind::IfBlock => {
                let children = tree.children(node);
                self.collect_read(tree, children[0]);
                for body in &children[1..] {
                    self.collect(tree, *body);
                }
            }
            NodeKind::Call { .. } => {
                // Without an interface for the callee, a plain variable
                // argument may be read or written.
                for arg in tree.children(node) {
                    if let Some(sig) = Signature::of_node(tree, *arg) {
                        for sub in tree.children(*arg) {
                            self.collect_read(tree, *sub);
                        }
                        self.add(sig, AccessMode::ReadWrite, *arg);
                    } else {
                        self.collect_read(tree, *arg);
                    }
                }
            }
            NodeKind::CodeBlock { .. } => {
                self.opaque = true;
            }
            NodeKind::Routine { .. }
            | NodeKind::Schedule { .. }
            | NodeKind::ExtractRegion { .. }
            | NodeKind::Container { .. }
            | NodeKind::FileContainer { .. } => {
                for child in tree.children(node).to_vec() {
                    self.collect(tree, child);
                }
            }
            kind if kind.is_expression() => self.collect_read(tree, node),
            _ => {}
        }
    }

    fn collect_read(&mut self, tree: &Tree, node: NodeId) {
        if let Some(sig) = Signature::of_node(tree, node) {
            self.add(sig, AccessMode::Read, node);
        }
        for child in tree.children(node) {
            self.collect_read(tree, *child);
        }
    }
}

impl std::fmt::Display for AccessInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sigs = self
            .map
            .iter()
            .map(|(sig, accesses)| {
                let modes =
                    accesses.iter().map(|a| format!("{:?}", a.mode)).join(",");
                format!("{sig}: [{modes}]")
            })
            .join("; ");
        write!(f, "{sigs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_ir::{parse_source, Dialect};

    fn analyze(body: &str) -> (Tree, AccessInfo) {
        let src = format!(
            "subroutine t(a, b, n)\nreal, intent(inout), dimension(n) :: a\nreal, intent(in), dimension(n) :: b\ninteger, intent(in) :: n\ninteger :: i\nreal :: s\n{body}\nend subroutine t\n"
        );
        let tree =
            parse_source(&src, "test", &Dialect::default()).expect("parses");
        let routine = tree.children(tree.root())[0];
        let info = AccessInfo::of(&tree, routine);
        (tree, info)
    }

    fn sig(name: &str) -> Signature {
        Signature::scalar(Id::new(name))
    }

    #[test]
    fn assignment_reads_before_writing() {
        let (_, info) = analyze("s = s + b(i)");
        assert_eq!(info.first_mode(&sig("s")), Some(AccessMode::Read));
        assert!(info.is_written(&sig("s")));
        assert!(!info.is_written(&sig("b")));
        assert_eq!(info.first_mode(&sig("i")), Some(AccessMode::Read));
    }

    #[test]
    fn lhs_subscripts_are_reads() {
        let (_, info) = analyze("a(i) = 0.0");
        assert_eq!(info.first_mode(&sig("i")), Some(AccessMode::Read));
        assert_eq!(info.first_mode(&sig("a")), Some(AccessMode::Write));
    }

    #[test]
    fn loop_variable_is_read_write() {
        let (_, info) = analyze("do i = 1, n\n  a(i) = b(i)\nend do");
        assert_eq!(info.first_mode(&sig("i")), Some(AccessMode::ReadWrite));
        assert_eq!(info.first_mode(&sig("n")), Some(AccessMode::Read));
        assert!(info.is_written(&sig("a")));
    }

    #[test]
    fn call_arguments_are_conservative() {
        let (_, info) = analyze("call helper(s, b(i))");
        assert_eq!(info.first_mode(&sig("s")), Some(AccessMode::ReadWrite));
        // The array argument itself may be written, its subscript is a read.
        assert!(info.is_written(&sig("b")));
        assert_eq!(info.first_mode(&sig("i")), Some(AccessMode::Read));
    }

    #[test]
    fn structure_members_get_distinct_signatures() {
        let (_, info) = analyze("s = fld%lo + fld%hi");
        let lo = Signature {
            var: Id::new("fld"),
            members: vec![Id::new("lo")],
        };
        let hi = Signature {
            var: Id::new("fld"),
            members: vec![Id::new("hi")],
        };
        assert!(info.contains(&lo));
        assert!(info.contains(&hi));
        assert_ne!(lo, hi);
        assert_eq!(lo.to_string(), "fld%lo");
    }
}
