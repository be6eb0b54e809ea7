//! The IR tree. Nodes, scopes and symbols live in arenas owned by the
//! [`Tree`]; ids are indices into those arenas. All structural mutation goes
//! through the methods here, which validate shape contracts *before*
//! touching the tree so that a failed operation leaves it unchanged.
use crate::{
    Node, NodeId, NodeKind, ScopeId, Symbol, SymbolId, SymbolTable, Type,
};
use crate::symbol::ArrayBound;
use loft_utils::{Error, GPosIdx, Id, LoftResult};
use smallvec::SmallVec;

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    scopes: Vec<SymbolTable>,
    symbols: Vec<Symbol>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree holding just a root [`NodeKind::FileContainer`].
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: Vec::new(),
            scopes: Vec::new(),
            symbols: Vec::new(),
            root: NodeId(0),
        };
        let scope = tree.new_scope();
        tree.root =
            tree.new_node(NodeKind::FileContainer { scope }, GPosIdx::UNKNOWN);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Allocate a new, detached node.
    pub fn new_node(&mut self, kind: NodeKind, span: GPosIdx) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind, span));
        id
    }

    pub fn new_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(SymbolTable::default());
        id
    }

    pub fn scope(&self, id: ScopeId) -> &SymbolTable {
        &self.scopes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.get(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).parent
    }

    /// The index of `id` in its parent's child list.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        let parent = self.get(id).parent?;
        self.children(parent).iter().position(|c| *c == id)
    }

    // ------------------------ structural mutation ------------------------

    /// Append a detached subtree as the last child of `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> LoftResult<()> {
        let at = self.children(parent).len();
        self.insert_child(parent, at, child)
    }

    /// Insert a detached subtree at position `at` of `parent`'s child list.
    /// Validates everything first; on error the tree is unchanged.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        at: usize,
        child: NodeId,
    ) -> LoftResult<()> {
        if child == self.root {
            return Err(Error::invalid_tree_shape(
                "the root node cannot become a child",
            ));
        }
        if self.get(child).parent.is_some() {
            return Err(Error::invalid_tree_shape(format!(
                "node {child:?} is already attached; detach it first"
            )));
        }
        let len = self.children(parent).len();
        if at > len {
            return Err(Error::invalid_tree_shape(format!(
                "insertion position {at} is out of bounds for {len} children"
            )));
        }
        // `parent` inside the subtree being attached would create a cycle.
        if self.descendants(child).any(|n| n == parent) {
            return Err(Error::invalid_tree_shape(
                "inserting a node into its own subtree",
            ));
        }
        self.get(parent)
            .kind
            .accepts_child(at, &self.get(child).kind, len)
            .map_err(Error::invalid_tree_shape)?;
        self.get_mut(parent).children.insert(at, child);
        self.get_mut(child).parent = Some(parent);
        Ok(())
    }

    /// Unlink a subtree from its parent. Detaching an already detached node
    /// is a no-op. The root cannot be detached.
    pub fn detach(&mut self, id: NodeId) -> LoftResult<NodeId> {
        if id == self.root {
            return Err(Error::invalid_tree_shape(
                "the root node cannot be detached",
            ));
        }
        if let Some(parent) = self.get(id).parent {
            let pos = self
                .position(id)
                .ok_or_else(|| Error::internal("corrupt parent link"))?;
            self.get_mut(parent).children.remove(pos);
            self.get_mut(id).parent = None;
        }
        Ok(id)
    }

    /// Swap the attached subtree `old` for the detached subtree `new`,
    /// keeping the position. Returns `old`, now detached.
    pub fn replace_with(
        &mut self,
        old: NodeId,
        new: NodeId,
    ) -> LoftResult<NodeId> {
        let parent = self.get(old).parent.ok_or_else(|| {
            Error::invalid_tree_shape("cannot replace a detached node")
        })?;
        if self.get(new).parent.is_some() {
            return Err(Error::invalid_tree_shape(format!(
                "node {new:?} is already attached; detach it first"
            )));
        }
        let pos = self
            .position(old)
            .ok_or_else(|| Error::internal("corrupt parent link"))?;
        if self.descendants(new).any(|n| n == parent) {
            return Err(Error::invalid_tree_shape(
                "inserting a node into its own subtree",
            ));
        }
        // The child count does not change, so only the positional kind rule
        // applies; pass `pos` as the length to sidestep the arity cap.
        self.get(parent)
            .kind
            .accepts_child(pos, &self.get(new).kind, pos)
            .map_err(Error::invalid_tree_shape)?;
        self.get_mut(parent).children[pos] = new;
        self.get_mut(new).parent = Some(parent);
        self.get_mut(old).parent = None;
        Ok(old)
    }

    // ------------------------------ traversal -----------------------------

    /// Pre-order traversal of the subtree at `from`, including `from`
    /// itself. Materialized so the caller may mutate the tree while
    /// iterating over the result.
    pub fn walk(&self, from: NodeId) -> Vec<NodeId> {
        self.descendants(from).collect()
    }

    /// Lazy pre-order traversal, including `from` itself.
    pub fn descendants(
        &self,
        from: NodeId,
    ) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: SmallVec<[NodeId; 8]> = SmallVec::new();
        stack.push(from);
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(self.children(next).iter().rev().copied());
            Some(next)
        })
    }

    /// The chain of ancestors of `id`, nearest first. Does not include `id`.
    pub fn ancestors(
        &self,
        id: NodeId,
    ) -> impl Iterator<Item = NodeId> + '_ {
        let mut cur = self.get(id).parent;
        std::iter::from_fn(move || {
            let next = cur?;
            cur = self.get(next).parent;
            Some(next)
        })
    }

    /// The nearest strict ancestor satisfying `pred`.
    pub fn ancestor<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
    {
        self.ancestor_where(id, pred, |_| false, false)
    }

    /// The nearest ancestor satisfying `pred`, optionally starting at `id`
    /// itself, giving up at the first node matching `excluding`.
    pub fn ancestor_where<F, G>(
        &self,
        id: NodeId,
        pred: F,
        excluding: G,
        include_self: bool,
    ) -> Option<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
        G: Fn(&NodeKind) -> bool,
    {
        let chain = include_self
            .then_some(id)
            .into_iter()
            .chain(self.ancestors(id));
        for n in chain {
            let kind = &self.get(n).kind;
            if pred(kind) {
                return Some(n);
            }
            if excluding(kind) {
                return None;
            }
        }
        None
    }

    /// The nearest statement node at or above `id`.
    pub fn enclosing_statement(&self, id: NodeId) -> Option<NodeId> {
        if self.get(id).kind.is_statement() {
            Some(id)
        } else {
            self.ancestor(id, NodeKind::is_statement)
        }
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Deep-copy the subtree at `from`. The copy gets fresh node ids and
    /// fresh scopes (with the same bindings); symbol ids are shared with the
    /// original. The returned root is detached.
    pub fn copy_subtree(&mut self, from: NodeId) -> NodeId {
        let kind = match &self.get(from).kind {
            k @ (NodeKind::FileContainer { .. }
            | NodeKind::Container { .. }
            | NodeKind::Routine { .. }
            | NodeKind::Schedule { .. }) => {
                let old_scope = k.scope().expect("scoping kind has a scope");
                let mut k = k.clone();
                let copied = self.scopes[old_scope.index()].clone();
                let fresh = ScopeId(self.scopes.len() as u32);
                self.scopes.push(copied);
                match &mut k {
                    NodeKind::FileContainer { scope }
                    | NodeKind::Container { scope, .. }
                    | NodeKind::Routine { scope, .. }
                    | NodeKind::Schedule { scope } => *scope = fresh,
                    _ => unreachable!(),
                }
                k
            }
            k => k.clone(),
        };
        let span = self.get(from).span;
        let annotations = self.get(from).annotations.clone();
        let copy = self.new_node(kind, span);
        self.get_mut(copy).annotations = annotations;
        let children: Vec<NodeId> =
            self.children(from).to_vec();
        for child in children {
            let child_copy = self.copy_subtree(child);
            self.get_mut(copy).children.push(child_copy);
            self.get_mut(child_copy).parent = Some(copy);
        }
        copy
    }

    /// The loop's `(start, stop, step, body)` children. Errors if the node
    /// is not a fully formed loop.
    pub fn loop_parts(
        &self,
        id: NodeId,
    ) -> LoftResult<(NodeId, NodeId, NodeId, NodeId)> {
        let node = self.get(id);
        if !matches!(node.kind, NodeKind::Loop { .. }) {
            return Err(Error::internal(format!(
                "expected a Loop, found '{}'",
                node.kind.tag()
            )));
        }
        match *node.children {
            [start, stop, step, body] => Ok((start, stop, step, body)),
            _ => Err(Error::internal(format!(
                "malformed Loop with {} children",
                node.children.len()
            ))),
        }
    }

    // ------------------------------ symbols -------------------------------

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    /// The scope owned by the nearest scoping node at or above `id`. The
    /// root owns a scope, so this always succeeds for attached nodes.
    pub fn enclosing_scope(&self, id: NodeId) -> ScopeId {
        if let Some(scope) = self.get(id).kind.scope() {
            return scope;
        }
        self.ancestors(id)
            .find_map(|n| self.get(n).kind.scope())
            .unwrap_or_else(|| {
                self.get(self.root).kind.scope().expect("root has a scope")
            })
    }

    /// The chain of scopes visible from `id`, innermost first.
    fn scope_chain(&self, id: NodeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        chain.extend(self.get(id).kind.scope());
        chain.extend(self.ancestors(id).filter_map(|n| self.get(n).kind.scope()));
        chain
    }

    /// Bind `symbol` in `scope`. Fails if the name is already bound there.
    pub fn add_symbol(
        &mut self,
        scope: ScopeId,
        symbol: Symbol,
    ) -> LoftResult<SymbolId> {
        if self.scopes[scope.index()].contains(symbol.name) {
            return Err(Error::name_collision(format!(
                "symbol '{}' is already declared in this scope",
                symbol.name
            )));
        }
        let id = SymbolId(self.symbols.len() as u32);
        let name = symbol.name;
        self.symbols.push(symbol);
        self.scopes[scope.index()].bind(name, id);
        Ok(id)
    }

    /// Look `name` up in one scope only.
    pub fn lookup_in(&self, scope: ScopeId, name: Id) -> Option<SymbolId> {
        self.scopes[scope.index()].get(name)
    }

    /// Look `name` up in the scopes visible from `id`, innermost first.
    pub fn lookup(&self, id: NodeId, name: Id) -> Option<SymbolId> {
        self.lookup_until(id, name, None)
    }

    /// Like [`Tree::lookup`], but the search stops before entering `limit`
    /// when one is given.
    pub fn lookup_until(
        &self,
        id: NodeId,
        name: Id,
        limit: Option<ScopeId>,
    ) -> Option<SymbolId> {
        self.scope_chain(id)
            .into_iter()
            .take_while(|scope| Some(*scope) != limit)
            .find_map(|scope| self.scopes[scope.index()].get(name))
    }

    /// Whether `name` is bound anywhere visible from `id`.
    fn is_visible(&self, id: NodeId, name: Id) -> bool {
        self.lookup(id, name).is_some()
    }

    /// Whether `sym` is the declared bound of any array symbol.
    pub fn is_array_bound(&self, sym: SymbolId) -> bool {
        self.symbols.iter().any(|other| match &other.ty {
            Type::Array { shape, .. } => shape
                .iter()
                .any(|b| matches!(b, ArrayBound::Var(v) if *v == sym)),
            _ => false,
        })
    }

    /// Create a fresh local data symbol in the scope enclosing `at`, named
    /// `base` or, on a clash with any visible binding, the first free of
    /// `base_1`, `base_2`, ... The search is deterministic: the same tree
    /// and arguments always yield the same name.
    pub fn new_symbol(
        &mut self,
        at: NodeId,
        base: &str,
        ty: Type,
    ) -> LoftResult<SymbolId> {
        let scope = self.enclosing_scope(at);
        let mut name = Id::new(base);
        let mut i = 0;
        while self.is_visible(at, name) {
            i += 1;
            name = Id::new(format!("{base}_{i}"));
        }
        self.add_symbol(scope, Symbol::data(name, ty))
    }

    /// Find the symbol tagged `tag` in the scopes visible from `at`.
    pub fn lookup_with_tag(&self, at: NodeId, tag: &str) -> Option<SymbolId> {
        let tag = Id::new(tag);
        self.scope_chain(at).into_iter().find_map(|scope| {
            self.scopes[scope.index()]
                .iter()
                .map(|(_, sym)| sym)
                .find(|sym| self.symbols[sym.index()].tag == Some(tag))
        })
    }

    /// Find the symbol tagged `tag` in the scopes visible from `at`, or
    /// create one named after `base` (disambiguated like [`Tree::new_symbol`])
    /// and tag it. Repeated calls with the same tag return the same symbol.
    pub fn symbol_from_tag(
        &mut self,
        at: NodeId,
        tag: &str,
        base: &str,
        ty: Type,
    ) -> LoftResult<SymbolId> {
        if let Some(sym) = self.lookup_with_tag(at, tag) {
            return Ok(sym);
        }
        let sym = self.new_symbol(at, base, ty)?;
        self.symbol_mut(sym).tag = Some(Id::new(tag));
        Ok(sym)
    }

    /// Unbind `sym` from `scope`. Fails eagerly if any node in the tree, or
    /// any array bound of another symbol, still refers to it. The arena
    /// entry is retained so existing `SymbolId`s stay valid.
    pub fn remove_symbol(
        &mut self,
        scope: ScopeId,
        sym: SymbolId,
    ) -> LoftResult<()> {
        let name = self.symbol(sym).name;
        if self.scopes[scope.index()].get(name) != Some(sym) {
            return Err(Error::symbol_not_found(format!(
                "symbol '{name}' is not bound in this scope"
            )));
        }
        for node in self.descendants(self.root) {
            let used = match self.get(node).kind {
                NodeKind::Reference { symbol }
                | NodeKind::ArrayRef { symbol }
                | NodeKind::StructureRef { symbol, .. } => symbol == sym,
                NodeKind::Loop { variable } => variable == sym,
                NodeKind::Call { routine } => routine == sym,
                _ => false,
            };
            if used {
                return Err(Error::symbol_in_use(format!(
                    "symbol '{name}' is still referenced in the tree"
                )));
            }
        }
        for other in &self.symbols {
            if let Type::Array { shape, .. } = &other.ty {
                if shape.iter().any(|b| matches!(b, ArrayBound::Var(v) if *v == sym))
                {
                    return Err(Error::symbol_in_use(format!(
                        "symbol '{name}' bounds the array '{}'",
                        other.name
                    )));
                }
            }
        }
        self.scopes[scope.index()].unbind(name);
        Ok(())
    }

    // ---------------------------- annotations -----------------------------

    pub fn annotate(&mut self, id: NodeId, ann: &str) {
        self.get_mut(id).annotate(Id::new(ann));
    }

    pub fn has_annotation(&self, id: NodeId, ann: &str) -> bool {
        self.get(id).has_annotation(Id::new(ann))
    }
}
