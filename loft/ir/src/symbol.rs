//! Symbols and symbol tables.
//!
//! Every scoping node in the tree owns a [`SymbolTable`] mapping visible names
//! to entries in the tree's symbol arena. Tables keep insertion order so that
//! regenerated declarations come out in a stable order.
use crate::SymbolId;
use linked_hash_map::LinkedHashMap;
use loft_frontend::{Intent, ScalarKind};
use loft_utils::Id;

/// The type of a data symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Scalar(ScalarKind),
    Array {
        elem: ScalarKind,
        shape: Vec<ArrayBound>,
    },
    /// The symbol was referenced but never declared; its type is unknown.
    Unresolved,
    /// The symbol has a type the engine does not model (routines, containers).
    Opaque,
}

impl Type {
    pub fn is_scalar_integer(&self) -> bool {
        matches!(self, Type::Scalar(ScalarKind::Integer))
    }
}

/// An upper bound of one array dimension. Lower bounds are implicitly 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayBound {
    Literal(i64),
    /// A scalar integer symbol visible where the array is declared.
    Var(SymbolId),
}

/// How a symbol enters its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    /// Declared locally.
    Local,
    /// A dummy argument of the enclosing routine.
    Argument(Intent),
    /// Imported from the named container.
    Import(Id),
    /// Referenced but never declared; assumed to come from an outer scope.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Data,
    Routine,
    Container,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Id,
    pub kind: SymbolKind,
    pub ty: Type,
    pub interface: Interface,
    /// Optional transformation-assigned tag, used to find a symbol again
    /// independently of renaming.
    pub tag: Option<Id>,
}

impl Symbol {
    /// A locally declared data symbol.
    pub fn data(name: Id, ty: Type) -> Self {
        Symbol {
            name,
            kind: SymbolKind::Data,
            ty,
            interface: Interface::Local,
            tag: None,
        }
    }

    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }
}

/// One scope's name bindings, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    bindings: LinkedHashMap<Id, SymbolId>,
}

impl SymbolTable {
    pub fn get(&self, name: Id) -> Option<SymbolId> {
        self.bindings.get(&name).copied()
    }

    pub fn contains(&self, name: Id) -> bool {
        self.bindings.contains_key(&name)
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Id, SymbolId)> + '_ {
        self.bindings.iter().map(|(name, sym)| (*name, *sym))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn bind(&mut self, name: Id, sym: SymbolId) {
        self.bindings.insert(name, sym);
    }

    pub(crate) fn unbind(&mut self, name: Id) -> Option<SymbolId> {
        self.bindings.remove(&name)
    }
}
