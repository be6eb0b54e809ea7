//! Globally interned identifiers and the interning pool behind them.
use std::sync::{Mutex, OnceLock};
use string_interner::{
    backend::BucketBackend, symbol::SymbolU32, StringInterner,
};

type Pool = StringInterner<BucketBackend>;

fn pool() -> &'static Mutex<Pool> {
    static POOL: OnceLock<Mutex<Pool>> = OnceLock::new();
    POOL.get_or_init(|| Mutex::new(Pool::new()))
}

/// A globally interned symbol.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GSym(SymbolU32);

impl GSym {
    /// Intern a string into the global symbol table.
    pub fn new(s: impl AsRef<str>) -> Self {
        s.as_ref().into()
    }

    /// Convert this symbol into the string in the static, global symbol table.
    pub fn as_str(&self) -> &'static str {
        let pool = pool().lock().unwrap();
        let s = pool.resolve(self.0).expect("symbol is interned");
        // SAFETY: the bucket backend neither moves nor frees interned
        // strings, and the pool itself is never dropped.
        unsafe { std::mem::transmute::<&str, &'static str>(s) }
    }
}

impl From<&str> for GSym {
    fn from(s: &str) -> Self {
        GSym(pool().lock().unwrap().get_or_intern(s))
    }
}

impl From<String> for GSym {
    fn from(s: String) -> Self {
        GSym(pool().lock().unwrap().get_or_intern(&s))
    }
}

impl From<&String> for GSym {
    fn from(s: &String) -> Self {
        GSym(pool().lock().unwrap().get_or_intern(s))
    }
}

impl std::fmt::Debug for GSym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl std::fmt::Display for GSym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_str(), f)
    }
}

/// An identifier in a program: a symbol name, a routine name, a tag.
/// Cheap to copy and compare; the underlying string lives in the global
/// interning pool.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id {
    id: GSym,
}

impl Default for GSym {
    fn default() -> Self {
        GSym::new("")
    }
}

impl Id {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Id { id: GSym::new(id) }
    }

    /// The interned string for this identifier.
    pub fn as_str(&self) -> &'static str {
        self.id.as_str()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::Id;

    #[test]
    fn interning_is_stable() {
        let a = Id::new("tmp");
        let b = Id::new("tmp");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "tmp");
        assert_ne!(a, Id::new("tmp2"));
    }
}
