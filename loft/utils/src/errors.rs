//! Errors surfaced by the loft transformation engine.
use crate::position::GPosIdx;

/// Convenience alias to represent an error with the error type.
pub type LoftResult<T> = std::result::Result<T, Error>;

/// An error in the program or in the engine's handling of it.
pub struct Error {
    kind: Box<ErrorKind>,
    pos: GPosIdx,
}

/// The cause of an [Error].
enum ErrorKind {
    /// A symbol with this name is already bound in the table.
    NameCollision(String),
    /// Name lookup exhausted the scope chain.
    SymbolNotFound(String),
    /// The symbol cannot be removed because references still target it.
    SymbolInUse(String),
    /// A structural mutation would violate a node's child shape contract.
    InvalidTreeShape(String),
    /// A transformation precondition failed during validate/apply.
    Transformation { trans: String, msg: String },
    /// The front-end failed to parse the input.
    Parse(String),
    /// The input file could not be read.
    InvalidFile(String),
    /// Failed to write the output.
    Write(String),
    /// An invariant of the engine itself was broken. Indicates a bug.
    Internal(String),
}

impl Error {
    pub fn name_collision<S: ToString>(msg: S) -> Self {
        ErrorKind::NameCollision(msg.to_string()).into()
    }

    pub fn symbol_not_found<S: ToString>(msg: S) -> Self {
        ErrorKind::SymbolNotFound(msg.to_string()).into()
    }

    pub fn symbol_in_use<S: ToString>(msg: S) -> Self {
        ErrorKind::SymbolInUse(msg.to_string()).into()
    }

    pub fn invalid_tree_shape<S: ToString>(msg: S) -> Self {
        ErrorKind::InvalidTreeShape(msg.to_string()).into()
    }

    pub fn transformation<S: ToString, M: ToString>(trans: S, msg: M) -> Self {
        ErrorKind::Transformation {
            trans: trans.to_string(),
            msg: msg.to_string(),
        }
        .into()
    }

    pub fn parse_error<S: ToString>(msg: S) -> Self {
        ErrorKind::Parse(msg.to_string()).into()
    }

    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        ErrorKind::InvalidFile(msg.to_string()).into()
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        ErrorKind::Write(msg.to_string()).into()
    }

    pub fn internal<S: ToString>(msg: S) -> Self {
        ErrorKind::Internal(msg.to_string()).into()
    }

    /// Attach a source position to the error.
    pub fn with_pos(mut self, pos: GPosIdx) -> Self {
        self.pos = pos;
        self
    }

    /// True when this error came from a transformation's validate/apply.
    pub fn is_transformation(&self) -> bool {
        matches!(*self.kind, ErrorKind::Transformation { .. })
    }

    /// True when this error reports a structural shape violation.
    pub fn is_invalid_tree_shape(&self) -> bool {
        matches!(*self.kind, ErrorKind::InvalidTreeShape(..))
    }

    /// True when this error reports a name collision.
    pub fn is_name_collision(&self) -> bool {
        matches!(*self.kind, ErrorKind::NameCollision(..))
    }

    /// True when this error reports an exhausted name lookup.
    pub fn is_symbol_not_found(&self) -> bool {
        matches!(*self.kind, ErrorKind::SymbolNotFound(..))
    }

    /// True when this error reports a still-referenced symbol.
    pub fn is_symbol_in_use(&self) -> bool {
        matches!(*self.kind, ErrorKind::SymbolInUse(..))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
            pos: GPosIdx::UNKNOWN,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        match &*self.kind {
            NameCollision(msg) => write!(f, "Name collision: {msg}")?,
            SymbolNotFound(msg) => write!(f, "Symbol not found: {msg}")?,
            SymbolInUse(msg) => write!(f, "Symbol in use: {msg}")?,
            InvalidTreeShape(msg) => write!(f, "Invalid tree shape: {msg}")?,
            Transformation { trans, msg } => {
                write!(f, "Error in transformation '{trans}': {msg}")?
            }
            Parse(msg) => write!(f, "Parse error: {msg}")?,
            InvalidFile(msg) => write!(f, "Invalid file: {msg}")?,
            Write(msg) => write!(f, "Write error: {msg}")?,
            Internal(msg) => write!(f, "Internal error: {msg}")?,
        }
        if let Some(loc) = self.pos.show() {
            write!(f, " ({loc})")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::invalid_file(err.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::write_error(err.to_string())
    }
}
