//! Vocabulary shared between the front-end AST and the IR.

/// The intrinsic scalar kinds of the host dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Integer,
    Real,
    Boolean,
    Character,
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScalarKind::Integer => "integer",
            ScalarKind::Real => "real",
            ScalarKind::Boolean => "logical",
            ScalarKind::Character => "character",
        };
        write!(f, "{s}")
    }
}

/// Access mode of a routine argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    In,
    Out,
    InOut,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Intent::In => "in",
            Intent::Out => "out",
            Intent::InOut => "inout",
        };
        write!(f, "{s}")
    }
}

/// Binary operators of the host dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// The surface spelling used by the code generator.
    pub fn surface(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "/=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => ".and.",
            BinOp::Or => ".or.",
        }
    }
}

/// Unary operators of the host dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Minus,
    Not,
}

impl UnOp {
    pub fn surface(&self) -> &'static str {
        match self {
            UnOp::Minus => "-",
            UnOp::Not => ".not.",
        }
    }
}

/// Library intrinsics the engine understands well enough to lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Abs,
    Sign,
    Min,
    Max,
    Sum,
}

impl Intrinsic {
    /// Recognize an intrinsic by its (case-normalized) name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Intrinsic::Abs),
            "sign" => Some(Intrinsic::Sign),
            "min" => Some(Intrinsic::Min),
            "max" => Some(Intrinsic::Max),
            "sum" => Some(Intrinsic::Sum),
            _ => None,
        }
    }

    /// The surface spelling used by the code generator.
    pub fn surface(&self) -> &'static str {
        match self {
            Intrinsic::Abs => "ABS",
            Intrinsic::Sign => "SIGN",
            Intrinsic::Min => "MIN",
            Intrinsic::Max => "MAX",
            Intrinsic::Sum => "SUM",
        }
    }

    /// The number of arguments the intrinsic accepts.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Intrinsic::Abs | Intrinsic::Sum => (1, Some(1)),
            Intrinsic::Sign => (2, Some(2)),
            Intrinsic::Min | Intrinsic::Max => (2, None),
        }
    }
}

/// Host-dialect configuration threaded through parsing. There is no
/// process-wide "current dialect"; two trees parsed under different dialects
/// can coexist.
#[derive(Debug, Clone, Default)]
pub struct Dialect {
    /// Keep the case of identifiers instead of folding to lowercase.
    pub case_sensitive: bool,
}
