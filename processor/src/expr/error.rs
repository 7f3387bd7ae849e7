//! Expression error types

use thiserror::Error;

/// Expression failed to compile
///
/// Always a startup-time failure: a processor whose expressions do not
/// compile does not start.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("syntax error at position {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(String),

    #[error("undeclared reference to '{0}'")]
    UndeclaredReference(String),

    #[error("invalid variable name '{0}'")]
    InvalidVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{name}' expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("has() requires a field selection argument, e.g. has(a.b)")]
    InvalidHas,

    #[error("type error: {0}")]
    Type(String),

    #[error("expression nesting exceeds maximum depth of {0}")]
    TooDeep(usize),
}

/// Runtime evaluation failure
///
/// Drops the current event (or pair); never fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("no such key: {0}")]
    NoSuchKey(String),

    #[error("index {index} out of range for list of size {size}")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("no such overload: {op} applied to ({operands})")]
    NoSuchOverload { op: String, operands: String },

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("no binding supplied for variable '{0}'")]
    MissingBinding(String),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("value cannot be serialized as JSON: {0}")]
    NotSerializable(String),

    #[error("evaluation nesting exceeds maximum depth of {0}")]
    TooDeep(usize),
}

impl EvalError {
    pub(crate) fn overload(op: impl Into<String>, operands: &[&str]) -> Self {
        EvalError::NoSuchOverload {
            op: op.into(),
            operands: operands.join(", "),
        }
    }
}

/// Value had the wrong dynamic type for its use (e.g. a non-boolean filter)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("type mismatch: expected {expected}, found {found}")]
pub struct TypeMismatchError {
    pub expected: &'static str,
    pub found: &'static str,
}
