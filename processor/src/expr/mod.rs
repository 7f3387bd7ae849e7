//! Filter/select expression engine
//!
//! A small CEL-compatible expression language. Expressions are compiled
//! once at startup against the names of the streams they may reference,
//! then evaluated for every event (or event pair) without re-parsing.
//!
//! ```text
//! source ──► lexer ──► parser ──► checker ──► Program (Arc, shared)
//!                                                 │
//!                     Bindings {name: &Value} ──► evaluate ──► Value
//! ```
//!
//! # Example
//!
//! ```
//! use rivulet_processor::expr::{self, Bindings, Value};
//!
//! let filter = expr::compile("orders.x > 0", &["orders"]).unwrap();
//! let event = Value::from(serde_json::json!({"x": 5}));
//! let result = expr::evaluate(&filter, &Bindings::new().with("orders", &event)).unwrap();
//! assert!(expr::as_bool(&result).unwrap());
//! ```

mod check;
mod error;
mod eval;
mod lexer;
mod parser;
mod value;

pub use error::{CompileError, EvalError, TypeMismatchError};
pub use value::Value;

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Maximum expression nesting, enforced when parsing and evaluating
pub const MAX_DEPTH: usize = 128;

/// A compiled expression
///
/// Immutable and cheap to clone; share one per configured expression
/// across every evaluation for the lifetime of the process.
#[derive(Clone)]
pub struct Program {
    inner: Arc<ProgramInner>,
}

struct ProgramInner {
    source: String,
    variables: Vec<String>,
    root: parser::Expr,
}

impl Program {
    /// Compile `source` with the given declared variables
    ///
    /// Each variable is typed `map(string, dyn)`: one per input stream.
    pub fn compile(source: &str, variables: &[&str]) -> Result<Self, CompileError> {
        let variables: Vec<String> = variables.iter().map(|v| v.to_string()).collect();
        for name in &variables {
            if !is_identifier(name) {
                return Err(CompileError::InvalidVariable(name.clone()));
            }
        }

        let root = parser::parse(source)?;
        check::check(&root, &variables)?;

        Ok(Self {
            inner: Arc::new(ProgramInner {
                source: source.to_string(),
                variables,
                root,
            }),
        })
    }

    /// Evaluate against a set of bindings
    ///
    /// Never panics; every failure is an `EvalError`.
    pub fn evaluate(&self, bindings: &Bindings<'_>) -> Result<Value, EvalError> {
        eval::eval(&self.inner.root, bindings)
    }

    /// Original expression text
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Declared variable names
    pub fn variables(&self) -> &[String] {
        &self.inner.variables
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("source", &self.inner.source)
            .field("variables", &self.inner.variables)
            .finish()
    }
}

/// Variable environment for one evaluation
///
/// Borrows its values; build one per event (or pair) and drop it after
/// evaluating.
#[derive(Debug, Clone, Default)]
pub struct Bindings<'a> {
    vars: Vec<(&'a str, &'a Value)>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Add a binding (builder style)
    pub fn with(mut self, name: &'a str, value: &'a Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a binding
    pub fn insert(&mut self, name: &'a str, value: &'a Value) {
        match self.vars.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.vars
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Compile an expression; see [`Program::compile`]
pub fn compile(source: &str, variables: &[&str]) -> Result<Program, CompileError> {
    Program::compile(source, variables)
}

/// Evaluate a program; see [`Program::evaluate`]
pub fn evaluate(program: &Program, bindings: &Bindings<'_>) -> Result<Value, EvalError> {
    program.evaluate(bindings)
}

/// Require a boolean result
///
/// Filters are never coerced: anything but `Bool` is a configuration error.
pub fn as_bool(value: &Value) -> Result<bool, TypeMismatchError> {
    value.as_bool().ok_or(TypeMismatchError {
        expected: "bool",
        found: value.type_name(),
    })
}

/// Serialize a value as JSON bytes
pub fn as_json_bytes(value: &Value) -> Result<Bytes, EvalError> {
    let json = value.to_json()?;
    serde_json::to_vec(&json)
        .map(Bytes::from)
        .map_err(|e| EvalError::NotSerializable(e.to_string()))
}

/// Turn a stream/topic name into a valid variable name
///
/// `-` and `.` become `_`, so topic `order-events` binds as `order_events`.
pub fn sanitize_identifier(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(name, "true" | "false" | "null" | "in")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_rejects_syntax_error() {
        assert!(matches!(
            compile("orders.x >", &["orders"]),
            Err(CompileError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_compile_rejects_undeclared_reference() {
        assert_eq!(
            compile("payments.x > 0", &["orders"]).unwrap_err(),
            CompileError::UndeclaredReference("payments".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_invalid_variable() {
        assert_eq!(
            compile("true", &["order-events"]).unwrap_err(),
            CompileError::InvalidVariable("order-events".to_string())
        );
    }

    #[test]
    fn test_program_is_shared_not_copied() {
        let program = compile("orders.x > 0", &["orders"]).unwrap();
        let cloned = program.clone();
        assert!(Arc::ptr_eq(&program.inner, &cloned.inner));
        assert_eq!(cloned.source(), "orders.x > 0");
        assert_eq!(cloned.variables(), &["orders".to_string()]);
    }

    #[test]
    fn test_program_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Program>();
    }

    #[test]
    fn test_filter_evaluation() {
        let program = compile("orders.x > 0", &["orders"]).unwrap();
        let negative = Value::from(json!({"x": -1}));
        let positive = Value::from(json!({"x": 5}));

        let r = evaluate(&program, &Bindings::new().with("orders", &negative)).unwrap();
        assert!(!as_bool(&r).unwrap());
        let r = evaluate(&program, &Bindings::new().with("orders", &positive)).unwrap();
        assert!(as_bool(&r).unwrap());
    }

    #[test]
    fn test_extra_bindings_are_ignored() {
        let program = compile("A.id == 1", &["A"]).unwrap();
        let a = Value::from(json!({"id": 1}));
        let other = Value::from(json!({}));
        let bindings = Bindings::new().with("A", &a).with("Z", &other);
        assert_eq!(program.evaluate(&bindings).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_as_bool_rejects_non_bool() {
        assert_eq!(
            as_bool(&Value::Int(1)),
            Err(TypeMismatchError {
                expected: "bool",
                found: "int",
            })
        );
    }

    #[test]
    fn test_json_bytes_round_trip() {
        let program = compile(r#"{"id": e.id, "tags": e.tags, "n": e.n * 2.5}"#, &["e"]).unwrap();
        let input = json!({"id": "a-1", "tags": ["x", "y"], "n": 2});
        let value = Value::from(&input);

        let result = program.evaluate(&Bindings::new().with("e", &value)).unwrap();
        let bytes = as_json_bytes(&result).unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded, json!({"id": "a-1", "tags": ["x", "y"], "n": 5}));
        assert_eq!(Value::from(&decoded), result);
    }

    #[test]
    fn test_primitive_select_result() {
        let program = compile("e.name", &["e"]).unwrap();
        let value = Value::from(json!({"name": "widget"}));
        let result = program.evaluate(&Bindings::new().with("e", &value)).unwrap();
        assert_eq!(&as_json_bytes(&result).unwrap()[..], br#""widget""#);
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("order-events"), "order_events");
        assert_eq!(sanitize_identifier("a.b-c"), "a_b_c");
        assert_eq!(sanitize_identifier("plain"), "plain");
    }

    #[test]
    fn test_bindings_insert_replaces() {
        let one = Value::Int(1);
        let two = Value::Int(2);
        let mut bindings = Bindings::new().with("x", &one);
        bindings.insert("x", &two);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("x"), Some(&two));
    }
}
