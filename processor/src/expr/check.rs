//! Compile-time checks over the expression AST
//!
//! Every declared variable is a `map(string, dyn)`. Anything reached through
//! one of them is `dyn` and only checked at evaluation time, so the checker
//! rejects only what is wrong for every possible input: undeclared names,
//! unknown functions, bad arity, and operators on statically incompatible
//! operands.

use super::error::CompileError;
use super::parser::{BinOp, Expr, UnaryOp};
use super::MAX_DEPTH;

/// Static type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Dyn,
    Null,
    Bool,
    Int,
    Double,
    String,
    List,
    Map,
}

impl Type {
    fn name(self) -> &'static str {
        match self {
            Type::Dyn => "dyn",
            Type::Null => "null",
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Double => "double",
            Type::String => "string",
            Type::List => "list",
            Type::Map => "map",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    /// True when a value of this type may be (or is) an `expected`
    fn admits(self, expected: Type) -> bool {
        self == Type::Dyn || self == expected
    }
}

/// Type-check `expr` against the declared variable names
pub fn check(expr: &Expr, variables: &[String]) -> Result<Type, CompileError> {
    Checker { variables }.check(expr, 0)
}

struct Checker<'a> {
    variables: &'a [String],
}

impl Checker<'_> {
    fn check(&self, expr: &Expr, depth: usize) -> Result<Type, CompileError> {
        if depth > MAX_DEPTH {
            return Err(CompileError::TooDeep(MAX_DEPTH));
        }
        let depth = depth + 1;

        match expr {
            Expr::Null => Ok(Type::Null),
            Expr::Bool(_) => Ok(Type::Bool),
            Expr::Int(_) => Ok(Type::Int),
            Expr::Double(_) => Ok(Type::Double),
            Expr::Str(_) => Ok(Type::String),
            Expr::List(items) => {
                for item in items {
                    self.check(item, depth)?;
                }
                Ok(Type::List)
            }
            Expr::Map(entries) => {
                for (_, value) in entries {
                    self.check(value, depth)?;
                }
                Ok(Type::Map)
            }
            Expr::Ident(name) => {
                if self.variables.iter().any(|v| v == name) {
                    Ok(Type::Map)
                } else {
                    Err(CompileError::UndeclaredReference(name.clone()))
                }
            }
            Expr::Member { expr, field } => {
                let target = self.check(expr, depth)?;
                if target.admits(Type::Map) {
                    Ok(Type::Dyn)
                } else {
                    Err(type_error(format!(
                        "type '{}' does not support field selection '.{}'",
                        target.name(),
                        field
                    )))
                }
            }
            Expr::Has { expr, field } => {
                let target = self.check(expr, depth)?;
                if target.admits(Type::Map) {
                    Ok(Type::Bool)
                } else {
                    Err(type_error(format!(
                        "has() on type '{}' cannot test field '{}'",
                        target.name(),
                        field
                    )))
                }
            }
            Expr::Index { expr, index } => {
                let target = self.check(expr, depth)?;
                let index = self.check(index, depth)?;
                let ok = match target {
                    Type::Dyn => true,
                    Type::List => index.admits(Type::Int),
                    Type::Map => index.admits(Type::String),
                    _ => false,
                };
                if ok {
                    Ok(Type::Dyn)
                } else {
                    Err(type_error(format!(
                        "cannot index type '{}' with '{}'",
                        target.name(),
                        index.name()
                    )))
                }
            }
            Expr::Unary { op, expr } => {
                let operand = self.check(expr, depth)?;
                match op {
                    UnaryOp::Not if operand.admits(Type::Bool) => Ok(Type::Bool),
                    UnaryOp::Neg if operand.is_numeric() || operand == Type::Dyn => Ok(operand),
                    UnaryOp::Not => Err(type_error(format!("'!' applied to '{}'", operand.name()))),
                    UnaryOp::Neg => Err(type_error(format!("'-' applied to '{}'", operand.name()))),
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.check(left, depth)?;
                let r = self.check(right, depth)?;
                binary_type(*op, l, r).ok_or_else(|| {
                    type_error(format!(
                        "'{}' applied to ('{}', '{}')",
                        op.symbol(),
                        l.name(),
                        r.name()
                    ))
                })
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let c = self.check(cond, depth)?;
                if !c.admits(Type::Bool) {
                    return Err(type_error(format!(
                        "conditional requires a bool condition, found '{}'",
                        c.name()
                    )));
                }
                let t = self.check(then, depth)?;
                let o = self.check(otherwise, depth)?;
                Ok(if t == o { t } else { Type::Dyn })
            }
            Expr::Call { name, target, args } => {
                let target = match target {
                    Some(t) => Some(self.check(t, depth)?),
                    None => None,
                };
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(self.check(arg, depth)?);
                }
                call_type(name, target, &arg_types)
            }
        }
    }
}

fn type_error(msg: String) -> CompileError {
    CompileError::Type(msg)
}

fn binary_type(op: BinOp, l: Type, r: Type) -> Option<Type> {
    use Type::*;

    let numeric = |t: Type| t.is_numeric() || t == Dyn;
    match op {
        BinOp::And | BinOp::Or => (l.admits(Bool) && r.admits(Bool)).then_some(Bool),
        BinOp::Eq | BinOp::NotEq => {
            let comparable = l == Dyn
                || r == Dyn
                || l == Null
                || r == Null
                || l == r
                || (l.is_numeric() && r.is_numeric());
            comparable.then_some(Bool)
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordered = match (l, r) {
                (Dyn, _) | (_, Dyn) => true,
                (a, b) if a.is_numeric() && b.is_numeric() => true,
                (String, String) | (Bool, Bool) => true,
                _ => false,
            };
            ordered.then_some(Bool)
        }
        BinOp::In => matches!(r, List | Map | Dyn).then_some(Bool),
        BinOp::Add => match (l, r) {
            (Int, Int) => Some(Int),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(Double),
            (String, String) => Some(String),
            (List, List) => Some(List),
            (Dyn, Dyn) => Some(Dyn),
            (Dyn, t) | (t, Dyn) if t.is_numeric() || matches!(t, String | List) => Some(Dyn),
            _ => None,
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => match (l, r) {
            (Int, Int) => Some(Int),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(Double),
            (a, b) if numeric(a) && numeric(b) => Some(Dyn),
            _ => None,
        },
    }
}

fn call_type(name: &str, target: Option<Type>, args: &[Type]) -> Result<Type, CompileError> {
    let arity = |expected: usize| -> Result<(), CompileError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(CompileError::Arity {
                name: name.to_string(),
                expected,
                found: args.len(),
            })
        }
    };
    let mismatch = |t: Type| type_error(format!("{}() does not accept '{}'", name, t.name()));

    match (name, target) {
        ("size", None) => {
            arity(1)?;
            sized(args[0]).map_err(mismatch)
        }
        ("size", Some(t)) => {
            arity(0)?;
            sized(t).map_err(mismatch)
        }
        ("contains" | "startsWith" | "endsWith", Some(t)) => {
            arity(1)?;
            if !t.admits(Type::String) {
                return Err(mismatch(t));
            }
            if !args[0].admits(Type::String) {
                return Err(mismatch(args[0]));
            }
            Ok(Type::Bool)
        }
        ("int", None) => {
            arity(1)?;
            match args[0] {
                Type::Int | Type::Double | Type::String | Type::Dyn => Ok(Type::Int),
                other => Err(mismatch(other)),
            }
        }
        ("double", None) => {
            arity(1)?;
            match args[0] {
                Type::Int | Type::Double | Type::String | Type::Dyn => Ok(Type::Double),
                other => Err(mismatch(other)),
            }
        }
        ("string", None) => {
            arity(1)?;
            match args[0] {
                Type::List | Type::Map | Type::Null => Err(mismatch(args[0])),
                _ => Ok(Type::String),
            }
        }
        _ => Err(CompileError::UnknownFunction(name.to_string())),
    }
}

fn sized(t: Type) -> Result<Type, Type> {
    match t {
        Type::String | Type::List | Type::Map | Type::Dyn => Ok(Type::Int),
        other => Err(other),
    }
}
