//! Tree-walking evaluator
//!
//! Values reached through bindings are borrowed (`Cow::Borrowed`) until an
//! operator has to build something new, so selecting `A.payload` out of a
//! large event does not copy the rest of it.

use super::error::EvalError;
use super::parser::{BinOp, Expr, UnaryOp};
use super::value::Value;
use super::{Bindings, MAX_DEPTH};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Evaluate `expr` against `bindings`
pub fn eval(expr: &Expr, bindings: &Bindings<'_>) -> Result<Value, EvalError> {
    Evaluator { bindings }
        .eval(expr, 0)
        .map(Cow::into_owned)
}

struct Evaluator<'b, 'a> {
    bindings: &'b Bindings<'a>,
}

impl<'a> Evaluator<'_, 'a> {
    fn eval(&self, expr: &Expr, depth: usize) -> Result<Cow<'a, Value>, EvalError> {
        if depth > MAX_DEPTH {
            return Err(EvalError::TooDeep(MAX_DEPTH));
        }
        let depth = depth + 1;

        match expr {
            Expr::Null => Ok(Cow::Owned(Value::Null)),
            Expr::Bool(b) => Ok(Cow::Owned(Value::Bool(*b))),
            Expr::Int(n) => Ok(Cow::Owned(Value::Int(*n))),
            Expr::Double(n) => Ok(Cow::Owned(Value::Double(*n))),
            Expr::Str(s) => Ok(Cow::Owned(Value::String(s.clone()))),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, depth)?.into_owned());
                }
                Ok(Cow::Owned(Value::List(out)))
            }
            Expr::Map(entries) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    out.insert(key.clone(), self.eval(value, depth)?.into_owned());
                }
                Ok(Cow::Owned(Value::Map(out)))
            }
            Expr::Ident(name) => self
                .bindings
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| EvalError::MissingBinding(name.clone())),
            Expr::Member { expr, field } => {
                let target = self.eval(expr, depth)?;
                select_field(target, field)
            }
            Expr::Has { expr, field } => {
                let target = self.eval(expr, depth)?;
                match &*target {
                    Value::Map(map) => Ok(Cow::Owned(Value::Bool(map.contains_key(field)))),
                    other => Err(EvalError::overload("has", &[other.type_name()])),
                }
            }
            Expr::Index { expr, index } => {
                let target = self.eval(expr, depth)?;
                let index = self.eval(index, depth)?;
                index_value(target, &index)
            }
            Expr::Unary { op, expr } => {
                let operand = self.eval(expr, depth)?;
                unary(*op, &operand).map(Cow::Owned)
            }
            Expr::Binary {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => self.logical(*op, left, right, depth).map(Cow::Owned),
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, depth)?;
                let r = self.eval(right, depth)?;
                binary(*op, &l, &r).map(Cow::Owned)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => match &*self.eval(cond, depth)? {
                Value::Bool(true) => self.eval(then, depth),
                Value::Bool(false) => self.eval(otherwise, depth),
                other => Err(EvalError::overload("_?_:_", &[other.type_name()])),
            },
            Expr::Call { name, target, args } => {
                let target = match target {
                    Some(t) => Some(self.eval(t, depth)?),
                    None => None,
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, depth)?);
                }
                call(name, target.as_deref(), &values).map(Cow::Owned)
            }
        }
    }

    /// `&&` / `||` with short-circuit
    ///
    /// An error on one side is absorbed when the other side alone decides
    /// the result (`false && <error>` is `false`).
    fn logical(
        &self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let decisive = op == BinOp::Or;
        let as_bool = |v: Result<Cow<'a, Value>, EvalError>| -> Result<bool, EvalError> {
            match &*v? {
                Value::Bool(b) => Ok(*b),
                other => Err(EvalError::overload(op.symbol(), &[other.type_name()])),
            }
        };

        let l = as_bool(self.eval(left, depth));
        if let Ok(b) = l {
            if b == decisive {
                return Ok(Value::Bool(decisive));
            }
        }
        let r = as_bool(self.eval(right, depth));
        match (l, r) {
            (_, Ok(b)) if b == decisive => Ok(Value::Bool(decisive)),
            (Ok(_), Ok(_)) => Ok(Value::Bool(!decisive)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }
}

fn select_field<'a>(target: Cow<'a, Value>, field: &str) -> Result<Cow<'a, Value>, EvalError> {
    match target {
        Cow::Borrowed(Value::Map(map)) => map
            .get(field)
            .map(Cow::Borrowed)
            .ok_or_else(|| EvalError::NoSuchKey(field.to_string())),
        Cow::Owned(Value::Map(mut map)) => map
            .swap_remove(field)
            .map(Cow::Owned)
            .ok_or_else(|| EvalError::NoSuchKey(field.to_string())),
        other => Err(EvalError::overload(
            format!(".{field}"),
            &[other.type_name()],
        )),
    }
}

fn index_value<'a>(target: Cow<'a, Value>, index: &Value) -> Result<Cow<'a, Value>, EvalError> {
    // Whole JSON numbers can index lists
    let whole;
    let index = match index {
        Value::Double(d) if d.fract() == 0.0 && d.abs() < i64::MAX as f64 => {
            whole = Value::Int(*d as i64);
            &whole
        }
        other => other,
    };
    match (target, index) {
        (Cow::Borrowed(Value::List(items)), Value::Int(i)) => {
            let pos = list_position(items.len(), *i)?;
            Ok(Cow::Borrowed(&items[pos]))
        }
        (Cow::Owned(Value::List(mut items)), Value::Int(i)) => {
            let pos = list_position(items.len(), *i)?;
            Ok(Cow::Owned(items.swap_remove(pos)))
        }
        (target @ (Cow::Borrowed(Value::Map(_)) | Cow::Owned(Value::Map(_))), Value::String(key)) => {
            select_field(target, key)
        }
        (target, index) => Err(EvalError::overload(
            "_[_]",
            &[target.type_name(), index.type_name()],
        )),
    }
}

fn list_position(len: usize, index: i64) -> Result<usize, EvalError> {
    usize::try_from(index)
        .ok()
        .filter(|&pos| pos < len)
        .ok_or(EvalError::IndexOutOfRange { index, size: len })
}

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match (op, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(EvalError::Overflow("negation")),
        (UnaryOp::Neg, Value::Double(n)) => Ok(Value::Double(-n)),
        (UnaryOp::Not, other) => Err(EvalError::overload("!", &[other.type_name()])),
        (UnaryOp::Neg, other) => Err(EvalError::overload("-", &[other.type_name()])),
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let overload = || EvalError::overload(op.symbol(), &[l.type_name(), r.type_name()]);

    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(l, r))),
        BinOp::NotEq => Ok(Value::Bool(!values_equal(l, r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = compare(l, r).ok_or_else(overload)?;
            let result = match ordering {
                // NaN on either side
                None => false,
                Some(ord) => match op {
                    BinOp::Lt => ord == Ordering::Less,
                    BinOp::Le => ord != Ordering::Greater,
                    BinOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                },
            };
            Ok(Value::Bool(result))
        }
        BinOp::In => match r {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|v| values_equal(l, v)))),
            Value::Map(map) => match l {
                Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
                _ => Err(overload()),
            },
            _ => Err(overload()),
        },
        BinOp::Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow("addition")),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => double_op(l, r, |a, b| a + b).ok_or_else(overload),
        },
        BinOp::Sub => match (l, r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow("subtraction")),
            _ => double_op(l, r, |a, b| a - b).ok_or_else(overload),
        },
        BinOp::Mul => match (l, r) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_mul(*b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow("multiplication")),
            _ => double_op(l, r, |a, b| a * b).ok_or_else(overload),
        },
        BinOp::Div => match (l, r) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => a
                .checked_div(*b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow("division")),
            _ => {
                if as_double(r) == Some(0.0) && as_double(l).is_some() {
                    return Err(EvalError::DivisionByZero);
                }
                double_op(l, r, |a, b| a / b).ok_or_else(overload)
            }
        },
        BinOp::Mod => match (l, r) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => a
                .checked_rem(*b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow("modulus")),
            _ => {
                if as_double(r) == Some(0.0) && as_double(l).is_some() {
                    return Err(EvalError::DivisionByZero);
                }
                double_op(l, r, |a, b| a % b).ok_or_else(overload)
            }
        },
        // Routed through `Evaluator::logical`
        BinOp::And | BinOp::Or => Err(overload()),
    }
}

fn as_double(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Double(n) => Some(*n),
        _ => None,
    }
}

/// Mixed or double arithmetic, promoting ints to double
fn double_op(l: &Value, r: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    Some(Value::Double(f(as_double(l)?, as_double(r)?)))
}

/// Structural equality; ints and doubles compare numerically, other
/// cross-type pairs are unequal
pub(crate) fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => *a as f64 == *b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => l == r,
    }
}

/// Ordering for `< <= > >=`
///
/// `None` means the operands cannot be ordered at all (overload error);
/// `Some(None)` means they are numbers but one is NaN.
fn compare(l: &Value, r: &Value) -> Option<Option<Ordering>> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Some(Some(a.cmp(b))),
        (Value::String(a), Value::String(b)) => Some(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Some(Some(a.cmp(b))),
        _ => Some(as_double(l)?.partial_cmp(&as_double(r)?)),
    }
}

fn call(name: &str, target: Option<&Value>, args: &[Cow<'_, Value>]) -> Result<Value, EvalError> {
    let arg_types = || -> Vec<&'static str> {
        target
            .into_iter()
            .chain(args.iter().map(|a| &**a))
            .map(Value::type_name)
            .collect()
    };
    let overload = || EvalError::overload(name, &arg_types());

    let subject = match (target, args) {
        (Some(t), _) => t,
        (None, [first, ..]) => &**first,
        (None, []) => return Err(overload()),
    };

    match name {
        "size" => match subject {
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Map(map) => Ok(Value::Int(map.len() as i64)),
            _ => Err(overload()),
        },
        "contains" | "startsWith" | "endsWith" => {
            let (Value::String(s), Some(Value::String(needle))) =
                (subject, args.first().map(|a| &**a))
            else {
                return Err(overload());
            };
            let found = match name {
                "contains" => s.contains(needle.as_str()),
                "startsWith" => s.starts_with(needle.as_str()),
                _ => s.ends_with(needle.as_str()),
            };
            Ok(Value::Bool(found))
        }
        "int" => match subject {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Double(d) => {
                if !d.is_finite() || *d < i64::MIN as f64 || *d >= i64::MAX as f64 {
                    Err(EvalError::Conversion(format!("double {d} out of int range")))
                } else {
                    Ok(Value::Int(d.trunc() as i64))
                }
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| EvalError::Conversion(format!("'{s}' is not an int"))),
            _ => Err(overload()),
        },
        "double" => match subject {
            Value::Int(n) => Ok(Value::Double(*n as f64)),
            Value::Double(d) => Ok(Value::Double(*d)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| EvalError::Conversion(format!("'{s}' is not a double"))),
            _ => Err(overload()),
        },
        "string" => match subject {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Int(n) => Ok(Value::String(n.to_string())),
            Value::Double(d) => Ok(Value::String(d.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(overload()),
        },
        _ => Err(overload()),
    }
}
