use std::collections::HashMap;

use sky_primitives::{PropertyId, Timestamp};

use crate::event::Value;

///
/// Expr
///
/// The boolean/scalar expression language spec.md §4.3 calls for:
/// identifiers, literals, comparisons, boolean connectives, and the
/// special `timestamp` identifier (seconds since epoch).
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Ident(String),
    Timestamp,
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    BoolLit(bool),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// A fully evaluated scalar: either a typed property value or a bare
/// number/string/bool literal that hasn't been bound to a property.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Scalar {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Str(_) => None,
        }
    }
}

impl From<&Value> for Scalar {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Str(s.clone()),
            Value::Integer(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            Value::Boolean(b) => Self::Bool(*b),
        }
    }
}

/// Resolves an identifier in `expr` to a property id, via `resolve`, and
/// evaluates it against `state`/`timestamp`. `resolve` is expected to be
/// the bound symbol table lookup (spec.md §4.5): unresolved names are a
/// binding error raised before execution starts, not at evaluation time,
/// so this function assumes every identifier already resolves.
pub fn eval_bool(
    expr: &Expr,
    state: &HashMap<PropertyId, Value>,
    timestamp: Timestamp,
    resolve: &impl Fn(&str) -> PropertyId,
) -> bool {
    match expr {
        Expr::And(l, r) => eval_bool(l, state, timestamp, resolve) && eval_bool(r, state, timestamp, resolve),
        Expr::Or(l, r) => eval_bool(l, state, timestamp, resolve) || eval_bool(r, state, timestamp, resolve),
        Expr::Not(e) => !eval_bool(e, state, timestamp, resolve),
        Expr::Eq(l, r) => compare(l, r, state, timestamp, resolve, |o| o == std::cmp::Ordering::Equal),
        Expr::Ne(l, r) => compare(l, r, state, timestamp, resolve, |o| o != std::cmp::Ordering::Equal),
        Expr::Lt(l, r) => compare(l, r, state, timestamp, resolve, |o| o == std::cmp::Ordering::Less),
        Expr::Le(l, r) => compare(l, r, state, timestamp, resolve, |o| o != std::cmp::Ordering::Greater),
        Expr::Gt(l, r) => compare(l, r, state, timestamp, resolve, |o| o == std::cmp::Ordering::Greater),
        Expr::Ge(l, r) => compare(l, r, state, timestamp, resolve, |o| o != std::cmp::Ordering::Less),
        other => eval_scalar(other, state, timestamp, resolve)
            .map(|s| matches!(s, Scalar::Bool(true)))
            .unwrap_or(false),
    }
}

fn compare(
    l: &Expr,
    r: &Expr,
    state: &HashMap<PropertyId, Value>,
    timestamp: Timestamp,
    resolve: &impl Fn(&str) -> PropertyId,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let (Some(l), Some(r)) = (
        eval_scalar(l, state, timestamp, resolve),
        eval_scalar(r, state, timestamp, resolve),
    ) else {
        return false;
    };
    let ordering = match (&l, &r) {
        (Scalar::Str(a), Scalar::Str(b)) => a.partial_cmp(b),
        _ => l.as_f64().zip(r.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
    };
    ordering.is_some_and(accept)
}

/// Evaluates `expr` as a scalar: identifiers resolve against the current
/// event's carried-forward state; an identifier absent from `state`
/// evaluates to `None` (treated as "no match" by comparisons, matching
/// the empty-dimension-bucket behavior of §8 scenario 2 for selections).
pub fn eval_scalar(
    expr: &Expr,
    state: &HashMap<PropertyId, Value>,
    timestamp: Timestamp,
    resolve: &impl Fn(&str) -> PropertyId,
) -> Option<Scalar> {
    match expr {
        Expr::Timestamp => Some(Scalar::Int(timestamp.as_seconds())),
        Expr::Ident(name) => state.get(&resolve(name)).map(Scalar::from),
        Expr::IntLit(i) => Some(Scalar::Int(*i)),
        Expr::FloatLit(f) => Some(Scalar::Float(*f)),
        Expr::StrLit(s) => Some(Scalar::Str(s.clone())),
        Expr::BoolLit(b) => Some(Scalar::Bool(*b)),
        _ => Some(Scalar::Bool(eval_bool(expr, state, timestamp, resolve))),
    }
}

/// Every bare identifier referenced by `expr` (used by the declaration
/// collector, spec.md §4.5).
pub fn identifiers(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Ident(name) => out.push(name.clone()),
        Expr::Not(e) => identifiers(e, out),
        Expr::Eq(l, r)
        | Expr::Ne(l, r)
        | Expr::Lt(l, r)
        | Expr::Le(l, r)
        | Expr::Gt(l, r)
        | Expr::Ge(l, r)
        | Expr::And(l, r)
        | Expr::Or(l, r) => {
            identifiers(l, out);
            identifiers(r, out);
        }
        Expr::Timestamp | Expr::IntLit(_) | Expr::FloatLit(_) | Expr::StrLit(_) | Expr::BoolLit(_) => {}
    }
}
