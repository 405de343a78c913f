//! Operator semantics.
//!
//! Integer arithmetic applies only when both operands are `Int`; any `Float` operand widens
//! both sides. `+` is the only operator with a non-numeric fallback (string concatenation).
//! Integer results wrap on overflow.

use std::cmp::Ordering;

use crate::ast::value::Value;
use crate::ast::{BinaryOp, UnaryOp};
use crate::errors::{ErrorKind, TemplateError};

type OpResult = Result<Value, TemplateError>;

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match op {
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Gt => compare(left, right).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Ge => compare(left, right).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Lt => compare(left, right).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Le => compare(left, right).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::Add => Ok(add(left, right)),
        BinaryOp::Sub => arithmetic("subtract", left, right, i64::wrapping_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic("multiply", left, right, i64::wrapping_mul, |a, b| a * b),
        BinaryOp::Div => divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Pow => power(left, right),
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> OpResult {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match operand.as_f64() {
            Some(n) => Ok(Value::Float(-n)),
            None => Err(TemplateError::new(ErrorKind::NegateNonNumeric {
                value: operand.to_string(),
            })),
        },
    }
}

/// Ordering used by the relational operators: numeric first, then the natural ordering of
/// strings and booleans. Anything else cannot be compared.
pub fn compare(left: &Value, right: &Value) -> Result<Ordering, TemplateError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (a, b) if a.is_number() && b.is_number() => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            // NaN sorts above everything, like a total order on doubles.
            Ok(a.partial_cmp(&b).unwrap_or(Ordering::Greater))
        }
        _ => left.natural_cmp(right).ok_or_else(|| {
            TemplateError::new(ErrorKind::CannotCompare {
                left: left.to_string(),
                right: right.to_string(),
            })
        }),
    }
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a.wrapping_add(*b)),
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => Value::Float(a + b),
            _ => Value::String(format!("{left}{right}")),
        },
    }
}

fn arithmetic(
    operation: &str,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> OpResult {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        _ => {
            let (a, b) = numeric_pair(operation, left, right)?;
            Ok(Value::Float(float_op(a, b)))
        }
    }
}

fn divide(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(TemplateError::new(ErrorKind::DivisionByZero)),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_div(*b))),
        _ => {
            let (a, b) = numeric_pair("divide", left, right)?;
            if b == 0.0 {
                return Err(TemplateError::new(ErrorKind::DivisionByZero));
            }
            Ok(Value::Float(a / b))
        }
    }
}

fn modulo(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(TemplateError::new(ErrorKind::DivisionByZero)),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
        _ => {
            let (a, b) = numeric_pair("apply modulo to", left, right)?;
            if b == 0.0 {
                return Err(TemplateError::new(ErrorKind::DivisionByZero));
            }
            Ok(Value::Float(a % b))
        }
    }
}

fn power(left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 => Ok(Value::Int(int_pow(*base, *exp))),
        _ => {
            let (a, b) = numeric_pair("apply power operator to", left, right)?;
            Ok(Value::Float(a.powf(b)))
        }
    }
}

/// Exponentiation by squaring with wrapping multiplication.
fn int_pow(mut base: i64, mut exp: i64) -> i64 {
    let mut result: i64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}

fn numeric_pair(operation: &str, left: &Value, right: &Value) -> Result<(f64, f64), TemplateError> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(TemplateError::new(ErrorKind::TypeMismatch {
            operation: operation.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        })),
    }
}
