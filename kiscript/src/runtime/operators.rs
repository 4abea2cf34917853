//! Arithmetic, membership and unary operators.

use super::error::{RuntimeError, RuntimeResult};
use super::evaluator::Interpreter;
use super::values::{DictKey, Value};
use crate::ast::{BinaryOp, UnaryOp};

// Repetition (`"ab" * n`, `[x] * n`) beyond this many elements is refused.
const MAX_REPEAT_LEN: usize = 10_000_000;
// List copies made between deadline checks while repeating.
const REPEAT_CHECK_INTERVAL: usize = 4096;

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Int(n) => Some(Num::Int(*n)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::type_error(
        "compatible operands",
        &format!("'{}' and '{}'", left.type_name(), right.type_name()),
        &format!("operator {}", op.symbol()),
    )
}

fn overflow(op: BinaryOp) -> RuntimeError {
    RuntimeError::value_error(format!("integer overflow in '{}'", op.symbol()))
}

pub fn binary(interp: &Interpreter, op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
        return numeric(op, a, b);
    }
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(format!("{a}{b}").into()),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            let count = repeat_count(*n, s.chars().count())?;
            Ok(s.repeat(count).into())
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
            let items = items.borrow();
            let count = repeat_count(*n, items.len())?;
            let mut out = Vec::with_capacity(items.len() * count);
            for round in 0..count {
                if round % REPEAT_CHECK_INTERVAL == REPEAT_CHECK_INTERVAL - 1 {
                    interp.checkpoint()?;
                }
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ => Err(unsupported(op, left, right)),
    }
}

fn repeat_count(n: i64, unit: usize) -> RuntimeResult<usize> {
    let count = n.max(0) as usize;
    if unit.saturating_mul(count) > MAX_REPEAT_LEN {
        return Err(RuntimeError::value_error("repeated sequence is too large"));
    }
    Ok(count)
}

fn numeric(op: BinaryOp, a: Num, b: Num) -> RuntimeResult<Value> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(op, x, y),
        (Num::Int(x), Num::Float(y)) => float_op(op, x as f64, y),
        (Num::Float(x), Num::Int(y)) => float_op(op, x, y as f64),
        (Num::Float(x), Num::Float(y)) => float_op(op, x, y),
    }
}

fn int_op(op: BinaryOp, x: i64, y: i64) -> RuntimeResult<Value> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            x.checked_div(y).map(|q| {
                if (x % y != 0) && ((x < 0) != (y < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            x.checked_rem(y).map(|r| {
                if r != 0 && ((r < 0) != (y < 0)) {
                    r + y
                } else {
                    r
                }
            })
        }
        BinaryOp::Pow => {
            if y < 0 {
                return Ok(Value::Float((x as f64).powf(y as f64)));
            }
            u32::try_from(y).ok().and_then(|e| x.checked_pow(e))
        }
    };
    result.map(Value::Int).ok_or_else(|| overflow(op))
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> RuntimeResult<Value> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => {
            return Err(RuntimeError::DivisionByZero)
        }
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => x.powf(y),
    };
    Ok(Value::Float(result))
}

pub fn unary(op: UnaryOp, operand: &Value) -> RuntimeResult<Value> {
    match (op, as_num(operand)) {
        (UnaryOp::Neg, Some(Num::Int(n))) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::value_error("integer overflow in unary '-'")),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Num::Int(n))) => Ok(Value::Int(n)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (_, None) => Err(RuntimeError::type_error(
            "number",
            &operand.type_name(),
            "unary operator",
        )),
    }
}

/// `item in container`.
pub fn contains(interp: &Interpreter, container: &Value, item: &Value) -> RuntimeResult<bool> {
    let any_equal = |items: &[Value]| -> RuntimeResult<bool> {
        for candidate in items {
            if interp.values_equal(candidate, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    };
    match container {
        Value::Str(haystack) => {
            let needle = item.expect_str("'in' on a string")?;
            Ok(haystack.contains(&*needle))
        }
        Value::List(items) => any_equal(&items.borrow()),
        Value::Tuple(items) => any_equal(items),
        Value::Dict(entries) => match DictKey::from_value(item) {
            Ok(key) => Ok(entries.borrow().contains_key(&key)),
            Err(_) => Ok(false),
        },
        Value::Range(range) => Ok(match item {
            Value::Int(n) => range.contains(*n),
            _ => false,
        }),
        other => Err(RuntimeError::type_error(
            "container",
            &other.type_name(),
            "'in' operator",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Environment, ExecutionBudget, RangeValue};
    use pretty_assertions::assert_eq;

    fn interp() -> Interpreter {
        Interpreter::new(Environment::new(), &ExecutionBudget::default())
    }

    #[test]
    fn test_integer_semantics() {
        let interp = interp();
        let cases = vec![
            (BinaryOp::FloorDiv, 7, 2, Value::Int(3)),
            (BinaryOp::FloorDiv, -7, 2, Value::Int(-4)),
            (BinaryOp::Mod, -7, 3, Value::Int(2)),
            (BinaryOp::Mod, 7, -3, Value::Int(-2)),
            (BinaryOp::Div, 7, 2, Value::Float(3.5)),
            (BinaryOp::Pow, 2, 10, Value::Int(1024)),
            (BinaryOp::Pow, 2, -1, Value::Float(0.5)),
        ];
        for (op, a, b, expected) in cases {
            assert_eq!(
                binary(&interp, op, &Value::Int(a), &Value::Int(b)).unwrap(),
                expected,
                "{a} {} {b}",
                op.symbol()
            );
        }
    }

    #[test]
    fn test_division_by_zero_and_overflow() {
        let interp = interp();
        assert_eq!(
            binary(&interp, BinaryOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            binary(&interp, BinaryOp::Mod, &Value::Float(1.0), &Value::Float(0.0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert!(binary(&interp, BinaryOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).is_err());
    }

    #[test]
    fn test_sequence_operators() {
        let interp = interp();
        assert_eq!(
            binary(&interp, BinaryOp::Add, &Value::from("ab"), &Value::from("cd")).unwrap(),
            Value::from("abcd")
        );
        assert_eq!(
            binary(&interp, BinaryOp::Mul, &Value::from("-"), &Value::Int(3)).unwrap(),
            Value::from("---")
        );
        assert!(binary(&interp, BinaryOp::Add, &Value::from("a"), &Value::Int(1)).is_err());
    }

    #[test]
    fn test_membership() {
        let interp = interp();
        let list = Value::list(vec![Value::Int(1), Value::from("x")]);
        assert!(contains(&interp, &list, &Value::from("x")).unwrap());
        assert!(!contains(&interp, &list, &Value::Int(2)).unwrap());
        assert!(contains(&interp, &Value::from("hello"), &Value::from("ell")).unwrap());
        assert!(contains(&interp, &Value::Int(3), &Value::Int(3)).is_err());
    }

    #[test]
    fn test_membership_in_extreme_range() {
        let interp = interp();
        let range = Value::Range(RangeValue {
            start: -i64::MAX,
            stop: i64::MAX,
            step: 1,
        });
        assert!(contains(&interp, &range, &Value::Int(1 << 62)).unwrap());
        assert!(!contains(&interp, &range, &Value::Int(i64::MAX)).unwrap());
    }
}
