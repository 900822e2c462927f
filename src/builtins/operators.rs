use std::cmp::Ordering;

use crate::tree_walk_interpreter::{BuiltinFn, Environment, ExecutionErrorKind, Value};

use super::{exact_args, Output};

pub(super) const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("__bitwise_and", bitwise_and),
    ("__and", and),
    ("__bitwise_or", bitwise_or),
    ("__or", or),
    ("__bitwise_not", bitwise_not),
    ("__not", not),
    ("__xor", xor),
    ("__add", add),
    ("__positive", positive),
    ("__sub", sub),
    ("__negative", negative),
    ("__mul", mul),
    ("__div", div),
    ("__mod", modulo),
    ("__equel", equal),
    ("__greater", greater),
    ("__greater_equel", greater_equal),
    ("__less", less),
    ("__less_equel", less_equal),
    ("__not_equel", not_equal),
];

enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

// Two ints stay ints; any float in the mix widens both sides.
fn numbers(left: &Value, right: &Value) -> Option<Numbers> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(Numbers::Ints(*a, *b)),
        _ => Some(Numbers::Floats(left.as_number()?, right.as_number()?)),
    }
}

fn arithmetic(
    name: &'static str,
    args: Vec<Value>,
    ints: fn(i64, i64) -> Result<i64, ExecutionErrorKind>,
    floats: fn(f64, f64) -> f64,
) -> Output {
    let [left, right] = exact_args(name, args)?;
    let result = match numbers(&left, &right) {
        Some(Numbers::Ints(a, b)) => Value::Int(ints(a, b)?),
        Some(Numbers::Floats(a, b)) => Value::Float(floats(a, b)),
        None => return Err(ExecutionErrorKind::invalid_operands(name, &[left, right]).into()),
    };
    Ok(vec![result])
}

fn integer(
    name: &'static str,
    args: Vec<Value>,
    op: fn(i64, i64) -> Result<i64, ExecutionErrorKind>,
) -> Output {
    let [left, right] = exact_args(name, args)?;
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => Ok(vec![Value::Int(op(*a, *b)?)]),
        _ => Err(ExecutionErrorKind::invalid_operands(name, &[left, right]).into()),
    }
}

fn compare(name: &'static str, args: Vec<Value>, accept: fn(Ordering) -> bool) -> Output {
    let [left, right] = exact_args(name, args)?;
    let ordering = match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match numbers(&left, &right) {
            Some(Numbers::Ints(a, b)) => Some(a.cmp(&b)),
            Some(Numbers::Floats(a, b)) => a.partial_cmp(&b),
            None => {
                return Err(ExecutionErrorKind::invalid_operands(name, &[left, right]).into())
            }
        },
    };
    Ok(vec![Value::Bool(ordering.is_some_and(accept))])
}

fn bitwise_and(_: &mut Environment, args: Vec<Value>) -> Output {
    integer("__bitwise_and", args, |a, b| Ok(a & b))
}

fn bitwise_or(_: &mut Environment, args: Vec<Value>) -> Output {
    integer("__bitwise_or", args, |a, b| Ok(a | b))
}

fn xor(_: &mut Environment, args: Vec<Value>) -> Output {
    integer("__xor", args, |a, b| Ok(a ^ b))
}

fn and(_: &mut Environment, args: Vec<Value>) -> Output {
    let [left, right] = exact_args("__and", args)?;
    Ok(vec![Value::Bool(left.is_truthy() && right.is_truthy())])
}

fn or(_: &mut Environment, args: Vec<Value>) -> Output {
    let [left, right] = exact_args("__or", args)?;
    Ok(vec![Value::Bool(left.is_truthy() || right.is_truthy())])
}

fn bitwise_not(_: &mut Environment, args: Vec<Value>) -> Output {
    let [operand] = exact_args("__bitwise_not", args)?;
    match operand {
        Value::Int(i) => Ok(vec![Value::Int(!i)]),
        other => Err(ExecutionErrorKind::invalid_operands("__bitwise_not", &[other]).into()),
    }
}

fn not(_: &mut Environment, args: Vec<Value>) -> Output {
    let [operand] = exact_args("__not", args)?;
    Ok(vec![Value::Bool(!operand.is_truthy())])
}

fn positive(_: &mut Environment, args: Vec<Value>) -> Output {
    let [operand] = exact_args("__positive", args)?;
    match operand {
        Value::Int(_) | Value::Float(_) => Ok(vec![operand]),
        other => Err(ExecutionErrorKind::invalid_operands("__positive", &[other]).into()),
    }
}

fn negative(_: &mut Environment, args: Vec<Value>) -> Output {
    let [operand] = exact_args("__negative", args)?;
    match operand {
        Value::Int(i) => Ok(vec![Value::Int(i.wrapping_neg())]),
        Value::Float(x) => Ok(vec![Value::Float(-x)]),
        other => Err(ExecutionErrorKind::invalid_operands("__negative", &[other]).into()),
    }
}

fn add(_: &mut Environment, args: Vec<Value>) -> Output {
    match args.as_slice() {
        [Value::String(left), right] => Ok(vec![Value::String(format!("{left}{right}"))]),
        _ => arithmetic("__add", args, |a, b| Ok(a.wrapping_add(b)), |a, b| a + b),
    }
}

fn sub(_: &mut Environment, args: Vec<Value>) -> Output {
    arithmetic("__sub", args, |a, b| Ok(a.wrapping_sub(b)), |a, b| a - b)
}

fn repeat(s: &str, times: i64) -> Option<String> {
    let times = usize::try_from(times).ok().filter(|&n| n > 0)?;
    let len = s.len().checked_mul(times)?;
    let mut repeated = String::new();
    repeated.try_reserve_exact(len).ok()?;
    for _ in 0..times {
        repeated.push_str(s);
    }
    Some(repeated)
}

fn mul(_: &mut Environment, args: Vec<Value>) -> Output {
    match args.as_slice() {
        [Value::String(s), Value::Int(times)] => match repeat(s, *times) {
            Some(repeated) => Ok(vec![Value::String(repeated)]),
            None => Err(ExecutionErrorKind::invalid_operands("__mul", &args).into()),
        },
        _ => arithmetic("__mul", args, |a, b| Ok(a.wrapping_mul(b)), |a, b| a * b),
    }
}

fn div(_: &mut Environment, args: Vec<Value>) -> Output {
    arithmetic(
        "__div",
        args,
        |a, b| match b {
            0 => Err(ExecutionErrorKind::DivisionByZero),
            _ => Ok(a.wrapping_div(b)),
        },
        |a, b| a / b,
    )
}

fn modulo(_: &mut Environment, args: Vec<Value>) -> Output {
    integer("__mod", args, |a, b| match b {
        0 => Err(ExecutionErrorKind::DivisionByZero),
        _ => Ok(a.wrapping_rem(b)),
    })
}

fn equal(_: &mut Environment, args: Vec<Value>) -> Output {
    let [left, right] = exact_args("__equel", args)?;
    Ok(vec![Value::Bool(left == right)])
}

fn not_equal(_: &mut Environment, args: Vec<Value>) -> Output {
    let [left, right] = exact_args("__not_equel", args)?;
    Ok(vec![Value::Bool(left != right)])
}

fn greater(_: &mut Environment, args: Vec<Value>) -> Output {
    compare("__greater", args, Ordering::is_gt)
}

fn greater_equal(_: &mut Environment, args: Vec<Value>) -> Output {
    compare("__greater_equel", args, Ordering::is_ge)
}

fn less(_: &mut Environment, args: Vec<Value>) -> Output {
    compare("__less", args, Ordering::is_lt)
}

fn less_equal(_: &mut Environment, args: Vec<Value>) -> Output {
    compare("__less_equel", args, Ordering::is_le)
}
