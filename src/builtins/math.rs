use std::collections::BTreeMap;

use crate::tree_walk_interpreter::{BuiltinFn, Environment, ExecutionErrorKind, Value};

use super::{exact_args, Output};

const FUNCTIONS: &[(&str, BuiltinFn)] = &[("sqrt", sqrt), ("abs", abs), ("cos", cos)];

/// The `math` dict.
pub(super) fn module() -> Value {
    let entries = FUNCTIONS
        .iter()
        .map(|&(name, function)| (Value::from(name), Value::native(function)))
        .collect::<BTreeMap<_, _>>();
    Value::from(entries)
}

fn float_fn(name: &'static str, args: Vec<Value>, f: fn(f64) -> f64) -> Output {
    let [x] = exact_args(name, args)?;
    match x.as_number() {
        Some(n) => Ok(vec![Value::Float(f(n))]),
        None => Err(ExecutionErrorKind::invalid_operands(name, &[x]).into()),
    }
}

fn sqrt(_: &mut Environment, args: Vec<Value>) -> Output {
    float_fn("sqrt", args, f64::sqrt)
}

fn cos(_: &mut Environment, args: Vec<Value>) -> Output {
    float_fn("cos", args, f64::cos)
}

fn abs(_: &mut Environment, args: Vec<Value>) -> Output {
    let [x] = exact_args("abs", args)?;
    match x {
        Value::Int(i) => Ok(vec![Value::Int(i.wrapping_abs())]),
        Value::Float(f) => Ok(vec![Value::Float(f.abs())]),
        other => Err(ExecutionErrorKind::invalid_operands("abs", &[other]).into()),
    }
}
