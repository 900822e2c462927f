//! The library every [`Environment::new`] starts with: the operator
//! functions, the base functions, array methods and the `math` dict.

mod array;
mod base;
mod math;
mod operators;

use std::collections::BTreeMap;

use crate::tree_walk_interpreter::{
    Environment, ExecutionError, ExecutionErrorKind, Value, LOADED_MODULES,
};

type Output = Result<Vec<Value>, ExecutionError>;

pub fn register(env: &mut Environment) {
    env.register_builtins(operators::BUILTINS.iter().copied());
    env.register_builtins(base::BUILTINS.iter().copied());
    env.assign_global("math", math::module());
    env.assign_global(LOADED_MODULES, Value::from(BTreeMap::new()));
}

fn exact_args<const N: usize>(
    name: &'static str,
    args: Vec<Value>,
) -> Result<[Value; N], ExecutionError> {
    let got = args.len();
    <[Value; N]>::try_from(args)
        .map_err(|_| ExecutionErrorKind::InvalidArgumentCount(name, N.to_string(), got).into())
}

/// Splits off a leading string argument, returning it with the rest.
fn leading_string(
    name: &'static str,
    args: Vec<Value>,
) -> Result<(String, Vec<Value>), ExecutionError> {
    let mut args = args.into_iter();
    match args.next() {
        Some(Value::String(s)) => Ok((s, args.collect())),
        Some(other) => Err(ExecutionErrorKind::invalid_operands(name, &[other]).into()),
        None => Err(
            ExecutionErrorKind::InvalidArgumentCount(name, "at least 1".to_string(), 0).into(),
        ),
    }
}
