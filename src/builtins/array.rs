use crate::tree_walk_interpreter::{ExecutionError, ExecutionErrorKind, Value};

use super::Output;

type Method = fn(&Value, Vec<Value>) -> Output;

/// Looks up a method by name and binds it to `array`.
pub(super) fn method(array: &Value, name: &str) -> Option<Value> {
    let method: Method = match name {
        "insert" => insert,
        "remove" => remove,
        _ => return None,
    };
    let array = array.clone();
    Some(Value::native(move |_, args| method(&array, args)))
}

fn len(array: &Value) -> i64 {
    array
        .as_array()
        .map_or(0, |items| items.borrow().len() as i64)
}

fn arity_error(name: &'static str, expected: &str, got: usize) -> ExecutionError {
    ExecutionErrorKind::InvalidArgumentCount(name, expected.to_string(), got).into()
}

/// `a.insert(v)` appends, `a.insert(i, v)` inserts before index `i`.
fn insert(array: &Value, args: Vec<Value>) -> Output {
    let got = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(value), None, None) => array.insert_at(len(array), value)?,
        (Some(Value::Int(index)), Some(value), None) => array.insert_at(index, value)?,
        (Some(index), Some(_), None) => {
            return Err(ExecutionErrorKind::invalid_operands("insert", &[index]).into())
        }
        _ => return Err(arity_error("insert", "1 or 2", got)),
    }
    Ok(Vec::new())
}

/// `a.remove()` drops the last element, `a.remove(i)` the one at `i` and
/// `a.remove(i, n)` the `n` elements starting at `i`.
fn remove(array: &Value, args: Vec<Value>) -> Output {
    let (index, count) = match args.as_slice() {
        [] => match len(array) {
            0 => return Err(ExecutionErrorKind::EmptyArray.into()),
            n => (n - 1, 1),
        },
        [Value::Int(index)] => (*index, 1),
        [Value::Int(index), Value::Int(count)] => (*index, *count),
        [_] | [_, _] => return Err(ExecutionErrorKind::invalid_operands("remove", &args).into()),
        _ => return Err(arity_error("remove", "0 to 2", args.len())),
    };
    array.remove_range(index, count)?;
    Ok(Vec::new())
}
