use std::{io::Write, path::PathBuf};

use crate::tree_walk_interpreter::{
    BuiltinFn, Environment, ExecutionErrorKind, Value, LOADED_MODULES,
};

use super::{array, exact_args, leading_string, Output};

const SOURCE_EXTENSION: &str = "sno";

pub(super) const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("__get_member", get_member),
    ("loadstring", load_string),
    ("loadfile", load_file),
    ("dostring", do_string),
    ("dofile", do_file),
    ("import", import),
    ("type", type_of),
    ("len", len),
    ("range", range),
    ("print", print),
    ("println", println),
];

fn get_member(_: &mut Environment, args: Vec<Value>) -> Output {
    let [container, key] = exact_args("__get_member", args)?;
    let value = match &container {
        Value::Array(items) => {
            if let Some(method) = key.as_str().and_then(|name| array::method(&container, name)) {
                method
            } else {
                let index = key
                    .as_int()
                    .ok_or(ExecutionErrorKind::ArrayKeyNotInteger(key.type_name()))?;
                let items = items.borrow();
                usize::try_from(index)
                    .ok()
                    .and_then(|index| items.get(index).cloned())
                    .unwrap_or(Value::Nil)
            }
        }
        Value::Dict(entries) => entries.borrow().get(&key).cloned().unwrap_or(Value::Nil),
        other => return Err(ExecutionErrorKind::NotIndexable(other.type_name()).into()),
    };
    Ok(vec![value])
}

fn load_string(env: &mut Environment, args: Vec<Value>) -> Output {
    let (text, _) = leading_string("loadstring", args)?;
    Ok(vec![env.load_string(&text)])
}

fn load_file(env: &mut Environment, args: Vec<Value>) -> Output {
    let (path, _) = leading_string("loadfile", args)?;
    Ok(vec![env.load_file(path)])
}

fn do_string(env: &mut Environment, args: Vec<Value>) -> Output {
    let (text, rest) = leading_string("dostring", args)?;
    let chunk = env.load_string(&text);
    env.call(&chunk, rest)
}

fn do_file(env: &mut Environment, args: Vec<Value>) -> Output {
    let (path, rest) = leading_string("dofile", args)?;
    let chunk = env.load_file(path);
    env.call(&chunk, rest)
}

/// `a.b.c` and `a.b.c.sno` both name `a/b/c.sno`.
fn module_path(name: &str) -> PathBuf {
    let stem = name
        .strip_suffix(SOURCE_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(name);
    PathBuf::from(stem.replace('.', "/")).with_extension(SOURCE_EXTENSION)
}

fn import(env: &mut Environment, args: Vec<Value>) -> Output {
    let (name, rest) = leading_string("import", args)?;
    let loaded = env.get_global(LOADED_MODULES);
    let Some(modules) = loaded.as_dict() else {
        return Err(ExecutionErrorKind::NotIndexable(loaded.type_name()).into());
    };

    let key = Value::from(name.as_str());
    let cached = modules.borrow().get(&key).cloned();
    if let Some(cached) = cached {
        return Ok(match cached.as_array() {
            Some(results) => results.borrow().clone(),
            None => vec![cached],
        });
    }

    let path = env.module_root().join(module_path(&name));
    tracing::debug!(module = %name, path = %path.display(), "importing module");
    let chunk = env.load_file(&path);
    let mut results = env.call(&chunk, rest)?;
    if results.is_empty() {
        results.push(Value::Bool(true));
    }
    loaded.dict_set(key, Value::from(results.clone()))?;
    Ok(results)
}

fn type_of(_: &mut Environment, args: Vec<Value>) -> Output {
    Ok(args.iter().map(|value| Value::from(value.type_name())).collect())
}

fn len(_: &mut Environment, args: Vec<Value>) -> Output {
    let [value] = exact_args("len", args)?;
    let len = match &value {
        Value::Array(items) => items.borrow().len(),
        Value::Dict(entries) => entries.borrow().len(),
        Value::String(s) => s.chars().count(),
        _ => return Err(ExecutionErrorKind::invalid_operands("len", &[value]).into()),
    };
    Ok(vec![Value::Int(len as i64)])
}

fn bounds<T: Copy>(values: &[T], zero: T, one: T) -> (T, T, T) {
    match *values {
        [] => (zero, zero, one),
        [end] => (zero, end, one),
        [begin, end] => (begin, end, one),
        [begin, end, step, ..] => (begin, end, step),
    }
}

fn check_step(ascending: bool, step_positive: bool, step_zero: bool) -> Result<(), ExecutionErrorKind> {
    if step_zero {
        return Err(ExecutionErrorKind::InvalidRange("step must not be zero"));
    }
    if ascending != step_positive {
        return Err(ExecutionErrorKind::InvalidRange("step moves away from the end"));
    }
    Ok(())
}

fn with_len(len: usize) -> Result<Vec<Value>, ExecutionErrorKind> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(len)
        .map_err(|_| ExecutionErrorKind::InvalidRange("too many elements"))?;
    Ok(items)
}

fn int_range(begin: i64, end: i64, step: i64) -> Result<Vec<Value>, ExecutionErrorKind> {
    check_step(begin <= end, step > 0, step == 0)?;
    let steps = (i128::from(end) - i128::from(begin)) / i128::from(step);
    let len = usize::try_from(steps + 1)
        .map_err(|_| ExecutionErrorKind::InvalidRange("too many elements"))?;
    let mut items = with_len(len)?;
    let mut i = begin;
    for _ in 0..len {
        items.push(Value::Int(i));
        i = i.wrapping_add(step);
    }
    Ok(items)
}

/// Elements are `begin + k * step`, so a step too small to move `begin`
/// still yields a finite range.
fn float_range(begin: f64, end: f64, step: f64) -> Result<Vec<Value>, ExecutionErrorKind> {
    if !(begin.is_finite() && end.is_finite() && step.is_finite()) {
        return Err(ExecutionErrorKind::InvalidRange("bounds must be finite"));
    }
    check_step(begin <= end, step > 0.0, step == 0.0)?;
    let steps = ((end - begin) / step).floor();
    if !steps.is_finite() || steps >= usize::MAX as f64 {
        return Err(ExecutionErrorKind::InvalidRange("too many elements"));
    }
    let len = steps as usize + 1;
    let mut items = with_len(len)?;
    items.extend((0..len).map(|k| Value::Float(begin + k as f64 * step)));
    Ok(items)
}

/// Inclusive: `range(n)` is `0..=n`, `range(a, b)` is `a..=b` and
/// `range(a, b, s)` steps by `s`.
fn range(_: &mut Environment, args: Vec<Value>) -> Output {
    if args.is_empty() || args.len() > 3 {
        return Err(ExecutionErrorKind::InvalidArgumentCount(
            "range",
            "1 to 3".to_string(),
            args.len(),
        )
        .into());
    }

    let items = if let Some(ints) = args.iter().map(Value::as_int).collect::<Option<Vec<_>>>() {
        let (begin, end, step) = bounds(&ints, 0, 1);
        int_range(begin, end, step)?
    } else if let Some(floats) = args.iter().map(Value::as_number).collect::<Option<Vec<_>>>() {
        let (begin, end, step) = bounds(&floats, 0.0, 1.0);
        float_range(begin, end, step)?
    } else {
        return Err(ExecutionErrorKind::invalid_operands("range", &args).into());
    };
    Ok(vec![Value::from(items)])
}

fn write_values(env: &mut Environment, args: &[Value], newline: bool) -> Output {
    let text = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = env.stdout();
    let mut stdout = stdout.borrow_mut();
    stdout.write_all(text.as_bytes())?;
    if newline {
        stdout.write_all(b"\n")?;
    }
    Ok(Vec::new())
}

fn print(env: &mut Environment, args: Vec<Value>) -> Output {
    write_values(env, &args, false)
}

fn println(env: &mut Environment, args: Vec<Value>) -> Output {
    write_values(env, &args, true)
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, collections::BTreeMap, path::Path, rc::Rc};

    use super::*;

    fn env() -> (Environment, Rc<RefCell<Vec<u8>>>) {
        let stdout = Rc::new(RefCell::new(Vec::<u8>::new()));
        (Environment::new(stdout.clone()), stdout)
    }

    fn run(f: BuiltinFn, args: Vec<Value>) -> Output {
        f(&mut env().0, args)
    }

    fn ints(value: &Value) -> Vec<i64> {
        value
            .as_array()
            .unwrap()
            .borrow()
            .iter()
            .filter_map(Value::as_int)
            .collect()
    }

    #[test]
    fn test_module_path() {
        assert_eq!(module_path("a.b.c"), Path::new("a/b/c.sno"));
        assert_eq!(module_path("a.b.sno"), Path::new("a/b.sno"));
        assert_eq!(module_path("main"), Path::new("main.sno"));
    }

    #[test]
    fn test_get_member_on_array() {
        let array = Value::from(vec![Value::Int(10), Value::Int(20)]);
        let get = |key: Value| run(get_member, vec![array.clone(), key]);

        assert_eq!(get(Value::Int(1)).unwrap(), vec![Value::Int(20)]);
        assert_eq!(get(Value::Int(2)).unwrap(), vec![Value::Nil]);
        assert_eq!(get(Value::Int(-1)).unwrap(), vec![Value::Nil]);
        assert!(get(Value::from("insert")).unwrap()[0].as_function().is_some());
        assert!(matches!(
            get(Value::from("size")).unwrap_err().kind,
            ExecutionErrorKind::ArrayKeyNotInteger("str")
        ));
        assert!(matches!(
            get(Value::Float(1.0)).unwrap_err().kind,
            ExecutionErrorKind::ArrayKeyNotInteger("float")
        ));
    }

    #[test]
    fn test_get_member_on_dict() {
        let mut entries = BTreeMap::new();
        entries.insert(Value::from("a"), Value::Int(1));
        let dict = Value::from(entries);

        let found = run(get_member, vec![dict.clone(), Value::from("a")]).unwrap();
        assert_eq!(found, vec![Value::Int(1)]);
        let missing = run(get_member, vec![dict, Value::from("b")]).unwrap();
        assert_eq!(missing, vec![Value::Nil]);
        assert!(matches!(
            run(get_member, vec![Value::from("s"), Value::Int(0)]).unwrap_err().kind,
            ExecutionErrorKind::NotIndexable("str")
        ));
    }

    #[test]
    fn test_type_names() {
        let types = run(
            type_of,
            vec![
                Value::Nil,
                Value::Bool(true),
                Value::Int(1),
                Value::Float(1.0),
                Value::from("s"),
                Value::from(Vec::new()),
                Value::from(BTreeMap::new()),
                Value::native(|_, _| Ok(Vec::new())),
            ],
        )
        .unwrap();
        let names = types.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["nil", "bool", "int", "float", "str", "array", "dict", "func"]
        );
    }

    #[test]
    fn test_len() {
        assert_eq!(
            run(len, vec![Value::from(vec![Value::Nil, Value::Nil])]).unwrap(),
            vec![Value::Int(2)]
        );
        assert_eq!(run(len, vec![Value::from("größe")]).unwrap(), vec![Value::Int(5)]);
        assert!(run(len, vec![Value::Int(3)]).is_err());
    }

    #[test]
    fn test_range_forms() {
        assert_eq!(ints(&run(range, vec![Value::Int(3)]).unwrap()[0]), vec![0, 1, 2, 3]);
        assert_eq!(
            ints(&run(range, vec![Value::Int(2), Value::Int(4)]).unwrap()[0]),
            vec![2, 3, 4]
        );
        assert_eq!(
            ints(&run(range, vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap()[0]),
            vec![5, 3, 1]
        );
        assert_eq!(
            ints(&run(range, vec![Value::Int(1), Value::Int(1), Value::Int(1)]).unwrap()[0]),
            vec![1]
        );
    }

    #[test]
    fn test_float_range() {
        let items = run(range, vec![Value::Int(0), Value::Float(1.0), Value::Float(0.5)]).unwrap();
        assert_eq!(
            *items[0].as_array().unwrap().borrow(),
            vec![Value::Float(0.0), Value::Float(0.5), Value::Float(1.0)]
        );
    }

    #[test]
    fn test_float_range_past_integer_precision_terminates() {
        let items = run(
            range,
            vec![
                Value::Float(9007199254740992.0),
                Value::Float(9007199254740994.0),
                Value::Float(1.0),
            ],
        )
        .unwrap();
        let items = items[0].as_array().unwrap().borrow();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2], Value::Float(9007199254740994.0));
    }

    #[test]
    fn test_oversized_ranges_are_errors() {
        let kind = |args: Vec<Value>| run(range, args).unwrap_err().kind;
        assert!(matches!(
            kind(vec![Value::Int(i64::MIN), Value::Int(i64::MAX)]),
            ExecutionErrorKind::InvalidRange("too many elements")
        ));
        assert!(matches!(
            kind(vec![Value::Float(0.0), Value::Float(1e300), Value::Float(1.0)]),
            ExecutionErrorKind::InvalidRange("too many elements")
        ));
        assert!(matches!(
            kind(vec![Value::Float(-1e308), Value::Float(1e308), Value::Float(1e-300)]),
            ExecutionErrorKind::InvalidRange("too many elements")
        ));
    }

    #[test]
    fn test_range_errors() {
        let kind = |args: Vec<Value>| run(range, args).unwrap_err().kind;
        assert!(matches!(
            kind(vec![Value::Int(0), Value::Int(3), Value::Int(-1)]),
            ExecutionErrorKind::InvalidRange(_)
        ));
        assert!(matches!(
            kind(vec![Value::Int(3), Value::Int(0)]),
            ExecutionErrorKind::InvalidRange(_)
        ));
        assert!(matches!(
            kind(vec![Value::Int(0), Value::Int(3), Value::Int(0)]),
            ExecutionErrorKind::InvalidRange(_)
        ));
        assert!(matches!(
            kind(vec![Value::Int(0), Value::Int(1), Value::Int(1), Value::Int(1)]),
            ExecutionErrorKind::InvalidArgumentCount("range", _, 4)
        ));
        assert!(matches!(
            kind(Vec::new()),
            ExecutionErrorKind::InvalidArgumentCount("range", _, 0)
        ));
        assert!(matches!(
            kind(vec![Value::from("3")]),
            ExecutionErrorKind::InvalidOperands("range", _)
        ));
    }

    #[test]
    fn test_print_joins_with_spaces() {
        let (mut env, stdout) = env();
        print(&mut env, vec![Value::Int(1), Value::from("a"), Value::Float(2.0)]).unwrap();
        println(&mut env, vec![Value::Nil]).unwrap();
        println(&mut env, Vec::new()).unwrap();
        assert_eq!(String::from_utf8(stdout.borrow().clone()).unwrap(), "1 a 2.0nil\n\n");
    }

    #[test]
    fn test_dostring_passes_arguments() {
        let results = run(
            do_string,
            vec![Value::from("return args[0] + args[1]"), Value::Int(2), Value::Int(3)],
        )
        .unwrap();
        assert_eq!(results, vec![Value::Int(5)]);
    }

    #[test]
    fn test_loadstring_failure_is_nil() {
        assert_eq!(
            run(load_string, vec![Value::from("x = ")]).unwrap(),
            vec![Value::Nil]
        );
        assert!(matches!(
            run(do_string, vec![Value::from("x = ")]).unwrap_err().kind,
            ExecutionErrorKind::NotCallable("nil")
        ));
    }
}
