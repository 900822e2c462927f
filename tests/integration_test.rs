use std::{cell::RefCell, path::Path, rc::Rc};

use pretty_assertions::assert_eq;
use snow::{
    parser::{ParseError, ParseErrorKind},
    tree_walk_interpreter::ExecutionErrorKind,
    Environment, Error, LoadError,
};
use tempfile::tempdir;

fn run(env_root: Option<&Path>, source: &str) -> (Result<(), Error>, String) {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let mut env = Environment::new(output.clone());
    if let Some(root) = env_root {
        env = env.with_module_root(root);
    }
    let result = env.do_string(source, Vec::new()).map(|_| ());
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (result, output)
}

fn test_valid_program(source: &str, expected_output: &str) {
    let (result, output) = run(None, source);
    if let Err(e) = result {
        panic!("Program should run: {e}");
    }
    assert_eq!(output, expected_output);
}

fn execution_error(source: &str) -> ExecutionErrorKind {
    match run(None, source).0 {
        Err(Error::Execution(e)) => e.kind,
        Err(e) => panic!("expected a runtime error, got {e}"),
        Ok(()) => panic!("expected a runtime error"),
    }
}

#[test]
fn test_fib() {
    let source = r#"
    func fib(n) {
        if (n < 2) { return n }
        return fib(n - 1) + fib(n - 2)
    }

    for (i in range(0, 9)) {
        println(fib(i))
    }
    "#;
    test_valid_program(source, "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
}

#[test]
fn test_precedence() {
    let source = r#"
    println(2 + 3 * 4, (2 + 3) * 4, 1 < 2 && 3 > 2)
    println(10 - 4 - 3, 2 * 3 % 4, -2 * 3)
    println(1 | 2 ^ 3 & 1)
    "#;
    test_valid_program(source, "14 20 true\n3 2 -6\n3\n");
}

#[test]
fn test_closure() {
    let source = r#"
    func counter() {
        var n = 0
        return func() {
            n = n + 1
            return n
        }
    }

    var first = counter()
    println(first(), first())
    var second = counter()
    println(second(), first())
    "#;
    test_valid_program(source, "1 2\n1 3\n");
}

#[test]
fn test_var_is_block_scoped() {
    let source = r#"
    var x = 1
    if (true) {
        var x = 2
        println(x)
    }
    println(x)
    {
        x = 3
    }
    println(x)
    "#;
    test_valid_program(source, "2\n1\n3\n");
}

#[test]
fn test_closure_shares_its_defining_frame() {
    let source = r#"
    var a = "outer"
    {
        var show = func() { println(a) }
        show()
        var a = "inner"
        show()
    }
    "#;
    test_valid_program(source, "outer\ninner\n");
}

#[test]
fn test_arrays_are_shared() {
    let source = r#"
    var a = [1, 2, 3];
    var b = a;
    b[0] = 9;
    println(a[0], len(a))
    a[5] = "end"
    println(len(b), b[4], b[5])
    "#;
    test_valid_program(source, "9 3\n6 nil end\n");
}

#[test]
fn test_array_methods() {
    let source = r#"
    var a = [1, 3]
    a.insert(4)
    a.insert(1, 2)
    println(a[0], a[1], a[2], a[3])
    a.remove()
    a.remove(0)
    println(len(a), a[0], a[1])
    "#;
    test_valid_program(source, "1 2 3 4\n2 2 3\n");
}

#[test]
fn test_dicts() {
    let source = r#"
    var d = {["a"] = 1, ["b"] = 2}
    println(len(d), d.a, d["b"], d.c)
    d["a"] = nil
    println(len(d))
    d.c = [1]
    println(len(d), type(d.c))
    var e = {x = 1, y = nil}
    println(len(e))
    "#;
    test_valid_program(source, "2 1 2 nil\n1\n2 array\n1\n");
}

#[test]
fn test_for_over_dict_is_ordered_by_key() {
    let source = r#"
    var d = {b = 2, a = 1, [3] = "three"}
    for (k, v in d) {
        println(k, v)
    }
    "#;
    test_valid_program(source, "3 three\na 1\nb 2\n");
}

#[test]
fn test_for_and_break() {
    let source = r#"
    for (i in range(1, 5)) {
        if (i == 3) { break }
        println(i)
    }
    var i = 0
    while (true) {
        i = i + 1
        if (i > 4) { break }
    }
    println(i)
    "#;
    test_valid_program(source, "1\n2\n5\n");
}

#[test]
fn test_multiple_values() {
    let source = r#"
    func two() { return 1, 2 }
    var a, b = two()
    println(a, b)
    var c, d, e = 0, two()
    println(c, d, e)
    var f, g = two(), 5
    println(f, g)
    a, b = b, a
    println(a, b)
    println(two())
    "#;
    test_valid_program(source, "1 2\n0 1 2\n1 5\n2 1\n1 2\n");
}

#[test]
fn test_return_leaves_enclosing_loops() {
    let source = r#"
    func find(items, wanted) {
        for (i in range(len(items) - 1)) {
            if (items[i] == wanted) { return i }
        }
        return -1
    }
    func countdown(n) {
        while (true) {
            for (x in [1]) {
                if (n == 0) { return "done" }
            }
            n = n - 1
        }
    }
    println(find([5, 6, 7], 6), find([5, 6, 7], 9), countdown(3))
    "#;
    test_valid_program(source, "1 -1 done\n");
}

#[test]
fn test_named_function_expression_binds_its_name() {
    let source = r#"
    var f = func square(x) { return x * x }
    println(f(3), square(4))
    "#;
    test_valid_program(source, "9 16\n");
}

#[test]
fn test_missing_arguments_are_nil() {
    let source = r#"
    func f(a, b) { return b }
    println(f(1), f(1, 2, 3))
    "#;
    test_valid_program(source, "nil 2\n");
}

#[test]
fn test_if_expression() {
    let source = r#"
    func sign(n) {
        return if (n < 0) { return "neg" } else if (n == 0) { return "zero" } else { return "pos" }
    }
    println(sign(-3), sign(0), sign(7))
    "#;
    test_valid_program(source, "neg zero pos\n");
}

#[test]
fn test_operators_do_not_short_circuit() {
    let source = r#"
    func side() {
        println("side")
        return true
    }
    println(false && side())
    "#;
    test_valid_program(source, "side\nfalse\n");
}

#[test]
fn test_operators_can_be_rebound() {
    let source = r#"
    var __add = func(a, b) { return a * b }
    println(3 + 4)
    "#;
    test_valid_program(source, "12\n");
}

#[test]
fn test_strings_and_numbers() {
    let source = r#"
    println("ab" * 3, "n=" + 1, "x" + 1.0)
    println(7 / 2, 7.0 / 2, 7 % 3, 1e2, .5)
    println(type(1, 1.5, "s", nil, true, [], {}, print))
    println(len("größe"), "tab\tend")
    "#;
    test_valid_program(
        source,
        "ababab n=1 x1.0\n3 3.5 1 100.0 0.5\nint float str nil bool array dict func\n5 tab\tend\n",
    );
}

#[test]
fn test_print_without_newline() {
    test_valid_program("print(1, 2) print(3)", "1 23");
}

#[test]
fn test_math() {
    let source = r#"
    println(math.sqrt(16), math.abs(-3), math.abs(-1.5), math.cos(0))
    "#;
    test_valid_program(source, "4.0 3 1.5 1.0\n");
}

#[test]
fn test_range() {
    let source = r#"
    var r = range(3)
    println(len(r), r[0], r[3])
    for (x in range(10, 0, -5)) { println(x) }
    for (x in range(0, 1, 0.5)) { println(x) }
    "#;
    test_valid_program(source, "4 0 3\n10\n5\n0\n0.0\n0.5\n1.0\n");
}

#[test]
fn test_dostring_and_loadstring() {
    let source = r#"
    println(dostring("return args[0] + 1", 41))
    var chunk = loadstring("return 'loaded'")
    println(chunk())
    println(loadstring("var = "))
    "#;
    test_valid_program(source, "42\nloaded\nnil\n");
}

#[test]
fn test_chunk_locals_do_not_leak_into_globals() {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let mut env = Environment::new(output.clone());
    env.do_string("var local = 1; shared = 2", Vec::new())
        .expect("Program should run");
    assert_eq!(env.get_global("local"), snow::Value::Nil);
    assert_eq!(env.get_global("shared"), snow::Value::Int(2));
}

#[test]
fn test_import_caches_results() {
    let dir = tempdir().expect("Should create module directory");
    std::fs::create_dir(dir.path().join("pkg")).expect("Should create package directory");
    std::fs::write(
        dir.path().join("util.sno"),
        "println('loading util')\nreturn args[0] * 2\n",
    )
    .expect("Should write module");
    std::fs::write(dir.path().join("pkg").join("helper.sno"), "helped = true\n")
        .expect("Should write module");

    let source = r#"
    println(import("util", 21))
    println(import("util", 0))
    println(import("pkg.helper"), helped)
    println(len(__loaded))
    "#;
    let (result, output) = run(Some(dir.path()), source);

    if let Err(e) = result {
        panic!("Program should run: {e}");
    }
    assert_eq!(output, "loading util\n42\n42\ntrue true\n2\n");
}

#[test]
fn test_import_of_missing_module_fails_to_call() {
    let kind = execution_error(r#"import("no.such.module")"#);
    assert!(matches!(kind, ExecutionErrorKind::NotCallable("nil")));
}

#[test]
fn test_type_errors() {
    assert!(matches!(
        execution_error(r#"var x = 1 + "x""#),
        ExecutionErrorKind::InvalidOperands("__add", _)
    ));
    assert!(matches!(
        execution_error(r#"var a = [1]; var b = a["k"]"#),
        ExecutionErrorKind::ArrayKeyNotInteger("str")
    ));
    assert!(matches!(
        execution_error("var a = [1]; a[1.5] = 2"),
        ExecutionErrorKind::ArrayKeyNotInteger("float")
    ));
    assert!(matches!(
        execution_error("var x = 1; x()"),
        ExecutionErrorKind::NotCallable("int")
    ));
    assert!(matches!(
        execution_error("for (x in 5) { }"),
        ExecutionErrorKind::NotIterable("int")
    ));
    assert!(matches!(
        execution_error("var x = 1 / 0"),
        ExecutionErrorKind::DivisionByZero
    ));
    assert!(matches!(
        execution_error(r#"var s = "abc"; s[0] = 1"#),
        ExecutionErrorKind::InvalidAssignTarget("str")
    ));
}

#[test]
fn test_oversized_requests_are_runtime_errors() {
    assert!(matches!(
        execution_error("var a = [1]; a[9223372036854775807] = 1"),
        ExecutionErrorKind::IndexOutOfRange(9223372036854775807, 1)
    ));
    assert!(matches!(
        execution_error(r#"var s = "abc" * 4000000000000000000"#),
        ExecutionErrorKind::InvalidOperands("__mul", _)
    ));
    assert!(matches!(
        execution_error("var r = range(0, 9223372036854775807)"),
        ExecutionErrorKind::InvalidRange(_)
    ));
    test_valid_program(
        "println(len(range(9007199254740992.0, 9007199254740994.0, 1.0)))",
        "3\n",
    );
}

#[test]
fn test_do_file_runs_a_decoded_file() {
    let dir = tempdir().expect("Should create directory");
    let path = dir.path().join("main.sno");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice("println(args[0], 'ü')\n".as_bytes());
    std::fs::write(&path, bytes).expect("Should write file");

    let output = Rc::new(RefCell::new(Vec::<u8>::new()));
    let mut env = Environment::new(output.clone());
    env.do_file(&path, vec![snow::Value::from("hi")])
        .expect("File should run");
    assert_eq!(String::from_utf8(output.take()).unwrap(), "hi ü\n");

    let missing = env.do_file(dir.path().join("missing.sno"), Vec::new());
    assert!(matches!(missing, Err(Error::Load(LoadError::Io { .. }))));
}

#[test]
fn test_error_names_innermost_statement() {
    let (result, _) = run(None, "func f() {\n  return 1 + nil\n}\nf()");
    let Err(Error::Execution(e)) = result else {
        panic!("expected a runtime error");
    };
    assert_eq!(e.statement.as_deref(), Some("return (1 + nil);"));
    assert_eq!(
        e.to_string(),
        "Error executing statement: return (1 + nil); - Invalid operands for __add: int, nil"
    );
}

#[test]
fn test_break_outside_loop_is_a_parse_error() {
    let (result, output) = run(None, "println(1)\nbreak");
    assert_eq!(output, "");
    match result {
        Err(Error::Load(LoadError::Parse(ParseError::Syntax(e)))) => {
            assert_eq!(e.error, ParseErrorKind::BreakOutsideLoop);
            assert_eq!(e.token.position.line, 2);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_break_in_function_inside_loop_is_a_parse_error() {
    let (result, _) = run(None, "while (true) { var f = func() { break } }");
    assert!(matches!(
        result,
        Err(Error::Load(LoadError::Parse(ParseError::Syntax(_))))
    ));
}

#[test]
fn test_not_a_left_value() {
    let (result, _) = run(None, "f() = 1");
    match result {
        Err(Error::Load(LoadError::Parse(ParseError::Syntax(e)))) => {
            assert_eq!(e.error, ParseErrorKind::NotALeftValue);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_tokenize_error_is_reported_as_load_error() {
    let (result, _) = run(None, "var s = \"unterminated");
    assert!(matches!(
        result,
        Err(Error::Load(LoadError::Parse(ParseError::Tokenize(_))))
    ));
}
