use kiscript::{run_script, ExecutionBudget, StandardLibrary};
use pretty_assertions::assert_eq;

/// Run a script and return (stdout, result repr or "Kind: message").
fn run(code: &str) -> (String, String) {
    let outcome = run_script(
        code,
        StandardLibrary::create_global_environment(),
        &ExecutionBudget::default(),
    );
    let result = match &outcome.result {
        Ok(Some(repr)) => repr.clone(),
        Ok(None) => "None".to_string(),
        Err(fault) => format!("{}: {}", fault.kind, fault.message),
    };
    (outcome.output.stdout_text(), result)
}

fn result_of(code: &str) -> String {
    run(code).1
}

#[test]
fn test_functions_defaults_and_keywords() {
    let code = r#"
def clearance(width, gap=0.2, scale=1) {
    return (width + gap) * scale
}
[clearance(1), clearance(1, 0.5), clearance(1, scale=2), clearance(width=2, gap=0)]
"#;
    assert_eq!(result_of(code), "[1.2, 1.5, 2.4, 2]");
}

#[test]
fn test_arity_errors_name_the_function() {
    let (_, result) = run("def f(a, b=1) { return a }\nf()");
    assert_eq!(result, "TypeError: f() takes from 1 to 2 argument(s) but 0 were given");
    let (_, result) = run("def f(a) { return a }\nf(1, nope=2)");
    assert_eq!(result, "TypeError: f() got an unexpected keyword argument 'nope'");
}

#[test]
fn test_tuple_unpacking_and_swaps() {
    let code = r#"
a, b = 1, 2
a, b = b, a
pairs = [(1, 'x'), (2, 'y')]
names = []
for n, label in pairs { names.append(f"{label}{n}") }
(a, b, names)
"#;
    assert_eq!(result_of(code), "(2, 1, ['x1', 'y2'])");
    assert_eq!(
        result_of("a, b = [1, 2, 3]"),
        "ValueError: expected 2 values to unpack, got 3"
    );
}

#[test]
fn test_dicts_keep_insertion_order() {
    let code = r#"
widths = {"GND": 0.5, "VCC": 0.3}
widths["SIG"] = 0.15
widths["GND"] += 0.1
total = 0
for name, width in widths.items() { total += width }
(list(widths.keys()), round(total, 2), widths.get("NONE", -1))
"#;
    assert_eq!(result_of(code), "(['GND', 'VCC', 'SIG'], 1.05, -1)");
}

#[test]
fn test_fstrings_and_format_specs() {
    let code = r#"
net = "GND"
width = 0.254
count = 1234567
print(f"{net:>5}|{width:.2f}|{count:,}|{{braces}}")
print("{} has {:.1f} mm".format(net, width))
"#;
    assert_eq!(run(code).0, "  GND|0.25|1,234,567|{braces}\nGND has 0.3 mm\n");
}

#[test]
fn test_string_methods() {
    let code = r#"
ref = "  R12 "
parts = "a,b,,c".split(",")
[ref.strip().lower(), "-".join(parts), "R12".startswith("R"), "x".upper() * 2, "netname".find("name")]
"#;
    assert_eq!(result_of(code), "['r12', 'a-b--c', True, 'XX', 3]");
}

#[test]
fn test_list_methods_and_aliasing() {
    let code = r#"
xs = [3, 1, 2]
ys = xs
ys.append(0)
xs.sort()
popped = xs.pop()
xs += [9]
(xs, ys is xs, popped, xs.index(9))
"#;
    assert_eq!(result_of(code), "([0, 1, 2, 9], True, 3, 3)");
}

#[test]
fn test_comprehensions_and_lambdas() {
    let code = r#"
pads = [("A1", 0.5), ("A2", 1.5), ("B1", 2.5)]
big = [name for name, size in pads if size > 1]
by_size = sorted(pads, key=lambda p: -p[1])
scale = lambda v, k: v * k
(big, by_size[0][0], scale(3, 2), sum(s for _, s in pads))
"#;
    assert_eq!(result_of(code), "(['A2', 'B1'], 'B1', 6, 4.5)");
}

#[test]
fn test_chained_comparisons_and_membership() {
    let code = "x = 5\n(1 < x <= 5, 1 < x < 3, 'G' in 'GND', 3 not in [1, 2], None is None)";
    assert_eq!(result_of(code), "(True, False, True, True, True)");
}

#[test]
fn test_exceptions_flow_through_functions() {
    let code = r#"
def check(v) {
    if v < 0 { raise ValueError(f"negative: {v}") }
    return v
}
results = []
for v in [1, -2, 3] {
    try {
        results.append(check(v))
    } except ValueError as e {
        results.append(e.message)
    }
}
results
"#;
    assert_eq!(result_of(code), "[1, 'negative: -2', 3]");
}

#[test]
fn test_bare_raise_reraises_current_error() {
    let code = r#"
try {
    try { {}["missing"] } except KeyError { raise }
} except Exception as outer {
    result = outer.kind
}
result
"#;
    assert_eq!(result_of(code), "'KeyError'");
}

#[test]
fn test_finally_runs_on_return() {
    let code = r#"
log = []
def f() {
    try { return "body" } finally { log.append("cleanup") }
}
(f(), log)
"#;
    assert_eq!(result_of(code), "('body', ['cleanup'])");
}

#[test]
fn test_unhandled_error_traceback() {
    let code = "def inner() {\n    return 1 / 0\n}\n\ninner()\n";
    let outcome = run_script(
        code,
        StandardLibrary::create_global_environment(),
        &ExecutionBudget::default(),
    );
    let fault = outcome.result.unwrap_err();
    assert_eq!(fault.kind, "ZeroDivisionError");
    assert_eq!(
        fault.traceback,
        "Traceback (most recent call last):\n  line 5, in <module>\n    inner()\n  line 2, in inner\n    return 1 / 0\nZeroDivisionError: division by zero"
    );
}

#[test]
fn test_output_before_a_failure_is_kept() {
    let (stdout, result) = run("print('step 1')\nundefined_name\nprint('step 2')");
    assert_eq!(stdout, "step 1\n");
    assert_eq!(result, "NameError: name 'undefined_name' is not defined");
}

#[test]
fn test_syntax_errors_do_not_run_anything() {
    let outcome = run_script(
        "print('never')\nx = (1 +\n",
        StandardLibrary::create_global_environment(),
        &ExecutionBudget::default(),
    );
    assert!(outcome.output.records().is_empty());
    let fault = outcome.result.unwrap_err();
    assert_eq!(fault.kind, "SyntaxError");
}

#[test]
fn test_imports_are_rejected() {
    let (_, result) = run("import os");
    assert!(result.starts_with("SyntaxError"), "{result}");
    assert!(result.contains("import statements are not supported"), "{result}");
}
