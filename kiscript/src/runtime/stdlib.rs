//! Built-in functions available to every script.

use std::any::Any;
use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;

use super::environment::Environment;
use super::error::{RuntimeError, RuntimeResult};
use super::evaluator::Interpreter;
use super::host_interface::NativeObject;
use super::methods::pairs_of;
use super::operators;
use super::output::OutputStream;
use super::values::{Arity, CallArgs, DictKey, Function, RangeValue, Value};
use crate::ast::BinaryOp;

type BuiltinImpl = fn(&mut Interpreter, CallArgs) -> RuntimeResult<Value>;

/// Exception types scripts can construct and raise.
pub const EXCEPTION_TYPES: &[&str] = &[
    "Exception",
    "ValueError",
    "RuntimeError",
    "TypeError",
    "KeyError",
    "IndexError",
];

/// The standard library for the KiScript runtime.
///
/// Everything here is pure apart from `print` and `warn`, which write to the
/// interpreter's output log rather than process stdio.
pub struct StandardLibrary;

impl StandardLibrary {
    /// Creates a new global environment populated with the builtins.
    pub fn create_global_environment() -> Environment {
        let env = Environment::new();
        Self::load_into(&env);
        env
    }

    /// Add the builtins to an existing namespace.
    pub fn load_into(env: &Environment) {
        Self::load_output_functions(env);
        Self::load_conversion_functions(env);
        Self::load_sequence_functions(env);
        Self::load_numeric_functions(env);
        Self::load_introspection_functions(env);
        Self::load_exception_types(env);
        env.define("math", Value::object(MathModule));
    }

    fn load_output_functions(env: &Environment) {
        define(env, "print", Arity::Variadic(0), &["sep", "end"], |interp, args| {
            Self::emit(interp, OutputStream::Stdout, args)
        });
        define(env, "warn", Arity::Variadic(0), &["sep", "end"], |interp, args| {
            Self::emit(interp, OutputStream::Stderr, args)
        });
    }

    fn load_conversion_functions(env: &Environment) {
        define(env, "str", Arity::Range(0, 1), &[], |_, args| {
            Ok(args.get(0).map(Value::display).unwrap_or_default().into())
        });
        define(env, "repr", Arity::Fixed(1), &[], |_, args| {
            Ok(args.positional[0].repr().into())
        });
        define(env, "int", Arity::Range(1, 2), &["base"], Self::int);
        define(env, "float", Arity::Range(0, 1), &[], Self::float);
        define(env, "bool", Arity::Range(0, 1), &[], |_, args| {
            Ok(Value::Bool(args.get(0).is_some_and(Value::is_truthy)))
        });
        define(env, "list", Arity::Range(0, 1), &[], |interp, args| match args.get(0) {
            Some(iterable) => Ok(Value::list(interp.collect_items(iterable)?)),
            None => Ok(Value::list(Vec::new())),
        });
        define(env, "tuple", Arity::Range(0, 1), &[], |interp, args| match args.get(0) {
            Some(iterable) => Ok(Value::tuple(interp.collect_items(iterable)?)),
            None => Ok(Value::tuple(Vec::new())),
        });
        define(env, "dict", Arity::Range(0, 1), ANY_KEYWORD, Self::dict);
    }

    fn load_sequence_functions(env: &Environment) {
        define(env, "len", Arity::Fixed(1), &[], Self::len);
        define(env, "range", Arity::Range(1, 3), &[], Self::range);
        define(env, "sorted", Arity::Fixed(1), &["key", "reverse"], |interp, mut args| {
            let key = args.take_keyword("key");
            let reverse = args.take_keyword("reverse").is_some_and(|v| v.is_truthy());
            let items = interp.collect_items(&args.positional[0])?;
            Ok(Value::list(sort_values(interp, items, key, reverse)?))
        });
        define(env, "reversed", Arity::Fixed(1), &[], |interp, args| {
            let mut items = interp.collect_items(&args.positional[0])?;
            items.reverse();
            Ok(Value::list(items))
        });
        define(env, "enumerate", Arity::Range(1, 2), &["start"], |interp, mut args| {
            let start = match args.take_keyword("start").or_else(|| args.get(1).cloned()) {
                Some(value) => value.expect_int("enumerate")?,
                None => 0,
            };
            let pairs = interp
                .iterate(&args.positional[0])?
                .enumerate()
                .map(|(i, item)| {
                    item.map(|item| Value::tuple(vec![Value::Int(start + i as i64), item]))
                })
                .collect::<RuntimeResult<Vec<_>>>()?;
            Ok(Value::list(pairs))
        });
        define(env, "zip", Arity::Variadic(0), &[], |interp, args| {
            let columns = args
                .positional
                .iter()
                .map(|iterable| interp.collect_items(iterable))
                .collect::<RuntimeResult<Vec<_>>>()?;
            let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::list(
                (0..rows)
                    .map(|row| Value::tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect(),
            ))
        });
        define(env, "map", Arity::Fixed(2), &[], |interp, args| {
            let mut out = Vec::new();
            for item in interp.iterate(&args.positional[1])? {
                let item = item?;
                out.push(interp.call_value(&args.positional[0], CallArgs::positional(vec![item]))?);
            }
            Ok(Value::list(out))
        });
        define(env, "filter", Arity::Fixed(2), &[], |interp, args| {
            let predicate = &args.positional[0];
            let mut out = Vec::new();
            for item in interp.iterate(&args.positional[1])? {
                let item = item?;
                let keep = if predicate.is_none() {
                    item.is_truthy()
                } else {
                    interp
                        .call_value(predicate, CallArgs::positional(vec![item.clone()]))?
                        .is_truthy()
                };
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        });
        define(env, "any", Arity::Fixed(1), &[], |interp, args| {
            let items = interp.iterate(&args.positional[0])?;
            let found = itertools::process_results(items, |mut items| items.any(|v| v.is_truthy()))?;
            Ok(Value::Bool(found))
        });
        define(env, "all", Arity::Fixed(1), &[], |interp, args| {
            let items = interp.iterate(&args.positional[0])?;
            let every = itertools::process_results(items, |mut items| items.all(|v| v.is_truthy()))?;
            Ok(Value::Bool(every))
        });
    }

    fn load_numeric_functions(env: &Environment) {
        define(env, "abs", Arity::Fixed(1), &[], |_, args| match &args.positional[0] {
            Value::Int(n) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::value_error("integer overflow in abs()")),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            other => Ok(Value::Float(other.expect_float("abs")?.abs())),
        });
        define(env, "min", Arity::Variadic(1), &["key", "default"], |interp, args| {
            Self::extreme(interp, args, "min", Ordering::Less)
        });
        define(env, "max", Arity::Variadic(1), &["key", "default"], |interp, args| {
            Self::extreme(interp, args, "max", Ordering::Greater)
        });
        define(env, "sum", Arity::Range(1, 2), &["start"], |interp, mut args| {
            let mut total = args
                .take_keyword("start")
                .or_else(|| args.get(1).cloned())
                .unwrap_or(Value::Int(0));
            for item in interp.iterate(&args.positional[0])? {
                total = operators::binary(interp, BinaryOp::Add, &total, &item?)?;
            }
            Ok(total)
        });
        define(env, "round", Arity::Range(1, 2), &["ndigits"], Self::round);
    }

    fn load_introspection_functions(env: &Environment) {
        define(env, "type", Arity::Fixed(1), &[], |_, args| {
            Ok(args.positional[0].type_name().into())
        });
        define(env, "hasattr", Arity::Fixed(2), &[], |interp, args| {
            let name = args.positional[1].expect_str("hasattr")?;
            Ok(Value::Bool(interp.get_attribute(&args.positional[0], &name).is_ok()))
        });
        define(env, "getattr", Arity::Range(2, 3), &[], |interp, args| {
            let name = args.positional[1].expect_str("getattr")?;
            match (interp.get_attribute(&args.positional[0], &name), args.get(2)) {
                (Ok(value), _) => Ok(value),
                (Err(RuntimeError::AttributeNotFound { .. }), Some(default)) => Ok(default.clone()),
                (Err(error), _) => Err(error),
            }
        });
    }

    fn load_exception_types(env: &Environment) {
        for kind in EXCEPTION_TYPES {
            let function = Function::builtin(kind, Arity::Range(0, 1), move |_, args| {
                args.reject_keywords(kind)?;
                let message = args.get(0).map(Value::display).unwrap_or_default();
                Ok(Value::Exception(std::rc::Rc::new(RuntimeError::Raised {
                    kind: kind.to_string(),
                    message,
                })))
            });
            env.define(kind, Value::Function(function));
        }
    }

    fn emit(interp: &mut Interpreter, stream: OutputStream, mut args: CallArgs) -> RuntimeResult<Value> {
        let sep = match args.take_keyword("sep") {
            Some(Value::None) | None => " ".to_string(),
            Some(value) => value.expect_str("print sep")?.to_string(),
        };
        let end = match args.take_keyword("end") {
            Some(Value::None) | None => "\n".to_string(),
            Some(value) => value.expect_str("print end")?.to_string(),
        };
        let mut text = args.positional.iter().map(Value::display).join(&sep);
        text.push_str(&end);
        interp.write(stream, text);
        Ok(Value::None)
    }

    fn len(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
        let length = match &args.positional[0] {
            Value::Str(s) => s.chars().count(),
            Value::List(items) => items.borrow().len(),
            Value::Tuple(items) => items.len(),
            Value::Dict(entries) => entries.borrow().len(),
            Value::Range(range) => range.len(),
            other => {
                return Err(RuntimeError::type_error(
                    "sized value",
                    &other.type_name(),
                    "len",
                ))
            }
        };
        i64::try_from(length)
            .map(Value::Int)
            .map_err(|_| RuntimeError::value_error("length does not fit in an int"))
    }

    fn range(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
        let ints = args
            .positional
            .iter()
            .map(|v| v.expect_int("range"))
            .collect::<RuntimeResult<Vec<_>>>()?;
        let (start, stop, step) = match ints.as_slice() {
            [stop] => (0, *stop, 1),
            [start, stop] => (*start, *stop, 1),
            [start, stop, step] => (*start, *stop, *step),
            _ => return Err(RuntimeError::InternalError("range arity".to_string())),
        };
        if step == 0 {
            return Err(RuntimeError::value_error("range() arg 3 must not be zero"));
        }
        Ok(Value::Range(RangeValue { start, stop, step }))
    }

    fn int(_: &mut Interpreter, mut args: CallArgs) -> RuntimeResult<Value> {
        let base = match args.take_keyword("base").or_else(|| args.get(1).cloned()) {
            Some(value) => Some(value.expect_int("int")?),
            None => None,
        };
        match (&args.positional[0], base) {
            (Value::Str(text), base) => {
                let base = base.unwrap_or(10);
                if !(2..=36).contains(&base) {
                    return Err(RuntimeError::value_error("int() base must be >= 2 and <= 36"));
                }
                let cleaned = text.trim().replace('_', "");
                i64::from_str_radix(&cleaned, base as u32)
                    .map(Value::Int)
                    .map_err(|_| {
                        RuntimeError::value_error(format!(
                            "invalid literal for int() with base {base}: {}",
                            args.positional[0].repr()
                        ))
                    })
            }
            (_, Some(_)) => Err(RuntimeError::type_error(
                "str",
                &args.positional[0].type_name(),
                "int() with explicit base",
            )),
            (Value::Int(n), None) => Ok(Value::Int(*n)),
            (Value::Bool(b), None) => Ok(Value::Int(*b as i64)),
            (Value::Float(f), None) => float_to_int(f.trunc(), "int"),
            (other, None) => Err(RuntimeError::type_error("number or str", &other.type_name(), "int")),
        }
    }

    fn float(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
        match args.get(0) {
            None => Ok(Value::Float(0.0)),
            Some(Value::Str(text)) => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| {
                    RuntimeError::value_error(format!(
                        "could not convert string to float: {}",
                        Value::Str(text.clone()).repr()
                    ))
                }),
            Some(other) => Ok(Value::Float(other.expect_float("float")?)),
        }
    }

    fn dict(interp: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
        let mut entries = IndexMap::new();
        if let Some(source) = args.get(0) {
            entries.extend(pairs_of(interp, source)?);
        }
        for (name, value) in args.keywords {
            entries.insert(DictKey::from(name.as_str()), value);
        }
        Ok(Value::dict(entries))
    }

    fn extreme(
        interp: &mut Interpreter,
        mut args: CallArgs,
        name: &str,
        wanted: Ordering,
    ) -> RuntimeResult<Value> {
        let key = args.take_keyword("key").filter(|k| !k.is_none());
        let default = args.take_keyword("default");
        let items: Vec<Value> = if args.len() == 1 {
            interp.collect_items(&args.positional[0])?
        } else {
            args.positional
        };

        let mut best: Option<(Value, Value)> = None;
        for item in items {
            let rank = match &key {
                Some(key) => interp.call_value(key, CallArgs::positional(vec![item.clone()]))?,
                None => item.clone(),
            };
            let replace = match &best {
                None => true,
                Some((best_rank, _)) => interp.compare_values(&rank, best_rank)? == wanted,
            };
            if replace {
                best = Some((rank, item));
            }
        }
        match (best, default) {
            (Some((_, item)), _) => Ok(item),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(RuntimeError::value_error(format!(
                "{name}() arg is an empty sequence"
            ))),
        }
    }

    fn round(_: &mut Interpreter, mut args: CallArgs) -> RuntimeResult<Value> {
        let ndigits = match args.take_keyword("ndigits").or_else(|| args.get(1).cloned()) {
            Some(Value::None) | None => None,
            Some(value) => Some(value.expect_int("round")?),
        };
        match (&args.positional[0], ndigits) {
            (Value::Int(n), _) => Ok(Value::Int(*n)),
            (value, None) => float_to_int(round_half_even(value.expect_float("round")?), "round"),
            (value, Some(digits)) => {
                let x = value.expect_float("round")?;
                let scale = 10f64.powi(digits.clamp(-308, 308) as i32);
                Ok(Value::Float(round_half_even(x * scale) / scale))
            }
        }
    }
}

const ANY_KEYWORD: &[&str] = &["*"];

/// Register a builtin that accepts only the listed keyword arguments.
fn define(
    env: &Environment,
    name: &'static str,
    arity: Arity,
    keywords: &'static [&'static str],
    func: BuiltinImpl,
) {
    let function = Function::builtin(name, arity, move |interp, args| {
        if keywords != ANY_KEYWORD {
            if let Some((keyword, _)) = args
                .keywords
                .iter()
                .find(|(keyword, _)| !keywords.contains(&keyword.as_str()))
            {
                return Err(RuntimeError::UnexpectedKeyword {
                    function: name.to_string(),
                    keyword: keyword.clone(),
                });
            }
        }
        func(interp, args)
    });
    env.define(name, Value::Function(function));
}

fn float_to_int(f: f64, operation: &str) -> RuntimeResult<Value> {
    if !f.is_finite() || f.abs() >= 9.2e18 {
        return Err(RuntimeError::value_error(format!(
            "{operation}(): cannot convert {f} to integer"
        )));
    }
    Ok(Value::Int(f as i64))
}

/// Round to the nearest integer, ties to even.
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

/// Stable sort with an optional key function. Incomparable items fail the
/// whole sort.
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> RuntimeResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let rank = match &key {
            Some(key) if !key.is_none() => {
                interp.call_value(key, CallArgs::positional(vec![item.clone()]))?
            }
            _ => item.clone(),
        };
        keyed.push((rank, item));
    }

    let interp = &*interp;
    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        let ordering = interp.compare_values(a, b).unwrap_or_else(|error| {
            failure.get_or_insert(error);
            Ordering::Equal
        });
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    match failure {
        Some(error) => Err(error),
        None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
    }
}

/// The `math` namespace.
pub struct MathModule;

impl MathModule {
    fn unary(name: &'static str, f: fn(f64) -> f64) -> Value {
        Value::Function(Function::builtin(name, Arity::Fixed(1), move |_, args| {
            args.reject_keywords(name)?;
            Ok(Value::Float(f(args.positional[0].expect_float(name)?)))
        }))
    }

    fn binary(name: &'static str, f: fn(f64, f64) -> f64) -> Value {
        Value::Function(Function::builtin(name, Arity::Fixed(2), move |_, args| {
            args.reject_keywords(name)?;
            let a = args.positional[0].expect_float(name)?;
            let b = args.positional[1].expect_float(name)?;
            Ok(Value::Float(f(a, b)))
        }))
    }

    fn rounding(name: &'static str, f: fn(f64) -> f64) -> Value {
        Value::Function(Function::builtin(name, Arity::Fixed(1), move |_, args| {
            args.reject_keywords(name)?;
            match &args.positional[0] {
                Value::Int(n) => Ok(Value::Int(*n)),
                other => float_to_int(f(other.expect_float(name)?), name),
            }
        }))
    }
}

impl NativeObject for MathModule {
    fn type_name(&self) -> &str {
        "module"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        use std::f64::consts;
        Ok(match name {
            "pi" => Value::Float(consts::PI),
            "tau" => Value::Float(consts::TAU),
            "e" => Value::Float(consts::E),
            "inf" => Value::Float(f64::INFINITY),
            "sqrt" => Value::Function(Function::builtin("sqrt", Arity::Fixed(1), |_, args| {
                args.reject_keywords("sqrt")?;
                let x = args.positional[0].expect_float("sqrt")?;
                if x < 0.0 {
                    return Err(RuntimeError::value_error("math domain error"));
                }
                Ok(Value::Float(x.sqrt()))
            })),
            "sin" => Self::unary("sin", f64::sin),
            "cos" => Self::unary("cos", f64::cos),
            "tan" => Self::unary("tan", f64::tan),
            "atan" => Self::unary("atan", f64::atan),
            "exp" => Self::unary("exp", f64::exp),
            "fabs" => Self::unary("fabs", f64::abs),
            "radians" => Self::unary("radians", f64::to_radians),
            "degrees" => Self::unary("degrees", f64::to_degrees),
            "atan2" => Self::binary("atan2", f64::atan2),
            "hypot" => Self::binary("hypot", f64::hypot),
            "copysign" => Self::binary("copysign", f64::copysign),
            "floor" => Self::rounding("floor", f64::floor),
            "ceil" => Self::rounding("ceil", f64::ceil),
            "log" => Value::Function(Function::builtin("log", Arity::Range(1, 2), |_, args| {
                args.reject_keywords("log")?;
                let x = args.positional[0].expect_float("log")?;
                if x <= 0.0 {
                    return Err(RuntimeError::value_error("math domain error"));
                }
                Ok(Value::Float(match args.get(1) {
                    Some(base) => x.ln() / base.expect_float("log")?.ln(),
                    None => x.ln(),
                }))
            })),
            "isclose" => Value::Function(Function::builtin(
                "isclose",
                Arity::Fixed(2),
                |_, mut args| {
                    let rel_tol = match args.take_keyword("rel_tol") {
                        Some(v) => v.expect_float("isclose")?,
                        None => 1e-9,
                    };
                    let abs_tol = match args.take_keyword("abs_tol") {
                        Some(v) => v.expect_float("isclose")?,
                        None => 0.0,
                    };
                    args.reject_keywords("isclose")?;
                    let a = args.positional[0].expect_float("isclose")?;
                    let b = args.positional[1].expect_float("isclose")?;
                    let tolerance = (rel_tol * a.abs().max(b.abs())).max(abs_tol);
                    Ok(Value::Bool(a == b || (a - b).abs() <= tolerance))
                },
            )),
            _ => return Err(RuntimeError::attribute_not_found("math", name)),
        })
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok("<module 'math'>".to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::runtime::ExecutionBudget;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    fn eval(source: &str) -> String {
        let program = parse(source).expect("parse");
        let mut interp = Interpreter::new(
            StandardLibrary::create_global_environment(),
            &ExecutionBudget::default(),
        );
        match interp.run(&program) {
            Ok(value) => value.map(|v| v.repr()).unwrap_or_else(|| "None".to_string()),
            Err(fault) => format!("{}: {}", fault.kind, fault.message),
        }
    }

    #[test]
    fn test_builtins() {
        let cases = vec![
            ("len('kicad')", "5"),
            ("list(range(3))", "[0, 1, 2]"),
            ("list(range(10, 0, -4))", "[10, 6, 2]"),
            ("int('42')", "42"),
            ("int('ff', 16)", "255"),
            ("int(-2.7)", "-2"),
            ("float('1.5')", "1.5"),
            ("str(None)", "'None'"),
            ("sum([1, 2, 3])", "6"),
            ("sum([0.5, 0.25], 1)", "1.75"),
            ("min(3, 1, 2)", "1"),
            ("max(['a', 'bbb', 'cc'], key=len)", "'bbb'"),
            ("max([], default=0)", "0"),
            ("round(2.5)", "2"),
            ("round(3.5)", "4"),
            ("round(1.23456, 2)", "1.23"),
            ("sorted([3, 1, 2], reverse=True)", "[3, 2, 1]"),
            ("sorted(['bb', 'a', 'ccc'], key=len)", "['a', 'bb', 'ccc']"),
            ("list(enumerate(['x', 'y'], start=1))", "[(1, 'x'), (2, 'y')]"),
            ("list(zip([1, 2, 3], 'ab'))", "[(1, 'a'), (2, 'b')]"),
            ("map(lambda v: v * 2, [1, 2])", "[2, 4]"),
            ("filter(None, [0, 1, '', 'x'])", "[1, 'x']"),
            ("any([0, None, 3])", "True"),
            ("all([])", "True"),
            ("dict([('a', 1)], b=2)", "{'a': 1, 'b': 2}"),
            ("type(1.0)", "'float'"),
            ("getattr('x', 'nope', 7)", "7"),
            ("hasattr([], 'append')", "True"),
            ("math.floor(2.7)", "2"),
            ("math.hypot(3, 4)", "5.0"),
            (
                "list(range(-9223372036854775807, 9223372036854775807, 4611686018427387904))",
                "[-9223372036854775807, -4611686018427387903, 1, 4611686018427387905]",
            ),
            ("4611686018427387904 in range(-9223372036854775807, 9223372036854775807)", "True"),
            ("range(-9223372036854775807, 9223372036854775807, 3)[-1]", "9223372036854775805"),
        ];
        for (source, expected) in cases {
            assert_eq!(eval(source), expected, "{source}");
        }
    }

    #[test]
    fn test_builtin_errors() {
        let cases = vec![
            ("len(5)", "TypeError"),
            ("int('x')", "ValueError"),
            ("min([])", "ValueError"),
            ("range(1, 2, 0)", "ValueError"),
            ("len('a', 'b')", "TypeError"),
            ("len(x='a')", "TypeError"),
            ("sorted([1, 'a'])", "TypeError"),
            ("math.sqrt(-1)", "ValueError"),
        ];
        for (source, kind) in cases {
            let result = eval(source);
            assert!(result.starts_with(kind), "{source} -> {result}");
        }
    }

    #[test]
    fn test_draining_builtins_stop_at_the_deadline() {
        for source in ["sum(range(10**12))", "all(range(1, 10**12))"] {
            let program = parse(source).expect("parse");
            let budget = ExecutionBudget::default().with_timeout(Duration::from_millis(200));
            let mut interp =
                Interpreter::new(StandardLibrary::create_global_environment(), &budget);
            let started = Instant::now();
            let fault = interp.run(&program).unwrap_err();
            assert_eq!(fault.kind, "TimeoutError", "{source}");
            assert!(started.elapsed() < Duration::from_secs(5), "{source}");
        }
    }

    #[test]
    fn test_print_writes_to_the_output_log() {
        let program = parse("print('a', 1, sep='-')\nwarn('careful')\nprint('x', end='')").unwrap();
        let mut interp = Interpreter::new(
            StandardLibrary::create_global_environment(),
            &ExecutionBudget::default(),
        );
        interp.run(&program).unwrap();
        assert_eq!(interp.output().stdout_text(), "a-1\nx");
        assert_eq!(interp.output().stderr_text(), "careful\n");
    }

    #[test]
    fn test_exception_constructors() {
        assert_eq!(eval("ValueError('bad')"), "ValueError('bad')");
        assert_eq!(eval("raise KeyError('missing')"), "KeyError: missing");
    }
}
