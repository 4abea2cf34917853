use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use super::budget::{Deadline, DEFAULT_MAX_CALL_DEPTH};
use super::environment::Environment;
use super::error::{RuntimeError, RuntimeResult};
use super::evaluator::Interpreter;
use super::format::{format_float, quote_str};
use super::host_interface::NativeObject;
use crate::ast::FunctionDef;

// Containers nested deeper than this print as `...`.
const MAX_REPR_DEPTH: usize = 32;
// A repr stops growing past this many bytes and ends in `...`.
const MAX_REPR_BYTES: usize = 1 << 20;
// Container pairs visited between deadline checks in a structural walk.
const WALK_CHECK_INTERVAL: usize = 1024;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<IndexMap<DictKey, Value>>>),
    Range(RangeValue),
    Function(Function),
    Object(Rc<dyn NativeObject>),
    /// An error caught by `except ... as name`.
    Exception(Rc<RuntimeError>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(items.into())
    }

    pub fn dict(entries: IndexMap<DictKey, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    pub fn object(object: impl NativeObject) -> Self {
        Value::Object(Rc::new(object))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Tuple(_) => "tuple".to_string(),
            Value::Dict(_) => "dict".to_string(),
            Value::Range(_) => "range".to_string(),
            Value::Function(Function::Builtin(_)) => "builtin_function".to_string(),
            Value::Function(Function::Closure(_)) => "function".to_string(),
            Value::Function(Function::Method(_)) => "method".to_string(),
            Value::Object(object) => object.type_name().to_string(),
            Value::Exception(error) => error.kind().to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Range(range) => range.len() > 0,
            _ => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The `repr()` of a value. Host objects whose representation fails
    /// degrade to `<TypeName object>`. Very large or deeply nested
    /// containers are cut short with `...`.
    pub fn repr(&self) -> String {
        let mut writer = ReprWriter::default();
        self.write_repr(&mut writer, 0);
        writer.finish()
    }

    fn write_repr(&self, w: &mut ReprWriter, depth: usize) {
        if w.full {
            return;
        }
        if depth > MAX_REPR_DEPTH {
            w.push("...");
            return;
        }
        match self {
            Value::List(items) => w.sequence("[", "]", items.borrow().iter(), depth),
            Value::Tuple(items) if items.len() == 1 => {
                w.push("(");
                items[0].write_repr(w, depth + 1);
                w.push(",)");
            }
            Value::Tuple(items) => w.sequence("(", ")", items.iter(), depth),
            Value::Dict(entries) => {
                w.push("{");
                for (index, (key, value)) in entries.borrow().iter().enumerate() {
                    if w.full {
                        break;
                    }
                    if index > 0 {
                        w.push(", ");
                    }
                    key.to_value().write_repr(w, depth + 1);
                    w.push(": ");
                    value.write_repr(w, depth + 1);
                }
                w.push("}");
            }
            scalar => w.push(&scalar.scalar_repr()),
        }
    }

    fn scalar_repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => quote_str(s),
            Value::Range(range) => range.to_string(),
            Value::Function(function) => function.to_string(),
            Value::Object(object) => object
                .repr()
                .unwrap_or_else(|_| format!("<{} object>", object.type_name())),
            Value::Exception(error) => format!("{}({})", error.kind(), quote_str(&error.to_string())),
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) => format!("<{}>", self.type_name()),
        }
    }

    /// The `str()` of a value.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(error) => error.to_string(),
            other => other.repr(),
        }
    }

    /// Structural equality with the default nesting limit and no deadline.
    /// Comparisons that hit the limit count as unequal; scripts go through
    /// [`Interpreter::values_equal`], which reports them instead.
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_within(other, &mut Nesting::new(DEFAULT_MAX_CALL_DEPTH, None))
            .unwrap_or(false)
    }

    pub(crate) fn equals_within(&self, other: &Value, nesting: &mut Nesting) -> RuntimeResult<bool> {
        Ok(match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b)
                    || nesting.within(|n| sequences_equal(&a.borrow(), &b.borrow(), n))?
            }
            (Value::Tuple(a), Value::Tuple(b)) => nesting.within(|n| sequences_equal(a, b, n))?,
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b) || nesting.within(|n| dicts_equal(&a.borrow(), &b.borrow(), n))?
            }
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || a.equals(&**b),
            (Value::Function(a), Value::Function(b)) => a.same_as(b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        })
    }

    /// Identity comparison used by `is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || a.equals(&**b),
            (Value::Function(a), Value::Function(b)) => a.same_as(b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering used by `<`, `sorted`, `min` and `max`, with the default
    /// nesting limit and no deadline.
    pub fn compare(&self, other: &Value) -> RuntimeResult<Ordering> {
        self.compare_within(other, &mut Nesting::new(DEFAULT_MAX_CALL_DEPTH, None))
    }

    pub(crate) fn compare_within(
        &self,
        other: &Value,
        nesting: &mut Nesting,
    ) -> RuntimeResult<Ordering> {
        let unsupported = || {
            RuntimeError::type_error(
                "comparable values",
                &format!("{} and {}", self.type_name(), other.type_name()),
                "ordering comparison",
            )
        };
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) if Rc::ptr_eq(a, b) => Ok(Ordering::Equal),
            (Value::List(a), Value::List(b)) => {
                nesting.within(|n| compare_sequences(&a.borrow(), &b.borrow(), n))
            }
            (Value::Tuple(a), Value::Tuple(b)) => nesting.within(|n| compare_sequences(a, b, n)),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(unsupported),
                _ => Err(unsupported()),
            },
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn expect_int(&self, operation: &str) -> RuntimeResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Bool(b) => Ok(*b as i64),
            other => Err(RuntimeError::type_error("int", &other.type_name(), operation)),
        }
    }

    /// Numbers coerce to float; anything else is a type error.
    pub fn expect_float(&self, operation: &str) -> RuntimeResult<f64> {
        self.as_number()
            .ok_or_else(|| RuntimeError::type_error("number", &self.type_name(), operation))
    }

    pub fn expect_str(&self, operation: &str) -> RuntimeResult<Rc<str>> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => Err(RuntimeError::type_error("str", &other.type_name(), operation)),
        }
    }

    pub fn expect_bool(&self, operation: &str) -> RuntimeResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::type_error("bool", &other.type_name(), operation)),
        }
    }

    pub fn as_object(&self) -> Option<&Rc<dyn NativeObject>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow a host object of a concrete type.
    pub fn downcast<T: NativeObject>(&self) -> Option<&T> {
        self.as_object()
            .and_then(|object| object.as_any().downcast_ref::<T>())
    }
}

/// Limits for a structural walk over nested containers: a depth bound and,
/// inside a script run, the run's deadline.
pub(crate) struct Nesting<'a> {
    max_depth: usize,
    depth: usize,
    visited: usize,
    deadline: Option<&'a Deadline>,
}

impl<'a> Nesting<'a> {
    pub(crate) fn new(max_depth: usize, deadline: Option<&'a Deadline>) -> Self {
        Self {
            max_depth,
            depth: 0,
            visited: 0,
            deadline,
        }
    }

    /// Run `walk` one container level deeper.
    fn within<T>(&mut self, walk: impl FnOnce(&mut Self) -> RuntimeResult<T>) -> RuntimeResult<T> {
        if self.depth >= self.max_depth {
            return Err(RuntimeError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        self.visited += 1;
        if self.visited % WALK_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                deadline.check()?;
            }
        }
        self.depth += 1;
        let result = walk(self);
        self.depth -= 1;
        result
    }
}

fn sequences_equal(a: &[Value], b: &[Value], nesting: &mut Nesting) -> RuntimeResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b.iter()) {
        if !x.equals_within(y, nesting)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn dicts_equal(
    a: &IndexMap<DictKey, Value>,
    b: &IndexMap<DictKey, Value>,
    nesting: &mut Nesting,
) -> RuntimeResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (key, value) in a {
        match b.get(key) {
            Some(other) if value.equals_within(other, nesting)? => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn compare_sequences(a: &[Value], b: &[Value], nesting: &mut Nesting) -> RuntimeResult<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare_within(y, nesting)? {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Accumulates a repr until it reaches [`MAX_REPR_BYTES`].
#[derive(Default)]
struct ReprWriter {
    out: String,
    full: bool,
}

impl ReprWriter {
    fn push(&mut self, text: &str) {
        if self.full {
            return;
        }
        self.out.push_str(text);
        self.full = self.out.len() >= MAX_REPR_BYTES;
    }

    fn sequence<'v>(
        &mut self,
        open: &str,
        close: &str,
        items: impl Iterator<Item = &'v Value>,
        depth: usize,
    ) {
        self.push(open);
        for (index, item) in items.enumerate() {
            if self.full {
                break;
            }
            if index > 0 {
                self.push(", ");
            }
            item.write_repr(self, depth + 1);
        }
        self.push(close);
    }

    fn finish(mut self) -> String {
        if self.full {
            let mut cut = MAX_REPR_BYTES.min(self.out.len());
            while !self.out.is_char_boundary(cut) {
                cut -= 1;
            }
            self.out.truncate(cut);
            self.out.push_str("...");
        }
        self.out
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::None)
    }
}

/// Hashable projection of a value, used for dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Rc<str>),
    Tuple(Vec<DictKey>),
}

impl DictKey {
    pub fn from_value(value: &Value) -> RuntimeResult<Self> {
        Ok(match value {
            Value::None => DictKey::None,
            Value::Bool(b) => DictKey::Bool(*b),
            Value::Int(n) => DictKey::Int(*n),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => DictKey::Int(*f as i64),
            Value::Float(f) => DictKey::Float(OrderedFloat(*f)),
            Value::Str(s) => DictKey::Str(s.clone()),
            Value::Tuple(items) => DictKey::Tuple(
                items
                    .iter()
                    .map(DictKey::from_value)
                    .collect::<RuntimeResult<Vec<_>>>()?,
            ),
            other => {
                return Err(RuntimeError::type_error(
                    "hashable value",
                    &other.type_name(),
                    "dict key",
                ))
            }
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            DictKey::None => Value::None,
            DictKey::Bool(b) => Value::Bool(*b),
            DictKey::Int(n) => Value::Int(*n),
            DictKey::Float(f) => Value::Float(f.into_inner()),
            DictKey::Str(s) => Value::Str(s.clone()),
            DictKey::Tuple(items) => Value::tuple(items.iter().map(DictKey::to_value).collect()),
        }
    }
}

impl From<&str> for DictKey {
    fn from(s: &str) -> Self {
        DictKey::Str(Rc::from(s))
    }
}

/// Lazy integer range produced by `range()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let count = if step > 0 && start < stop {
            (stop - start + step - 1) / step
        } else if step < 0 && start > stop {
            (start - stop - step - 1) / (-step)
        } else {
            0
        };
        count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        // In range, so the value lies between start and stop.
        i64::try_from(self.start as i128 + self.step as i128 * index as i128).ok()
    }

    pub fn contains(&self, n: i64) -> bool {
        let in_bounds = if self.step > 0 {
            n >= self.start && n < self.stop
        } else {
            n <= self.start && n > self.stop
        };
        in_bounds && (n as i128 - self.start as i128) % self.step as i128 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> {
        let range = *self;
        (0..range.len()).map_while(move |i| range.get(i))
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "range({}, {})", self.start, self.stop)
        } else {
            write!(f, "range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic(usize), // Minimum number of arguments
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => count == *n,
            Arity::Variadic(min) => count >= *min,
            Arity::Range(min, max) => count >= *min && count <= *max,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{n}"),
            Arity::Variadic(min) => write!(f, "at least {min}"),
            Arity::Range(min, max) => write!(f, "from {min} to {max}"),
        }
    }
}

/// Arguments of one call: positional values plus `name=value` pairs.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        CallArgs {
            positional: values,
            keywords: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(index).1)
    }

    pub fn check_arity(&self, function: &str, arity: &Arity) -> RuntimeResult<()> {
        if arity.accepts(self.positional.len()) {
            Ok(())
        } else {
            Err(RuntimeError::ArityMismatch {
                function: function.to_string(),
                expected: arity.to_string(),
                actual: self.positional.len(),
            })
        }
    }

    /// Fails on any keyword argument that was not taken.
    pub fn reject_keywords(&self, function: &str) -> RuntimeResult<()> {
        match self.keywords.first() {
            Some((keyword, _)) => Err(RuntimeError::UnexpectedKeyword {
                function: function.to_string(),
                keyword: keyword.clone(),
            }),
            None => Ok(()),
        }
    }
}

pub type BuiltinFn = Rc<dyn Fn(&mut Interpreter, CallArgs) -> RuntimeResult<Value>>;

pub struct BuiltinFunction {
    pub name: String,
    pub arity: Arity,
    pub func: BuiltinFn,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A user-defined function or lambda with its defining scope.
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: Environment,
    pub defaults: Vec<Option<Value>>,
}

/// A method looked up on a value but not yet called, e.g. `f = items.append`.
pub struct BoundMethod {
    pub receiver: Value,
    pub name: String,
}

#[derive(Clone)]
pub enum Function {
    Builtin(Rc<BuiltinFunction>),
    Closure(Rc<Closure>),
    Method(Rc<BoundMethod>),
}

impl Function {
    pub fn builtin(
        name: &str,
        arity: Arity,
        func: impl Fn(&mut Interpreter, CallArgs) -> RuntimeResult<Value> + 'static,
    ) -> Self {
        Function::Builtin(Rc::new(BuiltinFunction {
            name: name.to_string(),
            arity,
            func: Rc::new(func),
        }))
    }

    pub fn name(&self) -> String {
        match self {
            Function::Builtin(b) => b.name.clone(),
            Function::Closure(c) => c.def.name.clone(),
            Function::Method(m) => format!("{}.{}", m.receiver.type_name(), m.name),
        }
    }

    fn same_as(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Builtin(a), Function::Builtin(b)) => Rc::ptr_eq(a, b),
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            (Function::Method(a), Function::Method(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin(b) => write!(f, "<built-in function {}>", b.name),
            Function::Closure(c) => write!(f, "<function {}>", c.def.name),
            Function::Method(m) => {
                write!(f, "<bound method {}.{}>", m.receiver.type_name(), m.name)
            }
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_repr() {
        let mut entries = IndexMap::new();
        entries.insert(DictKey::from("a"), Value::Int(1));
        let cases = vec![
            (Value::None, "None"),
            (Value::Bool(true), "True"),
            (Value::Int(4), "4"),
            (Value::Float(2.5), "2.5"),
            (Value::Float(3.0), "3.0"),
            (Value::from("it's"), "\"it's\""),
            (Value::from("hi"), "'hi'"),
            (Value::list(vec![Value::Int(1), Value::from("x")]), "[1, 'x']"),
            (Value::tuple(vec![Value::Int(1)]), "(1,)"),
            (Value::dict(entries), "{'a': 1}"),
            (
                Value::Range(RangeValue {
                    start: 0,
                    stop: 5,
                    step: 1,
                }),
                "range(0, 5)",
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(value.repr(), expected);
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Float(0.1).is_truthy());
    }

    #[test]
    fn test_numeric_equality_and_ordering() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
        assert!(Value::from("a").compare(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_range_len_and_contains() {
        let cases = vec![
            ((0, 10, 1), 10),
            ((0, 10, 3), 4),
            ((10, 0, -2), 5),
            ((5, 5, 1), 0),
            ((5, 0, 1), 0),
        ];
        for ((start, stop, step), len) in cases {
            let range = RangeValue { start, stop, step };
            assert_eq!(range.len(), len, "{range}");
            assert_eq!(range.iter().count(), len);
        }
        let range = RangeValue {
            start: 10,
            stop: 0,
            step: -2,
        };
        assert!(range.contains(4));
        assert!(!range.contains(5));
        assert!(!range.contains(0));
    }

    #[test]
    fn test_extreme_ranges_do_not_overflow() {
        let wide = RangeValue {
            start: -i64::MAX,
            stop: i64::MAX,
            step: 1 << 62,
        };
        assert_eq!(
            wide.iter().collect::<Vec<_>>(),
            vec![-i64::MAX, -(1 << 62) + 1, 1, (1 << 62) + 1]
        );
        assert_eq!(wide.get(4), None);
        let full = RangeValue {
            start: -i64::MAX,
            stop: i64::MAX,
            step: 1,
        };
        assert!(full.contains(1 << 62));
        assert!(full.contains(-i64::MAX));
        assert!(!full.contains(i64::MAX));
        let down = RangeValue {
            start: i64::MAX,
            stop: i64::MIN,
            step: -(1 << 62),
        };
        assert_eq!(down.len(), 4);
        assert_eq!(down.get(3), Some(i64::MAX - (1 << 62) - (1 << 62) - (1 << 62)));
    }

    #[test]
    fn test_cyclic_lists_compare_without_overflowing() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        for cycle in [&a, &b] {
            if let Value::List(items) = cycle {
                items.borrow_mut().push(cycle.clone());
            }
        }
        assert!(a.equals(&a));
        assert!(!a.equals(&b));
        assert_eq!(
            a.compare(&b),
            Err(RuntimeError::RecursionLimit {
                limit: DEFAULT_MAX_CALL_DEPTH
            })
        );
        assert!(a.repr().starts_with("[[[[") && a.repr().contains("..."));
        for cycle in [&a, &b] {
            if let Value::List(items) = cycle {
                items.borrow_mut().clear();
            }
        }
    }

    #[test]
    fn test_dict_key_normalizes_integral_floats() {
        assert_eq!(
            DictKey::from_value(&Value::Float(1.0)).unwrap(),
            DictKey::Int(1)
        );
        assert!(DictKey::from_value(&Value::list(vec![])).is_err());
    }
}
