//! Tree-walking interpreter for KiScript programs.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use super::budget::{Deadline, ExecutionBudget};
use super::environment::Environment;
use super::error::{RuntimeError, RuntimeResult};
use super::format::format_with_spec;
use super::methods;
use super::operators;
use super::output::{OutputLog, OutputStream};
use super::traceback::{Fault, TraceFrame, MODULE_FRAME};
use super::values::{
    Arity, BoundMethod, CallArgs, Closure, DictKey, Function, Nesting, RangeValue, Value,
};
use crate::ast::{
    Argument, BinaryOp, CompareOp, Comprehension, ExceptHandler, Expr, FStringPart, FunctionDef,
    Literal, Program, Stmt, StmtKind, Target,
};

/// How a statement finished.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

// Items yielded between deadline checks.
const ITER_CHECK_INTERVAL: usize = 1024;

/// Iterator over the items of an iterable value.
///
/// Containers are snapshotted when iteration starts, so mutating a list
/// inside its own `for` loop never invalidates the loop. Ranges are lazy;
/// every item is a `Result` so a builtin draining a huge range still stops
/// at the run's deadline.
pub struct ValueIter {
    source: IterSource,
    deadline: Deadline,
    yielded: usize,
}

enum IterSource {
    Range(RangeValue, usize),
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for ValueIter {
    type Item = RuntimeResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = match &mut self.source {
            IterSource::Range(range, index) => {
                let value = range.get(*index)?;
                *index += 1;
                Value::Int(value)
            }
            IterSource::Items(items) => items.next()?,
        };
        self.yielded += 1;
        if self.yielded % ITER_CHECK_INTERVAL == 0 {
            if let Err(error) = self.deadline.check() {
                return Some(Err(error));
            }
        }
        Some(Ok(value))
    }
}

pub struct Interpreter {
    globals: Environment,
    env: Environment,
    deadline: Deadline,
    max_call_depth: usize,
    max_output_bytes: Option<usize>,
    output_truncated: bool,
    output: OutputLog,
    frames: Vec<TraceFrame>,
    /// Call stack captured where the pending error was first raised.
    fault_frames: Option<Vec<TraceFrame>>,
    /// Errors being handled by enclosing `except` blocks, for bare `raise`.
    handling: Vec<RuntimeError>,
    /// Scopes captured by closures; cleared on teardown to break cycles.
    captured: Vec<Environment>,
}

impl Interpreter {
    /// Create an interpreter over `globals`. The budget's clock starts now.
    ///
    /// The interpreter owns the namespace for its lifetime: dropping it
    /// clears `globals` and every scope a closure captured.
    pub fn new(globals: Environment, budget: &ExecutionBudget) -> Self {
        Interpreter {
            env: globals.clone(),
            globals,
            deadline: budget.start(),
            max_call_depth: budget.max_call_depth,
            max_output_bytes: budget.max_output_bytes,
            output_truncated: false,
            output: OutputLog::new(),
            frames: Vec::new(),
            fault_frames: None,
            handling: Vec::new(),
            captured: Vec::new(),
        }
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Run a program to completion.
    ///
    /// Returns the value of a trailing bare expression when it is not
    /// `None`.
    pub fn run(&mut self, program: &Program) -> Result<Option<Value>, Fault> {
        self.frames = vec![TraceFrame {
            function: MODULE_FRAME.to_string(),
            line: program.body.first().map(|stmt| stmt.line).unwrap_or(1),
        }];
        self.fault_frames = None;
        self.env = self.globals.clone();

        let result = self.run_module(program);
        let frames = self.fault_frames.take();
        let outcome = result.map_err(|error| {
            Fault::from_runtime(&error, frames.unwrap_or_else(|| self.frames.clone()))
        });
        self.frames.clear();
        outcome
    }

    fn run_module(&mut self, program: &Program) -> RuntimeResult<Option<Value>> {
        let last = program.body.len().saturating_sub(1);
        for (index, stmt) in program.body.iter().enumerate() {
            if let (true, StmtKind::Expr(expr)) = (index == last, &stmt.kind) {
                let result = self.enter(stmt).and_then(|_| self.eval(expr));
                let value = self.note_fault(result)?;
                return Ok((!value.is_none()).then_some(value));
            }
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                Flow::Break => return Err(misplaced("break", "loop")),
                Flow::Continue => return Err(misplaced("continue", "loop")),
                Flow::Return(_) => return Err(misplaced("return", "function")),
            }
        }
        Ok(None)
    }

    /// Deadline and cancellation check. Runs before every statement, loop
    /// iteration and call.
    pub fn checkpoint(&self) -> RuntimeResult<()> {
        self.deadline.check()
    }

    /// Append script output, honouring the output limit.
    pub fn write(&mut self, stream: OutputStream, text: impl Into<String>) {
        let text = text.into();
        if self.output_truncated {
            return;
        }
        if let Some(limit) = self.max_output_bytes {
            if self.output.total_len() + text.len() > limit {
                self.output_truncated = true;
                self.output.push(
                    OutputStream::Stderr,
                    format!("[output truncated after {limit} bytes]\n"),
                );
                return;
            }
        }
        self.output.push(stream, text);
    }

    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    pub fn take_output(&mut self) -> OutputLog {
        std::mem::take(&mut self.output)
    }

    /// Release every scope this run created. Called on drop.
    pub fn teardown(&mut self) {
        for scope in self.captured.drain(..) {
            scope.clear();
        }
        self.env.clear();
        self.globals.clear();
        self.handling.clear();
    }

    fn enter(&mut self, stmt: &Stmt) -> RuntimeResult<()> {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = stmt.line;
        }
        self.deadline.check()
    }

    fn note_fault<T>(&mut self, result: RuntimeResult<T>) -> RuntimeResult<T> {
        if result.is_err() && self.fault_frames.is_none() {
            self.fault_frames = Some(self.frames.clone());
        }
        result
    }

    // ---- statements ----

    fn exec_block(&mut self, body: &[Stmt]) -> RuntimeResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> RuntimeResult<Flow> {
        let result = self.enter(stmt).and_then(|_| self.exec_kind(&stmt.kind));
        self.note_fault(result)
    }

    fn exec_kind(&mut self, kind: &StmtKind) -> RuntimeResult<Flow> {
        match kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                if let [target] = targets.as_slice() {
                    self.assign(target, value)?;
                } else {
                    let items = unpack(self.collect_items(&value)?, targets.len())?;
                    for (target, item) in targets.iter().zip(items) {
                        self.assign(target, item)?;
                    }
                }
            }
            StmtKind::AugAssign { target, op, value } => self.augmented_assign(target, *op, value)?,
            StmtKind::If { branches, orelse } => {
                for (condition, body) in branches {
                    if self.eval(condition)?.is_truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = orelse {
                    return self.exec_block(body);
                }
            }
            StmtKind::For {
                targets,
                iter,
                body,
            } => {
                let iterable = self.eval(iter)?;
                for item in self.iterate(&iterable)? {
                    let item = item?;
                    self.deadline.check()?;
                    self.bind_names(targets, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            StmtKind::While { condition, body } => loop {
                self.deadline.check()?;
                if !self.eval(condition)?.is_truthy() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            },
            StmtKind::FunctionDef(def) => {
                let function = self.make_closure(def)?;
                self.env.define(&def.name, function);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Raise(value) => return Err(self.raise(value.as_ref())?),
            StmtKind::Try {
                body,
                handlers,
                finally,
            } => return self.exec_try(body, handlers, finally.as_deref()),
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
        }
        Ok(Flow::Normal)
    }

    fn augmented_assign(&mut self, target: &Target, op: BinaryOp, value: &Expr) -> RuntimeResult<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name)?;
                let rhs = self.eval(value)?;
                let updated = self.combine(op, current, rhs)?;
                self.env.define(name, updated);
            }
            Target::Attribute { object, name } => {
                let object = self.eval(object)?;
                let current = self.get_attribute(&object, name)?;
                let rhs = self.eval(value)?;
                let updated = self.combine(op, current, rhs)?;
                self.set_attribute(&object, name, updated)?;
            }
            Target::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                let current = self.get_item(&object, &index)?;
                let rhs = self.eval(value)?;
                let updated = self.combine(op, current, rhs)?;
                self.set_item(&object, index, updated)?;
            }
        }
        Ok(())
    }

    /// `a op= b`. Lists extend in place so aliases see the change.
    fn combine(&mut self, op: BinaryOp, current: Value, rhs: Value) -> RuntimeResult<Value> {
        if let (BinaryOp::Add, Value::List(items)) = (op, &current) {
            let extra = self.collect_items(&rhs)?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        operators::binary(self, op, &current, &rhs)
    }

    fn raise(&mut self, value: Option<&Expr>) -> RuntimeResult<RuntimeError> {
        let Some(expr) = value else {
            return Ok(self.handling.last().cloned().unwrap_or_else(|| RuntimeError::Raised {
                kind: "RuntimeError".to_string(),
                message: "no active exception to re-raise".to_string(),
            }));
        };
        match self.eval(expr)? {
            Value::Exception(error) => Ok((*error).clone()),
            Value::Str(message) => Ok(RuntimeError::Raised {
                kind: "Exception".to_string(),
                message: message.to_string(),
            }),
            other => Err(RuntimeError::type_error(
                "exception or str",
                &other.type_name(),
                "raise",
            )),
        }
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        finally: Option<&[Stmt]>,
    ) -> RuntimeResult<Flow> {
        let outcome = match self.exec_block(body) {
            Err(error) if error.is_catchable() => {
                let handler = handlers.iter().find(|handler| {
                    handler
                        .kind
                        .as_deref()
                        .map_or(true, |kind| error.matches_handler(kind))
                });
                match handler {
                    Some(handler) => {
                        self.fault_frames = None;
                        if let Some(name) = &handler.binding {
                            self.env
                                .define(name, Value::Exception(Rc::new(error.clone())));
                        }
                        self.handling.push(error);
                        let result = self.exec_block(&handler.body);
                        self.handling.pop();
                        result
                    }
                    None => Err(error),
                }
            }
            other => other,
        };

        let Some(finally) = finally else {
            return outcome;
        };
        // A pending fault keeps its original traceback unless the finally
        // block raises one of its own.
        let pending_frames = self.fault_frames.take();
        match self.exec_block(finally)? {
            Flow::Normal => {
                self.fault_frames = pending_frames;
                outcome
            }
            flow => Ok(flow),
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> RuntimeResult<()> {
        match target {
            Target::Name(name) => {
                self.env.define(name, value);
                Ok(())
            }
            Target::Attribute { object, name } => {
                let object = self.eval(object)?;
                self.set_attribute(&object, name, value)
            }
            Target::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.set_item(&object, index, value)
            }
        }
    }

    fn bind_names(&mut self, names: &[String], value: Value) -> RuntimeResult<()> {
        if let [name] = names {
            self.env.define(name, value);
            return Ok(());
        }
        let items = unpack(self.collect_items(&value)?, names.len())?;
        for (name, item) in names.iter().zip(items) {
            self.env.define(name, item);
        }
        Ok(())
    }

    fn make_closure(&mut self, def: &Rc<FunctionDef>) -> RuntimeResult<Value> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(expr) => Some(self.eval(expr)?),
                None => None,
            });
        }
        if !self.captured.iter().any(|scope| scope.ptr_eq(&self.env)) {
            self.captured.push(self.env.clone());
        }
        Ok(Value::Function(Function::Closure(Rc::new(Closure {
            def: def.clone(),
            env: self.env.clone(),
            defaults,
        }))))
    }

    // ---- expressions ----

    pub fn eval(&mut self, expr: &Expr) -> RuntimeResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            Expr::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = DictKey::from_value(&self.eval(key)?)?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::dict(map))
            }
            Expr::FString(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        FStringPart::Text(literal) => text.push_str(literal),
                        FStringPart::Field { expr, spec } => {
                            let value = self.eval(expr)?;
                            match spec {
                                Some(spec) => text.push_str(&format_with_spec(&value, spec)?),
                                None => text.push_str(&value.display()),
                            }
                        }
                    }
                }
                Ok(text.into())
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                operators::unary(*op, &operand)
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                operators::binary(self, *op, &left, &right)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !compare(self, *op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Lambda(def) => self.make_closure(def),
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Attribute { object, name } => {
                let object = self.eval(object)?;
                self.get_attribute(&object, name)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.get_item(&object, &index)
            }
            Expr::Slice {
                object,
                start,
                stop,
            } => {
                let object = self.eval(object)?;
                let start = self.eval_bound(start.as_deref())?;
                let stop = self.eval_bound(stop.as_deref())?;
                slice(&object, start, stop)
            }
            Expr::ListComp(comp) => self.eval_comprehension(comp),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> RuntimeResult<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval_bound(&mut self, bound: Option<&Expr>) -> RuntimeResult<Option<i64>> {
        match bound {
            None => Ok(None),
            Some(expr) => match self.eval(expr)? {
                Value::None => Ok(None),
                value => value.expect_int("slice index").map(Some),
            },
        }
    }

    fn lookup(&self, name: &str) -> RuntimeResult<Value> {
        self.env
            .lookup(name)
            .ok_or_else(|| RuntimeError::UndefinedName {
                name: name.to_string(),
            })
    }

    fn eval_comprehension(&mut self, comp: &Comprehension) -> RuntimeResult<Value> {
        let iterable = self.eval(&comp.iter)?;
        let scope = Environment::with_parent(&self.env);
        let outer = std::mem::replace(&mut self.env, scope);
        let result = self.collect_comprehension(comp, &iterable);
        self.env = outer;
        result.map(Value::list)
    }

    fn collect_comprehension(
        &mut self,
        comp: &Comprehension,
        iterable: &Value,
    ) -> RuntimeResult<Vec<Value>> {
        let mut out = Vec::new();
        'items: for item in self.iterate(iterable)? {
            let item = item?;
            self.deadline.check()?;
            self.bind_names(&comp.targets, item)?;
            for condition in &comp.conditions {
                if !self.eval(condition)?.is_truthy() {
                    continue 'items;
                }
            }
            out.push(self.eval(&comp.element)?);
        }
        Ok(out)
    }

    fn eval_args(&mut self, args: &[Argument]) -> RuntimeResult<CallArgs> {
        let mut call_args = CallArgs::default();
        for arg in args {
            match arg {
                Argument::Positional(expr) => call_args.positional.push(self.eval(expr)?),
                Argument::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    call_args.keywords.push((name.clone(), value));
                }
            }
        }
        Ok(call_args)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Argument]) -> RuntimeResult<Value> {
        if let Expr::Attribute { object, name } = callee {
            let receiver = self.eval(object)?;
            let args = self.eval_args(args)?;
            return self.call_method(&receiver, name, args);
        }
        let function = self.eval(callee)?;
        let args = self.eval_args(args)?;
        self.call_value(&function, args)
    }

    /// Call any callable value: builtins, script functions, bound methods
    /// and callable host objects.
    pub fn call_value(&mut self, callee: &Value, args: CallArgs) -> RuntimeResult<Value> {
        self.deadline.check()?;
        match callee {
            Value::Function(Function::Builtin(builtin)) => {
                args.check_arity(&builtin.name, &builtin.arity)?;
                let func = builtin.func.clone();
                func(self, args)
            }
            Value::Function(Function::Closure(closure)) => self.call_closure(closure, args),
            Value::Function(Function::Method(method)) => {
                self.call_method(&method.receiver, &method.name, args)
            }
            Value::Object(object) => object.clone().call(args, self),
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    /// `receiver.name(args)`.
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: CallArgs,
    ) -> RuntimeResult<Value> {
        match receiver {
            Value::Object(object) => object.clone().call_method(name, args, self),
            Value::Exception(_) | Value::Range(_) => {
                let attribute = self.get_attribute(receiver, name)?;
                self.call_value(&attribute, args)
            }
            _ => methods::call(self, receiver, name, args),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, mut args: CallArgs) -> RuntimeResult<Value> {
        let def = &closure.def;
        if self.frames.len() > self.max_call_depth {
            return Err(RuntimeError::RecursionLimit {
                limit: self.max_call_depth,
            });
        }

        let given = args.positional.len();
        let scope = Environment::with_parent(&closure.env);
        let mut positional = std::mem::take(&mut args.positional).into_iter();
        for (index, param) in def.params.iter().enumerate() {
            let value = if let Some(value) = positional.next() {
                if args.keywords.iter().any(|(name, _)| name == &param.name) {
                    return Err(RuntimeError::type_error(
                        "one value per parameter",
                        &format!("multiple values for '{}'", param.name),
                        &format!("{}()", def.name),
                    ));
                }
                value
            } else if let Some(value) = args.take_keyword(&param.name) {
                value
            } else if let Some(Some(default)) = closure.defaults.get(index) {
                default.clone()
            } else {
                return Err(arity_error(closure, given));
            };
            scope.define(&param.name, value);
        }
        if positional.len() > 0 {
            return Err(arity_error(closure, given));
        }
        args.reject_keywords(&def.name)?;

        self.frames.push(TraceFrame {
            function: def.name.clone(),
            line: def.line,
        });
        let caller = std::mem::replace(&mut self.env, scope);
        let result = self.exec_block(&def.body);
        self.env = caller;
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::None),
            Flow::Break => Err(misplaced("break", "loop")),
            Flow::Continue => Err(misplaced("continue", "loop")),
        }
    }

    // ---- attributes and items ----

    pub fn get_attribute(&self, value: &Value, name: &str) -> RuntimeResult<Value> {
        match value {
            Value::Object(object) => object.get_attr(name),
            Value::Exception(error) => match name {
                "kind" => Ok(error.kind().into()),
                "message" => Ok(error.to_string().into()),
                "args" => Ok(Value::tuple(vec![error.to_string().into()])),
                _ => Err(RuntimeError::attribute_not_found(error.kind(), name)),
            },
            Value::Range(range) => match name {
                "start" => Ok(Value::Int(range.start)),
                "stop" => Ok(Value::Int(range.stop)),
                "step" => Ok(Value::Int(range.step)),
                _ => Err(RuntimeError::attribute_not_found("range", name)),
            },
            _ if methods::has_method(value, name) => {
                Ok(Value::Function(Function::Method(Rc::new(BoundMethod {
                    receiver: value.clone(),
                    name: name.to_string(),
                }))))
            }
            _ => Err(RuntimeError::attribute_not_found(&value.type_name(), name)),
        }
    }

    pub fn set_attribute(&self, target: &Value, name: &str, value: Value) -> RuntimeResult<()> {
        match target {
            Value::Object(object) => object.set_attr(name, value),
            other => Err(RuntimeError::read_only(&other.type_name(), name)),
        }
    }

    pub fn get_item(&self, container: &Value, index: &Value) -> RuntimeResult<Value> {
        match container {
            Value::List(items) => {
                let items = items.borrow();
                let position = normalize_index(index.expect_int("list index")?, items.len())?;
                Ok(items[position].clone())
            }
            Value::Tuple(items) => {
                let position = normalize_index(index.expect_int("tuple index")?, items.len())?;
                Ok(items[position].clone())
            }
            Value::Str(text) => {
                let length = text.chars().count();
                let position = normalize_index(index.expect_int("string index")?, length)?;
                Ok(text
                    .chars()
                    .nth(position)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or(Value::None))
            }
            Value::Range(range) => {
                let position = normalize_index(index.expect_int("range index")?, range.len())?;
                Ok(range.get(position).map(Value::Int).unwrap_or(Value::None))
            }
            Value::Dict(entries) => {
                let key = DictKey::from_value(index)?;
                entries
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| RuntimeError::KeyNotFound { key: index.repr() })
            }
            other => Err(RuntimeError::type_error(
                "subscriptable value",
                &other.type_name(),
                "indexing",
            )),
        }
    }

    pub fn set_item(&self, container: &Value, index: Value, value: Value) -> RuntimeResult<()> {
        match container {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let position =
                    normalize_index(index.expect_int("list assignment index")?, items.len())?;
                items[position] = value;
                Ok(())
            }
            Value::Dict(entries) => {
                let key = DictKey::from_value(&index)?;
                entries.borrow_mut().insert(key, value);
                Ok(())
            }
            other => Err(RuntimeError::type_error(
                "list or dict",
                &other.type_name(),
                "item assignment",
            )),
        }
    }

    /// Iterate any iterable value.
    pub fn iterate(&self, value: &Value) -> RuntimeResult<ValueIter> {
        let source = match value {
            Value::Range(range) => IterSource::Range(*range, 0),
            other => IterSource::Items(self.snapshot(other)?.into_iter()),
        };
        Ok(ValueIter {
            source,
            deadline: self.deadline.clone(),
            yielded: 0,
        })
    }

    /// Every item of an iterable, collected.
    pub fn collect_items(&self, value: &Value) -> RuntimeResult<Vec<Value>> {
        self.iterate(value)?.collect()
    }

    /// `left == right` for scripts: nesting deeper than the call depth
    /// limit is a `RecursionError`, and long walks honour the deadline.
    pub fn values_equal(&self, left: &Value, right: &Value) -> RuntimeResult<bool> {
        left.equals_within(right, &mut self.nesting())
    }

    /// Ordering for scripts, bounded like [`Interpreter::values_equal`].
    pub fn compare_values(&self, left: &Value, right: &Value) -> RuntimeResult<Ordering> {
        left.compare_within(right, &mut self.nesting())
    }

    fn nesting(&self) -> Nesting<'_> {
        Nesting::new(self.max_call_depth, Some(&self.deadline))
    }

    fn snapshot(&self, value: &Value) -> RuntimeResult<Vec<Value>> {
        Ok(match value {
            Value::List(items) => items.borrow().clone(),
            Value::Tuple(items) => items.to_vec(),
            Value::Dict(entries) => entries.borrow().keys().map(DictKey::to_value).collect(),
            Value::Str(text) => text.chars().map(|c| Value::from(c.to_string())).collect(),
            other => {
                return Err(RuntimeError::type_error(
                    "iterable",
                    &other.type_name(),
                    "iteration",
                ))
            }
        })
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::from(s.as_str()),
    }
}

fn misplaced(statement: &'static str, context: &'static str) -> RuntimeError {
    RuntimeError::Misplaced { statement, context }
}

fn arity_error(closure: &Closure, given: usize) -> RuntimeError {
    let total = closure.def.params.len();
    let required = closure.defaults.iter().filter(|d| d.is_none()).count();
    let expected = if required == total {
        Arity::Fixed(total)
    } else {
        Arity::Range(required, total)
    };
    RuntimeError::ArityMismatch {
        function: closure.def.name.clone(),
        expected: expected.to_string(),
        actual: given,
    }
}

fn compare(interp: &Interpreter, op: CompareOp, left: &Value, right: &Value) -> RuntimeResult<bool> {
    Ok(match op {
        CompareOp::Eq => interp.values_equal(left, right)?,
        CompareOp::NotEq => !interp.values_equal(left, right)?,
        CompareOp::Lt => interp.compare_values(left, right)? == Ordering::Less,
        CompareOp::LtE => interp.compare_values(left, right)? != Ordering::Greater,
        CompareOp::Gt => interp.compare_values(left, right)? == Ordering::Greater,
        CompareOp::GtE => interp.compare_values(left, right)? != Ordering::Less,
        CompareOp::In => operators::contains(interp, right, left)?,
        CompareOp::NotIn => !operators::contains(interp, right, left)?,
        CompareOp::Is => left.is_same(right),
        CompareOp::IsNot => !left.is_same(right),
    })
}

fn unpack(items: Vec<Value>, expected: usize) -> RuntimeResult<Vec<Value>> {
    if items.len() != expected {
        return Err(RuntimeError::value_error(format!(
            "expected {expected} values to unpack, got {}",
            items.len()
        )));
    }
    Ok(items)
}

/// Resolve a possibly negative index against `length`.
pub(crate) fn normalize_index(index: i64, length: usize) -> RuntimeResult<usize> {
    let (wide, len) = (index as i128, length as i128);
    let resolved = if wide < 0 { wide + len } else { wide };
    if resolved < 0 || resolved >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, length });
    }
    Ok(resolved as usize)
}

fn slice_bounds(start: Option<i64>, stop: Option<i64>, length: usize) -> (usize, usize) {
    let clamp = |bound: i64| -> usize {
        let resolved = if bound < 0 { bound + length as i64 } else { bound };
        resolved.clamp(0, length as i64) as usize
    };
    let start = start.map(clamp).unwrap_or(0);
    let stop = stop.map(clamp).unwrap_or(length);
    (start, stop.max(start))
}

fn slice(value: &Value, start: Option<i64>, stop: Option<i64>) -> RuntimeResult<Value> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let (from, to) = slice_bounds(start, stop, items.len());
            Ok(Value::list(items[from..to].to_vec()))
        }
        Value::Tuple(items) => {
            let (from, to) = slice_bounds(start, stop, items.len());
            Ok(Value::tuple(items[from..to].to_vec()))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let (from, to) = slice_bounds(start, stop, chars.len());
            Ok(Value::from(chars[from..to].iter().collect::<String>()))
        }
        other => Err(RuntimeError::type_error(
            "sequence",
            &other.type_name(),
            "slicing",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (Result<Option<Value>, Fault>, String) {
        let program = parse(source).expect("parse");
        let globals = crate::runtime::StandardLibrary::create_global_environment();
        let mut interp = Interpreter::new(globals, &ExecutionBudget::default());
        let result = interp.run(&program);
        (result, interp.output().stdout_text())
    }

    fn value_of(source: &str) -> Value {
        run(source).0.expect("run").unwrap_or(Value::None)
    }

    #[test]
    fn test_trailing_expression_is_the_result() {
        assert_eq!(value_of("x = 2\nx * 21"), Value::Int(42));
        assert_eq!(run("x = 1").0, Ok(None));
        assert_eq!(run("print('hi')").0, Ok(None));
    }

    #[test]
    fn test_closures_capture_their_scope() {
        let source = r#"
def counter(start) {
    total = [start]
    def bump(n=1) {
        total[0] += n
        return total[0]
    }
    return bump
}
c = counter(10)
c()
c(5)
"#;
        assert_eq!(value_of(source), Value::Int(16));
    }

    #[test]
    fn test_loops_and_control_flow() {
        let source = r#"
found = None
for i in range(10) {
    if i % 2 == 0 { continue }
    if i > 6 { found = i; break }
}
n = 0
while True { n += 1; if n == 3 { break } }
(found, n)
"#;
        assert_eq!(value_of(source), Value::tuple(vec![Value::Int(7), Value::Int(3)]));
    }

    #[test]
    fn test_try_except_finally() {
        let source = r#"
log = []
try {
    x = 1 / 0
} except ZeroDivisionError as e {
    log.append(e.kind)
} finally {
    log.append("done")
}
try { raise ValueError("bad value") } except Exception as e { log.append(str(e)) }
log
"#;
        assert_eq!(
            value_of(source).repr(),
            "['ZeroDivisionError', 'done', 'bad value']"
        );
    }

    #[test]
    fn test_unhandled_error_records_call_stack() {
        let source = "def inner() {\n    return missing\n}\ndef outer() {\n    return inner()\n}\nouter()";
        let fault = run(source).0.unwrap_err();
        assert_eq!(fault.kind, "NameError");
        let trail: Vec<(String, usize)> = fault
            .frames
            .iter()
            .map(|f| (f.function.clone(), f.line))
            .collect();
        assert_eq!(
            trail,
            vec![
                ("<module>".to_string(), 7),
                ("outer".to_string(), 5),
                ("inner".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_recursion_limit() {
        let program = parse("def f(n) { return f(n + 1) }\nf(0)").unwrap();
        let globals = Environment::new();
        let budget = ExecutionBudget::default().with_max_call_depth(20);
        let mut interp = Interpreter::new(globals, &budget);
        let fault = interp.run(&program).unwrap_err();
        assert_eq!(fault.kind, "RecursionError");
    }

    #[test]
    fn test_self_referencing_containers() {
        let cycles = "a = []; a.append(a); b = []; b.append(b)\n";
        let cases = vec![
            ("a == b", "RecursionError"),
            ("a != b", "RecursionError"),
            ("[a] < [b]", "RecursionError"),
            ("a in [b]", "RecursionError"),
            ("[b].index(a)", "RecursionError"),
        ];
        for (expr, kind) in cases {
            let fault = run(&format!("{cycles}{expr}")).0.unwrap_err();
            assert_eq!(fault.kind, kind, "{expr}");
        }
        assert_eq!(value_of(&format!("{cycles}(a == a, a is b)")).repr(), "(True, False)");
        let nested = format!("{}...{}", "[".repeat(33), "]".repeat(33));
        assert_eq!(value_of(&format!("{cycles}repr(a)")), Value::from(nested));
    }

    #[test]
    fn test_repr_of_a_doubling_cycle_is_capped() {
        let source = "a = []; a.append(a); a.append(a)\ns = str(a)\n(len(s), s.endswith('...'))";
        assert_eq!(value_of(source).repr(), "(1048579, True)");
    }

    #[test]
    fn test_comprehension_scope_does_not_leak() {
        let source = "x = 'outer'\nsquares = [x * x for x in range(4) if x != 2]\n(x, squares)";
        assert_eq!(value_of(source).repr(), "('outer', [0, 1, 9])");
    }

    #[test]
    fn test_output_limit_marks_truncation_once() {
        let program = parse("for i in range(100) { print('0123456789') }").unwrap();
        let globals = crate::runtime::StandardLibrary::create_global_environment();
        let budget = ExecutionBudget::default().with_max_output_bytes(30);
        let mut interp = Interpreter::new(globals, &budget);
        interp.run(&program).unwrap();
        assert_eq!(interp.output().stdout_text(), "0123456789\n0123456789\n");
        assert_eq!(
            interp.output().stderr_text(),
            "[output truncated after 30 bytes]\n"
        );
    }

    #[test]
    fn test_misplaced_break() {
        let fault = run("break").0.unwrap_err();
        assert_eq!(fault.kind, "SyntaxError");
    }

    #[test]
    fn test_slicing_and_negative_indexes() {
        assert_eq!(value_of("'kicad'[1:-1]"), Value::from("ica"));
        assert_eq!(value_of("[1, 2, 3][-1]"), Value::Int(3));
        assert_eq!(value_of("[1, 2, 3][5:]").repr(), "[]");
    }
}
