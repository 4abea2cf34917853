//! KiScript runtime
//!
//! The interpreter, its value model and the builtins. [`run_script`] is the
//! one-call entry point hosts use: parse, execute under a budget and return
//! a thread-safe summary of what happened.

pub mod budget;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod host_interface;
mod methods;
mod operators;
pub mod output;
pub mod stdlib;
pub mod traceback;
pub mod values;

pub use budget::{CancelFlag, ExecutionBudget, DEFAULT_MAX_CALL_DEPTH};
pub use environment::Environment;
pub use error::{RuntimeError, RuntimeResult};
pub use evaluator::{Interpreter, ValueIter};
pub use host_interface::NativeObject;
pub use output::{OutputLog, OutputRecord, OutputStream};
pub use stdlib::{MathModule, StandardLibrary};
pub use traceback::{Fault, TraceFrame, MODULE_FRAME};
pub use values::{Arity, CallArgs, DictKey, Function, RangeValue, Value};

use serde::Serialize;

use crate::parser;

/// A fault as reported to callers, with the traceback already rendered
/// against the script source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultReport {
    pub kind: String,
    pub message: String,
    pub traceback: String,
}

impl FaultReport {
    pub fn new(fault: &Fault, source: &str) -> Self {
        FaultReport {
            kind: fault.kind.clone(),
            message: fault.message.clone(),
            traceback: fault.render(source),
        }
    }
}

/// Everything a host needs after a script run. Owns no interpreter values,
/// so it can cross threads.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub output: OutputLog,
    /// `repr()` of the trailing expression, when it produced a value.
    pub result: Result<Option<String>, FaultReport>,
}

impl ScriptOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Parse and run `source` in `globals`.
///
/// Syntax errors are reported as faults without running anything. The
/// namespace is torn down before this returns.
pub fn run_script(source: &str, globals: Environment, budget: &ExecutionBudget) -> ScriptOutcome {
    let program = match parser::parse(source) {
        Ok(program) => program,
        Err(error) => {
            globals.clear();
            return ScriptOutcome {
                output: OutputLog::new(),
                result: Err(FaultReport::new(&Fault::from_parse(&error), source)),
            };
        }
    };

    let mut interpreter = Interpreter::new(globals, budget);
    let result = interpreter
        .run(&program)
        .map(|value| value.map(|v| v.repr()))
        .map_err(|fault| FaultReport::new(&fault, source));
    ScriptOutcome {
        output: interpreter.take_output(),
        result,
    }
}
