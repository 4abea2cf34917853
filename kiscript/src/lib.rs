//! KiScript: a small, sandboxed, Python-flavoured scripting language.
//!
//! Scripts can only reach what the host binds into their namespace. There
//! is no import system, no file or network access, and every run is bounded
//! by an [`ExecutionBudget`].

pub mod ast;
pub mod parser;
pub mod runtime;

pub use parser::{parse, ParseError};
pub use runtime::{
    run_script, CallArgs, Environment, ExecutionBudget, Fault, FaultReport, Interpreter,
    NativeObject, RuntimeError, RuntimeResult, ScriptOutcome, StandardLibrary, Value,
};
