use std::any::Any;

use super::error::{RuntimeError, RuntimeResult};
use super::evaluator::Interpreter;
use super::values::{CallArgs, Value};

/// An object supplied by the host and reachable from scripts.
///
/// This is the only way scripts touch anything outside the interpreter: the
/// host binds instances (or callable type objects) into the namespace and
/// the interpreter dispatches attribute access and calls through this trait.
pub trait NativeObject: Any {
    fn type_name(&self) -> &str;

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        Err(RuntimeError::attribute_not_found(self.type_name(), name))
    }

    fn set_attr(&self, name: &str, _value: Value) -> RuntimeResult<()> {
        Err(RuntimeError::read_only(self.type_name(), name))
    }

    /// `obj.name(args)`. The default looks the attribute up and calls it.
    fn call_method(
        &self,
        name: &str,
        args: CallArgs,
        interp: &mut Interpreter,
    ) -> RuntimeResult<Value> {
        let attribute = self.get_attr(name)?;
        interp.call_value(&attribute, args)
    }

    /// `obj(args)`, for type objects acting as constructors.
    fn call(&self, _args: CallArgs, _interp: &mut Interpreter) -> RuntimeResult<Value> {
        Err(RuntimeError::NotCallable {
            type_name: self.type_name().to_string(),
        })
    }

    /// May fail; callers degrade to `<TypeName object>`.
    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("<{} object>", self.type_name()))
    }

    fn equals(&self, _other: &dyn NativeObject) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}
