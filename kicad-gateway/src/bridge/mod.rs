//! Bridge table: the names a KiCad script can reach.
//!
//! Scripts see the KiScript builtins plus exactly the bindings listed in
//! [`bindings()`]. Each binding carries the metadata the resource catalog
//! publishes, so the documented surface and the bound one come from the
//! same table.

pub mod board;
pub mod enums;
pub mod geometry;
pub mod items;

use std::rc::Rc;

use kiscript::runtime::{Arity, Function};
use kiscript::{
    CallArgs, Environment, Interpreter, NativeObject, RuntimeError, RuntimeResult,
    StandardLibrary, Value,
};

use crate::session::SessionLease;

/// Documented member of a bound object (method or attribute).
#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub signature: &'static str,
    pub summary: &'static str,
}

/// One name bound into every execution namespace.
pub struct Binding {
    pub name: &'static str,
    pub signature: &'static str,
    pub summary: &'static str,
    /// Members of the object the binding yields, for documentation.
    pub members: &'static [Member],
    build: fn(&Rc<SessionLease>) -> Value,
}

impl Binding {
    pub fn build(&self, lease: &Rc<SessionLease>) -> Value {
        (self.build)(lease)
    }
}

static BINDINGS: &[Binding] = &[
    Binding {
        name: "KiCad",
        signature: "KiCad()",
        summary: "Connection to the running KiCad instance. `KiCad().get_board()` returns the open board.",
        members: board::KICAD_MEMBERS,
        build: board::kicad_type,
    },
    Binding {
        name: "get_board",
        signature: "get_board() -> Board",
        summary: "Shortcut for `KiCad().get_board()`.",
        members: board::BOARD_MEMBERS,
        build: board::get_board_function,
    },
    Binding {
        name: "Vector2",
        signature: "Vector2(x=0, y=0)",
        summary: "Immutable point in nanometres.",
        members: geometry::VECTOR2_MEMBERS,
        build: geometry::vector2_type,
    },
    Binding {
        name: "Angle",
        signature: "Angle(degrees=0)",
        summary: "Immutable rotation in degrees.",
        members: geometry::ANGLE_MEMBERS,
        build: geometry::angle_type,
    },
    Binding {
        name: "Footprint",
        signature: "Footprint(reference=..., value=..., position=..., orientation=..., layer=..., locked=...)",
        summary: "New footprint without pads. Existing footprints come from `board.get_footprints()`.",
        members: items::FOOTPRINT_MEMBERS,
        build: items::footprint_type,
    },
    Binding {
        name: "Track",
        signature: "Track(start=..., end=..., width=..., layer=..., net=..., locked=...)",
        summary: "New track segment; default width 0.25 mm on BL_F_Cu.",
        members: items::TRACK_MEMBERS,
        build: items::track_type,
    },
    Binding {
        name: "Via",
        signature: "Via(position=..., diameter=..., drill_diameter=..., type=..., net=..., locked=...)",
        summary: "New via; defaults to a 0.8 mm / 0.4 mm through via.",
        members: items::VIA_MEMBERS,
        build: items::via_type,
    },
    Binding {
        name: "Zone",
        signature: "Zone(name=..., layer=..., net=..., priority=..., outline=..., filled=...)",
        summary: "New copper zone; the outline needs at least three points.",
        members: items::ZONE_MEMBERS,
        build: items::zone_type,
    },
    Binding {
        name: "BoardLayer",
        signature: "BoardLayer.BL_F_Cu, BoardLayer.BL_B_Cu, ...",
        summary: "Board layers: BL_F_Cu, BL_In1_Cu..BL_In4_Cu, BL_B_Cu, BL_F_SilkS, BL_B_SilkS, BL_F_Mask, BL_B_Mask, BL_Edge_Cuts.",
        members: &[],
        build: enums::board_layer_type,
    },
    Binding {
        name: "ViaType",
        signature: "ViaType.VT_THROUGH, ViaType.VT_BLIND_BURIED, ViaType.VT_MICRO",
        summary: "Via kinds.",
        members: &[],
        build: enums::via_type_enum,
    },
    Binding {
        name: "from_mm",
        signature: "from_mm(mm) -> int",
        summary: "Millimetres to nanometres (rounded).",
        members: &[],
        build: geometry::from_mm_function,
    },
    Binding {
        name: "to_mm",
        signature: "to_mm(nm) -> float",
        summary: "Nanometres to millimetres.",
        members: &[],
        build: geometry::to_mm_function,
    },
    Binding {
        name: "from_mils",
        signature: "from_mils(mils) -> int",
        summary: "Mils (thousandths of an inch) to nanometres (rounded).",
        members: &[],
        build: geometry::from_mils_function,
    },
    Binding {
        name: "to_mils",
        signature: "to_mils(nm) -> float",
        summary: "Nanometres to mils.",
        members: &[],
        build: geometry::to_mils_function,
    },
];

/// Every name the bridge binds, in documentation order.
pub fn bindings() -> &'static [Binding] {
    BINDINGS
}

/// Fresh namespace for one request: builtins plus the bridge table, all
/// board access going through `lease`.
pub fn build_namespace(lease: &Rc<SessionLease>) -> Environment {
    let globals = StandardLibrary::create_global_environment();
    for binding in bindings() {
        globals.define(binding.name, binding.build(lease));
    }
    globals
}

pub(crate) type StaticMethod = fn(&mut Interpreter, CallArgs) -> RuntimeResult<Value>;

/// A bound type: optional constructor plus static methods such as
/// `Vector2.from_xy_mm`.
pub(crate) struct TypeObject {
    name: &'static str,
    constructor: Option<StaticMethod>,
    statics: &'static [(&'static str, StaticMethod)],
}

impl TypeObject {
    pub(crate) fn value(
        name: &'static str,
        constructor: Option<StaticMethod>,
        statics: &'static [(&'static str, StaticMethod)],
    ) -> Value {
        Value::object(TypeObject {
            name,
            constructor,
            statics,
        })
    }

    fn find(&self, name: &str) -> Option<StaticMethod> {
        self.statics
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, method)| *method)
    }
}

impl NativeObject for TypeObject {
    fn type_name(&self) -> &str {
        "type"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        let method = self
            .find(name)
            .ok_or_else(|| RuntimeError::attribute_not_found(self.name, name))?;
        Ok(Value::Function(Function::builtin(
            &format!("{}.{}", self.name, name),
            Arity::Variadic(0),
            method,
        )))
    }

    fn call_method(
        &self,
        name: &str,
        args: CallArgs,
        interp: &mut Interpreter,
    ) -> RuntimeResult<Value> {
        match self.find(name) {
            Some(method) => method(interp, args),
            None => Err(RuntimeError::attribute_not_found(self.name, name)),
        }
    }

    fn call(&self, args: CallArgs, interp: &mut Interpreter) -> RuntimeResult<Value> {
        match self.constructor {
            Some(constructor) => constructor(interp, args),
            None => Err(RuntimeError::type_error(
                "constructible type",
                self.name,
                "call",
            )),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("<class '{}'>", self.name))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Bind positional-or-keyword arguments to `names`; the first `required`
/// must be present.
pub(crate) fn bind_args(
    function: &str,
    mut args: CallArgs,
    names: &[&str],
    required: usize,
) -> RuntimeResult<Vec<Option<Value>>> {
    let arity = if required == names.len() {
        Arity::Fixed(required)
    } else {
        Arity::Range(required, names.len())
    };
    if args.positional.len() > names.len() {
        return Err(arity_error(function, &arity, args.positional.len()));
    }
    let mut positional = std::mem::take(&mut args.positional).into_iter();
    let mut bound = Vec::with_capacity(names.len());
    for name in names {
        let by_position = positional.next();
        let by_keyword = args.take_keyword(name);
        if by_position.is_some() && by_keyword.is_some() {
            return Err(RuntimeError::type_error(
                "one value",
                &format!("several for argument '{name}'"),
                &format!("{function}()"),
            ));
        }
        bound.push(by_position.or(by_keyword));
    }
    args.reject_keywords(function)?;
    let given = bound.iter().filter(|v| v.is_some()).count();
    if bound.iter().take(required).any(Option::is_none) {
        return Err(arity_error(function, &arity, given));
    }
    Ok(bound)
}

fn arity_error(function: &str, arity: &Arity, actual: usize) -> RuntimeError {
    RuntimeError::ArityMismatch {
        function: function.to_string(),
        expected: arity.to_string(),
        actual,
    }
}

/// An argument `bind_args` already checked as required.
pub(crate) fn required(value: &Option<Value>) -> RuntimeResult<&Value> {
    value
        .as_ref()
        .ok_or_else(|| RuntimeError::InternalError("required argument not bound".into()))
}

/// A length in nanometres. Floats are rounded to the nearest nanometre.
pub(crate) fn nm_arg(value: &Value, what: &str) -> RuntimeResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Float(f) if f.is_finite() => Ok(f.round() as i64),
        Value::Float(_) => Err(RuntimeError::value_error(format!(
            "{what}: length must be finite"
        ))),
        other => Err(RuntimeError::type_error(
            "int (nanometres)",
            &other.type_name(),
            what,
        )),
    }
}

/// Items accepted by the bulk board calls: one item or a list/tuple of them.
pub(crate) fn values_of(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.borrow().clone(),
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    }
}
