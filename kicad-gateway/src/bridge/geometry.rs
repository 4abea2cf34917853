//! `Vector2`, `Angle` and the unit helpers.

use std::any::Any;
use std::rc::Rc;

use kiscript::runtime::format::format_float;
use kiscript::runtime::{Arity, Function};
use kiscript::{CallArgs, Interpreter, NativeObject, RuntimeError, RuntimeResult, Value};

use super::{bind_args, nm_arg, required, Member, StaticMethod, TypeObject};
use crate::session::model::{mils_to_nm, mm_to_nm, nm_to_mils, nm_to_mm, Angle, Vector2};
use crate::session::SessionLease;

pub const VECTOR2_MEMBERS: &[Member] = &[
    Member {
        signature: "Vector2.from_xy(x, y)",
        summary: "Point from nanometre coordinates.",
    },
    Member {
        signature: "Vector2.from_xy_mm(x_mm, y_mm)",
        summary: "Point from millimetre coordinates.",
    },
    Member {
        signature: "v.x, v.y",
        summary: "Coordinates in nanometres (read-only).",
    },
    Member {
        signature: "v.to_mm() -> (x_mm, y_mm)",
        summary: "Coordinates in millimetres.",
    },
    Member {
        signature: "v.offset(dx, dy) / v.offset_mm(dx_mm, dy_mm)",
        summary: "New point moved by the given distance.",
    },
    Member {
        signature: "v.length()",
        summary: "Distance from the origin in nanometres.",
    },
];

pub const ANGLE_MEMBERS: &[Member] = &[
    Member {
        signature: "Angle.from_degrees(deg) / Angle.from_radians(rad)",
        summary: "Construct an angle.",
    },
    Member {
        signature: "a.degrees, a.radians",
        summary: "The angle (read-only).",
    },
    Member {
        signature: "a.normalized()",
        summary: "Same angle in [0, 360).",
    },
];

/// Script view of a `Vector2`. Immutable; setters build new values.
pub struct Vector2Object(pub Vector2);

impl Vector2Object {
    pub fn value(vector: Vector2) -> Value {
        Value::object(Vector2Object(vector))
    }
}

/// Accept a `Vector2` object or an `(x, y)` pair of nanometres.
pub fn vector_arg(value: &Value, what: &str) -> RuntimeResult<Vector2> {
    if let Some(vector) = value.downcast::<Vector2Object>() {
        return Ok(vector.0);
    }
    match value {
        Value::Tuple(items) if items.len() == 2 => {
            Ok(Vector2::from_xy(nm_arg(&items[0], what)?, nm_arg(&items[1], what)?))
        }
        other => Err(RuntimeError::type_error("Vector2", &other.type_name(), what)),
    }
}

impl NativeObject for Vector2Object {
    fn type_name(&self) -> &str {
        "Vector2"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        match name {
            "x" => Ok(Value::Int(self.0.x)),
            "y" => Ok(Value::Int(self.0.y)),
            _ => Err(RuntimeError::attribute_not_found("Vector2", name)),
        }
    }

    fn call_method(
        &self,
        name: &str,
        args: CallArgs,
        _interp: &mut Interpreter,
    ) -> RuntimeResult<Value> {
        match name {
            "to_mm" => {
                bind_args("Vector2.to_mm", args, &[], 0)?;
                Ok(Value::tuple(vec![
                    Value::Float(nm_to_mm(self.0.x)),
                    Value::Float(nm_to_mm(self.0.y)),
                ]))
            }
            "length" => {
                bind_args("Vector2.length", args, &[], 0)?;
                Ok(Value::Float(self.0.length()))
            }
            "offset" => {
                let bound = bind_args("Vector2.offset", args, &["dx", "dy"], 2)?;
                let dx = nm_arg(required(&bound[0])?, "Vector2.offset")?;
                let dy = nm_arg(required(&bound[1])?, "Vector2.offset")?;
                Ok(Vector2Object::value(Vector2::from_xy(
                    self.0.x + dx,
                    self.0.y + dy,
                )))
            }
            "offset_mm" => {
                let bound = bind_args("Vector2.offset_mm", args, &["dx_mm", "dy_mm"], 2)?;
                let dx = required(&bound[0])?.expect_float("Vector2.offset_mm")?;
                let dy = required(&bound[1])?.expect_float("Vector2.offset_mm")?;
                Ok(Vector2Object::value(Vector2::from_xy(
                    self.0.x + mm_to_nm(dx),
                    self.0.y + mm_to_nm(dy),
                )))
            }
            _ => Err(RuntimeError::attribute_not_found("Vector2", name)),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("Vector2({}, {})", self.0.x, self.0.y))
    }

    fn equals(&self, other: &dyn NativeObject) -> bool {
        other
            .as_any()
            .downcast_ref::<Vector2Object>()
            .map(|other| other.0 == self.0)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Script view of an `Angle`.
pub struct AngleObject(pub Angle);

impl AngleObject {
    pub fn value(angle: Angle) -> Value {
        Value::object(AngleObject(angle))
    }
}

/// Accept an `Angle` object or a number of degrees.
pub fn angle_arg(value: &Value, what: &str) -> RuntimeResult<Angle> {
    if let Some(angle) = value.downcast::<AngleObject>() {
        return Ok(angle.0);
    }
    match value {
        Value::Int(_) | Value::Float(_) => Ok(Angle::from_degrees(value.expect_float(what)?)),
        other => Err(RuntimeError::type_error("Angle", &other.type_name(), what)),
    }
}

impl NativeObject for AngleObject {
    fn type_name(&self) -> &str {
        "Angle"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        match name {
            "degrees" => Ok(Value::Float(self.0.degrees)),
            "radians" => Ok(Value::Float(self.0.degrees.to_radians())),
            _ => Err(RuntimeError::attribute_not_found("Angle", name)),
        }
    }

    fn call_method(
        &self,
        name: &str,
        args: CallArgs,
        _interp: &mut Interpreter,
    ) -> RuntimeResult<Value> {
        match name {
            "normalized" => {
                bind_args("Angle.normalized", args, &[], 0)?;
                Ok(AngleObject::value(self.0.normalized()))
            }
            _ => Err(RuntimeError::attribute_not_found("Angle", name)),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("Angle({})", format_float(self.0.degrees)))
    }

    fn equals(&self, other: &dyn NativeObject) -> bool {
        other
            .as_any()
            .downcast_ref::<AngleObject>()
            .map(|other| other.0 == self.0)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn new_vector2(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Vector2", args, &["x", "y"], 0)?;
    let x = bound[0].as_ref().map(|v| nm_arg(v, "Vector2")).transpose()?;
    let y = bound[1].as_ref().map(|v| nm_arg(v, "Vector2")).transpose()?;
    Ok(Vector2Object::value(Vector2::from_xy(
        x.unwrap_or(0),
        y.unwrap_or(0),
    )))
}

fn vector2_from_xy(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Vector2.from_xy", args, &["x", "y"], 2)?;
    Ok(Vector2Object::value(Vector2::from_xy(
        nm_arg(required(&bound[0])?, "Vector2.from_xy")?,
        nm_arg(required(&bound[1])?, "Vector2.from_xy")?,
    )))
}

fn vector2_from_xy_mm(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Vector2.from_xy_mm", args, &["x_mm", "y_mm"], 2)?;
    Ok(Vector2Object::value(Vector2::from_xy_mm(
        required(&bound[0])?.expect_float("Vector2.from_xy_mm")?,
        required(&bound[1])?.expect_float("Vector2.from_xy_mm")?,
    )))
}

fn new_angle(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Angle", args, &["degrees"], 0)?;
    let degrees = bound[0]
        .as_ref()
        .map(|v| v.expect_float("Angle"))
        .transpose()?;
    Ok(AngleObject::value(Angle::from_degrees(degrees.unwrap_or(0.0))))
}

fn angle_from_degrees(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Angle.from_degrees", args, &["degrees"], 1)?;
    Ok(AngleObject::value(Angle::from_degrees(
        required(&bound[0])?.expect_float("Angle.from_degrees")?,
    )))
}

fn angle_from_radians(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Angle.from_radians", args, &["radians"], 1)?;
    Ok(AngleObject::value(Angle::from_radians(
        required(&bound[0])?.expect_float("Angle.from_radians")?,
    )))
}

const VECTOR2_STATICS: &[(&str, StaticMethod)] = &[
    ("from_xy", vector2_from_xy),
    ("from_xy_mm", vector2_from_xy_mm),
];

const ANGLE_STATICS: &[(&str, StaticMethod)] = &[
    ("from_degrees", angle_from_degrees),
    ("from_radians", angle_from_radians),
];

pub fn vector2_type(_: &Rc<SessionLease>) -> Value {
    TypeObject::value("Vector2", Some(new_vector2), VECTOR2_STATICS)
}

pub fn angle_type(_: &Rc<SessionLease>) -> Value {
    TypeObject::value("Angle", Some(new_angle), ANGLE_STATICS)
}

fn unit_function(name: &'static str, convert: fn(f64) -> Value) -> Value {
    Value::Function(Function::builtin(
        name,
        Arity::Fixed(1),
        move |_, args: CallArgs| {
            args.reject_keywords(name)?;
            let amount = args.positional[0].expect_float(name)?;
            Ok(convert(amount))
        },
    ))
}

pub fn from_mm_function(_: &Rc<SessionLease>) -> Value {
    unit_function("from_mm", |mm| Value::Int(mm_to_nm(mm)))
}

pub fn to_mm_function(_: &Rc<SessionLease>) -> Value {
    unit_function("to_mm", |nm| Value::Float(nm_to_mm(nm.round() as i64)))
}

pub fn from_mils_function(_: &Rc<SessionLease>) -> Value {
    unit_function("from_mils", |mils| Value::Int(mils_to_nm(mils)))
}

pub fn to_mils_function(_: &Rc<SessionLease>) -> Value {
    unit_function("to_mils", |nm| Value::Float(nm_to_mils(nm.round() as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_args_accept_pairs() {
        let pair = Value::tuple(vec![Value::Int(1), Value::Float(2.4)]);
        assert_eq!(vector_arg(&pair, "p").unwrap(), Vector2::from_xy(1, 2));
        let object = Vector2Object::value(Vector2::from_xy(5, 6));
        assert_eq!(vector_arg(&object, "p").unwrap(), Vector2::from_xy(5, 6));
        assert_eq!(vector_arg(&Value::Int(1), "p").unwrap_err().kind(), "TypeError");
    }

    #[test]
    fn test_reprs_and_equality() {
        let a = Vector2Object::value(Vector2::from_xy(1, 2));
        let b = Vector2Object::value(Vector2::from_xy(1, 2));
        assert_eq!(a.repr(), "Vector2(1, 2)");
        assert!(a.equals(&b));
        assert_eq!(AngleObject::value(Angle::from_degrees(90.0)).repr(), "Angle(90.0)");
        assert_eq!(angle_arg(&Value::Int(45), "a").unwrap().degrees, 45.0);
    }
}
