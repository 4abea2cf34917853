//! `BoardLayer` and `ViaType` as script-visible enums.

use std::any::Any;
use std::rc::Rc;

use kiscript::{NativeObject, RuntimeError, RuntimeResult, Value};

use crate::session::model::{BoardLayer, ViaType};
use crate::session::SessionLease;

/// One member, e.g. `BoardLayer.BL_F_Cu`.
pub struct EnumMember {
    enum_name: &'static str,
    member: &'static str,
}

impl EnumMember {
    pub fn layer(layer: BoardLayer) -> Value {
        Value::object(EnumMember {
            enum_name: "BoardLayer",
            member: layer.name(),
        })
    }

    pub fn via_type(via_type: ViaType) -> Value {
        Value::object(EnumMember {
            enum_name: "ViaType",
            member: via_type.name(),
        })
    }
}

impl NativeObject for EnumMember {
    fn type_name(&self) -> &str {
        self.enum_name
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        match name {
            "name" => Ok(Value::from(self.member)),
            _ => Err(RuntimeError::attribute_not_found(self.enum_name, name)),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("{}.{}", self.enum_name, self.member))
    }

    fn equals(&self, other: &dyn NativeObject) -> bool {
        other
            .as_any()
            .downcast_ref::<EnumMember>()
            .map(|other| other.enum_name == self.enum_name && other.member == self.member)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct EnumType {
    name: &'static str,
    members: fn(&str) -> Option<Value>,
}

impl NativeObject for EnumType {
    fn type_name(&self) -> &str {
        "type"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        (self.members)(name).ok_or_else(|| RuntimeError::attribute_not_found(self.name, name))
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("<enum '{}'>", self.name))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn board_layer_type(_: &Rc<SessionLease>) -> Value {
    Value::object(EnumType {
        name: "BoardLayer",
        members: |name| BoardLayer::from_name(name).map(EnumMember::layer),
    })
}

pub fn via_type_enum(_: &Rc<SessionLease>) -> Value {
    Value::object(EnumType {
        name: "ViaType",
        members: |name| ViaType::from_name(name).map(EnumMember::via_type),
    })
}

fn member_name(value: &Value, enum_name: &str, what: &str) -> RuntimeResult<Rc<str>> {
    match value.downcast::<EnumMember>() {
        Some(member) if member.enum_name == enum_name => Ok(Rc::from(member.member)),
        Some(member) => Err(RuntimeError::type_error(enum_name, member.enum_name, what)),
        None => match value {
            Value::Str(name) => Ok(name.clone()),
            other => Err(RuntimeError::type_error(enum_name, &other.type_name(), what)),
        },
    }
}

/// Accept `BoardLayer.X` or the layer name as a string.
pub fn layer_arg(value: &Value, what: &str) -> RuntimeResult<BoardLayer> {
    let name = member_name(value, "BoardLayer", what)?;
    BoardLayer::from_name(&name)
        .ok_or_else(|| RuntimeError::value_error(format!("{what}: unknown layer '{name}'")))
}

/// Accept `ViaType.X` or the via type name as a string.
pub fn via_type_arg(value: &Value, what: &str) -> RuntimeResult<ViaType> {
    let name = member_name(value, "ViaType", what)?;
    ViaType::from_name(&name)
        .ok_or_else(|| RuntimeError::value_error(format!("{what}: unknown via type '{name}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_members() {
        let front = EnumMember::layer(BoardLayer::FrontCopper);
        assert_eq!(front.repr(), "BoardLayer.BL_F_Cu");
        assert!(front.equals(&EnumMember::layer(BoardLayer::FrontCopper)));
        assert!(!front.equals(&EnumMember::layer(BoardLayer::BackCopper)));
        assert_eq!(layer_arg(&front, "t").unwrap(), BoardLayer::FrontCopper);
        assert_eq!(layer_arg(&Value::from("BL_B_Cu"), "t").unwrap(), BoardLayer::BackCopper);
    }

    #[test]
    fn test_enum_arguments_are_checked() {
        let via = EnumMember::via_type(ViaType::Micro);
        assert_eq!(layer_arg(&via, "t").unwrap_err().kind(), "TypeError");
        assert_eq!(layer_arg(&Value::from("BL_X"), "t").unwrap_err().kind(), "ValueError");
        assert_eq!(via_type_arg(&via, "t").unwrap(), ViaType::Micro);
    }
}
