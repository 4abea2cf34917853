//! Board items as script objects.
//!
//! An `ItemObject` is a local, editable copy of one board item. Attribute
//! writes only change the copy; `board.update_items(obj)` sends it back and
//! `board.create_items(obj)` adds it. After either call the object is
//! refreshed with what the board stored (ids, canonical nets).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use kiscript::runtime::format::quote_str;
use kiscript::runtime::Arity;
use kiscript::{CallArgs, Interpreter, NativeObject, RuntimeError, RuntimeResult, Value};

use super::enums::{layer_arg, via_type_arg, EnumMember};
use super::geometry::{angle_arg, vector_arg, AngleObject, Vector2Object};
use super::{nm_arg, values_of, Member, StaticMethod, TypeObject};
use crate::session::model::{
    mm_to_nm, Angle, BoardItem, BoardLayer, Footprint, Net, Pad, Track, Vector2, Via, ViaType,
    Zone,
};
use crate::session::SessionLease;

pub const FOOTPRINT_MEMBERS: &[Member] = &[
    Member {
        signature: "fp.reference, fp.value",
        summary: "Reference designator and value (str, writable).",
    },
    Member {
        signature: "fp.position",
        summary: "Vector2 anchor; assigning it moves the pads along.",
    },
    Member {
        signature: "fp.orientation",
        summary: "Angle (or degrees); assigning it rotates the pads about the anchor.",
    },
    Member {
        signature: "fp.layer, fp.locked",
        summary: "BoardLayer (BL_F_Cu or BL_B_Cu) and lock flag.",
    },
    Member {
        signature: "fp.pads",
        summary: "List of Pad objects; edits are sent with `board.update_items(fp)`.",
    },
    Member {
        signature: "pad.number, pad.position, pad.net, pad.parent",
        summary: "Pad fields; `pad.parent` is the owning footprint id.",
    },
    Member {
        signature: "pad.copper_clearance_override",
        summary: "Local clearance in nm, or None to inherit the design rules.",
    },
];

pub const TRACK_MEMBERS: &[Member] = &[
    Member {
        signature: "t.start, t.end",
        summary: "Vector2 end points.",
    },
    Member {
        signature: "t.width, t.layer, t.net, t.locked",
        summary: "Width in nm, copper layer, Net or None, lock flag.",
    },
    Member {
        signature: "t.length",
        summary: "Segment length in nm (read-only).",
    },
];

pub const VIA_MEMBERS: &[Member] = &[
    Member {
        signature: "v.position",
        summary: "Vector2 centre.",
    },
    Member {
        signature: "v.diameter, v.drill_diameter",
        summary: "Pad and drill diameters in nm; the drill must be smaller.",
    },
    Member {
        signature: "v.type (alias v.via_type)",
        summary: "ViaType member.",
    },
    Member {
        signature: "v.net, v.locked",
        summary: "Net or None, lock flag.",
    },
];

pub const ZONE_MEMBERS: &[Member] = &[
    Member {
        signature: "z.name, z.layer, z.net, z.priority",
        summary: "Zone fields.",
    },
    Member {
        signature: "z.outline",
        summary: "List of Vector2 corners (at least three).",
    },
    Member {
        signature: "z.filled",
        summary: "Whether the zone has been filled.",
    },
];

/// A net as seen by scripts.
pub struct NetObject(pub Net);

impl NetObject {
    pub fn value(net: Net) -> Value {
        Value::object(NetObject(net))
    }
}

impl NativeObject for NetObject {
    fn type_name(&self) -> &str {
        "Net"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        match name {
            "name" => Ok(Value::from(self.0.name.as_str())),
            "code" => Ok(Value::Int(self.0.code)),
            _ => Err(RuntimeError::attribute_not_found("Net", name)),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("Net({}, code={})", quote_str(&self.0.name), self.0.code))
    }

    fn equals(&self, other: &dyn NativeObject) -> bool {
        other
            .as_any()
            .downcast_ref::<NetObject>()
            .map(|other| other.0 == self.0)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn net_value(net: &Option<Net>) -> Value {
    match net {
        Some(net) => NetObject::value(net.clone()),
        None => Value::None,
    }
}

/// `None`, a `Net`, or a net name. Names are resolved by the board.
fn net_arg(value: &Value, what: &str) -> RuntimeResult<Option<Net>> {
    if let Some(net) = value.downcast::<NetObject>() {
        return Ok(Some(net.0.clone()));
    }
    match value {
        Value::None => Ok(None),
        Value::Str(name) => Ok(Some(Net {
            code: 0,
            name: name.to_string(),
        })),
        other => Err(RuntimeError::type_error("Net or None", &other.type_name(), what)),
    }
}

fn id_value(id: &Option<String>) -> Value {
    id.as_deref().map(Value::from).unwrap_or(Value::None)
}

fn net_label(net: &Option<Net>) -> String {
    match net {
        Some(net) => quote_str(&net.name),
        None => "None".to_string(),
    }
}

fn vector_repr(v: Vector2) -> String {
    format!("Vector2({}, {})", v.x, v.y)
}

fn rotate_about(point: Vector2, center: Vector2, degrees: f64) -> Vector2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = (point.x - center.x) as f64;
    let dy = (point.y - center.y) as f64;
    Vector2::from_xy(
        center.x + (dx * cos - dy * sin).round() as i64,
        center.y + (dx * sin + dy * cos).round() as i64,
    )
}

/// Script handle on one board item.
pub struct ItemObject {
    item: RefCell<BoardItem>,
    /// Pad objects handed out by `fp.pads`, kept so edits made through
    /// them travel with the footprint.
    pads: RefCell<Option<Vec<Rc<ItemObject>>>>,
}

impl ItemObject {
    pub fn new(item: BoardItem) -> Rc<Self> {
        Rc::new(ItemObject {
            item: RefCell::new(item),
            pads: RefCell::new(None),
        })
    }

    pub fn value(item: BoardItem) -> Value {
        Value::Object(ItemObject::new(item))
    }

    /// The item with any edits made through cached pad objects folded in.
    pub fn snapshot(&self) -> BoardItem {
        let mut item = self.item.borrow().clone();
        if let (BoardItem::Footprint(fp), Some(cached)) = (&mut item, &*self.pads.borrow()) {
            for (pad, object) in fp.pads.iter_mut().zip(cached) {
                if let BoardItem::Pad(edited) = object.snapshot() {
                    *pad = edited;
                }
            }
        }
        item
    }

    /// Replace the copy with what the board stored. Cached pad objects are
    /// updated in place so handles held by the script stay current.
    pub fn refresh(&self, item: BoardItem) {
        let mut cache = self.pads.borrow_mut();
        match (&item, cache.as_ref()) {
            (BoardItem::Footprint(fp), Some(cached)) if cached.len() == fp.pads.len() => {
                for (object, pad) in cached.iter().zip(&fp.pads) {
                    object.refresh(BoardItem::Pad(pad.clone()));
                }
            }
            _ => *cache = None,
        }
        *self.item.borrow_mut() = item;
    }

    pub fn id(&self) -> Option<String> {
        self.item.borrow().id().map(str::to_string)
    }

    fn kind_name(&self) -> &'static str {
        self.item.borrow().kind().name()
    }

    fn pad_objects(&self) -> Vec<Rc<ItemObject>> {
        let mut cache = self.pads.borrow_mut();
        if let Some(cached) = cache.as_ref() {
            return cached.clone();
        }
        let created: Vec<Rc<ItemObject>> = match &*self.item.borrow() {
            BoardItem::Footprint(fp) => fp
                .pads
                .iter()
                .map(|pad| ItemObject::new(BoardItem::Pad(pad.clone())))
                .collect(),
            _ => Vec::new(),
        };
        *cache = Some(created.clone());
        created
    }

    /// Edit the footprint together with its pads.
    fn edit_footprint(&self, edit: impl FnOnce(&mut Footprint)) {
        if let BoardItem::Footprint(mut fp) = self.snapshot() {
            edit(&mut fp);
            self.refresh(BoardItem::Footprint(fp));
        }
    }

    fn footprint_attr(fp: &Footprint, name: &str) -> Option<Value> {
        Some(match name {
            "id" => id_value(&fp.id),
            "reference" => Value::from(fp.reference.as_str()),
            "value" => Value::from(fp.value.as_str()),
            "position" => Vector2Object::value(fp.position),
            "orientation" => AngleObject::value(fp.orientation),
            "layer" => EnumMember::layer(fp.layer),
            "locked" => Value::Bool(fp.locked),
            _ => return None,
        })
    }

    fn pad_attr(pad: &Pad, name: &str) -> Option<Value> {
        Some(match name {
            "id" => id_value(&pad.id),
            "number" => Value::from(pad.number.as_str()),
            "position" => Vector2Object::value(pad.position),
            "net" => net_value(&pad.net),
            "copper_clearance_override" => pad
                .copper_clearance_override
                .map(Value::Int)
                .unwrap_or(Value::None),
            "parent" => id_value(&pad.parent),
            _ => return None,
        })
    }

    fn track_attr(track: &Track, name: &str) -> Option<Value> {
        Some(match name {
            "id" => id_value(&track.id),
            "start" => Vector2Object::value(track.start),
            "end" => Vector2Object::value(track.end),
            "width" => Value::Int(track.width),
            "layer" => EnumMember::layer(track.layer),
            "net" => net_value(&track.net),
            "locked" => Value::Bool(track.locked),
            "length" => Value::Float(track.length()),
            _ => return None,
        })
    }

    fn via_attr(via: &Via, name: &str) -> Option<Value> {
        Some(match name {
            "id" => id_value(&via.id),
            "position" => Vector2Object::value(via.position),
            "diameter" => Value::Int(via.diameter),
            "drill_diameter" => Value::Int(via.drill_diameter),
            "type" | "via_type" => EnumMember::via_type(via.via_type),
            "net" => net_value(&via.net),
            "locked" => Value::Bool(via.locked),
            _ => return None,
        })
    }

    fn zone_attr(zone: &Zone, name: &str) -> Option<Value> {
        Some(match name {
            "id" => id_value(&zone.id),
            "name" => Value::from(zone.name.as_str()),
            "layer" => EnumMember::layer(zone.layer),
            "net" => net_value(&zone.net),
            "priority" => Value::Int(i64::from(zone.priority)),
            "outline" => Value::list(
                zone.outline
                    .iter()
                    .copied()
                    .map(Vector2Object::value)
                    .collect(),
            ),
            "filled" => Value::Bool(zone.filled),
            _ => return None,
        })
    }

    fn set_footprint_attr(&self, name: &str, value: Value) -> RuntimeResult<()> {
        let what = format!("Footprint.{name}");
        match name {
            "reference" => {
                let reference = value.expect_str(&what)?.to_string();
                self.edit_footprint(|fp| fp.reference = reference);
            }
            "value" => {
                let text = value.expect_str(&what)?.to_string();
                self.edit_footprint(|fp| fp.value = text);
            }
            "position" => {
                let target = vector_arg(&value, &what)?;
                self.edit_footprint(|fp| {
                    let (dx, dy) = (target.x - fp.position.x, target.y - fp.position.y);
                    fp.position = target;
                    for pad in &mut fp.pads {
                        pad.position = Vector2::from_xy(pad.position.x + dx, pad.position.y + dy);
                    }
                });
            }
            "orientation" => {
                let target = angle_arg(&value, &what)?;
                self.edit_footprint(|fp| {
                    let delta = target.degrees - fp.orientation.degrees;
                    for pad in &mut fp.pads {
                        pad.position = rotate_about(pad.position, fp.position, delta);
                    }
                    fp.orientation = target;
                });
            }
            "layer" => {
                let layer = layer_arg(&value, &what)?;
                self.edit_footprint(|fp| fp.layer = layer);
            }
            "locked" => {
                let locked = value.expect_bool(&what)?;
                self.edit_footprint(|fp| fp.locked = locked);
            }
            _ => return Err(self.not_writable(name)),
        }
        Ok(())
    }

    fn set_pad_attr(pad: &mut Pad, name: &str, value: Value) -> RuntimeResult<bool> {
        let what = format!("Pad.{name}");
        match name {
            "number" => pad.number = value.expect_str(&what)?.to_string(),
            "position" => pad.position = vector_arg(&value, &what)?,
            "net" => pad.net = net_arg(&value, &what)?,
            "copper_clearance_override" => {
                pad.copper_clearance_override = match value {
                    Value::None => None,
                    other => {
                        let clearance = nm_arg(&other, &what)?;
                        if clearance < 0 {
                            return Err(RuntimeError::value_error(format!(
                                "{what}: clearance must not be negative"
                            )));
                        }
                        Some(clearance)
                    }
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn set_track_attr(track: &mut Track, name: &str, value: Value) -> RuntimeResult<bool> {
        let what = format!("Track.{name}");
        match name {
            "start" => track.start = vector_arg(&value, &what)?,
            "end" => track.end = vector_arg(&value, &what)?,
            "width" => track.width = nm_arg(&value, &what)?,
            "layer" => track.layer = layer_arg(&value, &what)?,
            "net" => track.net = net_arg(&value, &what)?,
            "locked" => track.locked = value.expect_bool(&what)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn set_via_attr(via: &mut Via, name: &str, value: Value) -> RuntimeResult<bool> {
        let what = format!("Via.{name}");
        match name {
            "position" => via.position = vector_arg(&value, &what)?,
            "diameter" => via.diameter = nm_arg(&value, &what)?,
            "drill_diameter" => via.drill_diameter = nm_arg(&value, &what)?,
            "type" | "via_type" => via.via_type = via_type_arg(&value, &what)?,
            "net" => via.net = net_arg(&value, &what)?,
            "locked" => via.locked = value.expect_bool(&what)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn set_zone_attr(zone: &mut Zone, name: &str, value: Value) -> RuntimeResult<bool> {
        let what = format!("Zone.{name}");
        match name {
            "name" => zone.name = value.expect_str(&what)?.to_string(),
            "layer" => zone.layer = layer_arg(&value, &what)?,
            "net" => zone.net = net_arg(&value, &what)?,
            "priority" => {
                let priority = value.expect_int(&what)?;
                zone.priority = u32::try_from(priority).map_err(|_| {
                    RuntimeError::value_error(format!("{what}: {priority} is out of range"))
                })?;
            }
            "outline" => {
                zone.outline = values_of(&value)
                    .iter()
                    .map(|point| vector_arg(point, &what))
                    .collect::<RuntimeResult<_>>()?;
            }
            "filled" => zone.filled = value.expect_bool(&what)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn not_writable(&self, name: &str) -> RuntimeError {
        let kind = self.kind_name();
        if self.get_attr(name).is_ok() {
            RuntimeError::read_only(kind, name)
        } else {
            RuntimeError::attribute_not_found(kind, name)
        }
    }
}

impl NativeObject for ItemObject {
    fn type_name(&self) -> &str {
        self.kind_name()
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        let found = match &*self.item.borrow() {
            BoardItem::Footprint(_) if name == "pads" => None,
            BoardItem::Footprint(fp) => Self::footprint_attr(fp, name),
            BoardItem::Pad(pad) => Self::pad_attr(pad, name),
            BoardItem::Track(track) => Self::track_attr(track, name),
            BoardItem::Via(via) => Self::via_attr(via, name),
            BoardItem::Zone(zone) => Self::zone_attr(zone, name),
        };
        if let Some(value) = found {
            return Ok(value);
        }
        if name == "pads" && matches!(&*self.item.borrow(), BoardItem::Footprint(_)) {
            let pads = self
                .pad_objects()
                .into_iter()
                .map(|pad| Value::Object(pad))
                .collect();
            return Ok(Value::list(pads));
        }
        Err(RuntimeError::attribute_not_found(self.kind_name(), name))
    }

    fn set_attr(&self, name: &str, value: Value) -> RuntimeResult<()> {
        if matches!(&*self.item.borrow(), BoardItem::Footprint(_)) {
            return self.set_footprint_attr(name, value);
        }
        let changed = match &mut *self.item.borrow_mut() {
            BoardItem::Footprint(_) => false,
            BoardItem::Pad(pad) => Self::set_pad_attr(pad, name, value)?,
            BoardItem::Track(track) => Self::set_track_attr(track, name, value)?,
            BoardItem::Via(via) => Self::set_via_attr(via, name, value)?,
            BoardItem::Zone(zone) => Self::set_zone_attr(zone, name, value)?,
        };
        if changed {
            Ok(())
        } else {
            Err(self.not_writable(name))
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(match &*self.item.borrow() {
            BoardItem::Footprint(fp) => format!(
                "Footprint({}, value={}, position={})",
                quote_str(&fp.reference),
                quote_str(&fp.value),
                vector_repr(fp.position)
            ),
            BoardItem::Pad(pad) => format!(
                "Pad({}, net={}, position={})",
                quote_str(&pad.number),
                net_label(&pad.net),
                vector_repr(pad.position)
            ),
            BoardItem::Track(track) => format!(
                "Track({} -> {}, width={}, layer={}, net={})",
                vector_repr(track.start),
                vector_repr(track.end),
                track.width,
                track.layer,
                net_label(&track.net)
            ),
            BoardItem::Via(via) => format!(
                "Via({}, diameter={}, drill={}, net={})",
                vector_repr(via.position),
                via.diameter,
                via.drill_diameter,
                net_label(&via.net)
            ),
            BoardItem::Zone(zone) => format!(
                "Zone({}, layer={}, net={}, corners={})",
                quote_str(&zone.name),
                zone.layer,
                net_label(&zone.net),
                zone.outline.len()
            ),
        })
    }

    /// Two handles are equal when they name the same stored item.
    fn equals(&self, other: &dyn NativeObject) -> bool {
        let Some(other) = other.as_any().downcast_ref::<ItemObject>() else {
            return false;
        };
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b && self.kind_name() == other.kind_name(),
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Build a new item from keyword arguments, starting from `template`.
fn construct(name: &str, template: BoardItem, args: CallArgs) -> RuntimeResult<Value> {
    args.check_arity(name, &Arity::Fixed(0))?;
    let object = ItemObject::new(template);
    for (keyword, value) in args.keywords {
        if keyword == "id" {
            return Err(RuntimeError::read_only(name, "id"));
        }
        object.set_attr(&keyword, value)?;
    }
    Ok(Value::Object(object))
}

fn new_footprint(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let template = Footprint {
        id: None,
        reference: "REF**".to_string(),
        value: String::new(),
        position: Vector2::default(),
        orientation: Angle::default(),
        layer: BoardLayer::FrontCopper,
        locked: false,
        pads: Vec::new(),
    };
    construct("Footprint", BoardItem::Footprint(template), args)
}

fn new_track(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let template = Track {
        id: None,
        start: Vector2::default(),
        end: Vector2::default(),
        width: mm_to_nm(0.25),
        layer: BoardLayer::FrontCopper,
        net: None,
        locked: false,
    };
    construct("Track", BoardItem::Track(template), args)
}

fn new_via(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let template = Via {
        id: None,
        position: Vector2::default(),
        diameter: mm_to_nm(0.8),
        drill_diameter: mm_to_nm(0.4),
        via_type: ViaType::Through,
        net: None,
        locked: false,
    };
    construct("Via", BoardItem::Via(template), args)
}

fn new_zone(_: &mut Interpreter, args: CallArgs) -> RuntimeResult<Value> {
    let template = Zone {
        id: None,
        name: String::new(),
        layer: BoardLayer::FrontCopper,
        net: None,
        priority: 0,
        outline: Vec::new(),
        filled: false,
    };
    construct("Zone", BoardItem::Zone(template), args)
}

const NO_STATICS: &[(&str, StaticMethod)] = &[];

pub fn footprint_type(_: &Rc<SessionLease>) -> Value {
    TypeObject::value("Footprint", Some(new_footprint), NO_STATICS)
}

pub fn track_type(_: &Rc<SessionLease>) -> Value {
    TypeObject::value("Track", Some(new_track), NO_STATICS)
}

pub fn via_type(_: &Rc<SessionLease>) -> Value {
    TypeObject::value("Via", Some(new_via), NO_STATICS)
}

pub fn zone_type(_: &Rc<SessionLease>) -> Value {
    TypeObject::value("Zone", Some(new_zone), NO_STATICS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::demo_board;
    use pretty_assertions::assert_eq;

    fn resistor() -> Rc<ItemObject> {
        let board = demo_board();
        let fp = board
            .footprints
            .iter()
            .find(|fp| fp.reference == "R1")
            .cloned()
            .unwrap();
        ItemObject::new(BoardItem::Footprint(fp))
    }

    fn pad_position(value: &Value) -> Vector2 {
        value
            .downcast::<ItemObject>()
            .map(|pad| match &*pad.item.borrow() {
                BoardItem::Pad(pad) => pad.position,
                other => panic!("not a pad: {other:?}"),
            })
            .unwrap()
    }

    #[test]
    fn test_moving_a_footprint_moves_its_pads() {
        let fp = resistor();
        let before = match fp.get_attr("pads").unwrap() {
            Value::List(pads) => pad_position(&pads.borrow()[0]),
            other => panic!("{other:?}"),
        };
        let Value::Object(object) = fp.get_attr("position").unwrap() else {
            panic!("position is not an object");
        };
        let start = object.as_any().downcast_ref::<Vector2Object>().unwrap().0;

        let target = Vector2::from_xy(start.x + 1_000, start.y - 2_000);
        fp.set_attr("position", Vector2Object::value(target)).unwrap();

        let Value::List(pads) = fp.get_attr("pads").unwrap() else {
            panic!("pads is not a list");
        };
        assert_eq!(
            pad_position(&pads.borrow()[0]),
            Vector2::from_xy(before.x + 1_000, before.y - 2_000)
        );
    }

    #[test]
    fn test_pad_edits_travel_with_the_footprint() {
        let fp = resistor();
        let Value::List(pads) = fp.get_attr("pads").unwrap() else {
            panic!("pads is not a list");
        };
        pads.borrow()[1]
            .as_object()
            .unwrap()
            .set_attr("copper_clearance_override", Value::Int(200_000))
            .unwrap();

        let BoardItem::Footprint(snapshot) = fp.snapshot() else {
            panic!("not a footprint");
        };
        assert_eq!(snapshot.pads[1].copper_clearance_override, Some(200_000));
        assert_eq!(snapshot.pads[0].copper_clearance_override, None);
    }

    #[test]
    fn test_read_only_and_unknown_attributes() {
        let track = ItemObject::value(BoardItem::Track(Track {
            id: None,
            start: Vector2::from_xy(0, 0),
            end: Vector2::from_xy(3, 4),
            width: 10,
            layer: BoardLayer::FrontCopper,
            net: None,
            locked: false,
        }));
        let object = track.as_object().unwrap();
        assert_eq!(object.get_attr("length").unwrap(), Value::Float(5.0));
        assert_eq!(
            object.set_attr("length", Value::Int(1)).unwrap_err().kind(),
            "AttributeError"
        );
        assert_eq!(
            object.get_attr("colour").unwrap_err().to_string(),
            "'Track' object has no attribute 'colour'"
        );
        assert_eq!(
            object.set_attr("width", Value::from("wide")).unwrap_err().kind(),
            "TypeError"
        );
    }

    #[test]
    fn test_net_arguments() {
        assert_eq!(net_arg(&Value::None, "n").unwrap(), None);
        assert_eq!(
            net_arg(&Value::from("GND"), "n").unwrap().map(|n| n.name),
            Some("GND".to_string())
        );
        let net = Net {
            code: 1,
            name: "GND".into(),
        };
        assert_eq!(
            NetObject::value(net.clone()).repr(),
            "Net('GND', code=1)"
        );
        assert_eq!(net_arg(&NetObject::value(net.clone()), "n").unwrap(), Some(net));
        assert_eq!(net_arg(&Value::Int(3), "n").unwrap_err().kind(), "TypeError");
    }

    #[test]
    fn test_rotation_about_anchor() {
        let rotated = rotate_about(Vector2::from_xy(10, 0), Vector2::from_xy(0, 0), 90.0);
        assert_eq!(rotated, Vector2::from_xy(0, 10));
    }
}
