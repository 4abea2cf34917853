//! `KiCad()`, `get_board()` and the board handle.

use std::any::Any;
use std::rc::Rc;

use indexmap::IndexMap;
use kiscript::runtime::{Arity, DictKey, Function};
use kiscript::{CallArgs, Interpreter, NativeObject, RuntimeError, RuntimeResult, Value};

use super::items::{ItemObject, NetObject};
use super::{bind_args, required, values_of, Member};
use crate::session::model::{BoardItem, ItemKind};
use crate::session::{CommitToken, SessionLease};

pub const KICAD_MEMBERS: &[Member] = &[
    Member {
        signature: "KiCad().get_board() -> Board",
        summary: "The board open in the editor.",
    },
    Member {
        signature: "KiCad().get_version() -> str",
        summary: "Version string of the gateway.",
    },
];

pub const BOARD_MEMBERS: &[Member] = &[
    Member {
        signature: "board.name, board.copper_layer_count",
        summary: "File name and copper layer count at the start of the request.",
    },
    Member {
        signature: "board.get_footprints() / get_pads() / get_tracks() / get_vias() / get_zones()",
        summary: "Fresh lists of item objects.",
    },
    Member {
        signature: "board.get_nets() / board.find_net(name)",
        summary: "All nets, or one net by name (None if absent).",
    },
    Member {
        signature: "board.find_footprint(reference)",
        summary: "Footprint with that reference designator, or None.",
    },
    Member {
        signature: "board.get_info() -> dict",
        summary: "Name, layer count and item counts.",
    },
    Member {
        signature: "board.get_copper_layer_count() -> int",
        summary: "Number of copper layers.",
    },
    Member {
        signature: "board.create_items(items) / board.update_items(items)",
        summary: "Add new items or write back edited ones; the objects are refreshed in place.",
    },
    Member {
        signature: "board.remove_items(items_or_ids) -> int",
        summary: "Delete items; returns how many were removed.",
    },
    Member {
        signature: "board.begin_commit() -> Commit",
        summary: "Group the following edits into one undo step.",
    },
    Member {
        signature: "board.push_commit(commit, message='') / board.drop_commit(commit)",
        summary: "Keep the grouped edits, or revert them. A rejected push raises CommitError.",
    },
];

fn version_string() -> String {
    format!("kicad-gateway {}", env!("CARGO_PKG_VERSION"))
}

/// The `KiCad` type; calling it connects to the leased session.
struct KiCadType {
    lease: Rc<SessionLease>,
}

impl NativeObject for KiCadType {
    fn type_name(&self) -> &str {
        "type"
    }

    fn call(&self, args: CallArgs, _interp: &mut Interpreter) -> RuntimeResult<Value> {
        bind_args("KiCad", args, &[], 0)?;
        Ok(Value::object(KiCadObject {
            lease: self.lease.clone(),
        }))
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok("<class 'KiCad'>".to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct KiCadObject {
    lease: Rc<SessionLease>,
}

impl NativeObject for KiCadObject {
    fn type_name(&self) -> &str {
        "KiCad"
    }

    fn call_method(
        &self,
        name: &str,
        args: CallArgs,
        _interp: &mut Interpreter,
    ) -> RuntimeResult<Value> {
        match name {
            "get_board" => {
                bind_args("KiCad.get_board", args, &[], 0)?;
                Ok(BoardObject::value(self.lease.clone()))
            }
            "get_version" => {
                bind_args("KiCad.get_version", args, &[], 0)?;
                Ok(Value::from(version_string()))
            }
            _ => Err(RuntimeError::attribute_not_found("KiCad", name)),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("<KiCad {}>", quote_name(&self.lease)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn quote_name(lease: &SessionLease) -> String {
    kiscript::runtime::format::quote_str(&lease.document().name)
}

pub fn kicad_type(lease: &Rc<SessionLease>) -> Value {
    Value::object(KiCadType {
        lease: lease.clone(),
    })
}

pub fn get_board_function(lease: &Rc<SessionLease>) -> Value {
    let lease = lease.clone();
    Value::Function(Function::builtin(
        "get_board",
        Arity::Fixed(0),
        move |_, args: CallArgs| {
            args.reject_keywords("get_board")?;
            Ok(BoardObject::value(lease.clone()))
        },
    ))
}

type BoardMethod = fn(&SessionLease, CallArgs) -> RuntimeResult<Value>;

const BOARD_METHODS: &[(&str, BoardMethod)] = &[
    ("get_footprints", get_footprints),
    ("get_pads", get_pads),
    ("get_tracks", get_tracks),
    ("get_vias", get_vias),
    ("get_zones", get_zones),
    ("get_nets", get_nets),
    ("find_net", find_net),
    ("find_footprint", find_footprint),
    ("get_info", get_info),
    ("get_copper_layer_count", get_copper_layer_count),
    ("create_items", create_items),
    ("update_items", update_items),
    ("remove_items", remove_items),
    ("begin_commit", begin_commit),
    ("push_commit", push_commit),
    ("drop_commit", drop_commit),
];

/// Handle on the open board. Every call goes through the request's lease.
pub struct BoardObject {
    lease: Rc<SessionLease>,
}

impl BoardObject {
    pub fn value(lease: Rc<SessionLease>) -> Value {
        Value::object(BoardObject { lease })
    }

    fn method(name: &str) -> Option<BoardMethod> {
        BOARD_METHODS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, method)| *method)
    }
}

impl NativeObject for BoardObject {
    fn type_name(&self) -> &str {
        "Board"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        match name {
            "name" => return Ok(Value::from(self.lease.document().name.as_str())),
            "copper_layer_count" => {
                return Ok(Value::Int(i64::from(
                    self.lease.document().copper_layer_count,
                )))
            }
            _ => {}
        }
        let method =
            Self::method(name).ok_or_else(|| RuntimeError::attribute_not_found("Board", name))?;
        let lease = self.lease.clone();
        Ok(Value::Function(Function::builtin(
            &format!("Board.{name}"),
            Arity::Variadic(0),
            move |_, args| method(&lease, args),
        )))
    }

    fn call_method(
        &self,
        name: &str,
        args: CallArgs,
        interp: &mut Interpreter,
    ) -> RuntimeResult<Value> {
        match Self::method(name) {
            Some(method) => method(&self.lease, args),
            None => {
                let attribute = self.get_attr(name)?;
                interp.call_value(&attribute, args)
            }
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("<Board {}>", quote_name(&self.lease)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn item_list(
    lease: &SessionLease,
    kind: ItemKind,
    what: &str,
    args: CallArgs,
) -> RuntimeResult<Value> {
    bind_args(what, args, &[], 0)?;
    let items = lease.get_items(kind)?;
    Ok(Value::list(items.into_iter().map(ItemObject::value).collect()))
}

fn get_footprints(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    item_list(lease, ItemKind::Footprint, "Board.get_footprints", args)
}

fn get_pads(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    item_list(lease, ItemKind::Pad, "Board.get_pads", args)
}

fn get_tracks(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    item_list(lease, ItemKind::Track, "Board.get_tracks", args)
}

fn get_vias(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    item_list(lease, ItemKind::Via, "Board.get_vias", args)
}

fn get_zones(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    item_list(lease, ItemKind::Zone, "Board.get_zones", args)
}

fn get_nets(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    bind_args("Board.get_nets", args, &[], 0)?;
    let nets = lease.get_nets()?;
    Ok(Value::list(nets.into_iter().map(NetObject::value).collect()))
}

fn find_net(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.find_net", args, &["name"], 1)?;
    let name = required(&bound[0])?.expect_str("Board.find_net")?;
    let found = lease.get_nets()?.into_iter().find(|net| *net.name == *name);
    Ok(found.map(NetObject::value).unwrap_or(Value::None))
}

fn find_footprint(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.find_footprint", args, &["reference"], 1)?;
    let reference = required(&bound[0])?.expect_str("Board.find_footprint")?;
    let found = lease
        .get_items(ItemKind::Footprint)?
        .into_iter()
        .find(|item| matches!(item, BoardItem::Footprint(fp) if *fp.reference == *reference));
    Ok(found.map(ItemObject::value).unwrap_or(Value::None))
}

fn get_info(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    bind_args("Board.get_info", args, &[], 0)?;
    let info = lease.refresh_document()?;
    let count = |n: usize| Value::Int(n as i64);
    let mut entries = IndexMap::new();
    entries.insert(DictKey::from("name"), Value::from(info.name.as_str()));
    entries.insert(
        DictKey::from("copper_layer_count"),
        Value::Int(i64::from(info.copper_layer_count)),
    );
    entries.insert(DictKey::from("net_count"), count(info.net_count));
    entries.insert(DictKey::from("footprint_count"), count(info.footprint_count));
    entries.insert(DictKey::from("pad_count"), count(info.pad_count));
    entries.insert(DictKey::from("track_count"), count(info.track_count));
    entries.insert(DictKey::from("via_count"), count(info.via_count));
    entries.insert(DictKey::from("zone_count"), count(info.zone_count));
    Ok(Value::dict(entries))
}

fn get_copper_layer_count(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    bind_args("Board.get_copper_layer_count", args, &[], 0)?;
    Ok(Value::Int(i64::from(
        lease.refresh_document()?.copper_layer_count,
    )))
}

/// The item objects passed to a bulk call, in order.
fn item_objects(value: &Value, what: &str) -> RuntimeResult<Vec<Value>> {
    let values = values_of(value);
    for value in &values {
        if value.downcast::<ItemObject>().is_none() {
            return Err(RuntimeError::type_error(
                "board item",
                &value.type_name(),
                what,
            ));
        }
    }
    Ok(values)
}

fn snapshots(objects: &[Value]) -> Vec<BoardItem> {
    objects
        .iter()
        .filter_map(|value| value.downcast::<ItemObject>())
        .map(ItemObject::snapshot)
        .collect()
}

fn refresh_all(objects: &[Value], stored: Vec<BoardItem>) {
    for (value, item) in objects.iter().zip(stored) {
        if let Some(object) = value.downcast::<ItemObject>() {
            object.refresh(item);
        }
    }
}

fn create_items(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.create_items", args, &["items"], 1)?;
    let objects = item_objects(required(&bound[0])?, "Board.create_items")?;
    let stored = lease.create_items(snapshots(&objects))?;
    refresh_all(&objects, stored);
    Ok(Value::list(objects))
}

fn update_items(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.update_items", args, &["items"], 1)?;
    let objects = item_objects(required(&bound[0])?, "Board.update_items")?;
    let stored = lease.update_items(snapshots(&objects))?;
    refresh_all(&objects, stored);
    Ok(Value::list(objects))
}

fn remove_items(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.remove_items", args, &["items"], 1)?;
    let mut ids = Vec::new();
    for value in values_of(required(&bound[0])?) {
        let id = match (&value, value.downcast::<ItemObject>()) {
            (_, Some(object)) => object.id().ok_or_else(|| {
                RuntimeError::value_error("Board.remove_items: item is not on the board")
            })?,
            (Value::Str(id), None) => id.to_string(),
            (other, None) => {
                return Err(RuntimeError::type_error(
                    "board item or id",
                    &other.type_name(),
                    "Board.remove_items",
                ))
            }
        };
        ids.push(id);
    }
    let removed = lease.remove_items(ids)?;
    Ok(Value::Int(removed as i64))
}

/// Handle on an open commit.
pub struct CommitObject(pub CommitToken);

impl NativeObject for CommitObject {
    fn type_name(&self) -> &str {
        "Commit"
    }

    fn get_attr(&self, name: &str) -> RuntimeResult<Value> {
        match name {
            "id" => Ok(Value::from(self.0.as_str())),
            _ => Err(RuntimeError::attribute_not_found("Commit", name)),
        }
    }

    fn repr(&self) -> RuntimeResult<String> {
        Ok(format!("<Commit {}>", self.0))
    }

    fn equals(&self, other: &dyn NativeObject) -> bool {
        other
            .as_any()
            .downcast_ref::<CommitObject>()
            .map(|other| other.0 == self.0)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn commit_arg(value: &Value, what: &str) -> RuntimeResult<CommitToken> {
    value
        .downcast::<CommitObject>()
        .map(|commit| commit.0.clone())
        .ok_or_else(|| RuntimeError::type_error("Commit", &value.type_name(), what))
}

fn begin_commit(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    bind_args("Board.begin_commit", args, &[], 0)?;
    Ok(Value::object(CommitObject(lease.begin_commit()?)))
}

fn push_commit(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.push_commit", args, &["commit", "message"], 1)?;
    let token = commit_arg(required(&bound[0])?, "Board.push_commit")?;
    let message = match &bound[1] {
        Some(message) => message.expect_str("Board.push_commit")?.to_string(),
        None => String::new(),
    };
    lease.push_commit(&token, &message)?;
    Ok(Value::None)
}

fn drop_commit(lease: &SessionLease, args: CallArgs) -> RuntimeResult<Value> {
    let bound = bind_args("Board.drop_commit", args, &["commit"], 1)?;
    let token = commit_arg(required(&bound[0])?, "Board.drop_commit")?;
    lease.drop_commit(&token)?;
    Ok(Value::None)
}
