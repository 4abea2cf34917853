//! In-process board backend.
//!
//! Holds one `BoardDocument` behind a mutex. Used when no KiCad instance is
//! attached (offline editing of a JSON board file, the demo board) and by
//! the tests, which drive the fault-injection hooks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::backend::{BoardBackend, CommitToken, SessionError};
use super::model::{
    mm_to_nm, Angle, BoardDocument, BoardItem, BoardLayer, DocumentInfo, Footprint, ItemKind,
    Net, Pad, Track, Vector2, Via, ViaType, Zone,
};

/// A pushed commit, kept in an append-only history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRecord {
    pub token: CommitToken,
    pub message: String,
    pub changes: usize,
    pub pushed_at: DateTime<Utc>,
}

struct OpenCommit {
    token: CommitToken,
    /// Document as it was at `begin_commit`; restored on drop.
    snapshot: BoardDocument,
    changes: usize,
}

struct MemoryState {
    document: Option<BoardDocument>,
    reachable: bool,
    reject_next_push: Option<String>,
    open_commit: Option<OpenCommit>,
    history: Vec<CommitRecord>,
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    board_file: Option<PathBuf>,
    persist_on_push: bool,
}

impl MemoryBackend {
    pub fn new(document: BoardDocument) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                document: Some(document),
                reachable: true,
                reject_next_push: None,
                open_commit: None,
                history: Vec::new(),
            }),
            board_file: None,
            persist_on_push: false,
        }
    }

    pub fn demo() -> Self {
        Self::new(demo_board())
    }

    /// Load a JSON board file. With `persist_on_push` the document is
    /// written back after every pushed commit.
    pub fn load(path: &Path, persist_on_push: bool) -> Result<Self, SessionError> {
        let data = fs::read_to_string(path)
            .map_err(|e| SessionError::Storage(format!("{}: {}", path.display(), e)))?;
        let document: BoardDocument = serde_json::from_str(&data)
            .map_err(|e| SessionError::Storage(format!("{}: {}", path.display(), e)))?;
        info!(
            "Loaded board '{}' from {} ({} footprints)",
            document.name,
            path.display(),
            document.footprints.len()
        );
        let mut backend = Self::new(document);
        backend.board_file = Some(path.to_path_buf());
        backend.persist_on_push = persist_on_push;
        Ok(backend)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the open document.
    fn with_document<T>(
        &self,
        f: impl FnOnce(&mut BoardDocument, &mut Option<OpenCommit>) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut state = self.lock();
        if !state.reachable {
            return Err(SessionError::Unavailable(
                "memory backend is marked unreachable".to_string(),
            ));
        }
        let MemoryState {
            document,
            open_commit,
            ..
        } = &mut *state;
        match document {
            Some(document) => f(document, open_commit),
            None => Err(SessionError::NoDocument),
        }
    }

    /// Copy of the current document, if one is open.
    pub fn document(&self) -> Option<BoardDocument> {
        self.lock().document.clone()
    }

    pub fn history(&self) -> Vec<CommitRecord> {
        self.lock().history.clone()
    }

    pub fn has_open_commit(&self) -> bool {
        self.lock().open_commit.is_some()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Close the document; any open commit goes with it.
    pub fn close_document(&self) {
        let mut state = self.lock();
        state.document = None;
        state.open_commit = None;
    }

    /// Make the next `push_commit` fail with `CommitRejected`.
    pub fn reject_next_push(&self, reason: impl Into<String>) {
        self.lock().reject_next_push = Some(reason.into());
    }

    fn persist(&self, document: &BoardDocument) -> Result<(), SessionError> {
        let Some(path) = self.board_file.as_ref().filter(|_| self.persist_on_push) else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        fs::write(path, json)
            .map_err(|e| SessionError::Storage(format!("{}: {}", path.display(), e)))?;
        debug!("Persisted board to {}", path.display());
        Ok(())
    }
}

fn record_changes(open_commit: &mut Option<OpenCommit>, count: usize) {
    if let Some(commit) = open_commit {
        commit.changes += count;
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Replace each net reference by the board's own net of that name.
fn canonical_net(document: &BoardDocument, net: &mut Option<Net>) -> Result<(), SessionError> {
    if let Some(requested) = net.as_ref() {
        let found = document.find_net(&requested.name).cloned().ok_or_else(|| {
            SessionError::InvalidItem(format!(
                "net '{}' does not exist on the board",
                requested.name
            ))
        })?;
        *net = Some(found);
    }
    Ok(())
}

fn check_layer(document: &BoardDocument, layer: BoardLayer) -> Result<(), SessionError> {
    if layer.exists_on(document.copper_layer_count) {
        Ok(())
    } else {
        Err(SessionError::InvalidItem(format!(
            "layer {} does not exist on a {}-layer board",
            layer, document.copper_layer_count
        )))
    }
}

/// Validate an item against the board and canonicalize its nets.
fn normalize(document: &BoardDocument, item: &mut BoardItem) -> Result<(), SessionError> {
    match item {
        BoardItem::Footprint(fp) => {
            if fp.reference.trim().is_empty() {
                return Err(SessionError::InvalidItem(
                    "footprint reference must not be empty".to_string(),
                ));
            }
            check_layer(document, fp.layer)?;
            for pad in &mut fp.pads {
                canonical_net(document, &mut pad.net)?;
            }
        }
        BoardItem::Pad(pad) => canonical_net(document, &mut pad.net)?,
        BoardItem::Track(track) => {
            if track.width <= 0 {
                return Err(SessionError::InvalidItem(format!(
                    "track width must be positive, got {} nm",
                    track.width
                )));
            }
            if !track.layer.is_copper() {
                return Err(SessionError::InvalidItem(format!(
                    "tracks must be on a copper layer, not {}",
                    track.layer
                )));
            }
            check_layer(document, track.layer)?;
            canonical_net(document, &mut track.net)?;
        }
        BoardItem::Via(via) => {
            if via.diameter <= 0 || via.drill_diameter <= 0 {
                return Err(SessionError::InvalidItem(
                    "via diameter and drill must be positive".to_string(),
                ));
            }
            if via.drill_diameter >= via.diameter {
                return Err(SessionError::InvalidItem(format!(
                    "via drill ({} nm) must be smaller than its diameter ({} nm)",
                    via.drill_diameter, via.diameter
                )));
            }
            canonical_net(document, &mut via.net)?;
        }
        BoardItem::Zone(zone) => {
            if zone.outline.len() < 3 {
                return Err(SessionError::InvalidItem(
                    "zone outline needs at least 3 points".to_string(),
                ));
            }
            check_layer(document, zone.layer)?;
            canonical_net(document, &mut zone.net)?;
        }
    }
    Ok(())
}

/// Give a footprint's pads ids and point them at their parent.
fn adopt_pads(fp: &mut Footprint) {
    let parent = fp.id.clone();
    for pad in &mut fp.pads {
        if pad.id.is_none() {
            pad.id = Some(new_id());
        }
        pad.parent = parent.clone();
    }
}

fn contains_id(document: &BoardDocument, id: &str) -> bool {
    let matches = |candidate: &Option<String>| candidate.as_deref() == Some(id);
    document.footprints.iter().any(|fp| matches(&fp.id))
        || document.pads().any(|pad| matches(&pad.id))
        || document.tracks.iter().any(|t| matches(&t.id))
        || document.vias.iter().any(|v| matches(&v.id))
        || document.zones.iter().any(|z| matches(&z.id))
}

fn items_of(document: &BoardDocument, kind: ItemKind) -> Vec<BoardItem> {
    match kind {
        ItemKind::Footprint => document
            .footprints
            .iter()
            .cloned()
            .map(BoardItem::Footprint)
            .collect(),
        ItemKind::Pad => document.pads().cloned().map(BoardItem::Pad).collect(),
        ItemKind::Track => document.tracks.iter().cloned().map(BoardItem::Track).collect(),
        ItemKind::Via => document.vias.iter().cloned().map(BoardItem::Via).collect(),
        ItemKind::Zone => document.zones.iter().cloned().map(BoardItem::Zone).collect(),
    }
}

/// Overwrite the stored item with the same id. Returns false if absent.
fn replace_item(document: &mut BoardDocument, item: &BoardItem) -> bool {
    fn put<T: Clone>(slot: Option<&mut T>, value: &T) -> bool {
        match slot {
            Some(slot) => {
                *slot = value.clone();
                true
            }
            None => false,
        }
    }
    let id = item.id();
    match item {
        BoardItem::Footprint(fp) => put(
            document.footprints.iter_mut().find(|f| f.id.as_deref() == id),
            fp,
        ),
        BoardItem::Pad(pad) => {
            let slot = document
                .footprints
                .iter_mut()
                .flat_map(|fp| fp.pads.iter_mut())
                .find(|p| p.id.as_deref() == id);
            match slot {
                Some(slot) => {
                    // The parent link belongs to the board, not the caller.
                    let parent = slot.parent.clone();
                    *slot = pad.clone();
                    slot.parent = parent;
                    true
                }
                None => false,
            }
        }
        BoardItem::Track(track) => put(
            document.tracks.iter_mut().find(|t| t.id.as_deref() == id),
            track,
        ),
        BoardItem::Via(via) => put(document.vias.iter_mut().find(|v| v.id.as_deref() == id), via),
        BoardItem::Zone(zone) => put(
            document.zones.iter_mut().find(|z| z.id.as_deref() == id),
            zone,
        ),
    }
}

fn remove_id(document: &mut BoardDocument, id: &str) {
    let keep = |candidate: &Option<String>| candidate.as_deref() != Some(id);
    document.footprints.retain(|fp| keep(&fp.id));
    for fp in &mut document.footprints {
        fp.pads.retain(|pad| keep(&pad.id));
    }
    document.tracks.retain(|t| keep(&t.id));
    document.vias.retain(|v| keep(&v.id));
    document.zones.retain(|z| keep(&z.id));
}

impl BoardBackend for MemoryBackend {
    fn ping(&self) -> Result<(), SessionError> {
        if self.lock().reachable {
            Ok(())
        } else {
            Err(SessionError::Unavailable(
                "memory backend is marked unreachable".to_string(),
            ))
        }
    }

    fn open_document(&self) -> Result<DocumentInfo, SessionError> {
        self.with_document(|document, _| Ok(document.info()))
    }

    fn get_nets(&self) -> Result<Vec<Net>, SessionError> {
        self.with_document(|document, _| Ok(document.nets.clone()))
    }

    fn get_items(&self, kind: ItemKind) -> Result<Vec<BoardItem>, SessionError> {
        self.with_document(|document, _| Ok(items_of(document, kind)))
    }

    fn create_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError> {
        self.with_document(|document, open_commit| {
            let mut created = Vec::with_capacity(items.len());
            for mut item in items {
                if item.kind() == ItemKind::Pad {
                    return Err(SessionError::InvalidItem(
                        "pads are created together with their footprint".to_string(),
                    ));
                }
                normalize(document, &mut item)?;
                item.set_id(new_id());
                if let BoardItem::Footprint(fp) = &mut item {
                    for pad in &mut fp.pads {
                        pad.id = None;
                    }
                    adopt_pads(fp);
                }
                created.push(item);
            }
            for item in &created {
                match item.clone() {
                    BoardItem::Footprint(fp) => document.footprints.push(fp),
                    BoardItem::Track(track) => document.tracks.push(track),
                    BoardItem::Via(via) => document.vias.push(via),
                    BoardItem::Zone(zone) => document.zones.push(zone),
                    BoardItem::Pad(_) => {}
                }
            }
            record_changes(open_commit, created.len());
            Ok(created)
        })
    }

    fn update_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError> {
        self.with_document(|document, open_commit| {
            let mut updated = Vec::with_capacity(items.len());
            for mut item in items {
                let id = item.id().map(str::to_string).ok_or_else(|| {
                    SessionError::InvalidItem(format!(
                        "{} has not been created on the board yet",
                        item.kind().name()
                    ))
                })?;
                if !items_of(document, item.kind())
                    .iter()
                    .any(|existing| existing.id() == Some(id.as_str()))
                {
                    return Err(SessionError::UnknownItem(id));
                }
                normalize(document, &mut item)?;
                if let BoardItem::Footprint(fp) = &mut item {
                    adopt_pads(fp);
                }
                updated.push(item);
            }
            for item in &updated {
                replace_item(document, item);
            }
            // Pads come back with the parent the board holds.
            let refreshed = updated
                .into_iter()
                .map(|item| {
                    let stored = match &item {
                        BoardItem::Pad(pad) => document.pads().find(|p| p.id == pad.id).cloned(),
                        _ => None,
                    };
                    stored.map(BoardItem::Pad).unwrap_or(item)
                })
                .collect::<Vec<_>>();
            record_changes(open_commit, refreshed.len());
            Ok(refreshed)
        })
    }

    fn remove_items(&self, ids: Vec<String>) -> Result<usize, SessionError> {
        self.with_document(|document, open_commit| {
            if let Some(missing) = ids.iter().find(|id| !contains_id(document, id)) {
                return Err(SessionError::UnknownItem(missing.clone()));
            }
            for id in &ids {
                remove_id(document, id);
            }
            record_changes(open_commit, ids.len());
            Ok(ids.len())
        })
    }

    fn begin_commit(&self) -> Result<CommitToken, SessionError> {
        self.with_document(|document, open_commit| {
            if let Some(commit) = open_commit {
                return Err(SessionError::CommitRejected(format!(
                    "commit {} is still open",
                    commit.token
                )));
            }
            let token = CommitToken::generate();
            *open_commit = Some(OpenCommit {
                token: token.clone(),
                snapshot: document.clone(),
                changes: 0,
            });
            Ok(token)
        })
    }

    fn push_commit(&self, token: &CommitToken, message: &str) -> Result<(), SessionError> {
        let mut state = self.lock();
        if !state.reachable {
            return Err(SessionError::Unavailable(
                "memory backend is marked unreachable".to_string(),
            ));
        }
        match &state.open_commit {
            Some(commit) if &commit.token == token => {}
            _ => return Err(SessionError::UnknownCommit(token.to_string())),
        }
        if let Some(reason) = state.reject_next_push.take() {
            // The commit stays open; its owner decides whether to drop it.
            return Err(SessionError::CommitRejected(reason));
        }
        let Some(commit) = state.open_commit.take() else {
            return Err(SessionError::UnknownCommit(token.to_string()));
        };
        state.history.push(CommitRecord {
            token: commit.token,
            message: message.to_string(),
            changes: commit.changes,
            pushed_at: Utc::now(),
        });
        match &state.document {
            Some(document) => self.persist(document),
            None => Ok(()),
        }
    }

    fn drop_commit(&self, token: &CommitToken) -> Result<(), SessionError> {
        let mut state = self.lock();
        match state.open_commit.take() {
            Some(commit) if &commit.token == token => {
                state.document = Some(commit.snapshot);
                Ok(())
            }
            other => {
                state.open_commit = other;
                Err(SessionError::UnknownCommit(token.to_string()))
            }
        }
    }
}

/// Small two-layer board used when no board file is configured.
pub fn demo_board() -> BoardDocument {
    let mut ids = 0u64;
    let mut next_id = move || {
        ids += 1;
        format!("00000000-0000-4000-8000-{ids:012x}")
    };
    let nets: Vec<Net> = ["", "GND", "+3V3", "GNDA", "/SDA", "/SCL"]
        .iter()
        .enumerate()
        .map(|(code, name)| Net {
            code: code as i64,
            name: name.to_string(),
        })
        .collect();
    let net = |name: &str| nets.iter().find(|n| n.name == name).cloned();

    let mut footprint = |reference: &str, value: &str, at: (f64, f64), pads: &[&str]| {
        let id = next_id();
        let position = Vector2::from_xy_mm(at.0, at.1);
        let pads = pads
            .iter()
            .enumerate()
            .map(|(index, net_name)| Pad {
                id: Some(next_id()),
                number: (index + 1).to_string(),
                position: Vector2::from_xy(position.x + mm_to_nm(index as f64 * 1.27), position.y),
                net: net(*net_name),
                copper_clearance_override: None,
                parent: Some(id.clone()),
            })
            .collect();
        Footprint {
            id: Some(id),
            reference: reference.to_string(),
            value: value.to_string(),
            position,
            orientation: Angle::default(),
            layer: BoardLayer::FrontCopper,
            locked: false,
            pads,
        }
    };

    let footprints = vec![
        footprint("U1", "MCU", (50.0, 40.0), &["+3V3", "GND", "/SDA", "/SCL"]),
        footprint("R1", "4k7", (40.0, 30.0), &["+3V3", "/SDA"]),
        footprint("R2", "4k7", (43.0, 30.0), &["+3V3", "/SCL"]),
        footprint("R3", "0R", (60.0, 30.0), &["GNDA", "GND"]),
        footprint("C1", "100n", (45.0, 50.0), &["+3V3", "GND"]),
        footprint("C2", "10u", (55.0, 50.0), &["+3V3", "GND"]),
        footprint("J1", "Conn_01x04", (20.0, 40.0), &["+3V3", "GND", "/SDA", "/SCL"]),
    ];

    let mut track = |start: (f64, f64), end: (f64, f64), width_mm: f64, layer, net_name: &str| {
        Track {
            id: Some(next_id()),
            start: Vector2::from_xy_mm(start.0, start.1),
            end: Vector2::from_xy_mm(end.0, end.1),
            width: mm_to_nm(width_mm),
            layer,
            net: net(net_name),
            locked: false,
        }
    };
    let tracks = vec![
        track((22.54, 40.0), (41.27, 30.0), 0.25, BoardLayer::FrontCopper, "/SDA"),
        track((23.81, 40.0), (44.27, 30.0), 0.25, BoardLayer::FrontCopper, "/SCL"),
        track((21.27, 40.0), (46.27, 50.0), 0.5, BoardLayer::BackCopper, "GND"),
    ];

    let vias = vec![Via {
        id: Some(next_id()),
        position: Vector2::from_xy_mm(45.0, 55.0),
        diameter: mm_to_nm(0.8),
        drill_diameter: mm_to_nm(0.4),
        via_type: ViaType::Through,
        net: net("GND"),
        locked: false,
    }];

    let zones = vec![Zone {
        id: Some(next_id()),
        name: "GND pour".to_string(),
        layer: BoardLayer::BackCopper,
        net: net("GND"),
        priority: 0,
        outline: vec![
            Vector2::from_xy_mm(10.0, 10.0),
            Vector2::from_xy_mm(90.0, 10.0),
            Vector2::from_xy_mm(90.0, 70.0),
            Vector2::from_xy_mm(10.0, 70.0),
        ],
        filled: true,
    }];

    BoardDocument {
        name: "demo.kicad_pcb".to_string(),
        copper_layer_count: 2,
        nets,
        footprints,
        tracks,
        vias,
        zones,
    }
}
