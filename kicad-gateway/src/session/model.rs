//! Board document model.
//!
//! Plain serde types mirroring what the KiCad IPC API exposes. Lengths and
//! coordinates are integer nanometres; angles are degrees.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const NM_PER_MM: f64 = 1_000_000.0;
pub const NM_PER_MIL: f64 = 25_400.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: i64,
    pub y: i64,
}

impl Vector2 {
    pub fn from_xy(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn from_xy_mm(x_mm: f64, y_mm: f64) -> Self {
        Self {
            x: mm_to_nm(x_mm),
            y: mm_to_nm(y_mm),
        }
    }

    pub fn length(&self) -> f64 {
        (self.x as f64).hypot(self.y as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    pub degrees: f64,
}

impl Angle {
    pub fn from_degrees(degrees: f64) -> Self {
        Self { degrees }
    }

    pub fn from_radians(radians: f64) -> Self {
        Self {
            degrees: radians.to_degrees(),
        }
    }

    /// Same angle in `[0, 360)`.
    pub fn normalized(&self) -> Self {
        Self {
            degrees: self.degrees.rem_euclid(360.0),
        }
    }
}

pub fn mm_to_nm(mm: f64) -> i64 {
    (mm * NM_PER_MM).round() as i64
}

pub fn nm_to_mm(nm: i64) -> f64 {
    nm as f64 / NM_PER_MM
}

pub fn mils_to_nm(mils: f64) -> i64 {
    (mils * NM_PER_MIL).round() as i64
}

pub fn nm_to_mils(nm: i64) -> f64 {
    nm as f64 / NM_PER_MIL
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardLayer {
    #[serde(rename = "BL_F_Cu")]
    FrontCopper,
    #[serde(rename = "BL_In1_Cu")]
    Inner1Copper,
    #[serde(rename = "BL_In2_Cu")]
    Inner2Copper,
    #[serde(rename = "BL_In3_Cu")]
    Inner3Copper,
    #[serde(rename = "BL_In4_Cu")]
    Inner4Copper,
    #[serde(rename = "BL_B_Cu")]
    BackCopper,
    #[serde(rename = "BL_F_SilkS")]
    FrontSilkscreen,
    #[serde(rename = "BL_B_SilkS")]
    BackSilkscreen,
    #[serde(rename = "BL_F_Mask")]
    FrontMask,
    #[serde(rename = "BL_B_Mask")]
    BackMask,
    #[serde(rename = "BL_Edge_Cuts")]
    EdgeCuts,
}

impl BoardLayer {
    pub const ALL: [BoardLayer; 11] = [
        BoardLayer::FrontCopper,
        BoardLayer::Inner1Copper,
        BoardLayer::Inner2Copper,
        BoardLayer::Inner3Copper,
        BoardLayer::Inner4Copper,
        BoardLayer::BackCopper,
        BoardLayer::FrontSilkscreen,
        BoardLayer::BackSilkscreen,
        BoardLayer::FrontMask,
        BoardLayer::BackMask,
        BoardLayer::EdgeCuts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BoardLayer::FrontCopper => "BL_F_Cu",
            BoardLayer::Inner1Copper => "BL_In1_Cu",
            BoardLayer::Inner2Copper => "BL_In2_Cu",
            BoardLayer::Inner3Copper => "BL_In3_Cu",
            BoardLayer::Inner4Copper => "BL_In4_Cu",
            BoardLayer::BackCopper => "BL_B_Cu",
            BoardLayer::FrontSilkscreen => "BL_F_SilkS",
            BoardLayer::BackSilkscreen => "BL_B_SilkS",
            BoardLayer::FrontMask => "BL_F_Mask",
            BoardLayer::BackMask => "BL_B_Mask",
            BoardLayer::EdgeCuts => "BL_Edge_Cuts",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|layer| layer.name() == name)
    }

    pub fn is_copper(&self) -> bool {
        matches!(
            self,
            BoardLayer::FrontCopper
                | BoardLayer::Inner1Copper
                | BoardLayer::Inner2Copper
                | BoardLayer::Inner3Copper
                | BoardLayer::Inner4Copper
                | BoardLayer::BackCopper
        )
    }

    /// Inner copper layers only exist on boards with enough layers.
    pub fn exists_on(&self, copper_layer_count: u32) -> bool {
        match self {
            BoardLayer::Inner1Copper | BoardLayer::Inner2Copper => copper_layer_count >= 4,
            BoardLayer::Inner3Copper | BoardLayer::Inner4Copper => copper_layer_count >= 6,
            _ => true,
        }
    }
}

impl fmt::Display for BoardLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViaType {
    #[default]
    #[serde(rename = "VT_THROUGH")]
    Through,
    #[serde(rename = "VT_BLIND_BURIED")]
    BlindBuried,
    #[serde(rename = "VT_MICRO")]
    Micro,
}

impl ViaType {
    pub const ALL: [ViaType; 3] = [ViaType::Through, ViaType::BlindBuried, ViaType::Micro];

    pub fn name(&self) -> &'static str {
        match self {
            ViaType::Through => "VT_THROUGH",
            ViaType::BlindBuried => "VT_BLIND_BURIED",
            ViaType::Micro => "VT_MICRO",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ViaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Net {
    pub code: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reference: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub position: Vector2,
    #[serde(default)]
    pub orientation: Angle,
    #[serde(default = "front_copper")]
    pub layer: BoardLayer,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub pads: Vec<Pad>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub number: String,
    #[serde(default)]
    pub position: Vector2,
    #[serde(default)]
    pub net: Option<Net>,
    /// Local copper clearance in nanometres; `None` inherits the rules.
    #[serde(default)]
    pub copper_clearance_override: Option<i64>,
    /// Id of the owning footprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub start: Vector2,
    pub end: Vector2,
    pub width: i64,
    #[serde(default = "front_copper")]
    pub layer: BoardLayer,
    #[serde(default)]
    pub net: Option<Net>,
    #[serde(default)]
    pub locked: bool,
}

impl Track {
    pub fn length(&self) -> f64 {
        Vector2::from_xy(self.end.x - self.start.x, self.end.y - self.start.y).length()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Via {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub position: Vector2,
    pub diameter: i64,
    pub drill_diameter: i64,
    #[serde(default)]
    pub via_type: ViaType,
    #[serde(default)]
    pub net: Option<Net>,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "front_copper")]
    pub layer: BoardLayer,
    #[serde(default)]
    pub net: Option<Net>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub outline: Vec<Vector2>,
    #[serde(default)]
    pub filled: bool,
}

fn front_copper() -> BoardLayer {
    BoardLayer::FrontCopper
}

/// Which items a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Footprint,
    Pad,
    Track,
    Via,
    Zone,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Footprint => "Footprint",
            ItemKind::Pad => "Pad",
            ItemKind::Track => "Track",
            ItemKind::Via => "Via",
            ItemKind::Zone => "Zone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardItem {
    Footprint(Footprint),
    Pad(Pad),
    Track(Track),
    Via(Via),
    Zone(Zone),
}

impl BoardItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            BoardItem::Footprint(_) => ItemKind::Footprint,
            BoardItem::Pad(_) => ItemKind::Pad,
            BoardItem::Track(_) => ItemKind::Track,
            BoardItem::Via(_) => ItemKind::Via,
            BoardItem::Zone(_) => ItemKind::Zone,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            BoardItem::Footprint(item) => item.id.as_deref(),
            BoardItem::Pad(item) => item.id.as_deref(),
            BoardItem::Track(item) => item.id.as_deref(),
            BoardItem::Via(item) => item.id.as_deref(),
            BoardItem::Zone(item) => item.id.as_deref(),
        }
    }

    pub fn set_id(&mut self, id: String) {
        let slot = match self {
            BoardItem::Footprint(item) => &mut item.id,
            BoardItem::Pad(item) => &mut item.id,
            BoardItem::Track(item) => &mut item.id,
            BoardItem::Via(item) => &mut item.id,
            BoardItem::Zone(item) => &mut item.id,
        };
        *slot = Some(id);
    }

    /// Nets referenced by the item, pads of a footprint included.
    pub fn nets(&self) -> Vec<&Net> {
        match self {
            BoardItem::Footprint(fp) => fp.pads.iter().filter_map(|p| p.net.as_ref()).collect(),
            BoardItem::Pad(pad) => pad.net.iter().collect(),
            BoardItem::Track(track) => track.net.iter().collect(),
            BoardItem::Via(via) => via.net.iter().collect(),
            BoardItem::Zone(zone) => zone.net.iter().collect(),
        }
    }

    pub fn layer(&self) -> Option<BoardLayer> {
        match self {
            BoardItem::Footprint(fp) => Some(fp.layer),
            BoardItem::Track(track) => Some(track.layer),
            BoardItem::Zone(zone) => Some(zone.layer),
            BoardItem::Pad(_) | BoardItem::Via(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub name: String,
    #[serde(default = "two_layers")]
    pub copper_layer_count: u32,
    #[serde(default)]
    pub nets: Vec<Net>,
    #[serde(default)]
    pub footprints: Vec<Footprint>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub vias: Vec<Via>,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

fn two_layers() -> u32 {
    2
}

impl BoardDocument {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            copper_layer_count: 2,
            nets: Vec::new(),
            footprints: Vec::new(),
            tracks: Vec::new(),
            vias: Vec::new(),
            zones: Vec::new(),
        }
    }

    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            name: self.name.clone(),
            copper_layer_count: self.copper_layer_count,
            net_count: self.nets.len(),
            footprint_count: self.footprints.len(),
            pad_count: self.footprints.iter().map(|fp| fp.pads.len()).sum(),
            track_count: self.tracks.len(),
            via_count: self.vias.len(),
            zone_count: self.zones.len(),
        }
    }

    pub fn pads(&self) -> impl Iterator<Item = &Pad> {
        self.footprints.iter().flat_map(|fp| fp.pads.iter())
    }

    pub fn find_net(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|net| net.name == name)
    }
}

/// Summary returned by the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub copper_layer_count: u32,
    pub net_count: usize,
    pub footprint_count: usize,
    pub pad_count: usize,
    pub track_count: usize,
    pub via_count: usize,
    pub zone_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_conversions() {
        assert_eq!(mm_to_nm(0.8), 800_000);
        assert_eq!(mm_to_nm(-1.5), -1_500_000);
        assert_eq!(nm_to_mm(254_000), 0.254);
        assert_eq!(mils_to_nm(10.0), 254_000);
        assert_eq!(nm_to_mils(254_000), 10.0);
        assert_eq!(Vector2::from_xy_mm(1.0, 2.5), Vector2::from_xy(1_000_000, 2_500_000));
    }

    #[test]
    fn test_layer_names_round_trip_through_serde() {
        for layer in BoardLayer::ALL {
            let json = serde_json::to_string(&layer).unwrap();
            assert_eq!(json, format!("\"{}\"", layer.name()));
            assert_eq!(BoardLayer::from_name(layer.name()), Some(layer));
        }
        assert!(!BoardLayer::Inner3Copper.exists_on(4));
        assert!(BoardLayer::Inner1Copper.exists_on(4));
        assert_eq!(ViaType::from_name("VT_MICRO"), Some(ViaType::Micro));
    }

    #[test]
    fn test_items_are_tagged_by_type() {
        let item = BoardItem::Via(Via {
            id: None,
            position: Vector2::from_xy(1, 2),
            diameter: 800_000,
            drill_diameter: 400_000,
            via_type: ViaType::Through,
            net: None,
            locked: false,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "Via");
        assert_eq!(json["via_type"], "VT_THROUGH");
        assert!(json.get("id").is_none());

        let parsed: BoardItem = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.kind(), ItemKind::Via);
    }

    #[test]
    fn test_minimal_board_file_uses_defaults() {
        let board: BoardDocument = serde_json::from_str(
            r#"{"name": "tiny.kicad_pcb", "footprints": [{"reference": "R1", "pads": [{"number": "1"}]}]}"#,
        )
        .unwrap();
        let info = board.info();
        assert_eq!(info.copper_layer_count, 2);
        assert_eq!(info.footprint_count, 1);
        assert_eq!(info.pad_count, 1);
        assert_eq!(board.footprints[0].layer, BoardLayer::FrontCopper);
    }
}
