//! Resource catalog
//!
//! Read-only documentation and example scripts, published as
//! `kicad-api://` resources. The catalog is built once at startup and never
//! changes afterwards.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bridge::bindings;

pub const URI_SCHEME: &str = "kicad-api://";
pub const EXAMPLE_TEMPLATE: &str = "kicad-api://examples/{name}";

const MARKDOWN: &str = "text/markdown";
const KISCRIPT: &str = "text/x-kiscript";
const EXAMPLE_EXTENSION: &str = "kis";
const EXAMPLE_PREFIX: &str = "example:";
// `kicad-api://examples/list` is the listing itself.
const RESERVED_EXAMPLE_NAME: &str = "list";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Resource not found: {0}")]
    UnknownResource(String),
    #[error("Unknown documentation name '{name}'. Valid names: {valid}")]
    UnknownDocName { name: String, valid: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    #[serde(skip)]
    pub content: String,
}

/// Advertised URI template (`resources/templates/list`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

struct Document {
    key: &'static str,
    title: &'static str,
    description: &'static str,
    content: &'static str,
}

static DOCUMENTS: &[Document] = &[
    Document {
        key: "overview",
        title: "KiCad scripting overview",
        description: "Quick start, common operations and key concepts",
        content: include_str!("../../resources/overview.md"),
    },
    Document {
        key: "language",
        title: "KiScript language",
        description: "Syntax, builtins and limits of the snippet language",
        content: include_str!("../../resources/language.md"),
    },
    Document {
        key: "board",
        title: "Board API",
        description: "Board queries, item changes and commits",
        content: include_str!("../../resources/board.md"),
    },
    Document {
        key: "board_types",
        title: "Board item types",
        description: "Footprint, Pad, Track, Via, Zone, Net and Commit",
        content: include_str!("../../resources/board_types.md"),
    },
    Document {
        key: "geometry",
        title: "Geometry and units",
        description: "Vector2, Angle, unit conversion and enums",
        content: include_str!("../../resources/geometry.md"),
    },
];

static BUILTIN_EXAMPLES: &[(&str, &str)] = &[
    (
        "adjust_pad_clearance",
        include_str!("../../resources/examples/adjust_pad_clearance.kis"),
    ),
    (
        "board_info",
        include_str!("../../resources/examples/board_info.kis"),
    ),
    (
        "create_via_grid",
        include_str!("../../resources/examples/create_via_grid.kis"),
    ),
    (
        "list_gnd_pads",
        include_str!("../../resources/examples/list_gnd_pads.kis"),
    ),
    (
        "organize_footprints_in_grid",
        include_str!("../../resources/examples/organize_footprints_in_grid.kis"),
    ),
];

/// Friendly names accepted by [`ResourceCatalog::resolve_doc_name`], besides
/// `example:NAME`.
const DOC_NAMES: &[&str] = &[
    "overview",
    "language",
    "board",
    "board_types",
    "geometry",
    "namespace",
    "examples",
];

#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    entries: IndexMap<String, ResourceEntry>,
    examples: Vec<String>,
}

impl ResourceCatalog {
    /// Catalog with the built-in documents and examples only.
    pub fn builtin() -> Self {
        Self::build(None)
    }

    /// Build the catalog. `*.kis` files in `examples_dir` are added as
    /// examples; one named like a built-in replaces it. An unreadable
    /// directory is logged and skipped.
    pub fn build(examples_dir: Option<&Path>) -> Self {
        let mut examples: IndexMap<String, String> = BUILTIN_EXAMPLES
            .iter()
            .map(|(name, source)| (name.to_string(), source.to_string()))
            .collect();
        if let Some(dir) = examples_dir {
            for (name, source) in read_examples_dir(dir) {
                if examples.insert(name.clone(), source).is_some() {
                    debug!("Example '{}' overrides the built-in one", name);
                }
            }
        }
        examples.sort_keys();

        let mut entries = IndexMap::new();
        for doc in DOCUMENTS {
            insert(
                &mut entries,
                ResourceEntry {
                    uri: format!("{URI_SCHEME}{}", doc.key),
                    name: doc.title.to_string(),
                    description: doc.description.to_string(),
                    mime_type: MARKDOWN.to_string(),
                    content: doc.content.to_string(),
                },
            );
        }
        insert(
            &mut entries,
            ResourceEntry {
                uri: format!("{URI_SCHEME}namespace"),
                name: "Script namespace".to_string(),
                description: "Every name bound into a snippet, with signatures".to_string(),
                mime_type: MARKDOWN.to_string(),
                content: namespace_doc(),
            },
        );
        insert(
            &mut entries,
            ResourceEntry {
                uri: format!("{URI_SCHEME}examples/list"),
                name: "Example scripts".to_string(),
                description: "Names and summaries of the example scripts".to_string(),
                mime_type: MARKDOWN.to_string(),
                content: examples_list(&examples),
            },
        );
        for (name, source) in &examples {
            insert(
                &mut entries,
                ResourceEntry {
                    uri: example_uri(name),
                    name: format!("Example: {name}"),
                    description: summary_line(source)
                        .unwrap_or("KiScript example")
                        .to_string(),
                    mime_type: KISCRIPT.to_string(),
                    content: source.clone(),
                },
            );
        }

        info!(
            "Resource catalog ready: {} entries ({} examples)",
            entries.len(),
            examples.len()
        );
        Self {
            entries,
            examples: examples.into_keys().collect(),
        }
    }

    /// Identifiers in publication order.
    pub fn list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.values()
    }

    pub fn get(&self, uri: &str) -> Result<&ResourceEntry, DiscoveryError> {
        self.entries
            .get(uri)
            .ok_or_else(|| DiscoveryError::UnknownResource(uri.to_string()))
    }

    pub fn example_names(&self) -> &[String] {
        &self.examples
    }

    pub fn templates(&self) -> Vec<ResourceTemplate> {
        vec![ResourceTemplate {
            uri_template: EXAMPLE_TEMPLATE.to_string(),
            name: "Example script".to_string(),
            description: format!(
                "One example script by name ({})",
                self.examples.join(", ")
            ),
            mime_type: KISCRIPT.to_string(),
        }]
    }

    /// Map a friendly doc name (`board`, `example:create_via_grid`, ...) to
    /// its entry.
    pub fn resolve_doc_name(&self, name: &str) -> Result<&ResourceEntry, DiscoveryError> {
        let name = name.trim();
        let lowered = name.to_ascii_lowercase();
        let uri = if lowered.starts_with(EXAMPLE_PREFIX) {
            // ASCII lowercasing keeps byte offsets, so the prefix length
            // applies to the original-case name too.
            let example = &name[EXAMPLE_PREFIX.len()..];
            let example = if lowered.ends_with(".kis") {
                &example[..example.len() - ".kis".len()]
            } else {
                example
            };
            let known = self
                .examples
                .iter()
                .find(|e| e.as_str() == example)
                .or_else(|| self.examples.iter().find(|e| e.eq_ignore_ascii_case(example)))
                .ok_or_else(|| self.unknown_doc_name(name))?;
            example_uri(known)
        } else if lowered == "examples" {
            format!("{URI_SCHEME}examples/list")
        } else if DOC_NAMES.contains(&lowered.as_str()) {
            format!("{URI_SCHEME}{lowered}")
        } else {
            return Err(self.unknown_doc_name(name));
        };
        self.entries
            .get(&uri)
            .ok_or_else(|| self.unknown_doc_name(name))
    }

    fn unknown_doc_name(&self, name: &str) -> DiscoveryError {
        let valid = DOC_NAMES
            .iter()
            .map(|n| n.to_string())
            .chain(self.examples.iter().map(|e| format!("example:{e}")))
            .collect::<Vec<_>>()
            .join(", ");
        DiscoveryError::UnknownDocName {
            name: name.to_string(),
            valid,
        }
    }
}

fn insert(entries: &mut IndexMap<String, ResourceEntry>, entry: ResourceEntry) {
    entries.insert(entry.uri.clone(), entry);
}

fn example_uri(name: &str) -> String {
    format!("{URI_SCHEME}examples/{name}")
}

/// First comment line of a script, without the `#`.
fn summary_line(source: &str) -> Option<&str> {
    source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn read_examples_dir(dir: &Path) -> Vec<(String, String)> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            warn!("Cannot read examples directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for entry in read.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXAMPLE_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if name == RESERVED_EXAMPLE_NAME {
            warn!(
                "Skipping example {}: '{}' is reserved for the listing",
                path.display(),
                RESERVED_EXAMPLE_NAME
            );
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(source) if source.trim().is_empty() => {
                warn!("Skipping empty example {}", path.display())
            }
            Ok(source) => found.push((name.to_string(), source)),
            Err(e) => warn!("Skipping example {}: {}", path.display(), e),
        }
    }
    found.sort();
    found
}

fn namespace_doc() -> String {
    let mut doc = String::from(
        "# Script Namespace\n\n\
         Besides the KiScript builtins (see kicad-api://language), every snippet\n\
         sees exactly these names. Nothing else from the host is reachable.\n",
    );
    for binding in bindings() {
        let _ = write!(
            doc,
            "\n## {}\n\n`{}`\n\n{}\n",
            binding.name, binding.signature, binding.summary
        );
        if !binding.members.is_empty() {
            doc.push('\n');
            for member in binding.members {
                let _ = writeln!(doc, "- `{}`: {}", member.signature, member.summary);
            }
        }
    }
    doc
}

fn examples_list(examples: &IndexMap<String, String>) -> String {
    let mut doc = String::from("# Example Scripts\n\n");
    for (name, source) in examples {
        let _ = writeln!(
            doc,
            "- `{}` ({}): {}",
            name,
            example_uri(name),
            summary_line(source).unwrap_or("KiScript example")
        );
    }
    doc.push_str("\nRead one with `read_kicad_api_docs(\"example:NAME\")`.\n");
    doc
}
