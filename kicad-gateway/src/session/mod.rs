//! Document session: board model, backends and the single-writer gateway.

pub mod backend;
pub mod bridge;
pub mod gateway;
pub mod memory;
pub mod model;

use std::sync::Arc;

use tracing::info;

pub use backend::{BoardBackend, CommitToken, SessionError};
pub use bridge::BridgeBackend;
pub use gateway::{SessionGateway, SessionLease};
pub use memory::{demo_board, CommitRecord, MemoryBackend};
pub use model::{
    Angle, BoardDocument, BoardItem, BoardLayer, DocumentInfo, Footprint, ItemKind, Net, Pad,
    Track, Vector2, Via, ViaType, Zone,
};

use crate::config::{BackendKind, SessionConfig};

/// Build the backend selected by the session config.
pub fn open_backend(config: &SessionConfig) -> Result<Arc<dyn BoardBackend>, SessionError> {
    match config.backend {
        BackendKind::Memory => {
            let backend = match &config.board_file {
                Some(path) => MemoryBackend::load(path, config.persist_on_push)?,
                None => {
                    info!("No board file configured, using the demo board");
                    MemoryBackend::demo()
                }
            };
            Ok(Arc::new(backend))
        }
        BackendKind::Bridge => {
            info!("Using KiCad bridge at {}", config.bridge_url);
            Ok(Arc::new(BridgeBackend::new(
                config.bridge_url.clone(),
                config.request_timeout(),
            )?))
        }
    }
}
