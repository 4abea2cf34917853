//! JSON-RPC 2.0 client for a KiCad-side bridge endpoint.
//!
//! Every `BoardBackend` call becomes one POST of
//! `{"jsonrpc": "2.0", "id": n, "method": "board.<call>", "params": {...}}`.
//! The bridge answers with the usual `result` / `error` envelope; error codes
//! below map back onto `SessionError`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::blocking::Client as BlockingHttpClient;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::backend::{BoardBackend, CommitToken, SessionError};
use super::model::{BoardItem, DocumentInfo, ItemKind, Net};

/// Bridge reports that KiCad has no board open.
pub const BRIDGE_NO_DOCUMENT: i64 = -32001;
/// Bridge refused a commit operation.
pub const BRIDGE_COMMIT_REJECTED: i64 = -32010;
pub const BRIDGE_UNKNOWN_ITEM: i64 = -32011;
pub const BRIDGE_INVALID_ITEM: i64 = -32012;

pub struct BridgeBackend {
    url: String,
    client: BlockingHttpClient,
    next_id: AtomicU64,
}

impl BridgeBackend {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SessionError> {
        let client = BlockingHttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Unavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("bridge -> {} (id {})", method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|e| SessionError::Unavailable(format!("{} failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Unavailable(format!(
                "{} failed ({} {})",
                method,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| SessionError::Protocol(format!("{}: invalid JSON: {}", method, e)))?;
        decode_response(method, body)
    }
}

/// Split a JSON-RPC envelope into the typed result or a `SessionError`.
fn decode_response<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, SessionError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(match code {
            BRIDGE_NO_DOCUMENT => SessionError::NoDocument,
            BRIDGE_COMMIT_REJECTED => SessionError::CommitRejected(message),
            BRIDGE_UNKNOWN_ITEM => SessionError::UnknownItem(message),
            BRIDGE_INVALID_ITEM => SessionError::InvalidItem(message),
            _ => SessionError::Protocol(format!("{} failed ({}): {}", method, code, message)),
        });
    }
    let result = body
        .get("result")
        .cloned()
        .ok_or_else(|| SessionError::Protocol(format!("{}: response has no result", method)))?;
    serde_json::from_value(result)
        .map_err(|e| SessionError::Protocol(format!("{}: unexpected result: {}", method, e)))
}

impl BoardBackend for BridgeBackend {
    fn ping(&self) -> Result<(), SessionError> {
        self.call::<Value>("board.ping", json!({})).map(|_| ())
    }

    fn open_document(&self) -> Result<DocumentInfo, SessionError> {
        self.call("board.open_document", json!({}))
    }

    fn get_nets(&self) -> Result<Vec<Net>, SessionError> {
        self.call("board.get_nets", json!({}))
    }

    fn get_items(&self, kind: ItemKind) -> Result<Vec<BoardItem>, SessionError> {
        self.call("board.get_items", json!({ "kind": kind }))
    }

    fn create_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError> {
        self.call("board.create_items", json!({ "items": items }))
    }

    fn update_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError> {
        self.call("board.update_items", json!({ "items": items }))
    }

    fn remove_items(&self, ids: Vec<String>) -> Result<usize, SessionError> {
        self.call("board.remove_items", json!({ "ids": ids }))
    }

    fn begin_commit(&self) -> Result<CommitToken, SessionError> {
        self.call("board.begin_commit", json!({}))
    }

    fn push_commit(&self, token: &CommitToken, message: &str) -> Result<(), SessionError> {
        self.call::<Value>(
            "board.push_commit",
            json!({ "token": token, "message": message }),
        )
        .map(|_| ())
    }

    fn drop_commit(&self, token: &CommitToken) -> Result<(), SessionError> {
        self.call::<Value>("board.drop_commit", json!({ "token": token }))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_result() {
        let info: DocumentInfo = decode_response(
            "board.open_document",
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "name": "a.kicad_pcb", "copper_layer_count": 4, "net_count": 1,
                    "footprint_count": 2, "pad_count": 4, "track_count": 0,
                    "via_count": 0, "zone_count": 0
                }
            }),
        )
        .unwrap();
        assert_eq!(info.copper_layer_count, 4);
    }

    #[test]
    fn test_decode_error_codes() {
        let envelope = |code: i64| {
            json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": "nope"}})
        };
        let decode = |code| decode_response::<Value>("board.x", envelope(code)).unwrap_err();
        assert_eq!(decode(BRIDGE_NO_DOCUMENT), SessionError::NoDocument);
        assert_eq!(
            decode(BRIDGE_COMMIT_REJECTED),
            SessionError::CommitRejected("nope".into())
        );
        assert_eq!(
            decode(-32603),
            SessionError::Protocol("board.x failed (-32603): nope".into())
        );
        assert!(matches!(
            decode_response::<Value>("board.x", json!({"jsonrpc": "2.0", "id": 1})),
            Err(SessionError::Protocol(_))
        ));
    }

    #[test]
    fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) on localhost is closed on CI machines.
        let backend = BridgeBackend::new("http://127.0.0.1:9/rpc", Duration::from_millis(500))
            .unwrap();
        let err = backend.ping().unwrap_err();
        assert!(err.is_unavailable(), "{err:?}");
    }
}
