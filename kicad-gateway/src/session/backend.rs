//! Backend trait and error types for the document session.
//!
//! A backend is the gateway's only view of KiCad. Calls are synchronous;
//! the async side reaches them through `spawn_blocking`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{BoardItem, DocumentInfo, ItemKind, Net};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("KiCad is not reachable: {0}")]
    Unavailable(String),
    #[error("no board document is open in KiCad")]
    NoDocument,
    #[error("commit rejected: {0}")]
    CommitRejected(String),
    #[error("unknown commit '{0}'")]
    UnknownCommit(String),
    #[error("item '{0}' does not exist on the board")]
    UnknownItem(String),
    #[error("invalid item: {0}")]
    InvalidItem(String),
    #[error("bridge protocol error: {0}")]
    Protocol(String),
    #[error("board file error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Failures that mean there is no usable document to run against.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SessionError::Unavailable(_) | SessionError::NoDocument)
    }

    /// Exception kind seen by scripts.
    pub fn script_kind(&self) -> &'static str {
        match self {
            SessionError::CommitRejected(_) | SessionError::UnknownCommit(_) => "CommitError",
            _ => "SessionError",
        }
    }
}

impl From<SessionError> for kiscript::RuntimeError {
    fn from(error: SessionError) -> Self {
        kiscript::RuntimeError::host(error.script_kind(), error.to_string())
    }
}

/// Handle for one begin/push commit group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitToken(pub String);

impl CommitToken {
    pub fn generate() -> Self {
        CommitToken(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal document-session API.
///
/// Notes:
/// - Backends must be Send + Sync; one instance is shared by every request.
/// - Mutations apply immediately. While a commit is open they are also
///   grouped so `drop_commit` can revert them.
/// - At most one commit may be open at a time.
pub trait BoardBackend: Send + Sync {
    /// Cheap reachability check.
    fn ping(&self) -> Result<(), SessionError>;
    /// Summary of the open document, or `NoDocument`.
    fn open_document(&self) -> Result<DocumentInfo, SessionError>;
    fn get_nets(&self) -> Result<Vec<Net>, SessionError>;
    fn get_items(&self, kind: ItemKind) -> Result<Vec<BoardItem>, SessionError>;
    /// Returns the created items with their assigned ids.
    fn create_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError>;
    fn update_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError>;
    /// Returns how many items were removed.
    fn remove_items(&self, ids: Vec<String>) -> Result<usize, SessionError>;
    fn begin_commit(&self) -> Result<CommitToken, SessionError>;
    fn push_commit(&self, token: &CommitToken, message: &str) -> Result<(), SessionError>;
    fn drop_commit(&self, token: &CommitToken) -> Result<(), SessionError>;

    /// Liveness probe run before every execution.
    fn probe(&self) -> Result<DocumentInfo, SessionError> {
        self.ping()?;
        self.open_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_kinds() {
        assert_eq!(
            SessionError::CommitRejected("busy".into()).script_kind(),
            "CommitError"
        );
        assert_eq!(SessionError::NoDocument.script_kind(), "SessionError");
        assert!(SessionError::NoDocument.is_unavailable());
        assert!(!SessionError::UnknownItem("x".into()).is_unavailable());

        let error: kiscript::RuntimeError = SessionError::CommitRejected("busy".into()).into();
        assert_eq!(error.kind(), "CommitError");
        assert_eq!(error.to_string(), "commit rejected: busy");
    }

    #[test]
    fn test_commit_tokens_are_unique() {
        assert_ne!(CommitToken::generate(), CommitToken::generate());
        let token = CommitToken("abc".into());
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc\"");
    }
}
