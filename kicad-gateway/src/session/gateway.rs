//! Single-writer access to the document session.
//!
//! Every request goes through `SessionGateway::acquire`, which queues on an
//! async mutex, then probes the backend. The resulting `SessionLease` is the
//! request's only handle on the board and closes out its commits when the
//! request ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::backend::{BoardBackend, CommitToken, SessionError};
use super::model::{BoardItem, DocumentInfo, ItemKind, Net};

pub struct SessionGateway {
    backend: Arc<dyn BoardBackend>,
    writer: Arc<AsyncMutex<()>>,
}

impl SessionGateway {
    pub fn new(backend: Arc<dyn BoardBackend>) -> Self {
        Self {
            backend,
            writer: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn backend(&self) -> &Arc<dyn BoardBackend> {
        &self.backend
    }

    /// Wait for exclusive access, then check the document is reachable.
    ///
    /// Fails with an unavailable error (and releases the guard) when the
    /// probe fails, so no code runs against a missing board.
    pub async fn acquire(&self) -> Result<SessionLease, SessionError> {
        let guard = self.writer.clone().lock_owned().await;
        let backend = self.backend.clone();
        let document = tokio::task::spawn_blocking(move || backend.probe())
            .await
            .map_err(|e| SessionError::Unavailable(format!("liveness probe failed: {e}")))?
            .map_err(|e| match e {
                e if e.is_unavailable() => e,
                other => SessionError::Unavailable(other.to_string()),
            })?;
        debug!(
            "Session lease acquired for '{}' ({} footprints)",
            document.name, document.footprint_count
        );
        Ok(SessionLease {
            backend: self.backend.clone(),
            document,
            open_commits: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
            guard: Mutex::new(Some(guard)),
        })
    }
}

/// Exclusive, request-scoped access to the board.
///
/// Mutations go straight to the backend. Commits begun through the lease
/// are tracked; whatever is still open when the lease finishes is dropped.
/// Finishing also releases the writer guard, even if script values still
/// hold the lease; calls made after that fail.
pub struct SessionLease {
    backend: Arc<dyn BoardBackend>,
    document: DocumentInfo,
    open_commits: Mutex<Vec<CommitToken>>,
    finished: AtomicBool,
    guard: Mutex<Option<OwnedMutexGuard<()>>>,
}

impl SessionLease {
    /// Document summary taken by the liveness probe.
    pub fn document(&self) -> &DocumentInfo {
        &self.document
    }

    fn active(&self) -> Result<&dyn BoardBackend, SessionError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(SessionError::Unavailable(
                "the request that held this session has finished".to_string(),
            ));
        }
        Ok(self.backend.as_ref())
    }

    /// Fresh summary from the backend.
    pub fn refresh_document(&self) -> Result<DocumentInfo, SessionError> {
        self.active()?.open_document()
    }

    pub fn get_nets(&self) -> Result<Vec<Net>, SessionError> {
        self.active()?.get_nets()
    }

    pub fn get_items(&self, kind: ItemKind) -> Result<Vec<BoardItem>, SessionError> {
        self.active()?.get_items(kind)
    }

    pub fn create_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError> {
        self.active()?.create_items(items)
    }

    pub fn update_items(&self, items: Vec<BoardItem>) -> Result<Vec<BoardItem>, SessionError> {
        self.active()?.update_items(items)
    }

    pub fn remove_items(&self, ids: Vec<String>) -> Result<usize, SessionError> {
        self.active()?.remove_items(ids)
    }

    pub fn begin_commit(&self) -> Result<CommitToken, SessionError> {
        let token = self.active()?.begin_commit()?;
        self.commits().push(token.clone());
        Ok(token)
    }

    /// A rejected push leaves the commit open; `finish` abandons it.
    pub fn push_commit(&self, token: &CommitToken, message: &str) -> Result<(), SessionError> {
        self.active()?.push_commit(token, message)?;
        self.commits().retain(|open| open != token);
        Ok(())
    }

    pub fn drop_commit(&self, token: &CommitToken) -> Result<(), SessionError> {
        self.active()?.drop_commit(token)?;
        self.commits().retain(|open| open != token);
        Ok(())
    }

    pub fn open_commits(&self) -> Vec<CommitToken> {
        self.commits().clone()
    }

    fn commits(&self) -> std::sync::MutexGuard<'_, Vec<CommitToken>> {
        self.open_commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Abandon every commit still open, release the writer guard and
    /// return the abandoned tokens.
    ///
    /// Runs once; later calls (including the one from `Drop`) return nothing.
    pub fn finish(&self) -> Vec<CommitToken> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        let abandoned: Vec<CommitToken> = std::mem::take(&mut *self.commits());
        for token in &abandoned {
            warn!("Abandoning commit {} left open by the request", token);
            if let Err(e) = self.backend.drop_commit(token) {
                warn!("Failed to drop abandoned commit {}: {}", token, e);
            }
        }
        self.guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        abandoned
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::MemoryBackend;
    use crate::session::model::{mm_to_nm, Vector2, Via, ViaType};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn via() -> BoardItem {
        BoardItem::Via(Via {
            id: None,
            position: Vector2::from_xy_mm(5.0, 5.0),
            diameter: mm_to_nm(0.6),
            drill_diameter: mm_to_nm(0.3),
            via_type: ViaType::Through,
            net: None,
            locked: false,
        })
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_rejected_before_lease() {
        let backend = Arc::new(MemoryBackend::demo());
        backend.set_reachable(false);
        let gateway = SessionGateway::new(backend.clone());
        let err = gateway.acquire().await.err().unwrap();
        assert!(err.is_unavailable());

        backend.set_reachable(true);
        backend.close_document();
        assert_eq!(gateway.acquire().await.err(), Some(SessionError::NoDocument));
    }

    #[tokio::test]
    async fn test_finish_abandons_open_commits() {
        let backend = Arc::new(MemoryBackend::demo());
        let gateway = SessionGateway::new(backend.clone());
        let lease = gateway.acquire().await.unwrap();

        lease.create_items(vec![via()]).unwrap();
        let token = lease.begin_commit().unwrap();
        lease.create_items(vec![via()]).unwrap();

        assert_eq!(lease.finish(), vec![token]);
        assert!(lease.finish().is_empty());
        assert!(!backend.has_open_commit());
        // The direct mutation survives; the grouped one is gone.
        assert_eq!(backend.get_items(ItemKind::Via).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dropping_the_lease_abandons_commits() {
        let backend = Arc::new(MemoryBackend::demo());
        let gateway = SessionGateway::new(backend.clone());
        {
            let lease = gateway.acquire().await.unwrap();
            lease.begin_commit().unwrap();
        }
        assert!(!backend.has_open_commit());
    }

    #[tokio::test]
    async fn test_pushed_commits_are_not_abandoned() {
        let backend = Arc::new(MemoryBackend::demo());
        let gateway = SessionGateway::new(backend.clone());
        let lease = gateway.acquire().await.unwrap();
        let token = lease.begin_commit().unwrap();
        lease.push_commit(&token, "ok").unwrap();
        assert!(lease.finish().is_empty());
        assert_eq!(backend.history().len(), 1);
    }

    #[tokio::test]
    async fn test_finish_releases_the_guard_while_the_lease_lives() {
        let gateway = SessionGateway::new(Arc::new(MemoryBackend::demo()));
        let lease = gateway.acquire().await.unwrap();
        lease.finish();

        let next = tokio::time::timeout(Duration::from_secs(5), gateway.acquire())
            .await
            .unwrap()
            .unwrap();
        assert!(lease.get_nets().unwrap_err().is_unavailable());
        assert!(next.get_nets().is_ok());
    }

    #[tokio::test]
    async fn test_requests_queue_on_the_writer_guard() {
        let gateway = Arc::new(SessionGateway::new(Arc::new(MemoryBackend::demo())));
        let lease = gateway.acquire().await.unwrap();

        let waiting = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.acquire().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        drop(lease);
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
