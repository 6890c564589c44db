use crate::error::SessionError;
use analytics::BacktestReport;
use backtester::SessionProgress;
use configuration::SessionConfig;
use core_types::{SessionStatus, TradingMode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Everything the manager tracks for one session.
pub struct SessionEntry {
    pub config: SessionConfig,
    pub status: SessionStatus,
    /// Live snapshots published by the replay loop.
    pub progress: watch::Receiver<SessionProgress>,
    /// The snapshot taken after the session finished, including any liquidation.
    pub final_progress: Option<SessionProgress>,
    pub report: Option<BacktestReport>,
    pub error: Option<String>,
    pub(crate) cancel: watch::Sender<bool>,
    pub(crate) task: Option<JoinHandle<()>>,
}

impl SessionEntry {
    pub fn new(
        config: SessionConfig,
        progress: watch::Receiver<SessionProgress>,
        cancel: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            status: SessionStatus::Initializing,
            progress,
            final_progress: None,
            report: None,
            error: None,
            cancel,
            task: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn current_progress(&self) -> SessionProgress {
        match &self.final_progress {
            Some(progress) => progress.clone(),
            None => self.progress.borrow().clone(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.config.session_id.clone(),
            status: self.status,
            mode: self.config.mode,
            symbols: self.config.symbols.clone(),
        }
    }
}

/// One line of `SessionManager::list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub status: SessionStatus,
    pub mode: TradingMode,
    pub symbols: Vec<String>,
}

/// The registry of sessions, keyed by session id.
///
/// Cloning is cheap and every clone sees the same map. The lock is only ever
/// held for the duration of a closure, never across an `.await`.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new session. Fails if the id is already taken, whatever the
    /// state of the existing session.
    pub async fn create(&self, entry: SessionEntry) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session_id = entry.session_id().to_string();
        if sessions.contains_key(&session_id) {
            return Err(SessionError::AlreadyExists(session_id));
        }
        sessions.insert(session_id, entry);
        Ok(())
    }

    /// Reads a session through `f`. Returns `None` for an unknown id.
    pub async fn get<R>(&self, session_id: &str, f: impl FnOnce(&SessionEntry) -> R) -> Option<R> {
        self.sessions.read().await.get(session_id).map(f)
    }

    /// Mutates a session through `f`. Returns `None` for an unknown id.
    pub async fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionEntry) -> R,
    ) -> Option<R> {
        self.sessions.write().await.get_mut(session_id).map(f)
    }

    pub async fn delete(&self, session_id: &str) -> Option<SessionEntry> {
        self.sessions.write().await.remove(session_id)
    }

    /// Summaries of every session, ordered by id.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> =
            self.sessions.read().await.values().map(SessionEntry::summary).collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(session_id: &str) -> SessionEntry {
        let config = SessionConfig {
            session_id: session_id.to_string(),
            symbols: vec!["NSE:SBIN-EQ".to_string()],
            ..SessionConfig::default()
        };
        let (_, progress) = watch::channel(SessionProgress::default());
        let (cancel, _) = watch::channel(false);
        SessionEntry::new(config, progress, cancel)
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_ids() {
        let store = SessionStore::new();
        store.create(entry("a")).await.unwrap();

        let err = store.create(entry("a")).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(id) if id == "a"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_the_same_map() {
        let store = SessionStore::new();
        let other = store.clone();
        store.create(entry("a")).await.unwrap();

        other
            .update("a", |entry| entry.status = SessionStatus::Running)
            .await
            .unwrap();
        assert_eq!(store.get("a", |entry| entry.status).await, Some(SessionStatus::Running));
        assert!(store.get("missing", |entry| entry.status).await.is_none());
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_delete_removes() {
        let store = SessionStore::new();
        store.create(entry("b")).await.unwrap();
        store.create(entry("a")).await.unwrap();

        let ids: Vec<String> = store.list().await.into_iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(store.delete("a").await.is_some());
        assert!(store.delete("a").await.is_none());
        assert_eq!(store.len().await, 1);
    }
}
