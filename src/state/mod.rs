//! Live session storage
//!
//! Each session sits behind its own async mutex, so one session's request
//! never waits on another's. The store remembers when each session was last
//! handed out so idle ones can be evicted; the chat store restores them on
//! the next request.

use crate::session::Session;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

pub type SessionHandle = Arc<Mutex<Session>>;

/// Trait for live session storage
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<SessionHandle>;
    async fn get(&self, id: Uuid) -> Result<Option<SessionHandle>>;
    async fn remove(&self, id: Uuid) -> Result<bool>;
    async fn len(&self) -> usize;
    /// Ids not inserted or fetched within `max_idle`
    async fn idle(&self, max_idle: Duration) -> Vec<Uuid>;
}

struct StoredSession {
    handle: SessionHandle,
    touched: Instant,
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, StoredSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> Result<SessionHandle> {
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        // Keep the first handle if two restores race for the same id.
        let stored = sessions.entry(id).or_insert_with(|| StoredSession {
            handle: Arc::new(Mutex::new(session)),
            touched: Instant::now(),
        });
        stored.touched = Instant::now();
        Ok(stored.handle.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionHandle>> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.get_mut(&id).map(|stored| {
            stored.touched = Instant::now();
            stored.handle.clone()
        }))
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&id).is_some())
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn idle(&self, max_idle: Duration) -> Vec<Uuid> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(_, stored)| stored.touched.elapsed() >= max_idle)
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionContext;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = InMemorySessionStore::new();
        let id = Uuid::new_v4();
        store.insert(Session::new(id, SessionContext::new(5))).await.unwrap();

        let handle = store.get(id).await.unwrap().unwrap();
        assert_eq!(handle.lock().await.id(), id);
        assert_eq!(store.len().await, 1);

        assert!(store.remove(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_insert_keeps_first_handle() {
        let store = InMemorySessionStore::new();
        let id = Uuid::new_v4();
        let first = store.insert(Session::new(id, SessionContext::new(5))).await.unwrap();
        let second = store.insert(Session::new(id, SessionContext::new(9))).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_idle_tracks_last_access() {
        let store = InMemorySessionStore::new();
        let stale = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        store.insert(Session::new(stale, SessionContext::new(5))).await.unwrap();
        store.insert(Session::new(fresh, SessionContext::new(5))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.get(fresh).await.unwrap();

        assert_eq!(store.idle(Duration::from_millis(20)).await, vec![stale]);
        assert_eq!(store.idle(Duration::ZERO).await.len(), 2);
    }
}
