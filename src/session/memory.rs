use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{SessionRecord, SessionStore, unix_now};
use super::Payload;
use crate::error::Result;

#[derive(Debug, Clone)]
struct StoredSession {
    payload: Payload,
    client_addr: Option<String>,
    user_agent: Option<String>,
    stamp: i64,
}

/// Process-local session store.
///
/// With `advisory` set, writes merge the request's changes into the current
/// record while holding the map's write lock; otherwise the whole payload
/// replaces the record.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    advisory: bool,
}

impl MemorySessionStore {
    pub fn new(advisory: bool) -> Self {
        Self {
            sessions: Arc::default(),
            advisory,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Client address and user agent recorded with `id`.
    pub async fn audit(&self, id: &str) -> Option<(Option<String>, Option<String>)> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| (s.client_addr.clone(), s.user_agent.clone()))
    }

    /// Moves the timestamp of `id` back by `age`.
    pub async fn backdate(&self, id: &str, age: Duration) {
        if let Some(stored) = self.sessions.write().await.get_mut(id) {
            stored.stamp -= age.as_secs() as i64;
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<Payload>> {
        Ok(self.sessions.read().await.get(id).map(|s| s.payload.clone()))
    }

    async fn write(&self, id: &str, record: SessionRecord<'_>) -> Result<()> {
        let mut sessions = self.sessions.write().await;

        let payload = match (self.advisory, sessions.get(id)) {
            (true, Some(current)) => {
                let mut merged = current.payload.clone();
                record.changes.apply(&mut merged);
                merged
            }
            _ => record.payload.clone(),
        };

        sessions.insert(
            id.to_string(),
            StoredSession {
                payload,
                client_addr: record.client_addr.map(str::to_string),
                user_agent: record.user_agent.map(str::to_string),
                stamp: unix_now(),
            },
        );
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn gc(&self, max_age: Duration) -> Result<u64> {
        let cutoff = unix_now() - max_age.as_secs() as i64;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.stamp >= cutoff);
        Ok((before - sessions.len()) as u64)
    }
}
