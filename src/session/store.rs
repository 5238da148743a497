use std::time::Duration;

use async_trait::async_trait;

use super::{Changes, Payload};
use crate::error::Result;

/// What a request hands to [`SessionStore::write`].
#[derive(Debug, Clone, Copy)]
pub struct SessionRecord<'a> {
    /// The full working copy at the end of the request
    pub payload: &'a Payload,
    /// What the request changed relative to what it read
    pub changes: &'a Changes,
    /// Recorded for diagnostics only
    pub client_addr: Option<&'a str>,
    /// Recorded for diagnostics only
    pub user_agent: Option<&'a str>,
}

/// Persistence backend for sessions.
///
/// Every request reads its record once before dispatch and writes it once
/// afterwards if it changed anything. Stores that support single-writer
/// mode merge `changes` into the current record under a lock; the others
/// replace the record with `payload`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Prepares the backend. Called once before the first request.
    async fn open(&self) -> Result<()>;

    /// Payload stored under `id`, or `None` for unknown ids.
    async fn read(&self, id: &str) -> Result<Option<Payload>>;

    /// Upserts the record for `id` and refreshes its timestamp.
    async fn write(&self, id: &str, record: SessionRecord<'_>) -> Result<()>;

    /// Removes the record for `id`; unknown ids are not an error.
    async fn destroy(&self, id: &str) -> Result<()>;

    /// Deletes records last written more than `max_age` ago and returns
    /// how many went away.
    async fn gc(&self, max_age: Duration) -> Result<u64>;
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
