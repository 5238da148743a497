use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::store::{SessionRecord, SessionStore, unix_now};
use super::Payload;
use crate::error::Result;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY NOT NULL,
    data TEXT NOT NULL DEFAULT '',
    ip TEXT,
    agent TEXT,
    stamp INTEGER NOT NULL
)";

const UPSERT: &str = "INSERT INTO sessions (session_id, data, ip, agent, stamp)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(session_id) DO UPDATE SET
        data = excluded.data,
        ip = excluded.ip,
        agent = excluded.agent,
        stamp = excluded.stamp";

/// Sessions kept in one SQLite table.
///
/// In advisory mode each write runs inside `BEGIN IMMEDIATE`, which takes
/// the database write lock before the current record is re-read, so
/// overlapping requests for the same id apply their changes one after the
/// other. Without it the last write wins.
#[derive(Debug, Clone)]
pub struct SqlSessionStore {
    pool: SqlitePool,
    advisory: bool,
}

impl SqlSessionStore {
    pub fn new(pool: SqlitePool, advisory: bool) -> Self {
        Self { pool, advisory }
    }

    /// Opens a pool for `url`, creating the database file if needed.
    pub async fn connect(url: &str, advisory: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool, advisory))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn merge_locked(
        conn: &mut SqliteConnection,
        id: &str,
        record: SessionRecord<'_>,
    ) -> Result<()> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT data FROM sessions WHERE session_id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        let mut payload = match current {
            Some(data) => decode(&data)?,
            None => Payload::new(),
        };
        record.changes.apply(&mut payload);

        upsert(conn, id, &payload, record).await
    }
}

async fn upsert(
    conn: &mut SqliteConnection,
    id: &str,
    payload: &Payload,
    record: SessionRecord<'_>,
) -> Result<()> {
    let data = serde_json::to_string(payload)?;

    sqlx::query(UPSERT)
        .bind(id)
        .bind(data)
        .bind(record.client_addr)
        .bind(record.user_agent)
        .bind(unix_now())
        .execute(conn)
        .await?;
    Ok(())
}

fn decode(data: &str) -> Result<Payload> {
    if data.is_empty() {
        return Ok(Payload::new());
    }
    Ok(serde_json::from_str(data)?)
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn open(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        tracing::debug!(advisory = self.advisory, "Session table ready");
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<Payload>> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM sessions WHERE session_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match data.as_deref().map(decode) {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Discarding unreadable session payload");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn write(&self, id: &str, record: SessionRecord<'_>) -> Result<()> {
        if !self.advisory {
            let mut conn = self.pool.acquire().await?;
            return upsert(&mut conn, id, record.payload, record).await;
        }

        // Dropping the guard without commit rolls back and releases the lock.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        if let Err(e) = Self::merge_locked(&mut *tx, id, record).await {
            tracing::warn!(error = %e, "Session merge failed, rolling back");
            return Err(e);
        }
        tx.commit().await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn gc(&self, max_age: Duration) -> Result<u64> {
        let cutoff = unix_now() - max_age.as_secs() as i64;

        let done = sqlx::query("DELETE FROM sessions WHERE stamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected())
    }
}
