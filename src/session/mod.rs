//! Request-scoped session state.
//!
//! A [`Session`] is the working copy of one stored record. Besides the data
//! it keeps a log of what the request changed ([`Changes`]) so a store that
//! serializes writers can replay those changes on top of whatever another
//! request wrote in the meantime instead of overwriting it.

mod memory;
mod sql;
mod store;

pub use memory::MemorySessionStore;
pub use sql::SqlSessionStore;
pub use store::{SessionRecord, SessionStore};

use std::collections::{BTreeMap, BTreeSet};

use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::csrf;
use crate::error::Result;

/// Serialized form of a session: key to JSON value.
pub type Payload = BTreeMap<String, Value>;

/// Mutations one request applied to its session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    cleared: bool,
    updated: BTreeMap<String, Value>,
    removed: BTreeSet<String>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Whether the request started from an empty session.
    pub fn cleared(&self) -> bool {
        self.cleared
    }

    pub fn updated(&self) -> &BTreeMap<String, Value> {
        &self.updated
    }

    pub fn removed(&self) -> &BTreeSet<String> {
        &self.removed
    }

    /// Replays the changes on `payload`.
    pub fn apply(&self, payload: &mut Payload) {
        if self.cleared {
            payload.clear();
        }
        for key in &self.removed {
            payload.remove(key);
        }
        for (key, value) in &self.updated {
            payload.insert(key.clone(), value.clone());
        }
    }

    fn set(&mut self, key: &str, value: Value) {
        self.removed.remove(key);
        self.updated.insert(key.to_string(), value);
    }

    fn unset(&mut self, key: &str) {
        self.updated.remove(key);
        self.removed.insert(key.to_string());
    }

    fn reset(&mut self, data: &Payload) {
        self.cleared = true;
        self.removed.clear();
        self.updated = data.clone();
    }
}

/// One session as seen by one request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    data: Payload,
    changes: Changes,
    replaced: Option<String>,
    issued: bool,
}

impl Session {
    /// Empty session without an id. An id is issued on first write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session restored from a stored record.
    pub fn load(id: impl Into<String>, data: Payload) -> Self {
        Self {
            id: Some(id.into()),
            data,
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Value under `key` deserialized as `T`; `None` if absent or of
    /// another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.insert_value(key, value);
        Ok(())
    }

    pub fn insert_value(&mut self, key: &str, value: Value) {
        self.changes.set(key, value.clone());
        self.data.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let old = self.data.remove(key);
        if old.is_some() {
            self.changes.unset(key);
        }
        old
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drops every key.
    pub fn clear(&mut self) {
        self.data.clear();
        self.changes.reset(&self.data);
    }

    /// Moves the data to a new id and forgets the CSRF token and nonces.
    ///
    /// The old record is destroyed when the request finishes. Call this on
    /// every privilege change so a session id seen before sign-in is
    /// worthless after it.
    pub fn regenerate(&mut self) {
        if let Some(old) = self.id.take() {
            if !self.issued {
                self.replaced.get_or_insert(old);
            }
        }
        self.issued = false;
        self.data.retain(|key, _| !csrf::is_csrf_key(key));
        self.changes.reset(&self.data);
    }

    /// Whether anything must be written back.
    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether the id was created during this request and the client has
    /// not seen it yet.
    pub fn is_issued(&self) -> bool {
        self.issued
    }

    pub fn payload(&self) -> &Payload {
        &self.data
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    /// Current id, issuing a fresh one if there is none.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_none() {
            self.issued = true;
        }
        self.id.get_or_insert_with(random_hex)
    }

    /// Id of the record this session moved away from, if any.
    pub fn take_replaced(&mut self) -> Option<String> {
        self.replaced.take()
    }
}

/// 256 bits from the thread RNG as 64 lowercase hex characters.
pub fn random_hex() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Shape check for ids arriving in cookies.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == 64 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
