//! Read-once notifications carried in the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::Session;

/// Session key of the message queue.
pub const FLASH_KEY: &str = "_flash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl FlashMessage {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
        }
    }
}

/// Flash queue over one session.
pub struct Flash<'s> {
    session: &'s mut Session,
}

impl<'s> Flash<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Appends a message.
    pub fn add(&mut self, kind: &str, text: &str) {
        let mut queue = match self.session.get_value(FLASH_KEY) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        match serde_json::to_value(FlashMessage::new(kind, text)) {
            Ok(entry) => queue.push(entry),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unserializable flash message");
                return;
            }
        }
        self.session.insert_value(FLASH_KEY, Value::Array(queue));
    }

    /// All queued messages in insertion order. Empties the queue.
    pub fn get(&mut self) -> Vec<FlashMessage> {
        let messages = self.peek();
        self.session.remove(FLASH_KEY);
        messages
    }

    /// Queued messages without draining them.
    pub fn peek(&self) -> Vec<FlashMessage> {
        self.session.get(FLASH_KEY).unwrap_or_default()
    }

    /// Whether any message (of `kind`, if given) is queued.
    pub fn has(&self, kind: Option<&str>) -> bool {
        let queue = self.peek();
        match kind {
            Some(kind) => queue.iter().any(|m| m.kind == kind),
            None => !queue.is_empty(),
        }
    }

    pub fn success(&mut self, text: &str) {
        self.add("success", text);
    }

    pub fn error(&mut self, text: &str) {
        self.add("error", text);
    }

    pub fn warning(&mut self, text: &str) {
        self.add("warning", text);
    }

    pub fn info(&mut self, text: &str) {
        self.add("info", text);
    }
}
