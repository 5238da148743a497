//! CSRF token and per-action nonces.
//!
//! The token is created lazily, once per session, and survives until the
//! session is regenerated. Nonces work the same way but are keyed by an
//! action name, so a nonce issued for `delete` never verifies for `edit`.
//! Each nonce sits under its own session key, so requests issuing nonces
//! for different actions touch disjoint keys.
//! Both are 256 random bits rendered as 64 hex characters and compared in
//! constant time.

use constant_time_eq::constant_time_eq;
use serde_json::Value;

use crate::html::escape_html;
use crate::session::{Session, random_hex};

/// Session key of the token.
pub const TOKEN_KEY: &str = "_csrf_token";

/// Prefix of the per-action nonce keys.
pub const NONCE_PREFIX: &str = "_csrf_nonce:";

/// Form field carrying the token.
pub const FORM_FIELD: &str = "csrf_token";

/// Form field carrying a nonce.
pub const NONCE_FIELD: &str = "nonce";

/// Header carrying the token for scripted requests.
pub const HEADER_NAME: &str = "X-CSRF-Token";

/// CSRF operations over one session.
pub struct Csrf<'s> {
    session: &'s mut Session,
}

impl<'s> Csrf<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// The session token, created on first use.
    pub fn token(&mut self) -> String {
        if let Some(token) = self.stored_token() {
            return token.to_string();
        }
        let token = random_hex();
        self.session.insert_value(TOKEN_KEY, Value::String(token.clone()));
        token
    }

    /// Whether `candidate` equals the session token.
    ///
    /// A session without a token validates nothing. Never creates one.
    pub fn validate(&self, candidate: Option<&str>) -> bool {
        match (self.stored_token(), candidate) {
            (Some(token), Some(candidate)) if !candidate.is_empty() => {
                constant_time_eq(token.as_bytes(), candidate.as_bytes())
            }
            _ => false,
        }
    }

    /// The nonce for `action`, created on first use.
    pub fn nonce(&mut self, action: &str) -> String {
        if let Some(nonce) = self.stored_nonce(action) {
            return nonce.to_string();
        }

        let nonce = random_hex();
        self.session
            .insert_value(&nonce_key(action), Value::String(nonce.clone()));
        nonce
    }

    /// Whether `candidate` is the nonce issued for `action`.
    pub fn verify_nonce(&self, action: &str, candidate: Option<&str>) -> bool {
        match (self.stored_nonce(action), candidate) {
            (Some(nonce), Some(candidate)) if !candidate.is_empty() => {
                constant_time_eq(nonce.as_bytes(), candidate.as_bytes())
            }
            _ => false,
        }
    }

    /// Hidden form input carrying the token, or the nonce for `action`.
    pub fn hidden_input(&mut self, action: Option<&str>) -> String {
        let (name, value) = match action {
            Some(action) => (NONCE_FIELD, self.nonce(action)),
            None => (FORM_FIELD, self.token()),
        };
        format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            name,
            escape_html(&value)
        )
    }

    fn stored_token(&self) -> Option<&str> {
        self.session.get_value(TOKEN_KEY).and_then(Value::as_str)
    }

    fn stored_nonce(&self, action: &str) -> Option<&str> {
        self.session
            .get_value(&nonce_key(action))
            .and_then(Value::as_str)
    }
}

/// Session key holding the nonce for `action`.
pub fn nonce_key(action: &str) -> String {
    format!("{NONCE_PREFIX}{action}")
}

/// Whether `key` belongs to the CSRF state dropped on regenerate.
pub(crate) fn is_csrf_key(key: &str) -> bool {
    key == TOKEN_KEY || key.starts_with(NONCE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_validation_keeps_token() {
        let mut session = Session::new();
        let mut csrf = Csrf::new(&mut session);
        let token = csrf.token();

        assert!(!csrf.validate(Some("nope")));
        assert_eq!(csrf.token(), token);
    }

    #[test]
    fn validate_without_token_creates_nothing() {
        let mut session = Session::new();
        let csrf = Csrf::new(&mut session);
        assert!(!csrf.validate(Some("anything")));
        assert!(!session.contains(TOKEN_KEY));
    }

    #[test]
    fn hidden_inputs() {
        let mut session = Session::new();
        let mut csrf = Csrf::new(&mut session);

        let token = csrf.token();
        assert_eq!(
            csrf.hidden_input(None),
            format!(r#"<input type="hidden" name="csrf_token" value="{token}">"#)
        );

        let nonce = csrf.nonce("delete");
        assert!(csrf.hidden_input(Some("delete")).contains(&nonce));
        assert!(csrf.hidden_input(Some("delete")).contains(r#"name="nonce""#));
    }
}
