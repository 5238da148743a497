//! Error types for the kernel.
//!
//! [`Error`] covers failures raised while building the application or while
//! talking to a session backend. [`HttpError`] is what guards and actions
//! return; dispatch turns each variant into a status code exactly once.

use crate::http::response::StatusCode;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the kernel itself.
#[derive(Debug, Error)]
pub enum Error {
    /// A route template could not be compiled.
    #[error("invalid route template `{template}`: {reason}")]
    InvalidTemplate {
        /// The template as registered
        template: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Two routes were registered under the same name.
    #[error("route name `{0}` is already registered")]
    DuplicateRouteName(String),

    /// Reverse lookup for a name nobody registered.
    #[error("no route named `{0}`")]
    UnknownRoute(String),

    /// Reverse lookup without a value for one of the placeholders.
    #[error("route `{route}` requires parameter `{param}`")]
    MissingParameter {
        /// Route name
        route: String,
        /// Placeholder without a value
        param: String,
    },

    /// Redirect to a foreign host or a scheme-relative URL.
    #[error("redirect target `{0}` is not allowed")]
    InvalidRedirectTarget(String),

    /// Session payload (de)serialization failed.
    #[error("session payload error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session database reported an error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading a configuration file failed.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid YAML for [`crate::config::Config`].
    #[error("config parse error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Failure signalled by a guard or an action.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The caller is not authenticated.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller is authenticated but not allowed.
    #[error("forbidden")]
    Forbidden,

    /// The requested resource does not exist.
    #[error("not found")]
    NotFound,

    /// CSRF token or nonce missing or wrong.
    #[error("CSRF token mismatch")]
    CsrfMismatch,

    /// Anything else. Logged, never shown to the client outside debug mode.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HttpError {
    /// Status code dispatch answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Unauthorized => StatusCode::Unauthorized,
            HttpError::Forbidden | HttpError::CsrfMismatch => StatusCode::Forbidden,
            HttpError::NotFound => StatusCode::NotFound,
            HttpError::Internal(_) => StatusCode::InternalServerError,
        }
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        HttpError::Internal(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_status_codes() {
        assert_eq!(HttpError::Unauthorized.status().as_u16(), 401);
        assert_eq!(HttpError::Forbidden.status().as_u16(), 403);
        assert_eq!(HttpError::CsrfMismatch.status().as_u16(), 403);
        assert_eq!(HttpError::NotFound.status().as_u16(), 404);
        assert_eq!(
            HttpError::Internal(anyhow::anyhow!("boom")).status().as_u16(),
            500
        );
    }

    #[test]
    fn kernel_errors_become_internal() {
        let err: HttpError = Error::UnknownRoute("home".into()).into();
        assert!(matches!(err, HttpError::Internal(_)));
        assert_eq!(err.to_string(), "no route named `home`");
    }
}
