//! Keel - minimal HTTP application kernel
//!
//! Routing, a middleware chain around controller dispatch, CSRF tokens,
//! flash messages and persisted sessions, plus a small HTTP/1.1 adapter
//! that feeds parsed requests to an [`app::App`].

pub mod app;
pub mod config;
pub mod context;
pub mod controller;
pub mod csrf;
pub mod error;
pub mod flash;
pub mod html;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod session;
pub mod validate;

pub use app::App;
pub use context::RequestContext;
pub use controller::{ActionResult, Controller, Handler};
pub use error::{Error, HttpError, Result};
pub use middleware::{Flow, Middleware, Next};
