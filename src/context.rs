//! Per-request context threaded through middleware, guards and actions.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::App;
use crate::config::Config;
use crate::controller::ActionResult;
use crate::csrf::{self, Csrf};
use crate::error::{HttpError, Result};
use crate::flash::Flash;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::session::Session;

/// Session key holding the signed-in user.
pub const USER_KEY: &str = "user";

/// Everything one request may touch: the request itself, its session and
/// the application that is serving it.
pub struct RequestContext<'a> {
    request: Request,
    session: &'a mut Session,
    app: &'a App,
}

impl<'a> RequestContext<'a> {
    pub fn new(request: Request, session: &'a mut Session, app: &'a App) -> Self {
        Self {
            request,
            session,
            app,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Matched route parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.param(name)
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut *self.session
    }

    pub fn app(&self) -> &App {
        self.app
    }

    pub fn config(&self) -> &Config {
        self.app.config()
    }

    pub fn csrf(&mut self) -> Csrf<'_> {
        Csrf::new(&mut *self.session)
    }

    pub fn flash(&mut self) -> Flash<'_> {
        Flash::new(&mut *self.session)
    }

    /// Path of a named route.
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        self.app.url(name, params)
    }

    /// 302 to `target`, refusing hosts other than the request's own.
    pub fn redirect(&self, target: &str) -> ActionResult {
        Ok(Response::redirect(target, self.request.host())?)
    }

    /// 302 to a named route.
    pub fn redirect_to_route(&self, name: &str, params: &[(&str, &str)]) -> ActionResult {
        let target = self.url(name, params)?;
        self.redirect(&target)
    }

    /// Fails with [`HttpError::Unauthorized`] unless someone is signed in.
    pub fn require_auth(&self) -> std::result::Result<(), HttpError> {
        if self.session.contains(USER_KEY) {
            Ok(())
        } else {
            Err(HttpError::Unauthorized)
        }
    }

    /// The signed-in user, if any and if it deserializes as `T`.
    pub fn current_user<T: DeserializeOwned>(&self) -> Option<T> {
        self.session.get(USER_KEY)
    }

    /// Stores `user` in a session with a fresh id.
    pub fn sign_in<T: Serialize>(&mut self, user: &T) -> Result<()> {
        self.session.regenerate();
        self.session.insert(USER_KEY, user)
    }

    /// Empties the session and moves it to a fresh id.
    pub fn sign_out(&mut self) {
        self.session.clear();
        self.session.regenerate();
    }

    /// Checks the session CSRF token against the `csrf_token` form field or
    /// the `X-CSRF-Token` header.
    pub fn validate_csrf(&mut self) -> std::result::Result<(), HttpError> {
        let candidate = self
            .request
            .form(csrf::FORM_FIELD)
            .or_else(|| self.request.header(csrf::HEADER_NAME));

        if Csrf::new(&mut *self.session).validate(candidate) {
            Ok(())
        } else {
            Err(HttpError::CsrfMismatch)
        }
    }

    /// Checks the nonce for `action` carried in the `nonce` form field.
    pub fn verify_nonce(&mut self, action: &str) -> std::result::Result<(), HttpError> {
        let candidate = self.request.form(csrf::NONCE_FIELD);

        if Csrf::new(&mut *self.session).verify_nonce(action, candidate) {
            Ok(())
        } else {
            Err(HttpError::CsrfMismatch)
        }
    }
}
