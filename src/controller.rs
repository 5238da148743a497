//! Controllers, route handlers and the dispatch boundary.
//!
//! A [`Handler`] is what a route points at. Handlers built with
//! [`Handler::action`] create a fresh controller per request, run its
//! [`Controller::before_route`] guard and only then the action method.
//!
//! [`dispatch`] is the single place where guard and action failures become
//! status codes; nothing an action returns or panics with escapes it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::HttpError;
use crate::http::response::{Response, StatusCode};
use crate::middleware::Flow;

/// What guards and actions return.
pub type ActionResult = Result<Response, HttpError>;

type InvokeFn = dyn for<'a, 'b> Fn(&'a mut RequestContext<'b>) -> ActionResult + Send + Sync;

/// Per-request controller.
///
/// One instance is created with `Default` for every dispatched request, so
/// fields live exactly as long as the request does.
pub trait Controller {
    /// Runs before every action of this controller.
    ///
    /// [`Flow::ShortCircuit`] answers the request without calling the action.
    fn before_route(&mut self, _ctx: &mut RequestContext<'_>) -> Result<Flow, HttpError> {
        Ok(Flow::Continue)
    }
}

/// Reference to the code a route runs.
#[derive(Clone)]
pub struct Handler {
    controller: &'static str,
    action: &'static str,
    invoke: Arc<InvokeFn>,
}

impl Handler {
    /// Handler running `f` as an action of controller `C`.
    ///
    /// ```
    /// use keel::context::RequestContext;
    /// use keel::controller::{ActionResult, Controller, Handler};
    /// use keel::http::response::Response;
    ///
    /// #[derive(Default)]
    /// struct Pages;
    ///
    /// impl Controller for Pages {}
    ///
    /// impl Pages {
    ///     fn about(&mut self, _ctx: &mut RequestContext<'_>) -> ActionResult {
    ///         Ok(Response::html("<h1>About</h1>"))
    ///     }
    /// }
    ///
    /// let handler = Handler::action("about", Pages::about);
    /// assert_eq!(handler.controller(), "Pages");
    /// assert_eq!(handler.action_name(), "about");
    /// ```
    pub fn action<C>(action: &'static str, f: fn(&mut C, &mut RequestContext<'_>) -> ActionResult) -> Self
    where
        C: Controller + Default + 'static,
    {
        Self::boxed(short_type_name::<C>(), action, move |ctx| {
            let mut controller = C::default();
            if let Flow::ShortCircuit(response) = controller.before_route(ctx)? {
                return Ok(response);
            }
            f(&mut controller, ctx)
        })
    }

    /// Handler running a plain closure with no controller or guard.
    pub fn from_fn<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(&mut RequestContext<'_>) -> ActionResult + Send + Sync + 'static,
    {
        Self::boxed("fn", name, f)
    }

    fn boxed<F>(controller: &'static str, action: &'static str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a mut RequestContext<'b>) -> ActionResult + Send + Sync + 'static,
    {
        Self {
            controller,
            action,
            invoke: Arc::new(f),
        }
    }

    pub fn controller(&self) -> &'static str {
        self.controller
    }

    pub fn action_name(&self) -> &'static str {
        self.action
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.controller, self.action)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Runs `handler` for the request in `ctx` and always produces a response.
///
/// Route parameters must already be attached to the request. Errors are
/// mapped once here: [`HttpError::Unauthorized`] to 401, `Forbidden` and
/// `CsrfMismatch` to 403, `NotFound` to 404, everything else (panics
/// included) to 500 with the detail logged and only shown in debug mode.
pub fn dispatch(ctx: &mut RequestContext<'_>, handler: &Handler) -> Response {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (handler.invoke)(&mut *ctx)));

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => error_response(ctx, handler, err),
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            tracing::error!(handler = ?handler, path = ctx.request().path(), detail = %detail, "Handler panicked");
            internal_error(ctx, &detail)
        }
    }
}

fn error_response(ctx: &RequestContext<'_>, handler: &Handler, err: HttpError) -> Response {
    let path = ctx.request().path();
    let status = err.status();

    match &err {
        HttpError::Unauthorized | HttpError::Forbidden | HttpError::NotFound => {
            tracing::debug!(handler = ?handler, path, status = status.as_u16(), "Request refused");
        }
        HttpError::CsrfMismatch => {
            tracing::warn!(
                handler = ?handler,
                path,
                client = ?ctx.request().client_addr(),
                "CSRF check failed"
            );
        }
        HttpError::Internal(e) => {
            let detail = format!("{e:#}");
            tracing::error!(handler = ?handler, path, error = %detail, "Handler failed");
            return internal_error(ctx, &detail);
        }
    }

    Response::error(status)
}

fn internal_error(ctx: &RequestContext<'_>, detail: &str) -> Response {
    if ctx.config().app.debug {
        Response::text(
            format!("500 Internal Server Error\n\n{detail}"),
            StatusCode::InternalServerError,
        )
    } else {
        Response::internal_error()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
