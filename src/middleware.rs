//! Global middleware chain.
//!
//! Middleware wrap the route endpoint in registration order: the first one
//! added is outermost, sees the request first and the response last.
//!
//! ```text
//!   request ──▶ A ──▶ B ──▶ endpoint
//!   response ◀── A ◀── B ◀──┘
//! ```
//!
//! A middleware continues the chain by calling [`Next::run`]. `Next` is
//! consumed by that call, so continuing twice does not compile; returning a
//! response without calling it short-circuits everything further in.

use std::sync::Arc;
use std::time::Instant;

use crate::context::RequestContext;
use crate::http::response::Response;

/// Outcome of a guard: keep going, or answer right now.
#[derive(Debug)]
pub enum Flow {
    /// Proceed to the next stage
    Continue,
    /// Stop and return this response
    ShortCircuit(Response),
}

type MiddlewareFn =
    dyn for<'c, 'r, 'n> Fn(&'c mut RequestContext<'r>, Next<'n>) -> Response + Send + Sync;

type Endpoint<'n> = dyn Fn(&mut RequestContext<'_>) -> Response + 'n;

/// The rest of the chain after the current middleware.
pub struct Next<'n> {
    rest: &'n [Middleware],
    endpoint: &'n Endpoint<'n>,
}

impl Next<'_> {
    /// Runs the remaining middleware and the endpoint.
    pub fn run(self, ctx: &mut RequestContext<'_>) -> Response {
        match self.rest.split_first() {
            Some((current, rest)) => (current.f)(
                ctx,
                Next {
                    rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }
}

/// One wrapper around the rest of the chain.
#[derive(Clone)]
pub struct Middleware {
    f: Arc<MiddlewareFn>,
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Middleware")
    }
}

impl Middleware {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'c, 'r, 'n> Fn(&'c mut RequestContext<'r>, Next<'n>) -> Response
            + Send
            + Sync
            + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Middleware built from a guard: continue on [`Flow::Continue`],
    /// answer with the guard's response otherwise.
    pub fn guard<G>(guard: G) -> Self
    where
        G: Fn(&mut RequestContext<'_>) -> Flow + Send + Sync + 'static,
    {
        Self::new(move |ctx, next| match guard(&mut *ctx) {
            Flow::Continue => next.run(ctx),
            Flow::ShortCircuit(response) => response,
        })
    }
}

/// Ordered middleware stack.
#[derive(Debug, Default, Clone)]
pub struct Pipeline {
    stack: Vec<Middleware>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` inside everything added before it.
    pub fn add(&mut self, middleware: Middleware) {
        self.stack.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs `ctx` through every middleware and finally `endpoint`.
    pub fn run<E>(&self, ctx: &mut RequestContext<'_>, endpoint: E) -> Response
    where
        E: Fn(&mut RequestContext<'_>) -> Response,
    {
        Next {
            rest: &self.stack,
            endpoint: &endpoint,
        }
        .run(ctx)
    }
}

/// Logs method, path, status and elapsed time of every request.
pub fn trace_requests() -> Middleware {
    Middleware::new(|ctx, next| {
        let started = Instant::now();
        let method = ctx.request().method().clone();
        let path = ctx.request().path().to_string();

        let response = next.run(ctx);

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    })
}
