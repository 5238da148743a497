//! The application object: routes, middleware, session backend and config.
//!
//! [`App::handle`] is the synchronous core: route lookup, middleware, guard
//! and action. [`App::serve`] wraps it with the session round trip a real
//! request needs: read the record named by the session cookie, handle, write
//! the record back if it changed and hand out a cookie for new ids.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::Config;
use crate::context::RequestContext;
use crate::controller::{Handler, dispatch};
use crate::error::Result;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::middleware::{Middleware, Pipeline};
use crate::router::{RouteLookup, Router};
use crate::session::{Session, SessionRecord, SessionStore, is_valid_session_id};

pub struct App {
    config: Config,
    router: Router,
    pipeline: Pipeline,
    store: Option<Arc<dyn SessionStore>>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            router: Router::new(),
            pipeline: Pipeline::new(),
            store: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Registers a route, optionally under a name for [`App::url`].
    pub fn route(
        &mut self,
        method: Method,
        template: &str,
        handler: Handler,
        name: Option<&str>,
    ) -> Result<&mut Self> {
        self.router.register(method, template, handler, name)?;
        Ok(self)
    }

    pub fn get(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.route(Method::GET, template, handler, None)
    }

    pub fn post(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.route(Method::POST, template, handler, None)
    }

    pub fn put(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.route(Method::PUT, template, handler, None)
    }

    pub fn patch(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.route(Method::PATCH, template, handler, None)
    }

    pub fn delete(&mut self, template: &str, handler: Handler) -> Result<&mut Self> {
        self.route(Method::DELETE, template, handler, None)
    }

    /// Appends `middleware` inside everything added before it.
    pub fn add_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.pipeline.add(middleware);
        self
    }

    /// Installs the session backend used by [`App::serve`].
    ///
    /// Without one, sessions live for a single request.
    pub fn register_session_store(&mut self, store: Arc<dyn SessionStore>) -> &mut Self {
        self.store = Some(store);
        self
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.store.as_ref()
    }

    /// Prepares the session backend, if any.
    pub async fn open(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.open().await,
            None => Ok(()),
        }
    }

    /// Path of the route registered as `name`.
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        self.router.reverse(name, params)
    }

    /// Runs one request through the router, middleware and dispatch.
    ///
    /// Unknown paths reach the middleware too and end in a 404 from the
    /// innermost stage.
    pub fn handle(&self, request: Request, session: &mut Session) -> Response {
        let lookup = self.router.lookup(request.method(), request.path());

        let (request, handler) = match lookup {
            RouteLookup::Match(found) => (
                request.with_route_params(found.params),
                Some(found.route.handler()),
            ),
            RouteLookup::NotFound => {
                tracing::debug!(method = %request.method(), path = request.path(), "No route");
                (request, None)
            }
        };

        let mut ctx = RequestContext::new(request, session, self);
        self.pipeline.run(&mut ctx, |ctx| match handler {
            Some(handler) => dispatch(ctx, handler),
            None => Response::not_found(),
        })
    }

    /// [`App::handle`] with the session loaded from and saved to the store.
    pub async fn serve(&self, request: Request) -> Result<Response> {
        let mut session = self
            .load_session(request.cookie(&self.config.session.cookie_name))
            .await?;
        let client_addr = request.client_addr().map(|a| a.to_string());
        let user_agent = request.user_agent().map(str::to_string);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle(request, &mut session)));
        let mut response = match outcome {
            Ok(response) => response,
            Err(_) => {
                tracing::error!("Request pipeline panicked; session left untouched");
                return Ok(Response::internal_error());
            }
        };

        self.save_session(&mut session, client_addr.as_deref(), user_agent.as_deref())
            .await?;

        if let (Some(_), true, Some(id)) = (&self.store, session.is_issued(), session.id()) {
            response.set_header(
                "Set-Cookie",
                format!(
                    "{}={}; Path=/; HttpOnly; SameSite=Lax",
                    self.config.session.cookie_name, id
                ),
            );
        }

        Ok(response)
    }

    /// Deletes sessions older than `session.max_age_secs`.
    pub async fn collect_garbage(&self) -> Result<u64> {
        match &self.store {
            Some(store) => store.gc(self.config.session.max_age()).await,
            None => Ok(0),
        }
    }

    async fn load_session(&self, cookie: Option<&str>) -> Result<Session> {
        let (Some(store), Some(id)) = (&self.store, cookie.filter(|id| is_valid_session_id(id)))
        else {
            return Ok(Session::new());
        };

        Ok(match store.read(id).await? {
            Some(payload) => Session::load(id, payload),
            None => Session::new(),
        })
    }

    async fn save_session(
        &self,
        session: &mut Session,
        client_addr: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        if let Some(old) = session.take_replaced() {
            store.destroy(&old).await?;
        }
        if !session.is_dirty() {
            return Ok(());
        }

        let id = session.ensure_id().to_string();
        let record = SessionRecord {
            payload: session.payload(),
            changes: session.changes(),
            client_addr,
            user_agent,
        };
        store.write(&id, record).await
    }
}
