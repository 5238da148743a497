//! Path-template router.
//!
//! Templates are `/`-separated segments, each either a literal or a
//! `{name}` placeholder capturing exactly one non-empty path segment.
//! Routes are tried in registration order and the first one whose method,
//! segment count and literals line up wins, so of two templates that both
//! fit a concrete path the earlier registration is the one that answers.
//!
//! Captured values are percent-decoded; [`Router::reverse`] percent-encodes
//! them again so a reversed path matches back to the same parameters.
//!
//! ```
//! use keel::controller::Handler;
//! use keel::http::request::Method;
//! use keel::http::response::Response;
//! use keel::router::{RouteLookup, Router};
//!
//! let mut router = Router::new();
//! let show = Handler::from_fn("show", |ctx| Ok(Response::ok(ctx.param("slug").unwrap_or("").to_string())));
//! router.register(Method::GET, "/o/{slug}", show, Some("ad.show")).unwrap();
//!
//! assert_eq!(router.reverse("ad.show", &[("slug", "my-ad")]).unwrap(), "/o/my-ad");
//! match router.lookup(&Method::GET, "/o/my-ad") {
//!     RouteLookup::Match(m) => assert_eq!(m.params["slug"], "my-ad"),
//!     RouteLookup::NotFound => unreachable!(),
//! }
//! ```

use std::collections::{HashMap, HashSet};

use crate::controller::Handler;
use crate::error::{Error, Result};
use crate::http::request::Method;

/// One compiled template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment byte for byte
    Literal(String),
    /// Captures the path segment under this name
    Param(String),
}

/// A registered route. Immutable once handed to the router.
#[derive(Clone)]
pub struct Route {
    method: Method,
    template: String,
    segments: Vec<Segment>,
    handler: Handler,
    name: Option<String>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn capture(&self, parts: &[&str]) -> Option<HashMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit.as_str() == *part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| (*part).to_string());
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("handler", &self.handler)
            .field("name", &self.name)
            .finish()
    }
}

/// A matched route with extracted parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The matched route.
    pub route: &'a Route,
    /// Extracted path parameters, percent-decoded.
    pub params: HashMap<String, String>,
}

/// Result of attempting to locate a route by path and method.
#[derive(Debug)]
pub enum RouteLookup<'a> {
    /// A route matched by path and method.
    Match(RouteMatch<'a>),
    /// No route matched.
    NotFound,
}

/// Ordered route table with named-route reverse lookup.
#[derive(Debug, Default, Clone)]
pub struct Router {
    routes: Vec<Route>,
    names: HashMap<String, usize>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `template` and appends the route.
    ///
    /// Fails on malformed templates and on a `name` that is already taken.
    pub fn register(
        &mut self,
        method: Method,
        template: &str,
        handler: Handler,
        name: Option<&str>,
    ) -> Result<()> {
        let segments = compile(template)?;

        if let Some(name) = name {
            if self.names.contains_key(name) {
                return Err(Error::DuplicateRouteName(name.to_string()));
            }
            self.names.insert(name.to_string(), self.routes.len());
        }

        tracing::trace!(%method, template, handler = ?handler, "Route registered");

        self.routes.push(Route {
            method,
            template: template.to_string(),
            segments,
            handler,
            name: name.map(str::to_string),
        });
        Ok(())
    }

    /// Finds the first route for `method` whose template fits `path`.
    ///
    /// `HEAD` uses routes registered for `HEAD` and otherwise falls back to
    /// the `GET` table.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup<'_> {
        let parts: Vec<&str> = split_path(path).collect();

        if let Some(found) = self.find(method, &parts) {
            return RouteLookup::Match(found);
        }
        if *method == Method::HEAD {
            if let Some(found) = self.find(&Method::GET, &parts) {
                return RouteLookup::Match(found);
            }
        }
        RouteLookup::NotFound
    }

    fn find(&self, method: &Method, parts: &[&str]) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .capture(parts)
                    .map(|params| RouteMatch { route, params })
            })
    }

    /// Builds the path of the route registered as `name`.
    ///
    /// Every placeholder needs a value in `params`; extra entries are ignored.
    pub fn reverse(&self, name: &str, params: &[(&str, &str)]) -> Result<String> {
        let route = self
            .names
            .get(name)
            .map(|&idx| &self.routes[idx])
            .ok_or_else(|| Error::UnknownRoute(name.to_string()))?;

        let mut path = String::new();
        for segment in &route.segments {
            path.push('/');
            match segment {
                Segment::Literal(lit) => path.push_str(lit),
                Segment::Param(param) => {
                    let value = params
                        .iter()
                        .find(|(k, _)| *k == param.as_str())
                        .map(|(_, v)| *v)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| Error::MissingParameter {
                            route: name.to_string(),
                            param: param.clone(),
                        })?;
                    path.push_str(&urlencoding::encode(value));
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn compile(template: &str) -> Result<Vec<Segment>> {
    let invalid = |reason| Error::InvalidTemplate {
        template: template.to_string(),
        reason,
    };

    if !template.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut seen = HashSet::new();
    let mut segments = Vec::new();

    for part in split_path(template) {
        let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) => {
                let valid = !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return Err(invalid("placeholder names must be non-empty [A-Za-z0-9_]"));
                }
                if !seen.insert(name) {
                    return Err(invalid("placeholder used twice"));
                }
                Segment::Param(name.to_string())
            }
            None if part.contains(['{', '}']) => {
                return Err(invalid("placeholders must span a whole segment"));
            }
            None => Segment::Literal(part.to_string()),
        };
        segments.push(segment);
    }

    Ok(segments)
}
