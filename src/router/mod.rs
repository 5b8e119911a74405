//! Route table — map HTTP methods and path patterns to handler functions.
//!
//! This module provides [`Router`], an ordered, append-only list of routes.
//! Patterns are made of literal segments and `:name` captures:
//!
//! | Pattern              | Example match              | Captured params              |
//! |----------------------|----------------------------|------------------------------|
//! | `/dummies`           | `/dummies`                 | *(none)*                     |
//! | `/dummies/:id`       | `/dummies/42`              | `id → "42"`                  |
//!
//! Routes are looked up in registration order; the first route whose method
//! and pattern both match wins, so an earlier registration shadows any later
//! one with an overlapping pattern. Duplicates are accepted without complaint.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::{Method, Response};

mod pattern;

pub use pattern::{PathPattern, match_path};

/// Type-erased, heap-allocated async route handler.
///
/// Handlers receive the request [`Context`] by value (routing is the last
/// step of a request, nothing needs it afterwards) and resolve to the final
/// [`Response`]. Register them through [`Router::get`] and friends.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

// A single registered route binding a method + pattern to a handler.
struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Handler,
}

impl Route {
    // Returns `Some(params)` when both the HTTP method and path pattern match.
    fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if &self.method == method {
            self.pattern.matches(path)
        } else {
            None
        }
    }
}

/// The outcome of a successful [`Router::lookup`].
pub struct RouteMatch<'r> {
    pub handler: &'r Handler,
    pub params: PathParams,
    /// The pattern of the route that matched, as registered.
    pub pattern: &'r str,
}

/// Ordered route table.
///
/// # Examples
///
/// ```rust
/// use waypoint::{Method, Response, Router, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/dummies/:id", |ctx| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(format!("Dummy with id={id}"))
/// });
///
/// let found = router.lookup(&Method::Get, "/dummies/99").unwrap();
/// assert_eq!(found.params.get("id"), Some("99"));
/// assert!(router.lookup(&Method::Post, "/dummies/99").is_none());
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Post, path, handler);
    }

    /// Register a handler for `PUT` requests matching `path`.
    pub fn put<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Put, path, handler);
    }

    /// Register a handler for `DELETE` requests matching `path`.
    pub fn delete<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add_route(Method::Delete, path, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route<H, F>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler: Handler = Arc::new(
            move |ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
                Box::pin(handler(ctx))
            },
        );
        tracing::debug!(method = %method, pattern = path, "route registered");
        self.routes.push(Route {
            method,
            pattern: PathPattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the first route registered for `method` whose pattern matches `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route.matches(method, path).map(|params| RouteMatch {
                handler: &route.handler,
                params,
                pattern: route.pattern.as_str(),
            })
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.pattern.as_str())),
            )
            .finish()
    }
}
