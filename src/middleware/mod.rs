//! Middleware — the stages a request passes through before routing.
//!
//! Every stage in the chain is one of two kinds, chosen explicitly when it is
//! registered:
//!
//! - a **regular** [`Middleware`], run while no error is pending;
//! - an **error-aware** [`ErrorMiddleware`], run only while an error is
//!   pending, receiving that error by value.
//!
//! A stage finishes by returning a [`Flow`]: continue ([`Flow::Next`]),
//! continue with a pending error ([`Flow::Fail`]), or stop the chain with a
//! response ([`Flow::Respond`]). The [`Dispatcher`](crate::Dispatcher) owns the
//! loop that interprets these values.
//!
//! Closures can be turned into stages with [`from_fn`] and [`from_error_fn`]:
//!
//! ```rust
//! use waypoint::middleware::{Flow, from_fn, from_error_fn};
//! use waypoint::{Response, StatusCode};
//!
//! let tag = from_fn(|ctx| {
//!     Box::pin(async move {
//!         ctx.extensions_mut().insert("tagged");
//!         Flow::Next
//!     })
//! });
//!
//! let recover = from_error_fn(|err, _ctx| {
//!     Box::pin(async move {
//!         Flow::Respond(Response::new(StatusCode::BadRequest).body(err.to_string()))
//!     })
//! });
//! # let _ = (tag, recover);
//! ```

use std::fmt;
use std::sync::Arc;

pub use futures::future::BoxFuture;

use crate::Response;
use crate::context::Context;

mod body;

pub use body::{
    BodyError, BodyErrorResponder, DEFAULT_BODY_ERROR, DEFAULT_BODY_LIMIT, JsonBody, read_json,
};

/// The opaque error value carried along the chain while it is pending.
///
/// The dispatcher only looks at whether an error is present; error-aware
/// middleware may downcast it to find out what went wrong.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a stage asks the dispatcher to do next.
#[derive(Debug)]
pub enum Flow {
    /// Continue with no pending error. From an error-aware stage this resolves
    /// the error it was handed.
    Next,
    /// Continue with `error` pending. Regular stages are skipped until an
    /// error-aware stage handles it.
    Fail(BoxError),
    /// The request is answered; no further stage or route runs.
    Respond(Response),
}

impl Flow {
    /// Shorthand for `Flow::Fail(err.into())`.
    pub fn fail(err: impl Into<BoxError>) -> Self {
        Self::Fail(err.into())
    }
}

/// A regular middleware stage.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; one instance serves every
///   request on every connection.
/// - The returned future may borrow `ctx` mutably until it resolves; it must
///   be `Send` so connection tasks can move across runtime threads.
pub trait Middleware: Send + Sync {
    /// Inspect or update the request context, then say how to continue.
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow>;
}

/// An error-aware middleware stage.
///
/// Only invoked while an error is pending. Returning [`Flow::Next`] clears the
/// error, [`Flow::Fail`] passes it (or a replacement) on, and
/// [`Flow::Respond`] answers the request.
pub trait ErrorMiddleware: Send + Sync {
    fn handle_error<'a>(&'a self, err: BoxError, ctx: &'a mut Context) -> BoxFuture<'a, Flow>;
}

/// One entry of the middleware chain, tagged with its kind.
#[derive(Clone)]
pub enum Stage {
    Regular(Arc<dyn Middleware>),
    ErrorAware(Arc<dyn ErrorMiddleware>),
}

impl Stage {
    pub fn regular(middleware: impl Middleware + 'static) -> Self {
        Self::Regular(Arc::new(middleware))
    }

    pub fn error_aware(middleware: impl ErrorMiddleware + 'static) -> Self {
        Self::ErrorAware(Arc::new(middleware))
    }

    pub fn is_error_aware(&self) -> bool {
        matches!(self, Self::ErrorAware(_))
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular(_) => f.write_str("Stage::Regular"),
            Self::ErrorAware(_) => f.write_str("Stage::ErrorAware"),
        }
    }
}

/// A [`Middleware`] built from a closure. See [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F> {
    f: F,
}

/// Wrap a closure `Fn(&mut Context) -> BoxFuture<Flow>` as a regular middleware.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Flow> + Send + Sync,
{
    FromFn { f }
}

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Flow> + Send + Sync,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        (self.f)(ctx)
    }
}

/// An [`ErrorMiddleware`] built from a closure. See [`from_error_fn`].
#[derive(Clone)]
pub struct FromErrorFn<F> {
    f: F,
}

/// Wrap a closure `Fn(BoxError, &mut Context) -> BoxFuture<Flow>` as an
/// error-aware middleware.
pub fn from_error_fn<F>(f: F) -> FromErrorFn<F>
where
    F: for<'a> Fn(BoxError, &'a mut Context) -> BoxFuture<'a, Flow> + Send + Sync,
{
    FromErrorFn { f }
}

impl<F> ErrorMiddleware for FromErrorFn<F>
where
    F: for<'a> Fn(BoxError, &'a mut Context) -> BoxFuture<'a, Flow> + Send + Sync,
{
    fn handle_error<'a>(&'a self, err: BoxError, ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        (self.f)(err, ctx)
    }
}
