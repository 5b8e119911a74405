//! The request pipeline: middleware chain, then route table, then defaults.
//!
//! For each request the [`Dispatcher`] walks its chain with a [`Cursor`], the
//! per-request record of `{ index, pending error }`. Every step visits exactly
//! one stage and moves the index forward by one:
//!
//! | pending error | stage kind   | action                                  |
//! |---------------|--------------|-----------------------------------------|
//! | none          | regular      | run it                                  |
//! | none          | error-aware  | skip it                                 |
//! | some          | regular      | skip it, error stays pending            |
//! | some          | error-aware  | run it with the error                   |
//!
//! Once the index reaches the end of the chain the request is routed if no
//! error is pending (falling back to `404 Page Not Found`), or answered with
//! `500 Internal Server Error` if one is. A stage returning
//! [`Flow::Respond`] ends the request immediately. A chain of `n` stages thus
//! takes at most `n + 1` steps.
//!
//! Panics raised by a stage are caught and become the pending error, so every
//! request ends with a response.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::context::Context;
use crate::middleware::{BoxError, ErrorMiddleware, Flow, Middleware, Stage};
use crate::router::Router;
use crate::{Request, Response, StatusCode};

/// Body of the response sent when no route matches.
pub const NOT_FOUND_BODY: &str = "Page Not Found";

/// Body of the response sent when an error is still pending at the end of the chain.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// A stage or handler panicked instead of returning.
#[derive(Debug, Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    message: String,
}

impl HandlerPanic {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// What the dispatcher does on one turn of its loop. Produced by [`Cursor::advance`].
pub enum Step<'c> {
    /// Run a regular stage.
    Run(&'c Arc<dyn Middleware>),
    /// Run an error-aware stage with the pending error.
    Recover(&'c Arc<dyn ErrorMiddleware>, BoxError),
    /// The stage at this position does not apply in the current state.
    Skip,
    /// The chain is exhausted with no error pending.
    Route,
    /// The chain is exhausted and this error was never resolved.
    Unhandled(BoxError),
}

impl std::fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(_) => f.write_str("Run"),
            Self::Recover(_, err) => f.debug_tuple("Recover").field(err).finish(),
            Self::Skip => f.write_str("Skip"),
            Self::Route => f.write_str("Route"),
            Self::Unhandled(err) => f.debug_tuple("Unhandled").field(err).finish(),
        }
    }
}

/// Per-request position in the middleware chain.
///
/// The index only moves forward, one stage per [`advance`](Self::advance),
/// and stays at the end of the chain once it gets there.
#[derive(Debug, Default)]
pub struct Cursor {
    index: usize,
    pending: Option<BoxError>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stages visited so far.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn has_pending_error(&self) -> bool {
        self.pending.is_some()
    }

    /// Decide what to do with the next stage of `chain`.
    ///
    /// Any pending error is handed out with [`Step::Recover`] or
    /// [`Step::Unhandled`]; a [`Step::Skip`] keeps it pending.
    pub fn advance<'c>(&mut self, chain: &'c [Stage]) -> Step<'c> {
        let Some(stage) = chain.get(self.index) else {
            return match self.pending.take() {
                Some(err) => Step::Unhandled(err),
                None => Step::Route,
            };
        };
        self.index += 1;

        match (stage, self.pending.take()) {
            (Stage::ErrorAware(mw), Some(err)) => Step::Recover(mw, err),
            (Stage::Regular(_), Some(err)) => {
                self.pending = Some(err);
                Step::Skip
            }
            (Stage::Regular(mw), None) => Step::Run(mw),
            (Stage::ErrorAware(_), None) => Step::Skip,
        }
    }

    /// Record the outcome of a stage that asked to continue.
    pub fn resume(&mut self, error: Option<BoxError>) {
        self.pending = error;
    }
}

/// Immutable request pipeline: an ordered middleware chain plus a route table.
///
/// Built once (usually through [`App`](crate::App)) and shared by every
/// connection behind an [`Arc`]. Several dispatchers can live side by side.
#[derive(Debug)]
pub struct Dispatcher {
    chain: Vec<Stage>,
    router: Router,
}

impl Dispatcher {
    pub fn new(chain: Vec<Stage>, router: Router) -> Self {
        Self { chain, router }
    }

    pub fn chain(&self) -> &[Stage] {
        &self.chain
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run `request` through the pipeline and return the response to send.
    pub async fn dispatch(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let ctx = Context::new(request);
        let path = ctx.pathname().to_owned();

        let response = self.run(ctx).await;

        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed = ?start.elapsed(),
            "request handled"
        );
        response
    }

    async fn run(&self, mut ctx: Context) -> Response {
        let mut cursor = Cursor::new();

        loop {
            let position = cursor.index();
            let flow = match cursor.advance(&self.chain) {
                Step::Run(mw) => {
                    debug!(stage = position, "running middleware");
                    let outcome = AssertUnwindSafe(async { mw.handle(&mut ctx).await })
                        .catch_unwind()
                        .await;
                    absorb_panic(outcome, position)
                }
                Step::Recover(mw, err) => {
                    debug!(stage = position, error = %err, "running error middleware");
                    let outcome = AssertUnwindSafe(async { mw.handle_error(err, &mut ctx).await })
                        .catch_unwind()
                        .await;
                    absorb_panic(outcome, position)
                }
                Step::Skip => {
                    trace!(
                        stage = position,
                        error_pending = cursor.has_pending_error(),
                        "stage skipped"
                    );
                    continue;
                }
                Step::Route => return self.route(ctx).await,
                Step::Unhandled(err) => {
                    warn!(
                        path = ctx.pathname(),
                        error = %err,
                        "unhandled error reached end of chain"
                    );
                    return internal_error();
                }
            };

            match flow {
                Flow::Next => cursor.resume(None),
                Flow::Fail(err) => cursor.resume(Some(err)),
                Flow::Respond(response) => return response,
            }
        }
    }

    async fn route(&self, mut ctx: Context) -> Response {
        let Some(found) = self.router.lookup(ctx.method(), ctx.pathname()) else {
            debug!(method = %ctx.method(), path = ctx.pathname(), "no route matched");
            return not_found();
        };

        debug!(pattern = found.pattern, "route matched");
        ctx.set_params(found.params);
        let handler = found.handler;

        match AssertUnwindSafe(async move { handler(ctx).await })
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(payload) => {
                let panic = HandlerPanic::from_payload(payload.as_ref());
                error!(pattern = found.pattern, error = %panic, "route handler panicked");
                internal_error()
            }
        }
    }
}

fn absorb_panic(outcome: Result<Flow, Box<dyn Any + Send>>, stage: usize) -> Flow {
    match outcome {
        Ok(flow) => flow,
        Err(payload) => {
            let panic = HandlerPanic::from_payload(payload.as_ref());
            error!(stage, error = %panic, "middleware panicked");
            Flow::fail(panic)
        }
    }
}

fn not_found() -> Response {
    Response::new(StatusCode::NotFound).body(NOT_FOUND_BODY)
}

fn internal_error() -> Response {
    Response::new(StatusCode::InternalServerError).body(INTERNAL_ERROR_BODY)
}
