//! Registration API — collect routes and middleware, then serve them.
//!
//! An [`App`] is mutable only while it is being set up. [`App::build`] turns
//! it into an immutable [`Dispatcher`]; [`App::listen`] and [`App::serve`] do
//! that and start accepting connections.

use std::sync::Arc;

use crate::context::Context;
use crate::dispatcher::Dispatcher;
use crate::middleware::{ErrorMiddleware, Middleware, Stage};
use crate::router::Router;
use crate::server::{Server, ServerError};
use crate::{Request, Response};

/// Builder for a [`Dispatcher`].
///
/// # Examples
///
/// ```rust
/// use waypoint::middleware::{Flow, JsonBody, from_error_fn};
/// use waypoint::{App, Response, StatusCode};
///
/// let mut app = App::new();
/// app.get("/", |_ctx| async {
///     Response::new(StatusCode::Ok).body("Hello Dummy Express!")
/// });
/// app.use_middleware(JsonBody::new());
/// app.use_error(from_error_fn(|err, _ctx| {
///     Box::pin(async move {
///         Flow::Respond(Response::new(StatusCode::BadRequest).body(format!("Error: {err}")))
///     })
/// }));
///
/// let dispatcher = app.build();
/// assert_eq!(dispatcher.chain().len(), 2);
/// assert_eq!(dispatcher.router().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct App {
    chain: Vec<Stage>,
    router: Router,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `GET` requests matching `path` to `handler`.
    pub fn get<H, F>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.router.get(path, handler);
        self
    }

    /// Route `POST` requests matching `path` to `handler`.
    pub fn post<H, F>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.router.post(path, handler);
        self
    }

    /// Route `PUT` requests matching `path` to `handler`.
    pub fn put<H, F>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.router.put(path, handler);
        self
    }

    /// Route `DELETE` requests matching `path` to `handler`.
    pub fn delete<H, F>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.router.delete(path, handler);
        self
    }

    /// Append a regular middleware to the chain.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.chain.push(Stage::regular(middleware));
        self
    }

    /// Append an error-aware middleware to the chain.
    pub fn use_error(&mut self, middleware: impl ErrorMiddleware + 'static) -> &mut Self {
        self.chain.push(Stage::error_aware(middleware));
        self
    }

    /// Append an already tagged stage.
    pub fn use_stage(&mut self, stage: Stage) -> &mut Self {
        self.chain.push(stage);
        self
    }

    /// Freeze the registrations into a dispatcher.
    pub fn build(self) -> Dispatcher {
        Dispatcher::new(self.chain, self.router)
    }

    /// Bind `0.0.0.0:port` and serve forever.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the port cannot be bound, or
    /// [`ServerError::Io`] if the listener fails.
    pub async fn listen(self, port: u16) -> Result<(), ServerError> {
        let server = Server::bind(format!("0.0.0.0:{port}")).await?;
        self.serve(server).await
    }

    /// Serve on an already bound server, forever.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener fails.
    pub async fn serve(self, server: Server) -> Result<(), ServerError> {
        let dispatcher = Arc::new(self.build());
        server
            .run(move |request: Request| {
                let dispatcher = Arc::clone(&dispatcher);
                async move { dispatcher.dispatch(request).await }
            })
            .await
    }
}
