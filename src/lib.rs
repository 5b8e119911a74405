//! # waypoint
//!
//! A small async HTTP/1.1 request dispatcher: routes with `:param` captures,
//! an ordered middleware chain with error-aware stages, and a JSON body
//! reader, served over a Tokio TCP listener.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypoint::{App, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::new();
//!     app.get("/dummies/:id", |ctx| async move {
//!         let id = ctx.params().get("id").unwrap_or_default();
//!         Response::new(StatusCode::Ok).body(format!("Dummy with id={id}"))
//!     });
//!     app.listen(3000).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Dispatch order
//!
//! Every request walks the middleware chain in registration order. A
//! regular stage runs only while no error is pending, an error-aware stage
//! only while one is. Once the chain is exhausted the route table is
//! consulted; an error still pending at that point becomes a 500.

pub mod app;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use context::Context;
pub use dispatcher::Dispatcher;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
