//! The sample "Dummy Express" application served by the `waypoint` binary.
//!
//! | Request               | Response                                    |
//! |-----------------------|---------------------------------------------|
//! | `GET /`               | `Hello Dummy Express!`                      |
//! | `GET /dummies/:id`    | `Dummy with id=<id>`                        |
//! | `POST /dummies`       | the parsed JSON body echoed as `{"body":…}` |
//!
//! A body that fails to parse is answered with `400 Error: <message>`.

use serde_json::json;
use tracing::info;

use waypoint::config::ServerConfig;
use waypoint::middleware::{BodyErrorResponder, JsonBody};
use waypoint::{App, Response, StatusCode};

pub const GREETING: &str = "Hello Dummy Express!";

/// Builds the demo application.
pub fn app(config: &ServerConfig) -> App {
    let mut app = App::new();

    app.get("/", |_ctx| async { Response::new(StatusCode::Ok).body(GREETING) });

    app.get("/dummies/:id", |ctx| async move {
        let id = ctx.params().get("id").unwrap_or_default();
        Response::new(StatusCode::Ok).body(format!("Dummy with id={id}"))
    });

    app.post("/dummies", |ctx| async move {
        let body = ctx.body().cloned().unwrap_or_default();
        info!(%body, "dummy received");
        Response::json(&json!({ "body": body }))
    });

    app.use_middleware(JsonBody::new().with_limit(config.max_body_bytes));
    app.use_error(BodyErrorResponder);

    app
}
