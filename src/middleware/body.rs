//! JSON request body reader and the error responder that pairs with it.

use thiserror::Error;
use tracing::debug;

use super::{BoxError, BoxFuture, ErrorMiddleware, Flow, Middleware};
use crate::context::Context;
use crate::http::{Request, Response, StatusCode};

/// Largest body [`JsonBody`] accepts unless configured otherwise (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Message [`BodyErrorResponder`] uses when a body error renders as an empty string.
pub const DEFAULT_BODY_ERROR: &str = "Invalid JSON format";

/// Why a request body could not be turned into JSON.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("request body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("{0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl BodyError {
    /// The status code that best describes this failure to a client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PayloadTooLarge,
            Self::InvalidUtf8(_) | Self::InvalidJson(_) => StatusCode::BadRequest,
        }
    }
}

/// Reads the whole body of `request` as UTF-8 text and parses it as JSON.
///
/// An empty body is not valid JSON and fails like any other malformed input.
///
/// # Errors
///
/// - [`BodyError::PayloadTooLarge`] — the announced or received body is over `limit`.
/// - [`BodyError::InvalidUtf8`] — the bytes are not UTF-8.
/// - [`BodyError::InvalidJson`] — the text does not parse as JSON.
pub fn read_json(request: &Request, limit: usize) -> Result<serde_json::Value, BodyError> {
    let announced = request.content_length().unwrap_or(0);
    let body = request.body();
    if announced > limit || body.len() > limit {
        return Err(BodyError::PayloadTooLarge { limit });
    }

    let text = std::str::from_utf8(body)?;
    Ok(serde_json::from_str(text)?)
}

/// Regular middleware that parses `POST` and `PUT` bodies as JSON into
/// [`Context::body`].
///
/// Other methods pass straight through. A body that cannot be read becomes the
/// pending error ([`BodyError`]) for error-aware middleware to deal with.
///
/// # Examples
///
/// ```rust
/// use waypoint::middleware::JsonBody;
///
/// let parser = JsonBody::new().with_limit(64 * 1024);
/// assert_eq!(parser.limit(), 64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct JsonBody {
    limit: usize,
}

impl Default for JsonBody {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonBody {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Sets the largest accepted body in bytes.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Middleware for JsonBody {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            if !ctx.method().carries_body() {
                return Flow::Next;
            }

            match read_json(ctx.request(), self.limit) {
                Ok(value) => {
                    ctx.set_body(value);
                    Flow::Next
                }
                Err(e) => {
                    debug!(path = ctx.pathname(), error = %e, "request body rejected");
                    Flow::fail(e)
                }
            }
        })
    }
}

/// Error-aware middleware that answers body-reading failures.
///
/// A [`BodyError`] becomes a response with the error's status and the body
/// `Error: <message>`. Any other error is passed on untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct BodyErrorResponder;

impl ErrorMiddleware for BodyErrorResponder {
    fn handle_error<'a>(&'a self, err: BoxError, _ctx: &'a mut Context) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            let Some(body_error) = err.downcast_ref::<BodyError>() else {
                return Flow::Fail(err);
            };

            let message = body_error.to_string();
            let message = if message.is_empty() {
                DEFAULT_BODY_ERROR
            } else {
                message.as_str()
            };

            Flow::Respond(Response::new(body_error.status()).body(format!("Error: {message}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Headers, Method};

    fn request(method: Method, body: &'static str) -> Request {
        Request::from_parts(method, "/dummies", Headers::new(), body)
    }

    #[test]
    fn parses_valid_json() {
        let value = read_json(&request(Method::Post, r#"{"x":1}"#), DEFAULT_BODY_LIMIT).unwrap();
        assert_eq!(value, serde_json::json!({ "x": 1 }));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = read_json(&request(Method::Post, "{bad json"), DEFAULT_BODY_LIMIT).unwrap_err();
        assert!(matches!(err, BodyError::InvalidJson(_)));
        assert_eq!(err.status(), StatusCode::BadRequest);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn empty_body_is_not_json() {
        let err = read_json(&request(Method::Put, ""), DEFAULT_BODY_LIMIT).unwrap_err();
        assert!(matches!(err, BodyError::InvalidJson(_)));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let err = read_json(&request(Method::Post, r#"{"x":1}"#), 4).unwrap_err();
        assert!(matches!(err, BodyError::PayloadTooLarge { limit: 4 }));
        assert_eq!(err.status(), StatusCode::PayloadTooLarge);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let req = Request::from_parts(Method::Post, "/", Headers::new(), vec![0xff, 0xfe]);
        let err = read_json(&req, DEFAULT_BODY_LIMIT).unwrap_err();
        assert!(matches!(err, BodyError::InvalidUtf8(_)));
    }

    #[tokio::test]
    async fn middleware_fills_context_body() {
        let mut ctx = Context::new(request(Method::Post, r#"{"x":1}"#));
        let flow = JsonBody::new().handle(&mut ctx).await;
        assert!(matches!(flow, Flow::Next));
        assert_eq!(ctx.body(), Some(&serde_json::json!({ "x": 1 })));
    }

    #[tokio::test]
    async fn middleware_ignores_get() {
        let mut ctx = Context::new(request(Method::Get, "{bad json"));
        let flow = JsonBody::new().handle(&mut ctx).await;
        assert!(matches!(flow, Flow::Next));
        assert!(ctx.body().is_none());
    }

    #[tokio::test]
    async fn responder_answers_body_errors() {
        let mut ctx = Context::new(request(Method::Post, "{bad json"));
        let err = read_json(ctx.request(), DEFAULT_BODY_LIMIT).unwrap_err();
        match BodyErrorResponder.handle_error(Box::new(err), &mut ctx).await {
            Flow::Respond(res) => {
                assert_eq!(res.status(), StatusCode::BadRequest);
                assert!(res.payload().starts_with(b"Error: "));
            }
            other => panic!("expected Respond, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn responder_passes_other_errors_on() {
        let mut ctx = Context::new(request(Method::Get, ""));
        let flow = BodyErrorResponder.handle_error("other".into(), &mut ctx).await;
        assert!(matches!(flow, Flow::Fail(err) if err.to_string() == "other"));
    }

    #[tokio::test]
    async fn middleware_fails_with_body_error() {
        let mut ctx = Context::new(request(Method::Post, "{bad json"));
        match JsonBody::new().handle(&mut ctx).await {
            Flow::Fail(err) => assert!(err.downcast_ref::<BodyError>().is_some()),
            other => panic!("expected Fail, got {other:?}"),
        }
        assert!(ctx.body().is_none());
    }
}
