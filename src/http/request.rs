//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },

    #[error("unsupported transfer encoding: {encoding}")]
    UnsupportedTransferEncoding { encoding: String },

    #[error("announced body of {length} bytes is too large")]
    ContentLengthTooLarge { length: usize },
}

impl RequestError {
    /// The status code the server answers with before closing the connection.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedTransferEncoding { .. } => StatusCode::NotImplemented,
            Self::ContentLengthTooLarge { .. } => StatusCode::PayloadTooLarge,
            _ => StatusCode::BadRequest,
        }
    }
}

/// A parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer, or assembled directly
/// with [`Request::from_parts`]. The request target is kept verbatim; splitting
/// it into pathname and query happens when the dispatcher builds the
/// [`Context`](crate::context::Context).
///
/// # Examples
///
/// ```
/// use waypoint::http::request::Request;
///
/// let raw = b"GET /dummies/7?verbose=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.target(), "/dummies/7?verbose=1");
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf`. The body holds at most `Content-Length` bytes of whatever
    /// follows the header block; callers check [`Request::is_complete`] before
    /// dispatching.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    /// - [`RequestError::InvalidContentLength`] — `Content-Length` is not a number.
    /// - [`RequestError::UnsupportedTransferEncoding`] — the body uses a transfer coding.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let Ok(method) = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>();

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        if let Some(encoding) = header_map.get("transfer-encoding") {
            return Err(RequestError::UnsupportedTransferEncoding {
                encoding: encoding.to_owned(),
            });
        }

        let mut request = Self {
            method,
            target,
            version,
            headers: header_map,
            body: Bytes::new(),
        };

        let content_length = request.content_length()?;
        let Some(frame_end) = body_offset.checked_add(content_length) else {
            return Err(RequestError::ContentLengthTooLarge {
                length: content_length,
            });
        };
        let end = buf.len().min(frame_end);
        request.body = Bytes::copy_from_slice(&buf[body_offset..end]);

        Ok((request, body_offset))
    }

    /// Builds a request without going through the wire parser.
    ///
    /// The version is HTTP/1.1 and `Content-Length` is taken from `body`.
    pub fn from_parts(
        method: Method,
        target: impl Into<String>,
        headers: Headers,
        body: impl Into<Bytes>,
    ) -> Self {
        let body = body.into();
        let mut headers = headers;
        headers.set("Content-Length", body.len().to_string());
        Self {
            method,
            target: target.into(),
            version: 1,
            headers,
            body,
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw request target (path plus optional `?query`).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns `true` once the body holds every byte announced by `Content-Length`.
    pub fn is_complete(&self) -> bool {
        self.content_length()
            .is_ok_and(|expected| self.body.len() >= expected)
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the announced `Content-Length`, or `0` when the header is absent.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidContentLength`] when the header is not a
    /// non-negative integer.
    pub fn content_length(&self) -> Result<usize, RequestError> {
        match self.headers.get("content-length") {
            None => Ok(0),
            Some(value) => {
                value
                    .trim()
                    .parse()
                    .map_err(|_| RequestError::InvalidContentLength {
                        value: value.to_owned(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.target(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
        assert!(req.body().is_empty());
        assert!(req.is_complete());
    }

    #[test]
    fn target_keeps_query_string() {
        let raw = b"GET /search?q=rust&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.target(), "/search?q=rust&page=2");
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_defaults() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(Request::parse(raw).unwrap().0.is_keep_alive());

        let raw = b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n";
        assert!(!Request::parse(raw).unwrap().0.is_keep_alive());

        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        assert!(!Request::parse(raw).unwrap().0.is_keep_alive());
    }

    #[test]
    fn body_is_cut_at_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length().unwrap(), 5);
        assert_eq!(&req.body()[..], b"hello");
        assert!(req.is_complete());
    }

    #[test]
    fn partial_body_is_not_complete() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nhel";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.is_complete());
    }

    #[test]
    fn bad_content_length_is_rejected() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        let err = Request::parse(raw).unwrap_err();
        assert!(matches!(err, RequestError::InvalidContentLength { .. }));
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[test]
    fn overflowing_content_length_is_rejected() {
        let raw = b"POST /dummies HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n{}";
        let err = Request::parse(raw).unwrap_err();
        assert!(matches!(
            err,
            RequestError::ContentLengthTooLarge { length: usize::MAX }
        ));
        assert_eq!(err.status(), StatusCode::PayloadTooLarge);
    }

    #[test]
    fn chunked_bodies_are_not_implemented() {
        let raw = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let err = Request::parse(raw).unwrap_err();
        assert_eq!(err.status(), StatusCode::NotImplemented);
    }

    #[test]
    fn from_parts_sets_content_length() {
        let req = Request::from_parts(Method::Post, "/dummies", Headers::new(), "{}");
        assert_eq!(req.headers().get("content-length"), Some("2"));
        assert!(req.is_complete());
    }
}
