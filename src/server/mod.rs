//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and hands each complete HTTP/1.1 request to a
//! handler function. Connections are persistent unless the client asks
//! otherwise.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Default cap on a complete HTTP request, headers plus body (8 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// A bound TCP listener that serves HTTP/1.1.
///
/// # Examples
///
/// ```rust,no_run
/// use waypoint::server::Server;
/// use waypoint::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:3000").await?;
///     server.run(|_req: Request| async {
///         Response::new(StatusCode::Ok).body("Hello!")
///     }).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    max_request_size: usize,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        })
    }

    /// Sets the largest request, headers plus body, the server will buffer.
    ///
    /// Larger requests are answered with `413` and the connection is closed.
    #[must_use]
    pub fn with_max_request_size(mut self, max_request_size: usize) -> Self {
        self.max_request_size = max_request_size;
        self
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// Every connection gets its own Tokio task; the handler is shared
    /// between them behind an [`Arc`]. Runs until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let max_request_size = self.max_request_size;
        info!(
            address = %self.local_addr,
            max_request_size,
            "listening"
        );

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) =
                    handle_connection(stream, peer_addr, handler, max_request_size).await
                {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// Loops reading one request per iteration until the peer closes the
/// connection, a request asks for `Connection: close`, or a request is
/// rejected.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    max_request_size: usize,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
    // Byte length of the request being received, once its head is parsed.
    let mut awaiting = 0;

    loop {
        // Pipelined requests may already be buffered; only read when the
        // buffer does not hold a complete one.
        let parsed = if buf.len() < awaiting {
            None
        } else {
            match Request::parse(&buf) {
                Ok((request, body_offset)) => {
                    // Parsing already validated the header, so this cannot fail.
                    let announced = request.content_length().unwrap_or(usize::MAX);
                    if body_offset.saturating_add(announced) > max_request_size {
                        warn!(
                            peer = %peer_addr,
                            announced,
                            "announced body too large, sending 413"
                        );
                        reject_too_large(&mut stream).await?;
                        break;
                    }
                    if request.is_complete() {
                        let consumed = body_offset + request.body().len();
                        Some((request, consumed))
                    } else {
                        awaiting = body_offset + announced;
                        buf.reserve(awaiting - buf.len());
                        None
                    }
                }
                Err(RequestError::Incomplete) => None,
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "rejecting malformed request");
                    let status = e.status();
                    let response = Response::new(status)
                        .body(format!("{}: {e}", status.canonical_reason()))
                        .keep_alive(false);
                    stream.write_all(&response.into_bytes()).await?;
                    break;
                }
            }
        };

        let Some((request, consumed)) = parsed else {
            if buf.len() > max_request_size {
                warn!(peer = %peer_addr, "request too large, sending 413");
                reject_too_large(&mut stream).await?;
                break;
            }

            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }
            continue;
        };

        let keep_alive = request.is_keep_alive();
        debug!(
            peer = %peer_addr,
            method = %request.method(),
            target = request.target(),
            "dispatching request"
        );

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(consumed);
        awaiting = 0;

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}

async fn reject_too_large(stream: &mut TcpStream) -> Result<(), std::io::Error> {
    let response = Response::new(StatusCode::PayloadTooLarge)
        .body("Request entity too large")
        .keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}
