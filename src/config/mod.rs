//! Server configuration from command-line flags and environment variables.

use clap::Parser;

use crate::middleware::DEFAULT_BODY_LIMIT;
use crate::server::DEFAULT_MAX_REQUEST_SIZE;

/// Port the server listens on when none is configured.
pub const DEFAULT_PORT: u16 = 3000;

/// Room left for the request line and headers on top of the body limit.
const HEAD_ALLOWANCE: usize = 64 * 1024;

/// Settings for the bundled server binary.
///
/// Every flag can also be set through the matching `WAYPOINT_*` environment
/// variable; an explicit flag wins.
///
/// # Examples
///
/// ```
/// use clap::Parser;
/// use waypoint::config::{DEFAULT_PORT, ServerConfig};
///
/// let config = ServerConfig::parse_from(["waypoint"]);
/// assert_eq!(config.port, DEFAULT_PORT);
/// assert_eq!(config.bind_addr(), format!("0.0.0.0:{DEFAULT_PORT}"));
/// ```
#[derive(Debug, Clone, Parser)]
#[command(name = "waypoint", version, about = "Minimal HTTP request dispatcher")]
pub struct ServerConfig {
    /// Interface to bind.
    #[arg(long, env = "WAYPOINT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on.
    #[arg(short, long, env = "WAYPOINT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Largest JSON request body accepted, in bytes.
    #[arg(long, env = "WAYPOINT_MAX_BODY_BYTES", default_value_t = DEFAULT_BODY_LIMIT)]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// `host:port`, ready for [`Server::bind`](crate::Server::bind).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request cap for the [`Server`](crate::Server), large enough that a body
    /// within `max_body_bytes` is never cut off before it reaches the body reader.
    pub fn max_request_bytes(&self) -> usize {
        self.max_body_bytes
            .saturating_add(HEAD_ALLOWANCE)
            .max(DEFAULT_MAX_REQUEST_SIZE)
    }
}
