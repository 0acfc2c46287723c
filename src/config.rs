//! Server configuration.
//!
//! ```rust
//! use rest_easy::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .port(3000)
//!     .shutdown_timeout(Duration::from_secs(30))
//!     .build();
//!
//! assert_eq!(config.port(), 3000);
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tracing::{Dispatch, warn};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default time in-flight requests get to finish once shutdown starts.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// Used instead of a zero shutdown timeout.
pub const FALLBACK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Overrides the port in [`ServerConfig::from_env`].
pub const PORT_ENV: &str = "REST_EASY_PORT";

/// Overrides the shutdown timeout (whole seconds) in [`ServerConfig::from_env`].
pub const SHUTDOWN_TIMEOUT_ENV: &str = "REST_EASY_SHUTDOWN_TIMEOUT_SECS";

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] to construct instances.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    host: IpAddr,
    port: u16,
    shutdown_timeout: Duration,
    logger: Option<Dispatch>,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Defaults, overridden by `REST_EASY_PORT` and
    /// `REST_EASY_SHUTDOWN_TIMEOUT_SECS` when they are set and valid.
    pub fn from_env() -> Self {
        Self::builder().env_overrides(|key| std::env::var(key).ok()).build()
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The configured timeout, or [`FALLBACK_SHUTDOWN_TIMEOUT`] if it is zero.
    pub fn shutdown_timeout(&self) -> Duration {
        if self.shutdown_timeout.is_zero() {
            FALLBACK_SHUTDOWN_TIMEOUT
        } else {
            self.shutdown_timeout
        }
    }

    /// The subscriber every server log record goes to. `None` means the
    /// ambient default subscriber.
    pub fn logger(&self) -> Option<&Dispatch> {
        self.logger.as_ref()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Clone, Debug)]
pub struct ServerConfigBuilder {
    host: IpAddr,
    port: u16,
    shutdown_timeout: Duration,
    logger: Option<Dispatch>,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            logger: None,
        }
    }
}

impl ServerConfigBuilder {
    /// Interface to bind. Defaults to all interfaces.
    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// `0` lets the OS pick a free port; see
    /// [`Listening::local_addr`](crate::Listening::local_addr).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Routes the server's log records (startup, shutdown, access logs,
    /// route registration) to `logger` instead of the global default.
    ///
    /// ```rust
    /// use rest_easy::ServerConfig;
    ///
    /// let subscriber = tracing_subscriber::fmt()
    ///     .with_max_level(tracing::Level::DEBUG)
    ///     .finish();
    /// let config = ServerConfig::builder().logger(subscriber).build();
    /// assert!(config.logger().is_some());
    /// ```
    pub fn logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// Applies [`PORT_ENV`] and [`SHUTDOWN_TIMEOUT_ENV`] as read through
    /// `lookup`. Unparseable values are ignored with a warning.
    pub fn env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(PORT_ENV) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(e) => warn!(var = PORT_ENV, value = %raw, "ignoring invalid port: {e}"),
            }
        }
        if let Some(raw) = lookup(SHUTDOWN_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.shutdown_timeout = Duration::from_secs(secs),
                Err(e) => warn!(var = SHUTDOWN_TIMEOUT_ENV, value = %raw, "ignoring invalid shutdown timeout: {e}"),
            }
        }
        self
    }

    pub fn build(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            shutdown_timeout: self.shutdown_timeout,
            logger: self.logger,
        }
    }
}
