//! Unified error types.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// The error type returned by rest-easy's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values or as an
/// [`ErrorResponse`](crate::ErrorResponse) returned from an adapted handler,
/// not as `Error`s. This type surfaces startup and lifecycle failures.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more route declarations were invalid. Nothing was bound.
    #[error("invalid route configuration: {}", ConfigErrors(.0))]
    Config(Vec<ConfigError>),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// In-flight connections did not finish within the shutdown timeout.
    #[error("graceful shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A static mistake in a route or group declaration.
///
/// Collected while routes are registered and reported together by
/// [`Server::listen`](crate::Server::listen) before any port is bound.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid pattern `{0}`: expected \"<METHOD> <path>\"")]
    InvalidPattern(String),

    #[error("unknown method `{method}` in pattern `{pattern}`")]
    UnknownMethod { method: String, pattern: String },

    #[error("invalid path `{0}`: must start with '/'")]
    InvalidPath(String),

    #[error("invalid group prefix `{0}`: must start with '/' and not end with '/'")]
    InvalidPrefix(String),

    #[error("group `{prefix}` names a parent that does not belong to this server")]
    UnknownParent { prefix: String },

    #[error("two groups share the prefix `{0}`")]
    DuplicatePrefix(String),

    #[error("route `{method} {path}` rejected: {reason}")]
    RouteConflict {
        method: String,
        path: String,
        reason: String,
    },
}

struct ConfigErrors<'a>(&'a [ConfigError]);

impl fmt::Display for ConfigErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}
