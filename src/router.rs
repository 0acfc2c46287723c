//! Route groups.
//!
//! A [`Router`] is a path prefix, an ordered middleware stack and a private
//! route table. Groups are created by [`Server::group`](crate::Server::group),
//! optionally nested under another group, and are mounted under the root
//! table when the server starts.
//!
//! ```rust
//! use rest_easy::{Request, Server, ServerConfig, middleware};
//!
//! async fn status(_req: Request) -> &'static str { "ok" }
//!
//! let mut server = Server::new(ServerConfig::default());
//! let internal = server
//!     .group("/internal", None)
//!     .use_middleware(middleware::access_log())
//!     .handle_func("GET /status", status)
//!     .id();
//!
//! let admin = server.group("/admin", Some(internal));
//! assert_eq!(admin.full_path("/settings"), "/internal/admin/settings");
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::{Dispatch, debug};

use crate::dispatch::{Dispatcher, parse_prefix};
use crate::error::ConfigError;
use crate::handler::Handler;
use crate::method::Method;
use crate::middleware::{self, Middleware};
use crate::request::Request;
use crate::response::IntoResponse;

/// Names a group inside the [`Server`](crate::Server) that created it.
///
/// Pass it as the `parent` of [`Server::group`](crate::Server::group) to
/// nest one group under another.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct GroupId(pub(crate) usize);

/// A path-prefixed, middleware-scoped collection of routes.
///
/// Registration never fails on the spot. A malformed pattern or a
/// conflicting route is recorded and reported, together with every other
/// configuration problem, when the server mounts its groups.
pub struct Router {
    id: GroupId,
    prefix: String,
    parent_prefix: String,
    middleware: Vec<Arc<dyn Middleware>>,
    table: Dispatcher,
    errors: Vec<ConfigError>,
    logger: Option<Dispatch>,
}

impl Router {
    pub(crate) fn new(
        id: GroupId,
        prefix: &str,
        parent_prefix: &str,
        logger: Option<Dispatch>,
    ) -> Self {
        let mut errors = Vec::new();
        if !valid_prefix(prefix) {
            errors.push(ConfigError::InvalidPrefix(prefix.to_owned()));
        }
        Self {
            id,
            prefix: prefix.to_owned(),
            parent_prefix: parent_prefix.to_owned(),
            middleware: Vec::new(),
            table: Dispatcher::default(),
            errors,
            logger,
        }
    }

    pub(crate) fn record_error(&mut self, err: ConfigError) {
        self.errors.push(err);
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// This group's own prefix, as given to [`Server::group`](crate::Server::group).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Every ancestor prefix followed by this group's own, root first.
    pub fn full_prefix(&self) -> String {
        format!("{}{}", self.parent_prefix, self.prefix)
    }

    /// The path a route declared as `path` in this group is served at.
    pub fn full_path(&self, path: &str) -> String {
        format!("{}{}{}", self.parent_prefix, self.prefix, path)
    }

    /// Appends a middleware. Routes registered afterwards run through every
    /// middleware added so far, first-added outermost.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers `handler` for `pattern` (`"<METHOD> <path>"`).
    ///
    /// Accepts anything implementing [`Handler`], including the
    /// [`Endpoint`](crate::Endpoint)s built by [`adapt`](crate::adapt).
    pub fn handle(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        let (method, path) = match parse_pattern(pattern) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.errors.push(e);
                return self;
            }
        };

        let full_path = self.full_path(path);
        let handler = middleware::apply(&self.middleware, handler.into_boxed_handler());

        self.log_registration(method, &full_path);
        if let Err(e) = self.table.insert(method, &full_path, handler) {
            self.errors.push(e);
        }
        self
    }

    /// Registers a plain `async fn(Request) -> impl IntoResponse` for
    /// `pattern`. Middleware is applied exactly as for [`Router::handle`].
    pub fn handle_func<F, Fut, R>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + Send + 'static,
    {
        self.handle(pattern, f)
    }

    fn log_registration(&self, method: Method, full_path: &str) {
        let pattern = format!("{method} {full_path}");
        let log = || debug!(%pattern, "registering route");
        match &self.logger {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, log),
            None => log(),
        }
    }

    pub(crate) fn into_parts(self) -> (String, Dispatcher, Vec<ConfigError>) {
        let full_prefix = self.full_prefix();
        (full_prefix, self.table, self.errors)
    }
}

/// Empty (mounted at the root) or `/segment[/segment..]` without a trailing
/// slash, where a segment may be a `{name}` wildcard.
fn valid_prefix(prefix: &str) -> bool {
    parse_prefix(prefix).is_some()
}

/// Splits `"<METHOD> <path>"` on the first space.
pub(crate) fn parse_pattern(pattern: &str) -> Result<(Method, &str), ConfigError> {
    let Some((method, path)) = pattern.split_once(' ') else {
        return Err(ConfigError::InvalidPattern(pattern.to_owned()));
    };
    let method = method.parse::<Method>().map_err(|()| ConfigError::UnknownMethod {
        method: method.to_owned(),
        pattern: pattern.to_owned(),
    })?;
    if !path.starts_with('/') {
        return Err(ConfigError::InvalidPath(path.to_owned()));
    }
    Ok((method, path))
}
