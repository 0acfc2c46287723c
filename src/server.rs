//! HTTP server and graceful shutdown.
//!
//! # Lifecycle
//!
//! ```text
//! configuring ──listen()──▶ mounted + listening ──signal──▶ shutting down ──▶ stopped
//! ```
//!
//! 1. **Configuring**: [`Server::group`] creates groups; routes and
//!    middleware are registered on them. Nothing touches the network.
//! 2. **Mounted**: [`Server::listen`] checks every collected configuration
//!    error, mounts each group's table under the root table and binds the
//!    port. A bad route or a busy port is returned here as an [`Error`].
//! 3. **Listening**: [`Listening::serve`] accepts connections until its
//!    shutdown future resolves. [`Server::run`] wires that future to
//!    SIGINT / SIGTERM.
//! 4. **Shutting down**: the listener is dropped so no new connections are
//!    made, idle keep-alive connections are closed, and in-flight requests
//!    get up to [`ServerConfig::shutdown_timeout`] to finish. Running out of
//!    time yields [`Error::ShutdownTimeout`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, info};

use crate::config::ServerConfig;
use crate::dispatch::{Mux, method_not_allowed};
use crate::error::{ConfigError, Error};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::{GroupId, Router};
use crate::shutdown::{self, ShutdownWatch};

/// The HTTP server: configuration plus the groups registered on it.
pub struct Server {
    config: ServerConfig,
    routers: Vec<Router>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config, routers: Vec::new() }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates a group at `prefix`, nested under `parent` when given.
    ///
    /// The group's full prefix is the parent's full prefix followed by
    /// `prefix`. Prefixes are either empty or start with `/` and have no
    /// trailing `/`.
    pub fn group(&mut self, prefix: &str, parent: Option<GroupId>) -> &mut Router {
        let id = GroupId(self.routers.len());
        let logger = self.config.logger().cloned();

        let (parent_prefix, unknown_parent) = match parent {
            None => (String::new(), false),
            Some(GroupId(i)) => match self.routers.get(i) {
                Some(p) => (p.full_prefix(), false),
                None => (String::new(), true),
            },
        };

        let mut router = Router::new(id, prefix, &parent_prefix, logger);
        if unknown_parent {
            router.record_error(ConfigError::UnknownParent { prefix: prefix.to_owned() });
        }
        self.routers.push(router);
        &mut self.routers[id.0]
    }

    /// Looks a group up again by id.
    pub fn router(&mut self, id: GroupId) -> Option<&mut Router> {
        self.routers.get_mut(id.0)
    }

    /// Attaches every group's table to a fresh root table, in registration
    /// order, and returns it.
    ///
    /// Every configuration error collected while registering routes, plus
    /// prefix collisions found here, is returned together.
    pub fn mount(self) -> Result<Mux, Error> {
        mount_all(self.routers)
    }

    /// Mounts all groups and binds the listener.
    pub async fn listen(self) -> Result<Listening, Error> {
        let Server { config, routers } = self;
        let logger = config.logger().cloned();

        with_logger(logger.as_ref(), async move {
            let mux = mount_all(routers)?;
            let addr = config.socket_addr();
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| Error::Bind { addr, source })?;
            let local_addr = listener.local_addr()?;
            info!(addr = %local_addr, "rest-easy listening");
            Ok(Listening { listener, local_addr, mux: Arc::new(mux), config })
        })
        .await
    }

    /// Mounts, binds, and serves until SIGINT or SIGTERM, then shuts down
    /// gracefully.
    pub async fn run(self) -> Result<(), Error> {
        self.listen().await?.serve(shutdown_signal()).await
    }
}

fn mount_all(routers: Vec<Router>) -> Result<Mux, Error> {
    let mut mux = Mux::default();
    let mut errors = Vec::new();
    for router in routers {
        let (full_prefix, table, router_errors) = router.into_parts();
        let bad_prefix = router_errors.iter().any(|e| matches!(e, ConfigError::InvalidPrefix(_)));
        errors.extend(router_errors);
        if bad_prefix {
            continue;
        }
        if let Err(e) = mux.mount(&full_prefix, table) {
            errors.push(e);
        }
    }
    if errors.is_empty() {
        Ok(mux)
    } else {
        Err(Error::Config(errors))
    }
}

// ── Listening ─────────────────────────────────────────────────────────────────

/// A server whose groups are mounted and whose port is bound.
pub struct Listening {
    listener: TcpListener,
    local_addr: SocketAddr,
    mux: Arc<Mux>,
    config: ServerConfig,
}

impl Listening {
    /// The bound address. Useful after configuring port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` resolves, then drains.
    pub async fn serve<S>(self, shutdown: S) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send,
    {
        let logger = self.config.logger().cloned();
        with_logger(logger.as_ref(), self.accept_loop(shutdown, logger.clone())).await
    }

    async fn accept_loop<S>(self, shutdown: S, logger: Option<Dispatch>) -> Result<(), Error>
    where
        S: Future<Output = ()> + Send,
    {
        let Listening { listener, mux, config, .. } = self;
        let (trigger, watch) = shutdown::channel();
        let graceful = GracefulShutdown::new();
        let builder = ConnBuilder::new(TokioExecutor::new());
        let mut tasks = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, no longer accepting connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let mux = Arc::clone(&mux);
                    let watch = watch.clone();
                    let svc = service_fn(move |req| {
                        let mux = Arc::clone(&mux);
                        let watch = watch.clone();
                        async move { Ok::<_, Infallible>(dispatch(&mux, req, remote_addr, watch).await) }
                    });

                    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), svc);
                    let conn = graceful.watch(conn.into_owned());
                    let task = async move {
                        if let Err(e) = conn.await {
                            debug!(peer = %remote_addr, "connection error: {e}");
                        }
                    };
                    match &logger {
                        Some(dispatch) => tasks.spawn(task.with_subscriber(dispatch.clone())),
                        None => tasks.spawn(task),
                    };
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        trigger.trigger();

        let timeout = config.shutdown_timeout();
        tokio::select! {
            () = graceful.shutdown() => {
                while tasks.join_next().await.is_some() {}
                info!("shutdown complete");
                Ok(())
            }
            () = tokio::time::sleep(timeout) => {
                error!(?timeout, "in-flight requests did not finish in time");
                tasks.abort_all();
                Err(Error::ShutdownTimeout(timeout))
            }
        }
    }
}

/// Runs `fut` with `logger` as the default subscriber, if there is one.
async fn with_logger<F: Future>(logger: Option<&Dispatch>, fut: F) -> F::Output {
    match logger {
        Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
        None => fut.await,
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers one hyper request, routes it, and converts the response back.
async fn dispatch(
    mux: &Mux,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    watch: ShutdownWatch,
) -> http::Response<Full<Bytes>> {
    let Ok(method) = Method::try_from(req.method()) else {
        return method_not_allowed(&[]).into_inner();
    };

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .text(format!("failed to read request body: {e}"))
                .into_inner();
        }
    };

    let req = Request::from_parts(parts, method, body, remote_addr, watch);
    mux.dispatch(req).await.into_inner()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGINT or SIGTERM the process receives.
/// On non-Unix platforms only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
