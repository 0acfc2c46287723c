//! # rest-easy
//!
//! Route groups, ordered middleware, typed JSON handlers and graceful
//! shutdown on top of hyper. Nothing more.
//!
//! What it adds to a bare HTTP stack:
//!
//! - **Groups**: a path prefix plus a middleware stack, nestable as in
//!   `/internal` → `/internal/admin`.
//! - **Middleware**: handler decorators. The first one added is the
//!   outermost, whichever way a route is registered.
//! - **Typed handlers**: [`adapt`] turns
//!   `async fn(Context, FuncReq<In>) -> Result<Out, E>` into a route
//!   handler that decodes JSON, encodes JSON and maps errors to statuses.
//! - **Lifecycle**: configuration errors are reported together before any
//!   port is bound. SIGINT / SIGTERM drain in-flight requests within a
//!   timeout.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rest_easy::{Context, ErrorResponse, FuncReq, Request, Server, ServerConfig, adapt, middleware};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Hello { message: String }
//!
//! async fn hello(_ctx: Context, _req: FuncReq) -> Result<Hello, ErrorResponse> {
//!     Ok(Hello { message: "Hello from API v1".into() })
//! }
//!
//! async fn status(_req: Request) -> &'static str { "healthy" }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rest_easy::Error> {
//!     let mut server = Server::new(ServerConfig::default());
//!
//!     server.group("/v1", None)
//!         .use_middleware(middleware::access_log())
//!         .handle("GET /hello", adapt(hello))
//!         .handle_func("GET /status", status);
//!
//!     server.run().await
//! }
//! ```

mod adapter;
mod config;
mod dispatch;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod shutdown;

pub mod middleware;

pub use adapter::{BoxError, Context, ErrorResponse, FuncReq, adapt};
pub use config::{
    DEFAULT_PORT, DEFAULT_SHUTDOWN_TIMEOUT, FALLBACK_SHUTDOWN_TIMEOUT, PORT_ENV,
    SHUTDOWN_TIMEOUT_ENV, ServerConfig, ServerConfigBuilder,
};
pub use dispatch::Mux;
pub use error::{ConfigError, Error};
pub use handler::{BoxFuture, BoxedHandler, Endpoint, ErasedHandler, Handler};
pub use method::Method;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{GroupId, Router};
pub use server::{Listening, Server};

pub use http::StatusCode;
