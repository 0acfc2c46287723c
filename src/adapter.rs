//! Typed handlers: JSON in, JSON out.
//!
//! [`adapt`] is the single boundary between business logic and the wire.
//! The business function sees a decoded [`FuncReq`] and returns
//! `Result<Out, E>`; the adapter takes care of everything HTTP:
//!
//! | Situation                                   | Response                                   |
//! |---------------------------------------------|--------------------------------------------|
//! | `POST`/`PUT`/`PATCH` body is not valid JSON | `400`, decode message as plain text        |
//! | `Ok(out)`                                   | `200`, `out` as JSON                       |
//! | `Ok(out)` where `out` serializes to `null`  | `204`, no body                             |
//! | `Err(ErrorResponse)`                        | its status, `{"message": .., "code": ..}`  |
//! | any other `Err(e)`                          | `500`, `{"error": "<e>"}`                  |
//!
//! ```rust
//! use rest_easy::{Context, ErrorResponse, FuncReq, adapt};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct NewUser { name: String }
//!
//! #[derive(Serialize)]
//! struct User { id: u64, name: String }
//!
//! async fn create_user(_ctx: Context, req: FuncReq<NewUser>) -> Result<User, ErrorResponse> {
//!     let new = req.body.ok_or_else(|| ErrorResponse::bad_request("missing body"))?;
//!     Ok(User { id: 7, name: new.name })
//! }
//!
//! let endpoint = adapt(create_user);
//! # let _ = endpoint;
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::handler::{BoxFuture, Endpoint, ErasedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::shutdown::ShutdownWatch;

/// Any error a typed handler may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── FuncReq ───────────────────────────────────────────────────────────────────

/// What a typed handler receives.
///
/// `In` defaults to [`serde_json::Value`] for handlers that accept any JSON.
#[derive(Debug)]
pub struct FuncReq<In = serde_json::Value> {
    /// The decoded JSON body. Only ever `Some` for `POST`, `PUT` and `PATCH`.
    pub body: Option<In>,
    /// The original request. Headers, query and path parameters live here.
    pub request: Request,
    /// Whether a body was supplied and decoded.
    pub has_body: bool,
}

// ── ErrorResponse ─────────────────────────────────────────────────────────────

/// An error that knows its HTTP status.
///
/// Serialized as `{"message": .., "code": ..}`; `code` is omitted when unset
/// and the status travels in the status line only.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), code: None }
    }

    /// Attaches an application error code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        Response::json_value(self.status, &self)
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Per-request context handed to typed handlers.
///
/// Dropping the request (the client went away) drops the handler future,
/// so cancellation needs no polling. `Context` adds what a long-running
/// handler may still want to know: who is calling and whether the server
/// has started draining.
#[derive(Clone, Debug, Default)]
pub struct Context {
    remote_addr: Option<SocketAddr>,
    shutdown: Option<ShutdownWatch>,
}

impl Context {
    pub fn from_request(req: &Request) -> Self {
        Self { remote_addr: req.remote_addr(), shutdown: req.shutdown_watch() }
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// `true` once the server has stopped accepting connections.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(ShutdownWatch::is_triggered)
    }

    /// Resolves when the server starts shutting down. Never resolves for a
    /// request that did not come through a server.
    pub async fn shutting_down(&self) {
        match &self.shutdown {
            Some(watch) => watch.clone().triggered().await,
            None => std::future::pending().await,
        }
    }
}

// ── adapt ─────────────────────────────────────────────────────────────────────

/// Turns a typed async function into an [`Endpoint`].
pub fn adapt<F, Fut, In, Out, E>(f: F) -> Endpoint
where
    F: Fn(Context, FuncReq<In>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, E>> + Send + 'static,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + 'static,
    E: Into<BoxError> + 'static,
{
    Endpoint::new(Arc::new(Adapted { f, _in: PhantomData }))
}

struct Adapted<F, In> {
    f: F,
    _in: PhantomData<fn() -> In>,
}

impl<F, Fut, In, Out, E> ErasedHandler for Adapted<F, In>
where
    F: Fn(Context, FuncReq<In>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, E>> + Send + 'static,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + 'static,
    E: Into<BoxError> + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let ctx = Context::from_request(&req);
        let mut input = FuncReq { body: None, request: req, has_body: false };

        if input.request.method().carries_body() {
            match serde_json::from_slice::<In>(input.request.body()) {
                Ok(body) => {
                    input.body = Some(body);
                    input.has_body = true;
                }
                Err(e) => {
                    let res = Response::builder().status(StatusCode::BAD_REQUEST).text(e.to_string());
                    return Box::pin(async move { res });
                }
            }
        }

        let fut = (self.f)(ctx, input);
        Box::pin(async move { respond(fut.await) })
    }
}

fn respond<Out: Serialize, E: Into<BoxError>>(result: Result<Out, E>) -> Response {
    match result {
        Ok(out) => match serde_json::to_vec(&out) {
            Ok(bytes) if bytes == b"null" => Response::status(StatusCode::NO_CONTENT),
            Ok(bytes) => Response::json(bytes),
            Err(e) => Response::error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        Err(e) => {
            let err: BoxError = e.into();
            match err.downcast::<ErrorResponse>() {
                Ok(structured) => (*structured).into_response(),
                Err(other) => Response::error_json(StatusCode::INTERNAL_SERVER_ERROR, &other.to_string()),
            }
        }
    }
}
