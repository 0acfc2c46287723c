//! Middleware layer.
//!
//! A middleware turns one handler into another. It sees the [`Request`]
//! before the wrapped handler does and the [`Response`] after, which makes
//! it the place for cross-cutting concerns: access logging, authentication,
//! request-id injection.
//!
//! # Execution order
//!
//! Middleware added to a group first runs first: it is the **outermost**
//! layer. For a group with `a`, `b`, `c` added in that order a request
//! travels
//!
//! ```text
//! a → b → c → handler → c → b → a
//! ```
//!
//! The order is the same whether a route is registered with
//! [`Router::handle`](crate::Router::handle) or
//! [`Router::handle_func`](crate::Router::handle_func).
//!
//! # Writing middleware
//!
//! ```rust
//! use rest_easy::middleware::{self, Next};
//! use rest_easy::{Request, Response};
//!
//! let tag = middleware::from_fn(|req: Request, next: Next| async move {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("x-served-by", "rest-easy".parse().unwrap());
//!     res
//! });
//! # let _ = tag;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

mod access_log;

pub use access_log::{AccessLog, access_log};

/// A decorator over a handler.
///
/// Any `Fn(BoxedHandler) -> BoxedHandler` closure is a middleware.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// Wraps `handler` in every middleware of `stack`, first element outermost.
pub(crate) fn apply(stack: &[Arc<dyn Middleware>], handler: BoxedHandler) -> BoxedHandler {
    stack.iter().rev().fold(handler, |next, m| m.wrap(next))
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain, handed to a [`from_fn`] middleware.
pub struct Next(BoxedHandler);

impl Next {
    /// Runs the remaining middleware and the handler.
    pub async fn run(self, req: Request) -> Response {
        self.0.call(req).await
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Builds a middleware from an async closure taking the request and the
/// rest of the chain.
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(Arc::new(f))
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F>(Arc<F>);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(FromFnHandler { f: Arc::clone(&self.0), next })
    }
}

struct FromFnHandler<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F, Fut> ErasedHandler for FromFnHandler<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        Box::pin((self.f)(req, Next(Arc::clone(&self.next))))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::handler::Handler;
    use crate::method::Method;

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<dyn Middleware> {
        let log = Arc::clone(log);
        Arc::new(from_fn(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:before"));
                let res = next.run(req).await;
                log.lock().unwrap().push(format!("{name}:after"));
                res
            }
        }))
    }

    #[tokio::test]
    async fn first_added_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = vec![
            recording(&log, "a"),
            recording(&log, "b"),
            recording(&log, "c"),
        ];
        let inner_log = Arc::clone(&log);
        let handler = move |_req: Request| {
            let log = Arc::clone(&inner_log);
            async move {
                log.lock().unwrap().push("handler".to_owned());
                StatusCode::OK
            }
        };

        let wrapped = apply(&stack, handler.into_boxed_handler());
        wrapped.call(Request::new(Method::Get, "/")).await;

        assert_eq!(
            *log.lock().unwrap(),
            ["a:before", "b:before", "c:before", "handler", "c:after", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let deny: Arc<dyn Middleware> = Arc::new(from_fn(|_req: Request, _next: Next| async {
            Response::status(StatusCode::FORBIDDEN)
        }));
        async fn never_called(_req: Request) -> StatusCode {
            panic!("handler must not run")
        }
        let wrapped = apply(&[deny], never_called.into_boxed_handler());
        let res = wrapped.call(Request::new(Method::Get, "/")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn plain_closures_are_middleware() {
        let passthrough: Arc<dyn Middleware> = Arc::new(|next: BoxedHandler| next);
        let handler = |_req: Request| async { "ok" };
        let wrapped = apply(&[passthrough], handler.into_boxed_handler());
        let res = wrapped.call(Request::new(Method::Get, "/")).await;
        assert_eq!(res.body(), b"ok");
    }
}
