//! Route handlers.
//!
//! Plain `async fn`s, [`adapt`](crate::adapt)ed endpoints and whatever
//! middleware wraps around them all end up in a route table as the same
//! thing: a [`BoxedHandler`]. Registration goes
//!
//! ```text
//! f ─into_boxed_handler─▶ Arc<FnHandler<f>> ─wrap × n─▶ BoxedHandler ─call─▶ BoxFuture
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// The future every stored handler returns.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe dispatch interface shared by every stored handler.
///
/// Implement this directly when writing a [`Middleware`](crate::middleware::Middleware)
/// by hand; [`middleware::from_fn`](crate::middleware::from_fn) covers the
/// common case.
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Anything that can be registered on a route.
///
/// Satisfied automatically by every `async fn` with the signature
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// and by the [`Endpoint`]s that [`adapt`](crate::adapt) returns.
pub trait Handler: Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// A ready-made, already-erased handler.
///
/// Returned by [`adapt`](crate::adapt); register it with
/// [`Router::handle`](crate::Router::handle) or call it directly.
#[derive(Clone)]
pub struct Endpoint(pub(crate) BoxedHandler);

impl Endpoint {
    pub fn new(handler: BoxedHandler) -> Self {
        Self(handler)
    }

    /// Runs the endpoint on `req` without going through a server.
    pub async fn call(&self, req: Request) -> Response {
        self.0.call(req).await
    }
}

impl Handler for Endpoint {
    fn into_boxed_handler(self) -> BoxedHandler {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::method::Method;

    async fn teapot(_req: Request) -> StatusCode {
        StatusCode::IM_A_TEAPOT
    }

    #[tokio::test]
    async fn async_fn_becomes_a_handler() {
        let handler = teapot.into_boxed_handler();
        let res = handler.call(Request::new(Method::Get, "/")).await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn endpoint_passes_through_unchanged() {
        let endpoint = Endpoint::new(teapot.into_boxed_handler());
        let erased = endpoint.clone().into_boxed_handler();
        assert!(Arc::ptr_eq(&erased, &endpoint.0));
        let res = endpoint.call(Request::new(Method::Get, "/")).await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
    }
}
