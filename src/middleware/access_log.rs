//! Per-request access log.

use std::sync::Arc;

use tracing::info;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Emits one `INFO` record per request once the response is ready:
///
/// ```text
/// INFO request completed method=GET path=/v1/users status=200 ip=10.0.0.7:51234 user-agent=curl/8.5.0
/// ```
///
/// The response passes through untouched. Records go to whichever
/// subscriber the server was configured with
/// ([`ServerConfigBuilder::logger`](crate::ServerConfigBuilder::logger)).
pub fn access_log() -> AccessLog {
    AccessLog
}

/// Middleware returned by [`access_log`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(Logged { next })
    }
}

struct Logged {
    next: BoxedHandler,
}

impl ErasedHandler for Logged {
    fn call(&self, req: Request) -> BoxFuture {
        let method = req.method();
        let path = req.path().to_owned();
        let ip = req.remote_addr().map(|a| a.to_string()).unwrap_or_default();
        let user_agent = req.user_agent().to_owned();
        let next = Arc::clone(&self.next);

        Box::pin(async move {
            let res = next.call(req).await;
            info!(
                method = %method,
                path = %path,
                status = res.status_code().as_u16(),
                ip = %ip,
                "user-agent" = %user_agent,
                "request completed"
            );
            res
        })
    }
}
