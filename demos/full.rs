//! A versioned API with an authenticated internal area.
//!
//! Run with:
//!   cargo run --example full
//!
//! Try:
//!   curl http://localhost:8080/v1/hello
//!   curl http://localhost:8080/v2/users
//!   curl http://localhost:8080/internal/metrics                 # 401
//!   curl -H 'x-user: ops' http://localhost:8080/internal/metrics
//!   curl http://localhost:8080/internal/admin/settings

use rest_easy::middleware::{self, Next};
use rest_easy::{
    Context, ErrorResponse, FuncReq, IntoResponse, Request, Response, Server, ServerConfig,
    StatusCode, adapt,
};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<(), rest_easy::Error> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let config = ServerConfig::builder()
        .env_overrides(|key| std::env::var(key).ok())
        .logger(subscriber)
        .build();

    let mut server = Server::new(config);
    build_routes(&mut server);
    server.run().await
}

fn build_routes(server: &mut Server) {
    server
        .group("/v1", None)
        .use_middleware(middleware::access_log())
        .handle("GET /hello", adapt(hello_v1))
        .handle("GET /users", adapt(users_v1));

    server
        .group("/v2", None)
        .use_middleware(middleware::access_log())
        .handle("GET /hello", adapt(hello_v2))
        .handle("GET /users", adapt(users_v2));

    let internal = server
        .group("/internal", None)
        .use_middleware(middleware::access_log())
        .use_middleware(middleware::from_fn(authenticate))
        .handle_func("GET /metrics", metrics)
        .handle_func("GET /status", status)
        .id();

    server
        .group("/admin", Some(internal))
        .use_middleware(middleware::access_log())
        .handle("GET /settings", adapt(settings));
}

// ── Auth ──────────────────────────────────────────────────────────────────────

/// Whoever the `x-user` header names.
#[derive(Clone, Debug)]
struct AuthUser(String);

async fn authenticate(mut req: Request, next: Next) -> Response {
    if let Some(user) = req.header("x-user").map(str::to_owned) {
        req.extensions_mut().insert(AuthUser(user));
    }
    next.run(req).await
}

// ── v1 ────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Serialize)]
struct UserV1 {
    id: u32,
    name: &'static str,
    version: &'static str,
}

async fn hello_v1(_ctx: Context, _req: FuncReq) -> Result<Message, ErrorResponse> {
    Ok(Message { message: "Hello from API v1" })
}

async fn users_v1(_ctx: Context, _req: FuncReq) -> Result<Vec<UserV1>, ErrorResponse> {
    Ok(vec![
        UserV1 { id: 1, name: "Alice", version: "v1" },
        UserV1 { id: 2, name: "Bob", version: "v1" },
    ])
}

// ── v2 ────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct UserV2 {
    id: u32,
    name: &'static str,
    email: &'static str,
    version: &'static str,
}

async fn hello_v2(_ctx: Context, _req: FuncReq) -> Result<Message, ErrorResponse> {
    Ok(Message { message: "Hello from API v2" })
}

async fn users_v2(_ctx: Context, _req: FuncReq) -> Result<Vec<UserV2>, ErrorResponse> {
    Ok(vec![
        UserV2 { id: 1, name: "Alice", email: "alice@example.com", version: "v2" },
        UserV2 { id: 2, name: "Bob", email: "bob@example.com", version: "v2" },
    ])
}

// ── internal ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Metrics {
    uptime: &'static str,
    requests: u64,
    errors: u64,
    accessed_by: String,
}

async fn metrics(req: Request) -> Response {
    let Some(AuthUser(user)) = req.extensions().get::<AuthUser>() else {
        return ErrorResponse::unauthorized("unauthorized").into_response();
    };
    Response::json_value(
        StatusCode::OK,
        &Metrics { uptime: "24h", requests: 12345, errors: 123, accessed_by: user.clone() },
    )
}

#[derive(Serialize)]
struct Status {
    status: &'static str,
    version: &'static str,
    environment: &'static str,
}

async fn status(_req: Request) -> Response {
    Response::json_value(
        StatusCode::OK,
        &Status { status: "healthy", version: "1.0.3", environment: "production" },
    )
}

async fn settings(_ctx: Context, _req: FuncReq) -> Result<Message, ErrorResponse> {
    Ok(Message { message: "Settings!" })
}
