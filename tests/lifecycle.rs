//! End-to-end tests over real sockets: serving, draining and timing out.

mod common;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use rest_easy::{Context, Error, ErrorResponse, FuncReq, Request, Server, ServerConfig, adapt};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use common::send;

fn local_config(shutdown_timeout: Duration) -> ServerConfig {
    ServerConfig::builder()
        .host(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .shutdown_timeout(shutdown_timeout)
        .build()
}

/// Binds `server` on an ephemeral port and serves it until the returned
/// sender fires.
async fn start(server: Server) -> (SocketAddr, oneshot::Sender<()>, JoinHandle<Result<(), Error>>) {
    let listening = server.listen().await.expect("listen");
    let addr = listening.local_addr();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(listening.serve(async {
        let _ = rx.await;
    }));
    (addr, tx, handle)
}

async fn slow(_req: Request) -> &'static str {
    tokio::time::sleep(Duration::from_millis(300)).await;
    "done"
}

async fn echo(_ctx: Context, req: FuncReq) -> Result<Value, ErrorResponse> {
    req.body.ok_or_else(|| ErrorResponse::bad_request("missing body"))
}

#[tokio::test]
async fn serves_plain_and_typed_routes() {
    let mut server = Server::new(local_config(Duration::from_secs(5)));
    server
        .group("/v1", None)
        .handle_func("GET /hello", |_req: Request| async { "Hello from API v1" })
        .handle("POST /echo", adapt(echo));
    let (addr, stop, handle) = start(server).await;

    let res = send(addr, "GET", "/v1/hello", None).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "Hello from API v1");

    let res = send(addr, "POST", "/v1/echo", Some(r#"{"n":1}"#)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(serde_json::from_str::<Value>(&res.body).unwrap(), json!({"n": 1}));

    let res = send(addr, "POST", "/v1/echo", Some("{oops")).await;
    assert_eq!(res.status, 400);

    let res = send(addr, "GET", "/v1/echo", None).await;
    assert_eq!(res.status, 405);

    let res = send(addr, "GET", "/nowhere", None).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body, "404 page not found");

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn in_flight_request_completes_during_shutdown() {
    let mut server = Server::new(local_config(Duration::from_secs(5)));
    server.group("/v1", None).handle_func("GET /slow", slow);
    let (addr, stop, handle) = start(server).await;

    let client = tokio::spawn(async move { send(addr, "GET", "/v1/slow", None).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.send(()).unwrap();

    let res = client.await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "done");
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn no_new_connections_after_shutdown() {
    let server = Server::new(local_config(Duration::from_secs(5)));
    let (addr, stop, handle) = start(server).await;

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn shutdown_times_out_on_a_stuck_handler() {
    let mut server = Server::new(local_config(Duration::from_millis(200)));
    server.group("/v1", None).handle_func("GET /stuck", |_req: Request| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        "too late"
    });
    let (addr, stop, handle) = start(server).await;

    let client = tokio::spawn(async move { send(addr, "GET", "/v1/stuck", None).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("serve returns once the timeout elapses")
        .unwrap();
    assert!(matches!(result, Err(Error::ShutdownTimeout(t)) if t == Duration::from_millis(200)));
    client.abort();
}

#[tokio::test]
async fn handlers_observe_shutdown_through_context() {
    let mut server = Server::new(local_config(Duration::from_secs(5)));
    server.group("/v1", None).handle(
        "GET /watch",
        adapt(|ctx: Context, _req: FuncReq| async move {
            ctx.shutting_down().await;
            Ok::<_, ErrorResponse>(json!({ "draining": ctx.is_shutting_down() }))
        }),
    );
    let (addr, stop, handle) = start(server).await;

    let client = tokio::spawn(async move { send(addr, "GET", "/v1/watch", None).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.send(()).unwrap();

    let res = client.await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(serde_json::from_str::<Value>(&res.body).unwrap(), json!({"draining": true}));
    handle.await.unwrap().unwrap();
}
