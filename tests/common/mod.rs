//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Router,
};
use flate2::{write::GzEncoder, Compression};
use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use viewproxy::routing::importer::load_json;
use viewproxy::{HttpServer, ProxyConfig, RouteTable, Shutdown};

/// Routes served by [`fragment_server`].
pub const ROUTES: &str = r#"[
    {
        "url": "/hello/:name",
        "root": {
            "path": "/layout",
            "ignoreValidation": true,
            "timingLabel": "layout",
            "children": {
                "body": {
                    "path": "/body",
                    "ignoreValidation": true,
                    "children": {
                        "greeting": { "path": "/greeting/:name", "timingLabel": "greeting" }
                    }
                }
            }
        }
    },
    {
        "url": "/gzip",
        "root": {
            "path": "/gzip/layout",
            "children": { "content": { "path": "/gzip/content" } }
        }
    },
    {
        "url": "/missing",
        "root": {
            "path": "/layout",
            "children": { "body": { "path": "/missing" } }
        }
    },
    { "url": "/slow", "root": { "path": "/slow" } }
]"#;

/// Bind an axum app on an ephemeral local port.
pub async fn spawn_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// A fragment server that also answers passthrough requests.
pub fn fragment_server() -> Router {
    Router::new()
        .route("/layout", get(layout))
        .route("/body", get(|| async { "<body><viewproxy-fragment id=\"greeting\"></viewproxy-fragment></body>" }))
        .route("/greeting/{name}", get(greeting))
        .route("/gzip/layout", get(gzip_layout))
        .route("/gzip/content", get(|| async { "wow gzipped!" }))
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "not here") }))
        .route("/slow", get(slow))
        .fallback(passthrough)
}

async fn layout() -> impl IntoResponse {
    (
        [("x-name", "viewproxy"), ("etag", "\"1234\"")],
        "<html><viewproxy-fragment id=\"body\"></viewproxy-fragment></html>",
    )
}

async fn greeting(Path(name): Path<String>, Query(query): Query<HashMap<String, String>>) -> String {
    if query.contains_key("important") {
        format!("hello {}!", name)
    } else {
        format!("hello {}", name)
    }
}

async fn gzip_layout() -> impl IntoResponse {
    (
        [(header::CONTENT_ENCODING, "gzip")],
        gzip(b"<body><viewproxy-fragment id=\"content\"></viewproxy-fragment></body>"),
    )
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "slow"
}

async fn passthrough(method: Method, uri: Uri, body: String) -> impl IntoResponse {
    if uri.path() == "/oops" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong".to_string());
    }
    (StatusCode::OK, format!("{} {} {}", method, uri, body))
}

/// Capture the headers of every request to an app.
pub fn recording(app: Router) -> (Router, Arc<std::sync::Mutex<Vec<(String, HeaderMap)>>>) {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    let app = app.layer(axum::middleware::from_fn(
        move |request: axum::extract::Request, next: axum::middleware::Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock()
                    .unwrap()
                    .push((request.uri().to_string(), request.headers().clone()));
                next.run(request).await
            }
        },
    ));

    (app, seen)
}

pub fn gzip(body: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).unwrap();
    encoder.finish().unwrap()
}

pub fn routes(ignore_trailing_slash: bool) -> RouteTable {
    let mut table = RouteTable::new().with_ignore_trailing_slash(ignore_trailing_slash);
    load_json(&mut table, ROUTES.as_bytes()).unwrap();
    table
}

pub fn config_for(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.target = format!("http://{}", upstream);
    config
}

/// A running proxy. Dropping it shuts the server down.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub updates: mpsc::UnboundedSender<RouteTable>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_server(server: HttpServer) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (updates, route_updates) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();

    tokio::spawn(async move {
        server.run(listener, route_updates, receiver).await.unwrap();
    });

    TestProxy {
        addr,
        updates,
        shutdown,
    }
}

pub async fn start_proxy(config: ProxyConfig, routes: RouteTable) -> TestProxy {
    start_server(HttpServer::new(config, routes).unwrap()).await
}

/// Proxy in front of a fresh [`fragment_server`].
pub async fn start_default() -> TestProxy {
    let upstream = spawn_upstream(fragment_server()).await;
    start_proxy(config_for(upstream), routes(false)).await
}
