mod common;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use url::Url;

use viewproxy::fragment::Layout;
use viewproxy::routing::importer::{load_http, ImportError};
use viewproxy::security::signing::signature;
use viewproxy::RouteTable;

use common::*;

const SECRET: &str = "route-import-secret";

const LEGACY_ROUTES: &str = r#"[
    {
        "url": "/legacy/:name",
        "layout": { "path": "/legacy/layout", "ignoreValidation": true },
        "fragments": [
            { "path": "/legacy/header/:name" },
            { "path": "/legacy/body/:name" }
        ]
    }
]"#;

fn route_server() -> Router {
    Router::new()
        .route(
            "/_viewproxy/routes",
            get(|headers: HeaderMap| async move {
                let time = headers
                    .get("x-authorization-time")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok());
                let authorization = headers.get("authorization").and_then(|value| value.to_str().ok());

                match (time, authorization) {
                    (Some(time), Some(authorization))
                        if signature(SECRET, "/_viewproxy/routes", time).unwrap() == authorization =>
                    {
                        (StatusCode::OK, LEGACY_ROUTES)
                    }
                    _ => (StatusCode::UNAUTHORIZED, "unauthorized"),
                }
            }),
        )
        .route(
            "/legacy/layout",
            get(|| async { "<html><view-proxy-content></view-proxy-content></html>" }),
        )
        .route(
            "/legacy/header/{name}",
            get(|axum::extract::Path(name): axum::extract::Path<String>| async move {
                format!("<header>{}</header>", name)
            }),
        )
        .route(
            "/legacy/body/{name}",
            get(|axum::extract::Path(name): axum::extract::Path<String>| async move {
                format!("<main>{}</main>", name)
            }),
        )
}

#[tokio::test]
async fn test_load_http_with_signature() {
    let upstream = spawn_upstream(route_server()).await;
    let target = Url::parse(&format!("http://{}", upstream)).unwrap();

    let mut table = RouteTable::new();
    let count = load_http(
        &mut table,
        &reqwest::Client::new(),
        &target,
        "/_viewproxy/routes",
        Some(SECRET),
    )
    .await
    .unwrap();

    assert_eq!(count, 1);
    let route = &table.routes()[0];
    assert_eq!(route.path(), "/legacy/:name");
    assert_eq!(route.layout(), Layout::Concatenate);
}

#[tokio::test]
async fn test_load_http_rejects_error_status() {
    let upstream = spawn_upstream(route_server()).await;
    let target = Url::parse(&format!("http://{}", upstream)).unwrap();

    let err = load_http(
        &mut RouteTable::new(),
        &reqwest::Client::new(),
        &target,
        "/_viewproxy/routes",
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ImportError::Status(status) if status == 401));
}

#[tokio::test]
async fn test_legacy_routes_concatenate_into_layout() {
    let upstream = spawn_upstream(route_server()).await;
    let target = Url::parse(&format!("http://{}", upstream)).unwrap();

    let mut table = RouteTable::new();
    load_http(
        &mut table,
        &reqwest::Client::new(),
        &target,
        "/_viewproxy/routes",
        Some(SECRET),
    )
    .await
    .unwrap();

    let proxy = start_proxy(config_for(upstream), table).await;
    let res = reqwest::get(proxy.url("/legacy/fox")).await.unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        res.text().await.unwrap(),
        "<html><header>fox</header><main>fox</main></html>"
    );
}
