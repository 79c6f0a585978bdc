//! Forwarding of unmatched requests to the upstream origin.
//!
//! # Responsibilities
//! - Buffer the inbound body (bounded) and forward method, path, query, headers
//! - Return the upstream status, headers and body to the client
//!
//! # Design Decisions
//! - Upstream status codes are passed through untouched, errors included
//! - Transport failures become 502 Bad Gateway
//! - Bodies decoded from gzip lose their Content-Encoding header

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::request::RequestIdExt;
use super::server::AppState;
use crate::security::headers::forwarded_headers;

/// Upstream URL for an inbound URI: the target origin with the inbound path and query.
pub fn passthrough_url(target: &Url, uri: &Uri) -> Url {
    let mut url = target.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url.set_fragment(None);
    url
}

pub async fn forward(state: &AppState, request: Request<Body>) -> Response {
    let request_id = request.request_id().to_owned();
    let remote_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_request_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting passthrough body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let url = passthrough_url(&state.passthrough_target, &parts.uri);
    let headers = forwarded_headers(&parts.headers, remote_ip, "http");

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        url = %state.multiplexer.secret_filter().filter_url(&url),
        "Passing request through"
    );

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state
        .multiplexer
        .fetch_single(parts.method, &url, headers, body, &cancel)
        .await
    {
        Ok(result) => {
            let mut headers = result.headers_without_hop_by_hop();
            if result.was_gzip_encoded() {
                headers.remove(header::CONTENT_ENCODING);
            }
            headers.remove(header::CONTENT_LENGTH);

            let mut response = Response::new(Body::from(result.body));
            *response.status_mut() = result.status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Passthrough request failed");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
