//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the composition handler
//! - Wire up middleware (timeout, request ID, tracing)
//! - Bind server to listener and shut down gracefully
//! - Match routes, fetch fragments, stitch and respond
//! - Pass unmatched requests through when enabled
//! - Swap in reloaded route tables
//!
//! # Data Flow
//! ```text
//! GET/HEAD request
//!     → RouteTable::match_path (raw escaped path)
//!     → Route::requestables (params + inbound query)
//!     → Multiplexer::fetch_all (forwarded headers, per-request cancellation)
//!     → ResponseBuilder (stitch, headers, Server-Timing, gzip)
//!
//! anything else, or no match
//!     → passthrough (if enabled) or 404
//! ```

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

use crate::config::ProxyConfig;
use crate::fragment::PathParams;
use crate::http::error::{DefaultErrorHandler, ErrorHandler, ProxyError};
use crate::http::passthrough;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::http::response::ResponseBuilder;
use crate::multiplexer::{HyperTripper, LoggingTripper, Multiplexer, Tripper};
use crate::observability::metrics;
use crate::routing::{Route, RouteTable};
use crate::security::headers::forwarded_headers;
use crate::security::secret_filter::SecretFilter;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub multiplexer: Arc<Multiplexer>,
    pub target: Arc<Url>,
    pub passthrough: bool,
    pub passthrough_target: Arc<Url>,
    pub ignore_headers: Arc<[HeaderName]>,
    pub error_handler: Arc<dyn ErrorHandler>,
    pub max_request_body_bytes: usize,
}

/// HTTP server for viewproxy.
pub struct HttpServer {
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server that talks to the upstream over the pooled hyper client.
    pub fn new(config: ProxyConfig, routes: RouteTable) -> Result<Self, ServerError> {
        let filter = secret_filter(&config);
        let tripper = LoggingTripper::new(
            HyperTripper::new(Duration::from_secs(config.timeouts.connect_secs)),
            filter,
        );
        Self::with_tripper(config, routes, Arc::new(tripper))
    }

    /// Create a server with a custom upstream transport.
    pub fn with_tripper(
        config: ProxyConfig,
        routes: RouteTable,
        tripper: Arc<dyn Tripper>,
    ) -> Result<Self, ServerError> {
        let target = parse_target(&config.upstream.target)?;
        let passthrough_target = match &config.routing.passthrough_target {
            Some(value) => parse_target(value)?,
            None => target.clone(),
        };

        let multiplexer = Multiplexer::new(tripper)
            .with_timeout(config.upstream.timeout())
            .with_hmac_secret(config.upstream.hmac_secret.clone())
            .with_secret_filter(secret_filter(&config))
            .with_max_body_bytes(config.upstream.max_body_bytes);

        let ignore_headers: Vec<HeaderName> = config
            .response
            .ignore_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!(header = %name, error = %e, "Ignoring invalid header name");
                    None
                }
            })
            .collect();

        let state = AppState {
            routes: Arc::new(ArcSwap::from_pointee(routes)),
            multiplexer: Arc::new(multiplexer),
            target: Arc::new(target),
            passthrough: config.routing.passthrough,
            passthrough_target: Arc::new(passthrough_target),
            ignore_headers: ignore_headers.into(),
            error_handler: Arc::new(DefaultErrorHandler),
            max_request_body_bytes: config.security.max_request_body_bytes,
        };

        Ok(Self { config, state })
    }

    /// Replace the handler that renders fragment failures.
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.state.error_handler = handler;
        self
    }

    /// Shared handle to the live route table.
    pub fn routes(&self) -> Arc<ArcSwap<RouteTable>> {
        Arc::clone(&self.state.routes)
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Route tables received on `route_updates` replace the live table.
    pub async fn run(
        self,
        listener: TcpListener,
        mut route_updates: mpsc::UnboundedReceiver<RouteTable>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.state.multiplexer.secret_filter().filter_url(&self.state.target),
            routes = self.state.routes.load().len(),
            passthrough = self.state.passthrough,
            "HTTP server starting"
        );

        let routes = self.routes();
        tokio::spawn(async move {
            while let Some(table) = route_updates.recv().await {
                tracing::info!(routes = table.len(), "Route table reloaded");
                routes.store(Arc::new(table));
            }
        });

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

fn parse_target(value: &str) -> Result<Url, ServerError> {
    Url::parse(value).map_err(|source| ServerError::InvalidTarget {
        target: value.to_string(),
        source,
    })
}

fn secret_filter(config: &ProxyConfig) -> SecretFilter {
    SecretFilter::with_allowed(&config.security.allowed_query_params)
}

/// Main handler.
/// Renders matched GET/HEAD routes, passes everything else through or 404s.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().to_owned();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    if method == Method::GET || method == Method::HEAD {
        let matched = state.routes.load().match_path(&path);
        if let Some((route, params)) = matched {
            tracing::debug!(
                request_id = %request_id,
                route = route.path(),
                path = %path,
                "Rendering fragment route"
            );
            let response = render_route(&state, &route, &params, request, start).await;
            metrics::record_request(method.as_str(), response.status().as_u16(), "fragments", start);
            return response;
        }
    }

    if state.passthrough {
        let response = passthrough::forward(&state, request).await;
        metrics::record_request(method.as_str(), response.status().as_u16(), "passthrough", start);
        return response;
    }

    tracing::info!(request_id = %request_id, method = %method, path = %path, "No route matched");
    metrics::record_request(method.as_str(), 404, "not_found", start);
    (StatusCode::NOT_FOUND, "404 not found").into_response()
}

async fn render_route(
    state: &AppState,
    route: &Route,
    params: &PathParams,
    request: Request<Body>,
    start: Instant,
) -> Response {
    let request_id = request.request_id().to_owned();
    let remote_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let headers = forwarded_headers(request.headers(), remote_ip, "http");
    let query: Vec<(String, String)> = url::form_urlencoded::parse(request.uri().query().unwrap_or("").as_bytes())
        .into_owned()
        .collect();

    let requestables = match route.requestables(&state.target, params, &query) {
        Ok(requestables) => requestables,
        Err(e) => {
            tracing::error!(request_id = %request_id, route = route.path(), error = %e, "Could not build fragment requests");
            return state.error_handler.handle(route, &ProxyError::from(e));
        }
    };

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.multiplexer.fetch_all(&requestables, &headers, &cancel).await {
        Ok(results) => {
            tracing::debug!(
                request_id = %request_id,
                route = route.path(),
                fragments = results.len(),
                "Fragments fetched"
            );
            ResponseBuilder::new(route, &results)
                .with_ignored_headers(&state.ignore_headers)
                .with_elapsed(start.elapsed())
                .build()
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, route = route.path(), error = %e, "Fragment fetch failed");
            metrics::record_fragment_failure(e.kind());
            state.error_handler.handle(route, &ProxyError::from(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::FragmentDefinition;
    use crate::multiplexer::tripper::{BoxError, TripperFuture};
    use tower::ServiceExt;

    /// Serves every fragment path as its own body.
    #[derive(Debug)]
    struct PathTripper;

    impl Tripper for PathTripper {
        fn request(&self, request: Request<Body>) -> TripperFuture {
            let path = request.uri().path().to_string();
            Box::pin(async move {
                let body = match path.as_str() {
                    "/layout" => "<main><viewproxy-fragment id=\"body\"></viewproxy-fragment></main>".to_string(),
                    "/broken" => return Err(BoxError::from("connection reset")),
                    other => other.to_string(),
                };
                Ok(Response::new(Body::from(body)))
            })
        }
    }

    fn server(passthrough: bool) -> HttpServer {
        let mut routes = RouteTable::new();
        routes
            .register(Route::new(
                "/hello/:name",
                FragmentDefinition::define("/layout")
                    .without_validation()
                    .with_child("body", FragmentDefinition::define("/body/:name")),
            ))
            .unwrap();
        routes
            .register(Route::new("/broken", FragmentDefinition::define("/broken")))
            .unwrap();

        let mut config = ProxyConfig::default();
        config.upstream.target = "http://fragments.test".into();
        config.routing.passthrough = passthrough;
        HttpServer::with_tripper(config, routes, Arc::new(PathTripper)).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_renders_matched_route() {
        let response = server(false)
            .router()
            .oneshot(Request::get("/hello/world").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_string(response).await, "<main>/body/world</main>");
    }

    #[tokio::test]
    async fn test_unmatched_is_404_without_passthrough() {
        let response = server(false)
            .router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "404 not found");
    }

    #[tokio::test]
    async fn test_post_to_route_is_passed_through() {
        let response = server(true)
            .router()
            .oneshot(Request::post("/hello/world").body(Body::from("x=1")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "/hello/world");
    }

    #[tokio::test]
    async fn test_fetch_error_uses_error_handler() {
        let response = server(false)
            .router()
            .oneshot(Request::get("/broken").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Internal Server Error");
    }
}
