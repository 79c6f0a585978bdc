//! viewproxy server binary.
//!
//! # Startup
//! ```text
//! CLI flags + optional TOML file
//!     → ProxyConfig (validated)
//!     → logging, metrics exporter
//!     → RouteTable (routes file and/or target endpoint)
//!     → routes watcher (optional)
//!     → HttpServer::run until SIGINT/SIGTERM
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;

use viewproxy::config::loader::load_config;
use viewproxy::config::validation::validate_config;
use viewproxy::config::watcher::RoutesWatcher;
use viewproxy::lifecycle::signals::spawn_signal_handler;
use viewproxy::observability::{logging, metrics};
use viewproxy::routing::importer::{load_http, load_json_file};
use viewproxy::{HttpServer, ProxyConfig, RouteTable, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "viewproxy")]
#[command(about = "Fragment-composition reverse proxy", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "VIEWPROXY_CONFIG")]
    config: Option<PathBuf>,

    /// JSON routes file.
    #[arg(short, long, env = "VIEWPROXY_ROUTES")]
    routes: Option<PathBuf>,

    /// Upstream server that serves fragments.
    #[arg(short, long, env = "TARGET")]
    target: Option<String>,

    /// Address to listen on.
    #[arg(short, long, env = "VIEWPROXY_BIND")]
    bind: Option<String>,

    /// Forward unmatched requests to the target.
    #[arg(long)]
    passthrough: bool,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(routes) = self.routes {
            config.routing.routes_file = Some(routes);
        }
        if let Some(target) = self.target {
            config.upstream.target = target;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if self.passthrough {
            config.routing.passthrough = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init(&config.observability)?;

    tracing::info!("viewproxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        timeout_ms = config.upstream.timeout_ms,
        passthrough = config.routing.passthrough,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let routes = load_routes(&config).await?;

    // Dropping the watcher stops it, so it lives as long as main.
    let (route_updates, _watcher) = match (&config.routing.routes_file, config.routing.watch) {
        (Some(path), true) => {
            let (watcher, updates) = RoutesWatcher::new(path, config.routing.ignore_trailing_slash);
            (updates, Some(watcher.run()?))
        }
        _ => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, routes)?;
    server.run(listener, route_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn load_routes(config: &ProxyConfig) -> Result<RouteTable, Box<dyn std::error::Error>> {
    let mut table = RouteTable::new().with_ignore_trailing_slash(config.routing.ignore_trailing_slash);

    if let Some(path) = &config.routing.routes_file {
        load_json_file(&mut table, path)?;
    }

    if let Some(path) = &config.routing.routes_path {
        let target = Url::parse(&config.upstream.target)?;
        let client = reqwest::Client::builder()
            .timeout(config.upstream.timeout())
            .build()?;
        load_http(
            &mut table,
            &client,
            &target,
            path,
            config.upstream.hmac_secret.as_deref(),
        )
        .await?;
    }

    if table.is_empty() {
        tracing::warn!("No routes loaded, every request will pass through or 404");
    }

    Ok(table)
}
