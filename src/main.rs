//! local-https-proxy demo: a plain HTTP application with an HTTPS front door.
//!
//! Serves a small axum application over HTTP and, when `APP_ENV=local`,
//! additionally over HTTPS through [`LocalHttpsProxy`] using the certificate
//! and key configured in the TOML file.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use local_https_proxy::config::{
    AppConfig, ProxyConfig, APP_ENV_VAR, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER,
};
use local_https_proxy::http::shutdown::wait_for_signal;
use local_https_proxy::{HttpsOptions, LocalHttpsProxy, ServerError};

/// Serve a local axum application over HTTP and HTTPS
#[derive(Parser, Debug)]
#[command(name = "local-https-proxy", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "local_https_proxy=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<String>, format: &str) {
    // CLI > env > default
    let log_filter = log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn hello() -> &'static str {
    "Hello from local-https-proxy"
}

async fn health() -> &'static str {
    "ok"
}

fn create_router() -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
}

/// Build and start the HTTPS proxy, or `None` if the certificate files are missing.
fn start_local_https_proxy(
    app: &Router,
    config: &ProxyConfig,
) -> Result<Option<LocalHttpsProxy>, Box<dyn std::error::Error>> {
    let (Ok(cert), Ok(key)) = (
        std::fs::read(&config.cert_path),
        std::fs::read(&config.key_path),
    ) else {
        tracing::warn!(
            cert = %config.cert_path,
            key = %config.key_path,
            "Failed to initialize HTTPS certificates for local SSL proxy"
        );
        return Ok(None);
    };

    let bind_addr: IpAddr = config
        .host
        .parse()
        .map_err(|e| format!("Invalid proxy.host '{}': {}", config.host, e))?;
    let options = HttpsOptions::new(cert, key).with_bind_addr(bind_addr);

    let host = config.host.clone();
    let proxy = LocalHttpsProxy::new(
        app,
        Some(options),
        Some(Arc::new(|error: &ServerError| {
            tracing::error!("HTTPS proxy error occurred: {}", error.message());
        })),
        Some(Arc::new(move |port: u16| {
            tracing::info!("HTTPS listening on https://{}:{}", host, port);
        })),
    )?;
    proxy.start(Some(config.port));

    Ok(Some(proxy))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    init_tracing(args.log_level, &config.logging.format);

    tracing::info!(config = %args.config, "Loaded configuration");

    let app = create_router();

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .map_err(|e| format!("Invalid http.host or http.port: {}", e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP listening on http://{}", addr);

    let app_env = std::env::var(APP_ENV_VAR).ok();
    let proxy = if config.proxy.enabled(app_env.as_deref()) {
        start_local_https_proxy(&app, &config.proxy)?
    } else {
        tracing::debug!(app_env = ?app_env, "Local HTTPS proxy disabled");
        None
    };

    axum::serve(listener, app.layer(TraceLayer::new_for_http()))
        .with_graceful_shutdown(async {
            if let Err(e) = wait_for_signal().await {
                tracing::error!(error = %e, "Failed to install signal handlers");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Some(proxy) = proxy {
        proxy.close();
    }
    tracing::info!("Server stopped");

    Ok(())
}
