use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use rulegate::api::{create_router, AppState};
use rulegate::catalog::{FileRuleConfigSource, RuleCatalog};
use rulegate::config::Config;
use rulegate::engine::RuleEngine;
use rulegate::expression::Evaluator;
use rulegate::external::ReqwestHttpClient;
use rulegate::observability::{init_tracing, MetricsRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting rulegate rule engine"
    );

    if !config.rules_dir.is_dir() {
        warn!(path = %config.rules_dir.display(), "Rules directory does not exist yet");
    }

    // Expression evaluator and outbound HTTP client
    let evaluator = Arc::new(Evaluator::new(&config.template_tag)?);
    let http = Arc::new(ReqwestHttpClient::new(&config.http_client_settings())?);

    let engine = Arc::new(RuleEngine::new(evaluator, http));

    // Rule configurations are loaded lazily per request type
    let source = Arc::new(FileRuleConfigSource::new(config.rules_dir.clone()));
    let catalog = Arc::new(RuleCatalog::new(source));

    info!(
        rules_dir = %config.rules_dir.display(),
        template_tag = %config.template_tag,
        "Rule catalog ready"
    );

    // Create application state
    let state = Arc::new(AppState {
        engine,
        catalog,
        metrics: Arc::new(MetricsRegistry::new()),
        api_key: config.api_key.clone(),
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
