//! Ruster Scan API Server
//!
//! REST API for smart contract risk analysis
//!
//! Usage:
//!   cargo run --bin ruster_scan
//!
//! Environment:
//!   PORT / RUSTER_PORT - Server port (default: 8080)
//!   RUSTER_HOST        - Server host (default: 0.0.0.0)
//!   RUST_LOG           - Log filter (default: info)
//!   ETHERSCAN_API_KEY  - Explorer key (optional)

use ruster_scan::api::{create_router, start_cleanup_task, AppState};
use ruster_scan::utils::constants::{APP_NAME, APP_VERSION, CACHE_SWEEP_INTERVAL_SECS};
use ruster_scan::ScanConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = ScanConfig::from_env();
    if config.explorer_api_key.is_none() {
        warn!("⚠️ ETHERSCAN_API_KEY not set, explorer lookups will be throttled");
    }

    let state = Arc::new(AppState::from_config(&config)?);

    // Sweep once at startup, then on a fixed interval
    let cache = state.scanner.cache().clone();
    let removed = cache.cleanup_expired();
    info!("🧹 Startup cache sweep removed {} entries", removed);
    start_cleanup_task(cache, Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS));

    let app = create_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("🚀 {} v{} starting on http://{}", APP_NAME, APP_VERSION, addr);
    info!("Endpoints:");
    info!("  POST /analyze        - Risk analysis of one contract");
    info!("  POST /analyze-batch  - Batch analysis (up to {} contracts)", config.max_batch_size);
    info!("  GET  /health         - Upstream reachability");
    info!("  GET  /               - Service metadata");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    let stats = state.scanner.cache().stats();
    info!("🛑 Shutdown complete");
    info!("   Cached records: {}", stats.entries);
    info!("   Cache hit rate: {:.1}%", stats.hit_rate);

    Ok(())
}
