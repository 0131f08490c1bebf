// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Trust-Boundary Filter Service
//!
//! Sits between untrusted callers and the charter marketplace core:
//!
//! - Per-identity request rate limiting with progressive backoff
//! - Suspicion heuristics over user-agent and client IP
//! - Challenge escalation for automated-looking traffic
//! - Contact-info detection and redaction in outbound chat messages,
//!   gated on deposit state
//!
//! ## Usage
//!
//! The service runs as an external auth filter: the marketplace edge calls
//! `POST /check` before forwarding a request, and the chat delivery path
//! calls `POST /validate-message` before sending a message. Neither
//! endpoint ever fails the caller; denial is a decision in the body.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `SWEEP_INTERVAL_SECS`: Window store sweep interval (default: 300)
//! - `FLAG_PRIVATE_RANGES`: Flag private/reserved IPs as suspicious
//!   (default: true; disable behind a load balancer)

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use charter_trust_filter::{
    audit::{DenyAllOracle, TracingAuditSink},
    challenge::ChallengeGate,
    clock::{Clock, SystemClock},
    config::Config,
    guard::ContentPatternGuard,
    handlers::{check, health, metrics, validate_message, AppState},
    heuristics::SuspicionHeuristics,
    limiter::{PolicyRegistry, RateLimiter},
    metrics::Metrics,
    store::WindowStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        policies = config.policies.len(),
        sweep_interval_secs = config.sweep_interval_secs,
        "Starting trust-boundary filter"
    );

    // Create application state
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let store = Arc::new(WindowStore::new());
    let limiter = RateLimiter::new(Arc::clone(&store), Arc::clone(&clock));
    let gate = ChallengeGate::new(SuspicionHeuristics::new(config.heuristics.clone()));
    let guard = ContentPatternGuard::new(config.guard.clone(), Arc::clone(&clock))?;
    let policies = PolicyRegistry::new(&config.policies);
    let service_metrics = Metrics::new()?;

    let metrics_path = config.metrics.path.clone();
    let sweep_interval = config.sweep_interval();
    let bind_addr = config.bind_addr.clone();

    let state = Arc::new(AppState {
        limiter,
        gate,
        guard,
        policies,
        audit: Arc::new(TracingAuditSink),
        oracle: Arc::new(DenyAllOracle),
        metrics: service_metrics,
        clock: Arc::clone(&clock),
        config,
    });

    // Spawn the window store sweep, independent of request traffic.
    let sweep_store = Arc::clone(&store);
    let sweep_clock = Arc::clone(&clock);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_store.sweep(sweep_clock.now_millis()).await;
        }
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check", post(check))
        .route("/validate-message", post(validate_message))
        .route(&metrics_path, get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let mut config = Config {
        bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300),
        ..Default::default()
    };
    if let Some(flag) = std::env::var("FLAG_PRIVATE_RANGES")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.heuristics.flag_private_ranges = flag;
    }
    config
}
