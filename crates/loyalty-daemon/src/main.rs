//! loyalty-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, connects the
//! store, spawns the reconciliation worker, wires middleware, and starts
//! the HTTP server. All route handlers live in `routes.rs`; shared state
//! types live in `state.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use loyalty_accrual::HttpAccrualClient;
use loyalty_daemon::{auth::AuthService, config::Config, routes, state::AppState};
use loyalty_db::PgStore;
use loyalty_engine::{OrderService, ReconcileWorker, WithdrawalPolicy, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file
    // does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let config = Config::load();

    let store = Arc::new(
        PgStore::connect(&config.database_uri)
            .await
            .context("store bootstrap failed")?,
    );
    let accrual = Arc::new(
        HttpAccrualClient::new(&config.accrual_address)
            .context("accrual client bootstrap failed")?,
    );

    let worker = ReconcileWorker::spawn(
        store.clone(),
        accrual.clone(),
        WorkerConfig {
            poll_interval: config.poll_interval,
            ..WorkerConfig::default()
        },
    )
    .await
    .context("worker startup failed")?;

    let service = OrderService::new(
        store.clone(),
        accrual,
        worker.queue(),
        WithdrawalPolicy {
            require_luhn: config.withdrawal_luhn,
        },
    );
    let auth = AuthService::new(store.clone(), &config.token_secret);
    let shared = Arc::new(AppState::new(service, auth));

    let app = routes::build_router(shared).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("cannot bind {}", config.address))?;
    info!("loyalty-daemon listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    // Stop the worker loop first; an in-flight reconciliation pass
    // completes before the join returns. The grace delay lets detached
    // first-attempt tasks finish their writes before the pool closes.
    worker.shutdown().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    store.close().await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
