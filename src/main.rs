// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! motocalc API Server
//!
//! Serves the engine calculators and enforces the Free-tier daily
//! calculation quota for signed-in users.

use motocalc::{
    config::Config,
    db::FirestoreDb,
    services::{FirebaseTokenVerifier, QuotaPolicy},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        daily_limit = config.daily_calculation_limit,
        "Starting motocalc API"
    );

    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let token_verifier = Arc::new(FirebaseTokenVerifier::new(&config)?);
    let quota_policy = QuotaPolicy::from_config(&config);

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        token_verifier,
        quota_policy,
    });

    let app = motocalc::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("motocalc=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}
