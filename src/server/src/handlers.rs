//! HTTP handlers

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use rolemap_core::LoadReceipt;
use rolemap_crawler::{load_batches, PassStats};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Answer of a completed crawl
#[derive(Debug, Serialize)]
pub struct CrawlSummary {
    pub run_id: Uuid,
    pub mode: String,
    pub region: String,
    pub roles: usize,
    pub permissions: usize,
    pub permissions_seeded: usize,
    /// Roles dropped because their detail lookup failed
    pub dropped: usize,
    /// Roles skipped after cancellation
    pub abandoned: usize,
    pub passes: Vec<PassStats>,
    pub loads: Vec<LoadReceipt>,
    pub duration_ms: u64,
}

/// Run one crawl in the configured mode and load the result into the sink
pub async fn run_crawl(State(state): State<AppState>) -> Result<Json<CrawlSummary>> {
    let run_id = Uuid::new_v4();
    let span = info_span!("crawl_run", run_id = %run_id, mode = %state.mode);
    crawl_and_load(state, run_id).instrument(span).await.map(Json)
}

async fn crawl_and_load(state: AppState, run_id: Uuid) -> Result<CrawlSummary> {
    let started = Instant::now();
    let crawler = state.crawler()?;

    // cancelled when the request is dropped, on shutdown, or on timeout
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let timer = state.crawl_timeout.map(|timeout| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("Crawl exceeded {:?}, cancelling", timeout);
            cancel.cancel();
        })
    });

    info!("Crawl requested");
    let result = crawler.run(&state.mode, &cancel).await;
    if let Some(timer) = timer {
        timer.abort();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) if cancel.is_cancelled() => {
            error!("Crawl cancelled: {}", e);
            return Err(ApiError::Cancelled(e.to_string()));
        }
        Err(e) => {
            error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let loads = load_batches(state.sink.as_ref(), &report.batches)
        .await
        .map_err(ApiError::SinkError)?;

    let summary = CrawlSummary {
        run_id,
        mode: report.mode.clone(),
        region: report.region.clone(),
        roles: report.role_count(),
        permissions: report.permission_count(),
        permissions_seeded: report.permissions_seeded,
        dropped: report.failed(),
        abandoned: report.abandoned(),
        passes: report.passes,
        loads,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Crawl finished: {} roles, {} permissions in {}ms",
        summary.roles, summary.permissions, summary.duration_ms
    );
    Ok(summary)
}

/// Liveness probe
pub async fn health_check() -> &'static str {
    "ok"
}

/// Prometheus metrics in text format
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let body = state
        .metrics
        .export()
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
