//! Trigger surface - HTTP endpoint and optional scheduler around the sync service
//!
//! `GET /run?bankID=<id>` runs the pipeline. In single-shot mode the first
//! successful run shuts the server down; in interval mode a background loop
//! also runs the pipeline on its own.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::domain::result::{Error, Result};
use crate::ports::{Sleeper, TokioSleeper};
use crate::services::SyncService;

/// How long the process lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Exit after the first successful run
    Once,
    /// Keep serving and run on a schedule
    Interval(Duration),
}

impl RunMode {
    pub fn from_interval(interval: Option<Duration>) -> Self {
        interval.map_or(Self::Once, Self::Interval)
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct TriggerState {
    sync: Arc<SyncService>,
    mode: RunMode,
    detached: bool,
    sleeper: Arc<dyn Sleeper>,
    shutdown: Arc<Notify>,
}

impl TriggerState {
    pub fn new(sync: Arc<SyncService>, mode: RunMode) -> Self {
        Self {
            sync,
            mode,
            detached: false,
            sleeper: Arc::new(TokioSleeper),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Acknowledge `/run` at once and sync in a background task
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Notified once a single-shot run has succeeded
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    fn run_succeeded(&self) {
        if self.mode == RunMode::Once {
            tracing::info!("run succeeded in single-shot mode, shutting down");
            self.shutdown.notify_one();
        }
    }
}

/// Run failure rendered as 500 with the error text
#[derive(Debug)]
pub struct RunError(pub Error);

impl IntoResponse for RunError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<Error> for RunError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    #[serde(rename = "bankID")]
    pub bank_id: Option<String>,
}

async fn run(
    State(state): State<TriggerState>,
    Query(params): Query<RunParams>,
) -> std::result::Result<(StatusCode, &'static str), RunError> {
    if state.detached {
        // Owned by the runtime, not the request: a dropped connection must not cancel it
        tokio::spawn(async move {
            match state.sync.run(params.bank_id.as_deref()).await {
                Ok(_) => state.run_succeeded(),
                Err(e) => tracing::error!(error = %e, "detached run failed"),
            }
        });
        return Ok((StatusCode::ACCEPTED, "Run started"));
    }

    if let Err(e) = state.sync.run(params.bank_id.as_deref()).await {
        tracing::error!(error = %e, "run failed");
        return Err(e.into());
    }
    state.run_succeeded();
    Ok((StatusCode::OK, "Run succeeded"))
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn build_router(state: TriggerState) -> Router {
    Router::new()
        .route("/run", get(run))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Run the pipeline forever, sleeping `every` after each attempt
pub async fn schedule(sync: Arc<SyncService>, every: Duration, sleeper: Arc<dyn Sleeper>) {
    loop {
        if let Err(e) = sync.run(None).await {
            tracing::error!(error = %e, "scheduled run failed");
        }
        tracing::info!(next_in_secs = every.as_secs(), "waiting for next scheduled run");
        sleeper.sleep(every).await;
    }
}

/// Serve on a pre-bound listener until shutdown.
///
/// Returns after a successful single-shot run or on Ctrl-C.
pub async fn serve(listener: TcpListener, state: TriggerState) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(mode = ?state.mode, detached = state.detached, "listening on http://{addr}");

    let scheduler = match state.mode {
        RunMode::Interval(every) => Some(tokio::spawn(schedule(
            Arc::clone(&state.sync),
            every,
            Arc::clone(&state.sleeper),
        ))),
        RunMode::Once => None,
    };

    let shutdown = state.shutdown_signal();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown.notified() => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
            }
        })
        .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}
