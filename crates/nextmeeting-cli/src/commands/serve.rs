//! Long-running mode: HTTP surface plus the periodic loop.
//!
//! | Route | Behaviour |
//! |---|---|
//! | `GET /health` | `{status, timestamp, uptime}` |
//! | `POST /trigger` | starts a run in the background, answers 202 |
//! | `GET /` | service descriptor |

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use nextmeeting_core::{JobError, JobRunner, UtcDateTime};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::cli::ServeArgs;
use crate::commands::Context;
use crate::error::CliError;

#[derive(Clone)]
struct AppState {
    runner: Arc<JobRunner>,
    started: Instant,
}

pub async fn execute(context: Context, args: &ServeArgs) -> Result<ExitCode, CliError> {
    let runner = Arc::new(context.job_runner().await);
    let port = args.port.unwrap_or(context.settings.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let app = router(AppState {
        runner: Arc::clone(&runner),
        started: Instant::now(),
    });
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    if context.settings.run_on_startup {
        info!("running job on startup");
        tokio::spawn(run_job(Arc::clone(&runner), "startup"));
    }
    match context.settings.run_interval() {
        Some(interval) => {
            info!(minutes = interval.as_secs() / 60, "periodic regeneration scheduled");
            tokio::spawn(periodic(Arc::clone(&runner), interval));
        }
        None => info!("RUN_INTERVAL_MINUTES <= 0, periodic regeneration disabled"),
    }

    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served.map_err(|error| CliError::Server(error.to_string()))?;
        }
        () = shutdown_signal() => {}
    }

    info!("shutting down");
    Ok(ExitCode::SUCCESS)
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(describe))
        .route("/health", get(health))
        .route("/trigger", post(trigger))
        .with_state(state)
}

async fn describe() -> Json<serde_json::Value> {
    Json(json!({
        "service": "NextMeeting Schedule Regeneration",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "trigger": "POST /trigger",
        },
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": UtcDateTime::now().to_string(),
        "uptime": state.started.elapsed().as_secs_f64(),
    }))
}

async fn trigger(State(state): State<AppState>) -> impl IntoResponse {
    info!("manual trigger received");
    if state.runner.is_running() {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "message": "Job already running",
                "timestamp": UtcDateTime::now().to_string(),
            })),
        );
    }

    tokio::spawn(run_job(Arc::clone(&state.runner), "manual"));
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Job triggered",
            "timestamp": UtcDateTime::now().to_string(),
        })),
    )
}

async fn periodic(runner: Arc<JobRunner>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; startup runs are RUN_ON_STARTUP's job.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        run_job(Arc::clone(&runner), "interval").await;
    }
}

async fn run_job(runner: Arc<JobRunner>, trigger: &'static str) {
    let started = Instant::now();
    match runner.run().await {
        Ok(result) => {
            let summary = result.summary();
            info!(
                trigger,
                success = summary.success,
                errors = summary.errors,
                duration_ms = started.elapsed().as_millis() as u64,
                "run finished"
            );
        }
        Err(JobError::AlreadyRunning) => {
            warn!(trigger, "previous run still in progress, skipped");
        }
        Err(job_error) => {
            error!(trigger, error = %job_error, "run failed");
        }
    }
}

/// Resolves on SIGINT or SIGTERM. In-flight runs are not drained.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received terminate signal"),
    }
}
