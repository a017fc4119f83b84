//! `studio` — resume a session's pending generation jobs.
//!
//! Opens the durable queue, hydrates the configured session, keeps
//! placeholders reconciled with the queue, and drains until every task has
//! settled. Ctrl-C cancels the pollers and leaves unfinished tasks queued
//! for the next run.

use std::process::ExitCode;
use std::sync::Arc;

use studio::config::{RemoteConfig, StudioConfig};
use studio::queue::TaskQueue;
use studio::remote::SessionApi;
use studio::remote::http::HttpSessionApi;
use studio::scheduler::{Scheduler, SchedulerOptions};
use studio::services::{canvas, generate, sync};
use studio::state::StudioState;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env loaded");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!(error = %message, "studio exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let config = StudioConfig::from_env();
    let remote = RemoteConfig::from_env().map_err(|e| e.to_string())?;
    let session_id = std::env::var("STUDIO_SESSION_ID").map_err(|_| "missing required env var STUDIO_SESSION_ID")?;

    let queue = TaskQueue::open(config.queue_path()).map_err(|e| e.to_string())?;
    let api: Arc<dyn SessionApi> = Arc::new(HttpSessionApi::new(remote).map_err(|e| e.to_string())?);
    let options = SchedulerOptions::from_config(&config);
    let state = StudioState::new(config, &session_id, Arc::clone(&api), queue.clone());

    let report = sync::hydrate(&state).await.map_err(|e| e.to_string())?;
    tracing::info!(%session_id, items = report.items, enqueued = report.enqueued, "session hydrated");

    let listener = generate::CanvasTaskListener::new(state.clone());
    let scheduler = Scheduler::new(queue.clone(), api, listener, options);
    let stop = CancellationToken::new();
    let watcher = canvas::watch_queue(state.clone(), stop.clone());

    let mut revisions = queue.subscribe();
    let started = scheduler.drain();
    tracing::info!(started, "queue drain started");

    loop {
        let pending = queue.get().map_err(|e| e.to_string())?.len();
        if pending == 0 {
            tracing::info!("queue empty");
            break;
        }
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "ctrl-c handler failed");
                }
                tracing::info!(pending, "interrupted, cancelling pollers");
                scheduler.cancel_all();
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    stop.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "queue watcher ended abnormally");
    }
    state.sync.cancel_all();
    queue.close().map_err(|e| e.to_string())?;
    Ok(())
}
