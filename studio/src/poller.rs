//! Job poller — watches one remote task until it settles.
//!
//! DESIGN
//! ======
//! `poll` spawns a tokio task that fetches the task status every `interval`
//! and reports each fetch through `on_progress`, including the final one.
//! The caller gets a [`PollHandle`] holding a cancellation token and the
//! join handle.
//!
//! Cancellation is cooperative. A request already in flight is allowed to
//! finish, but its result is discarded and the poller settles as
//! cancelled. A cancel during the sleep between fetches wakes the poller
//! immediately.
//!
//! ERROR HANDLING
//! ==============
//! A remote `failed` status, an exhausted attempt budget, a transport error,
//! and cancellation each settle the poller with their own [`PollError`]
//! variant, so the scheduler can tell a cancelled task from a failed one.

use std::sync::Arc;
use std::time::Duration;

use canvas::doc::ItemStatus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::StudioConfig;
use crate::error::ErrorCode;
use crate::remote::{RemoteError, SessionApi};

// =============================================================================
// TYPES
// =============================================================================

/// One status fetch, as reported to `on_progress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollUpdate {
    pub status: ItemStatus,
    pub progress: u8,
    pub download_url: Option<String>,
    pub fail_message: Option<String>,
}

/// Successful settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub download_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollOptions {
    #[must_use]
    pub fn from_config(config: &StudioConfig) -> Self {
        Self { interval: config.poll_interval, max_attempts: config.poll_max_attempts }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PollError {
    #[error("polling cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
    #[error("task still pending after {attempts} attempts")]
    TimedOut { attempts: u32 },
    #[error("status fetch failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("poller task ended abnormally: {0}")]
    Join(String),
}

impl PollError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl ErrorCode for PollError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "E_POLL_CANCELLED",
            Self::Failed(_) => "E_POLL_FAILED",
            Self::TimedOut { .. } => "E_POLL_TIMED_OUT",
            Self::Remote(_) => "E_POLL_REMOTE",
            Self::Join(_) => "E_POLL_JOIN",
        }
    }
}

/// Running poller: cancel it, or await its settlement.
pub struct PollHandle {
    cancel: CancellationToken,
    join: JoinHandle<Result<PollOutcome, PollError>>,
}

impl PollHandle {
    /// Request cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the poller to settle.
    ///
    /// # Errors
    ///
    /// Returns the poller's [`PollError`], or `Join` if its task panicked.
    pub async fn wait(self) -> Result<PollOutcome, PollError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(PollError::Join(e.to_string())),
        }
    }
}

// =============================================================================
// POLL
// =============================================================================

/// Start polling `task_id` in a background task.
pub fn poll<F>(
    api: Arc<dyn SessionApi>,
    session_id: String,
    task_id: String,
    on_progress: F,
    options: PollOptions,
) -> PollHandle
where
    F: Fn(&PollUpdate) + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let join = tokio::spawn(async move { run(api, &session_id, &task_id, &on_progress, options, &token).await });
    PollHandle { cancel, join }
}

async fn run<F>(
    api: Arc<dyn SessionApi>,
    session_id: &str,
    task_id: &str,
    on_progress: &F,
    options: PollOptions,
    cancel: &CancellationToken,
) -> Result<PollOutcome, PollError>
where
    F: Fn(&PollUpdate),
{
    for attempt in 1..=options.max_attempts {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        let fetched = api.get_task_status(session_id, task_id).await;
        if cancel.is_cancelled() {
            debug!(%task_id, attempt, "poller: discarding response after cancel");
            return Err(PollError::Cancelled);
        }
        let response = fetched?;

        let update = PollUpdate {
            status: response.status,
            progress: response.progress.unwrap_or(0).min(100),
            download_url: response.download_url,
            fail_message: response.fail_message,
        };
        on_progress(&update);

        match update.status {
            ItemStatus::Completed => {
                let Some(download_url) = update.download_url else {
                    return Err(PollError::Failed("completed without a download URL".into()));
                };
                return Ok(PollOutcome { download_url });
            }
            ItemStatus::Failed => {
                return Err(PollError::Failed(update.fail_message.unwrap_or_else(|| "generation failed".into())));
            }
            ItemStatus::Queued | ItemStatus::Processing => {}
        }

        if attempt < options.max_attempts {
            tokio::select! {
                () = cancel.cancelled() => return Err(PollError::Cancelled),
                () = tokio::time::sleep(options.interval) => {}
            }
        }
    }
    Err(PollError::TimedOut { attempts: options.max_attempts })
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;
