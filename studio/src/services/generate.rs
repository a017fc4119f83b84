//! Generation flow — submit prompts, place results, follow pending jobs.
//!
//! DESIGN
//! ======
//! `generate` records the prompt in the transcript with one assistant
//! message per requested output, plans a non-overlapping rect for each
//! output at the top-left of the visible area, and submits one remote job
//! per output. A job that comes back finished is placed at once; a pending
//! job becomes a queue entry (and so a placeholder); a failed job marks its
//! message failed. The scheduler is drained at the end so pollers start
//! right away.
//!
//! [`CanvasTaskListener`] receives the scheduler's task events and turns
//! them into canvas and transcript changes: progress moves placeholders and
//! messages forward, completion swaps the placeholder for the media item
//! and persists it, failure drops the placeholder and keeps the reason.
//!
//! ERROR HANDLING
//! ==============
//! Submission failures are per output: each one fails its message, sends
//! one notice, and is not retried. Persisting a finished result is
//! best-effort and only logged.

use std::sync::Arc;

use async_trait::async_trait;
use canvas::consts::DEFAULT_ITEM_EDGE;
use canvas::doc::{CanvasItem, ItemId, ItemKind, ItemStatus};
use canvas::geometry::{Rect, Size, place_many};
use tracing::{error, info, warn};

use super::ActionError;
use super::canvas::{attach_remote_id, reconcile_placeholders};
use crate::chat::ChatMessage;
use crate::now_ms;
use crate::poller::{PollError, PollOutcome, PollUpdate};
use crate::queue::Task;
use crate::remote::types::{
    AssetPayload, GenerationPayload, MessagePayload, NewCanvasItem, SaveGenerationRequest, SubmitRequest,
};
use crate::scheduler::{Scheduler, TaskListener};
use crate::state::StudioState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    /// Aspect ratio such as `"16:9"`.
    pub aspect_ratio: String,
    pub quality: Option<String>,
    pub style: Option<String>,
    /// Number of outputs, each submitted as its own job.
    pub output_number: u32,
    /// Reference image URLs sent along with the prompt.
    pub source_images: Vec<String>,
}

/// What happened to one requested output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputOutcome {
    /// Finished on submit and placed as this item.
    Placed(ItemId),
    /// Pending; queued under this task id.
    Queued(String),
    /// Rejected, with the reason.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub user_message_id: String,
    pub outputs: Vec<OutputOutcome>,
    /// Pollers started by the closing drain.
    pub pollers_started: usize,
}

// =============================================================================
// GENERATE
// =============================================================================

/// Submit a generation request.
///
/// # Errors
///
/// Returns `InvalidRequest` for an empty prompt or zero outputs. Remote
/// failures are reported per output in the returned outcome.
pub async fn generate(
    state: &StudioState,
    scheduler: &Scheduler,
    request: GenerateRequest,
) -> Result<GenerateOutcome, ActionError> {
    if request.prompt.trim().is_empty() {
        return Err(ActionError::InvalidRequest("prompt is empty".into()));
    }
    if request.output_number == 0 {
        return Err(ActionError::InvalidRequest("output number must be at least 1".into()));
    }

    let user_message = ChatMessage::user(request.prompt.clone(), request.source_images.clone());
    let user_message_id = user_message.id.clone();
    let message_ids: Vec<String> = {
        let mut transcript = state.transcript.write().await;
        transcript.push(user_message);
        (0..request.output_number)
            .map(|_| {
                let message = ChatMessage::pending_assistant("");
                let id = message.id.clone();
                transcript.push(message);
                id
            })
            .collect()
    };

    let rects = plan_rects(state, &request).await;
    info!(outputs = rects.len(), model = %request.model, "generate: submitting");

    let mut outputs = Vec::with_capacity(rects.len());
    for (message_id, rect) in message_ids.iter().zip(rects) {
        outputs.push(submit_one(state, &request, message_id, rect).await);
    }

    if let Err(e) = reconcile_placeholders(state).await {
        warn!(error = %e, "generate: placeholder reconcile failed");
    }
    let pollers_started = scheduler.drain();

    Ok(GenerateOutcome { user_message_id, outputs, pollers_started })
}

async fn plan_rects(state: &StudioState, request: &GenerateRequest) -> Vec<Rect> {
    let size = Size::from_aspect_ratio(&request.aspect_ratio, DEFAULT_ITEM_EDGE);
    let sizes = vec![size; request.output_number as usize];
    let canvas = state.canvas.read().await;
    let origin = canvas.view().placement_origin();
    place_many(
        &sizes,
        &canvas.occupied_rects(),
        origin.x,
        origin.y,
        state.config.placement_max_attempts,
        state.config.placement_padding,
    )
}

async fn submit_one(state: &StudioState, request: &GenerateRequest, message_id: &str, rect: Rect) -> OutputOutcome {
    let body = SubmitRequest {
        model: request.model.clone(),
        prompt: request.prompt.clone(),
        source_images: request.source_images.clone(),
        size: request.aspect_ratio.clone(),
        quality: request.quality.clone(),
        style: request.style.clone(),
        n: 1,
        canvas_item: rect,
    };

    let response = match state.api.submit_task(&state.session_id, &body).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "generate: submission rejected");
            state.transcript.write().await.fail(message_id, e.to_string());
            state.notices.error("Generation failed", &e);
            return OutputOutcome::Failed(e.to_string());
        }
    };

    match response.status {
        ItemStatus::Completed => {
            let Some(url) = response.download_url.clone() else {
                return fail_output(state, message_id, "completed without a download URL").await;
            };
            let kind = response.media_type.unwrap_or_else(|| media_kind_for(&url));
            let item = CanvasItem::media(kind, url.clone(), rect, Some(request.prompt.clone()));
            let item_id = item.id;
            state.canvas.write().await.insert_item(item.clone(), response.canvas_item_id.clone());
            if response.canvas_item_id.is_none() {
                let result = ResultRecord {
                    generation_id: &response.generation_id,
                    prompt: &request.prompt,
                    model: &request.model,
                    aspect_ratio: &request.aspect_ratio,
                    message_id,
                    references: &request.source_images,
                };
                persist_result(state, &item, &result).await;
            }
            state.transcript.write().await.complete(message_id, url);
            info!(item_id = %item_id, "generate: placed immediate result");
            OutputOutcome::Placed(item_id)
        }
        ItemStatus::Failed => {
            let reason = response.fail_message.unwrap_or_else(|| "generation failed".into());
            fail_output(state, message_id, &reason).await
        }
        ItemStatus::Queued | ItemStatus::Processing => {
            let task = Task {
                task_id: response.poll_id().to_string(),
                message_id: message_id.to_string(),
                session_id: state.session_id.to_string(),
                prompt: request.prompt.clone(),
                model: request.model.clone(),
                aspect_ratio: request.aspect_ratio.clone(),
                quality: request.quality.clone(),
                style: request.style.clone(),
                status: response.status,
                progress: 0,
                created_at: now_ms(),
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            };
            let task_id = task.task_id.clone();
            match state.queue.add(task) {
                Ok(()) => {
                    state.transcript.write().await.set_progress(message_id, response.status, 0);
                    OutputOutcome::Queued(task_id)
                }
                Err(e) => {
                    error!(%task_id, error = %e, "generate: could not queue task");
                    state.transcript.write().await.fail(message_id, e.to_string());
                    state.notices.error("Generation failed", &e);
                    OutputOutcome::Failed(e.to_string())
                }
            }
        }
    }
}

async fn fail_output(state: &StudioState, message_id: &str, reason: &str) -> OutputOutcome {
    error!(%message_id, %reason, "generate: job failed on submit");
    state.transcript.write().await.fail(message_id, reason);
    state.notices.error_message(format!("Generation failed: {reason}"));
    OutputOutcome::Failed(reason.to_string())
}

/// Media kind guessed from a result URL's extension.
fn media_kind_for(url: &str) -> ItemKind {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if [".mp4", ".webm", ".mov"].iter().any(|ext| path.ends_with(ext)) {
        ItemKind::Video
    } else {
        ItemKind::Image
    }
}

// =============================================================================
// PERSIST RESULT
// =============================================================================

struct ResultRecord<'a> {
    generation_id: &'a str,
    prompt: &'a str,
    model: &'a str,
    aspect_ratio: &'a str,
    message_id: &'a str,
    references: &'a [String],
}

/// Save a finished result and map the new item to its remote id.
async fn persist_result(state: &StudioState, item: &CanvasItem, record: &ResultRecord<'_>) {
    let request = SaveGenerationRequest {
        generation: GenerationPayload {
            id: record.generation_id.to_string(),
            prompt: record.prompt.to_string(),
            model: record.model.to_string(),
            aspect_ratio: record.aspect_ratio.to_string(),
            status: ItemStatus::Completed,
        },
        asset: AssetPayload { kind: item.kind, url: item.url.clone() },
        canvas_item: NewCanvasItem {
            kind: item.kind,
            url: item.url.clone(),
            x: item.x,
            y: item.y,
            width: item.width,
            height: item.height,
            prompt: item.prompt.clone(),
        },
        message: MessagePayload { id: record.message_id.to_string(), content: record.prompt.to_string() },
        references: record.references.to_vec(),
    };
    match state.api.save_generation_result(&state.session_id, &request).await {
        Ok(saved) => attach_remote_id(state, item.id, saved.canvas_item_id).await,
        Err(e) => warn!(item_id = %item.id, error = %e, "generate: result not persisted"),
    }
}

// =============================================================================
// TASK LISTENER
// =============================================================================

/// Applies scheduler task events to the canvas and transcript.
pub struct CanvasTaskListener {
    state: StudioState,
}

impl CanvasTaskListener {
    #[must_use]
    pub fn new(state: StudioState) -> Arc<Self> {
        Arc::new(Self { state })
    }
}

#[async_trait]
impl TaskListener for CanvasTaskListener {
    async fn on_progress(&self, task: &Task, update: &PollUpdate) {
        if update.status.is_terminal() {
            return;
        }
        self.state.canvas.write().await.update_placeholder(&task.task_id, update.status, update.progress);
        self.state.transcript.write().await.set_progress(&task.message_id, update.status, update.progress);
    }

    async fn on_completed(&self, task: &Task, outcome: &PollOutcome) {
        let url = outcome.download_url.as_str();
        let item = self.state.canvas.write().await.complete_placeholder(
            &task.task_id,
            media_kind_for(url),
            url,
            Some(task.prompt.clone()),
            task.rect(),
        );
        let record = ResultRecord {
            generation_id: &task.task_id,
            prompt: &task.prompt,
            model: &task.model,
            aspect_ratio: &task.aspect_ratio,
            message_id: &task.message_id,
            references: &[],
        };
        persist_result(&self.state, &item, &record).await;
        self.state.transcript.write().await.complete(&task.message_id, url);
        info!(task_id = %task.task_id, item_id = %item.id, "generate: task result placed");
    }

    async fn on_failed(&self, task: &Task, error: &PollError) {
        self.state.canvas.write().await.drop_placeholder(&task.task_id);
        self.state.transcript.write().await.fail(&task.message_id, error.to_string());
        self.state.notices.error("Generation failed", error);
    }
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
