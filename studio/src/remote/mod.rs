//! Remote — the persistence/generation API the engine talks to.
//!
//! DESIGN
//! ======
//! `SessionApi` is the seam between the engine and the network. Services
//! hold an `Arc<dyn SessionApi>`: production wires in [`http::HttpSessionApi`],
//! tests wire in a scripted mock from `state::test_helpers`. The engine never
//! sees HTTP details; everything it needs is expressed in [`types`].
//!
//! ERROR HANDLING
//! ==============
//! Every call returns [`RemoteError`]. Callers decide whether a failure is
//! fatal (a failed submit marks the message failed) or best-effort (a failed
//! debounced write is logged and dropped).

pub mod http;
pub mod types;

use async_trait::async_trait;
use canvas::doc::ItemPatch;

pub use types::RemoteError;
use types::{
    CanvasItemRef, NewCanvasItem, SaveGenerationRequest, SessionDetail, SessionPatch, SubmitRequest,
    SubmitResponse, TaskStatusResponse,
};

/// Operations the engine needs from the remote service.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Start a generation job.
    async fn submit_task(&self, session_id: &str, request: &SubmitRequest) -> Result<SubmitResponse, RemoteError>;

    /// Current status of a pending job.
    async fn get_task_status(&self, session_id: &str, task_id: &str) -> Result<TaskStatusResponse, RemoteError>;

    /// Full session state used for hydration.
    async fn get_session_detail(&self, session_id: &str) -> Result<SessionDetail, RemoteError>;

    /// Persist the session's canvas view.
    async fn update_session(&self, session_id: &str, patch: &SessionPatch) -> Result<(), RemoteError>;

    /// Persist a partial geometry update for one item.
    async fn update_canvas_item(&self, item_id: &str, patch: &ItemPatch) -> Result<(), RemoteError>;

    /// Delete several items at once. All-or-nothing from the caller's view.
    async fn batch_delete_canvas_items(&self, item_ids: &[String]) -> Result<(), RemoteError>;

    /// Persist a finished generation together with its canvas item.
    async fn save_generation_result(
        &self,
        session_id: &str,
        request: &SaveGenerationRequest,
    ) -> Result<CanvasItemRef, RemoteError>;

    /// Persist a new canvas item that did not come from a generation.
    async fn create_canvas_item(&self, session_id: &str, item: &NewCanvasItem) -> Result<CanvasItemRef, RemoteError>;
}
