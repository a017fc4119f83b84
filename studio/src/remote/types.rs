//! Wire types for the remote session/task API, plus its error type.
//!
//! All bodies use camelCase keys. Task statuses share the canvas
//! [`ItemStatus`] enum so a remote status can flow onto a placeholder
//! without translation.

use canvas::camera::View;
use canvas::doc::{ItemKind, ItemStatus};
use canvas::geometry::Rect;
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by remote API calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The HTTP request could not be sent or its body not read.
    #[error("request failed: {0}")]
    Request(String),

    /// The API answered with a non-success HTTP status.
    #[error("API response error: status {status}")]
    Response { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The API accepted the request but reported a failure in the body.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for RemoteError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_REMOTE_REQUEST",
            Self::Response { .. } => "E_REMOTE_RESPONSE",
            Self::Parse(_) => "E_REMOTE_PARSE",
            Self::Rejected(_) => "E_REMOTE_REJECTED",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Body of `submitTask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_images: Vec<String>,
    /// Aspect ratio such as `"16:9"`.
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Number of outputs requested by this call.
    pub n: u32,
    /// Planned geometry of the resulting canvas item.
    pub canvas_item: Rect,
}

/// Result of `submitTask`. Either already terminal or pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: ItemStatus,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub fail_message: Option<String>,
    pub generation_id: String,
    /// Set when the server already persisted the canvas item.
    #[serde(default)]
    pub canvas_item_id: Option<String>,
    /// Id to poll. Falls back to `generation_id` when the API omits it.
    #[serde(default)]
    pub task_id: Option<String>,
    /// Media kind of the result; images unless the API says otherwise.
    #[serde(default)]
    pub media_type: Option<ItemKind>,
}

impl SubmitResponse {
    #[must_use]
    pub fn poll_id(&self) -> &str {
        self.task_id.as_deref().unwrap_or(&self.generation_id)
    }
}

/// Result of `getTaskStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    pub status: ItemStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub fail_message: Option<String>,
}

// =============================================================================
// SESSIONS
// =============================================================================

/// A persisted canvas item as the API returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCanvasItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default)]
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// A generation job as recorded by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: ItemStatus,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub canvas_item: Option<Rect>,
}

impl GenerationRecord {
    #[must_use]
    pub fn poll_id(&self) -> &str {
        self.task_id.as_deref().unwrap_or(&self.id)
    }
}

/// Full hydration payload of `getSessionDetail`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: String,
    #[serde(default)]
    pub view: Option<View>,
    #[serde(default)]
    pub items: Vec<RemoteCanvasItem>,
    #[serde(default)]
    pub generations: Vec<GenerationRecord>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub assets: Vec<serde_json::Value>,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Body of `updateSession`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub canvas_view: View,
}

/// Canvas item to persist, either on paste or alongside a generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCanvasItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub url: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Identifies a canvas item the API created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasItemRef {
    pub canvas_item_id: String,
}

/// Body of `batchDeleteCanvasItems`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    pub item_ids: Vec<String>,
}

/// Reply of `batchDeleteCanvasItems`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// GENERATION RESULTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    pub id: String,
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPayload {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub content: String,
}

/// Body of `saveGenerationResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGenerationRequest {
    pub generation: GenerationPayload,
    pub asset: AssetPayload,
    pub canvas_item: NewCanvasItem,
    pub message: MessagePayload,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}
