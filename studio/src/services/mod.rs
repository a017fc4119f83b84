//! Engine services used by the UI layer and the resume binary.
//!
//! ARCHITECTURE
//! ============
//! Service functions take `&StudioState`, mutate the local projection
//! first, and then talk to the remote API. `canvas` holds the user-facing
//! canvas handlers, `generate` the submission flow and task listener, and
//! `sync` the debounced persistence and hydration.

pub mod canvas;
pub mod generate;
pub mod sync;

use ::canvas::doc::ItemId;

use crate::clipboard::ClipboardError;
use crate::error::ErrorCode;
use crate::queue::QueueError;
use crate::remote::RemoteError;

/// Errors returned by service handlers.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),
    #[error("nothing selected")]
    NothingSelected,
    #[error("clipboard is empty")]
    ClipboardEmpty,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

impl ErrorCode for ActionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ItemNotFound(_) => "E_ITEM_NOT_FOUND",
            Self::NothingSelected => "E_NOTHING_SELECTED",
            Self::ClipboardEmpty => "E_CLIPBOARD_EMPTY",
            Self::InvalidRequest(_) => "E_INVALID_REQUEST",
            Self::Remote(e) => e.error_code(),
            Self::Queue(e) => e.error_code(),
            Self::Clipboard(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.retryable(),
            Self::Queue(e) => e.retryable(),
            _ => false,
        }
    }
}
