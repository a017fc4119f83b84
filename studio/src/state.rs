//! Shared engine state.
//!
//! DESIGN
//! ======
//! `StudioState` is handed to every service function. It holds the remote
//! API, the durable queue, the canvas projection and transcript of the
//! active session, the clipboard, the session synchronizer, and the notice
//! channel. Clone is cheap: all fields are Arc-wrapped or handles.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::chat::Transcript;
use crate::clipboard::Clipboard;
use crate::config::StudioConfig;
use crate::notice::Notices;
use crate::queue::TaskQueue;
use crate::remote::SessionApi;
use crate::services::sync::SessionSync;
use crate::session::CanvasSession;

#[derive(Clone)]
pub struct StudioState {
    pub config: Arc<StudioConfig>,
    pub session_id: Arc<str>,
    pub api: Arc<dyn SessionApi>,
    pub queue: TaskQueue,
    pub canvas: Arc<RwLock<CanvasSession>>,
    pub transcript: Arc<RwLock<Transcript>>,
    pub clipboard: Clipboard,
    pub sync: SessionSync,
    pub notices: Notices,
}

impl StudioState {
    #[must_use]
    pub fn new(config: StudioConfig, session_id: &str, api: Arc<dyn SessionApi>, queue: TaskQueue) -> Self {
        let clipboard = Clipboard::new(config.clipboard_path());
        let sync = SessionSync::new(Arc::clone(&api), session_id, config.sync_debounce);
        Self {
            config: Arc::new(config),
            session_id: Arc::from(session_id),
            api,
            queue,
            canvas: Arc::new(RwLock::new(CanvasSession::new(session_id))),
            transcript: Arc::new(RwLock::new(Transcript::new())),
            clipboard,
            sync,
            notices: Notices::new(),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
