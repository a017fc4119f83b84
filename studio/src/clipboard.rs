//! Cross-session clipboard.
//!
//! One durable slot in a JSON file, shared by every session that opens the
//! same path, plus a broadcast so open sessions hear about new copies. A
//! copy holds either one item or several; writing one kind replaces the
//! other.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use canvas::doc::CanvasItem;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::ErrorCode;

const CLIPBOARD_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "items", rename_all = "lowercase")]
pub enum ClipboardPayload {
    Single(CanvasItem),
    Multi(Vec<CanvasItem>),
}

impl ClipboardPayload {
    /// Build the payload for a selection: one item is a single copy, more
    /// are a multi copy, none is nothing.
    #[must_use]
    pub fn from_items(mut items: Vec<CanvasItem>) -> Option<Self> {
        match items.len() {
            0 => None,
            1 => items.pop().map(Self::Single),
            _ => Some(Self::Multi(items)),
        }
    }

    #[must_use]
    pub fn items(&self) -> &[CanvasItem] {
        match self {
            Self::Single(item) => std::slice::from_ref(item),
            Self::Multi(items) => items,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("clipboard file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ErrorCode for ClipboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_CLIPBOARD_IO",
            Self::Serde(_) => "E_CLIPBOARD_SERDE",
        }
    }
}

#[derive(Clone)]
pub struct Clipboard {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    tx: broadcast::Sender<ClipboardPayload>,
}

impl Clipboard {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(CLIPBOARD_CHANNEL_CAPACITY);
        Self { path: path.into(), lock: Arc::new(Mutex::new(())), tx }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the slot and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be written.
    pub fn write(&self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
        {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, serde_json::to_vec(payload)?)?;
        }
        debug!(count = payload.items().len(), "clipboard: written");
        if self.tx.send(payload.clone()).is_err() {
            debug!("clipboard: no subscribers");
        }
        Ok(())
    }

    /// Current slot contents, `None` if nothing was ever copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(&self) -> Result<Option<ClipboardPayload>, ClipboardError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClipboardPayload> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "clipboard_test.rs"]
mod tests;
