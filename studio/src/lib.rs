//! Studio — generation task scheduling and canvas session sync.
//!
//! ARCHITECTURE
//! ============
//! A prompt becomes remote generation jobs. Finished jobs land on the
//! canvas immediately; pending jobs go into the durable [`queue`], show up
//! as placeholders, and are followed by the [`scheduler`] through bounded
//! [`poller`]s until they settle. Canvas edits apply locally first and are
//! persisted behind the user's back by [`services::sync`].
//!
//! | Module | Role |
//! |---|---|
//! | [`config`] | Environment-driven tunables and remote endpoint |
//! | [`remote`] | `SessionApi` trait, wire types, reqwest client |
//! | [`queue`] | File-backed durable task queue |
//! | [`poller`] | Cancellable status polling for one task |
//! | [`scheduler`] | Single-flight, bounded drain of the queue |
//! | [`session`] | Local canvas projection: items, placeholders, selection, view |
//! | [`clipboard`] | Cross-session copy slot |
//! | [`chat`] | Session transcript |
//! | [`notice`] | User-visible notices |
//! | [`state`] | Shared wiring handed to services |
//! | [`services`] | Canvas handlers, generation flow, sync + hydration |

pub mod chat;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod notice;
pub mod poller;
pub mod queue;
pub mod remote;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod state;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}
