//! Progress events emitted while applying a diff
//!
//! Every cycle that applies a diff produces `start`, then per-file
//! `progress` events, then `complete`. Events carry the cycle number as their
//! sequence number and can be rendered as JSON lines or as human text.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

// ============================================================================
// Event types
// ============================================================================

/// Operation a progress event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Put,
    Delete,
}

/// Payload of an [`Event`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    /// A diff is about to be applied
    Start {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        put: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        delete: Vec<String>,
    },

    /// A single file operation started (0.0) or finished (1.0)
    Progress {
        action: EventAction,
        path: String,
        progress: f32,
    },

    /// A diff was applied completely
    Complete {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        put: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        delete: Vec<String>,
    },
}

/// A sync progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Cycle number, 0 for the first cycle of a session
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Creates an event stamped with the current time
    pub fn new(seq: u64, kind: EventKind) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Renders the event for humans; `None` when there is nothing to say
    pub fn to_text(&self) -> Option<String> {
        let text = match &self.kind {
            EventKind::Start { put, delete } => {
                let changes = describe_changes(put, delete);
                if changes.is_empty() {
                    return None;
                }
                format!("Action: {changes}")
            }
            EventKind::Progress {
                action,
                path,
                progress,
            } => {
                if *progress < 1.0 {
                    return None;
                }
                match action {
                    EventAction::Put => format!("Uploaded {path}"),
                    EventAction::Delete => format!("Deleted {path}"),
                }
            }
            EventKind::Complete { put, delete } => {
                if self.seq == 0 {
                    "Initial Sync Complete".to_string()
                } else if put.is_empty() && delete.is_empty() {
                    return None;
                } else {
                    "Complete".to_string()
                }
            }
        };
        Some(text)
    }

    /// Renders the event as a single line of JSON
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text().unwrap_or_default())
    }
}

fn describe_changes(put: &[String], delete: &[String]) -> String {
    let mut parts = Vec::new();
    if !put.is_empty() {
        parts.push(format!("PUT: {}", put.join(", ")));
    }
    if !delete.is_empty() {
        parts.push(format!("DELETE: {}", delete.join(", ")));
    }
    parts.join(", ")
}

// ============================================================================
// Notifier
// ============================================================================

/// Sending half of the event stream
///
/// Cloned into every apply worker. A notifier without a channel, or whose
/// receiver has gone away, drops events silently.
#[derive(Debug, Clone, Default)]
pub struct EventNotifier {
    tx: Option<mpsc::Sender<Event>>,
}

impl EventNotifier {
    /// Creates a notifier feeding `tx`
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a notifier that discards every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Sends an event, waiting for channel capacity
    pub async fn notify(&self, event: Event) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).await.is_err() {
            trace!("Event receiver dropped");
        }
    }

    pub async fn start(&self, seq: u64, put: Vec<String>, delete: Vec<String>) {
        self.notify(Event::new(seq, EventKind::Start { put, delete }))
            .await;
    }

    pub async fn progress(&self, seq: u64, action: EventAction, path: &str, progress: f32) {
        self.notify(Event::new(
            seq,
            EventKind::Progress {
                action,
                path: path.to_string(),
                progress,
            },
        ))
        .await;
    }

    pub async fn complete(&self, seq: u64, put: Vec<String>, delete: Vec<String>) {
        self.notify(Event::new(seq, EventKind::Complete { put, delete }))
            .await;
    }
}
