//! Wire protocol message types for the control socket.
//!
//! Every message is a MessagePack map tagged by `type` and carrying an `id`.
//! Requests carry a client-chosen id which the response echoes. Unsolicited
//! events use id 0.

use serde::{Deserialize, Serialize};

use crate::wallpaper::cache::ArtifactInfo;
use crate::wallpaper::{Category, Resolution};

/// All wire protocol messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32 },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // -- Requests --
    /// Fire one action from the dispatch table, e.g. `change:nature`.
    #[serde(rename = "trigger")]
    Trigger { id: u32, action: String },

    /// Ask for a [`Snapshot`] of controller state.
    #[serde(rename = "status")]
    Query { id: u32 },

    /// Receive every subsequent [`UiEvent`] on this connection.
    #[serde(rename = "subscribe")]
    Subscribe { id: u32 },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Human-readable note for benign outcomes (e.g. nothing to clear).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
        /// Saved copy for `save`, deleted artifact for `clear-cache`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Snapshot>,
    },

    // -- Unsolicited (controller → subscriber) --
    #[serde(rename = "event")]
    Event { id: u32, event: UiEvent },
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Feedback for the UI collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UiEvent {
    /// A change started: trigger disabled, label replaced.
    Loading { category: Category, label: String },
    /// The change finished: trigger re-enabled, label restored.
    Idle,
    /// Error dialog.
    Alert { title: String, message: String },
    /// Transient success notification.
    Notify { title: String, message: String },
}

impl UiEvent {
    pub fn loading(category: Category) -> Self {
        UiEvent::Loading {
            category,
            label: format!("Loading {category}..."),
        }
    }

    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        UiEvent::Alert {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn notify(title: impl Into<String>, message: impl Into<String>) -> Self {
        UiEvent::Notify {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Read-only view of controller state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Category being fetched, if a change is in flight.
    pub loading: Option<Category>,
    pub resolution: Resolution,
    pub current: Option<ArtifactInfo>,
}

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages, so
/// the error response can echo the request id.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub id: u32,
}
