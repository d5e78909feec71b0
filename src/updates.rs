//! Wire payloads: per-cycle diffs and the snapshot messages around them.
//!
//! An [`UpdatePayload`] is a partial object — it carries only fields that
//! changed in the cycle that produced it, so replaying a sequence of diffs
//! onto a blank endpoint reconstructs the same state as the raw results.
//! Snapshot messages ([`OutboundMessage::Init`]) exist because diffs alone
//! can never bootstrap a newly connected viewer.

use serde::{Deserialize, Serialize};

use crate::config::ProtocolFamily;
use crate::ping::PingError;

/// Truncation cap for error descriptors forwarded to viewers
pub const ERROR_MESSAGE_CAP: usize = 28;

/// All-time maximum observed player count for one server. `timestamp` (in
/// seconds) may be absent for records seeded without timestamp data; viewers
/// render those distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordData {
    pub player_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Maximum player count within the current graph window, with the graph-axis
/// timestamp (seconds) it occurred at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPeak {
    pub player_count: u32,
    pub timestamp: i64,
}

/// Sanitized failure descriptor shown to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    /// Build a viewer-safe descriptor from a poll failure: the short typed
    /// message, truncated. Raw transport internals never pass through here
    /// verbatim beyond the cap.
    pub fn from_ping_error(err: &PingError) -> Self {
        let message = err.to_string();
        let message = if message.chars().count() > ERROR_MESSAGE_CAP {
            let truncated: String = message.chars().take(ERROR_MESSAGE_CAP).collect();
            format!("{truncated}...")
        } else {
            message
        };
        ErrorInfo { message }
    }

    pub fn pinging() -> Self {
        ErrorInfo {
            message: "Pinging...".to_string(),
        }
    }
}

/// Diff for one server in one cycle. `player_count` is always present
/// (null on failure); every other field appears only when it changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub player_count: Option<u32>,

    /// Compatible probe-table indices, only when the set changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<usize>>,

    /// Only when a new all-time record was set (requires persistence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordData>,

    /// Only when the graph peak moved (requires persistence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_peak: Option<GraphPeak>,

    /// Only when the favicon content hash changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,

    /// Only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Static per-server metadata handed to viewers. A dedicated type rather
/// than the raw config entry so nothing internal leaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicServerData {
    pub name: String,
    pub host: String,
    pub family: ProtocolFamily,
    pub color: String,
}

/// Client-facing configuration sent once per connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub graph_duration_label: String,
    pub graph_max_length: usize,
    pub server_graph_max_length: usize,
    pub servers: Vec<PublicServerData>,
    pub java_versions: Vec<String>,
    pub is_graph_visible: bool,
}

/// Latest-known full state of one server, sent on connect (not a diff)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub player_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_count_history: Option<Vec<Option<u32>>>,

    pub versions: Vec<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_peak: Option<GraphPeak>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Everything the engine sends to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Snapshot on connect
    Init {
        config: ClientConfig,
        /// Live axis, seconds
        timestamp_points: Vec<i64>,
        servers: Vec<ServerSnapshot>,
    },

    /// One batch per completed cycle, atomic from the viewer's perspective
    UpdateServers {
        /// Shared cycle timestamp, seconds
        timestamp: i64,
        update_history_graph: bool,
        /// Ordered by server id, one entry per server
        updates: Vec<UpdatePayload>,
    },

    /// Full graph history, on explicit request
    HistoryGraph {
        timestamps: Vec<i64>,
        graph_data: Vec<Vec<Option<u32>>>,
    },
}
