//! Protocol pollers for the two server families.
//!
//! One probe against one endpoint, bounded by a timeout, always resolving to
//! a typed result. Transport errors, malformed responses and timeouts all
//! surface as [`PingError`] values; nothing crosses this boundary as a panic.

pub mod bedrock;
pub mod java;

use std::fmt;

use tracing::warn;

/// Upper bound on reported player counts. Counts are 32-bit on the wire and
/// garbage values wreck downstream graph rendering, so anything outside
/// `[0, MAX_PLAYER_COUNT]` is clamped to the nearest bound.
pub const MAX_PLAYER_COUNT: u32 = 250_000;

/// Successful probe payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    pub players_online: u32,

    /// Protocol id the server actually spoke; Java only
    pub protocol_version: Option<i32>,

    /// Embedded `data:image/` favicon URI; Java only, validated before use
    pub favicon: Option<String>,
}

/// Result type alias for probe operations
pub type PingResult = Result<PingResponse, PingError>;

/// Typed probe failure
#[derive(Debug)]
pub enum PingError {
    /// The timeout budget elapsed before a full response arrived
    Timeout,

    /// Transport-level failure (connect refused, reset, ...)
    Io(std::io::Error),

    /// The remote answered with something that is not a valid status
    Protocol(String),
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingError::Timeout => write!(f, "timed out"),
            PingError::Io(err) => write!(f, "{}", err),
            PingError::Protocol(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PingError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PingError {
    fn from(err: std::io::Error) -> Self {
        PingError::Io(err)
    }
}

impl From<tokio::time::error::Elapsed> for PingError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PingError::Timeout
    }
}

/// Clamp a reported player count into `[0, MAX_PLAYER_COUNT]`, logging the
/// anomaly. Negative or otherwise garbage values become 0.
pub fn cap_player_count(host: &str, player_count: i64) -> u32 {
    if player_count > MAX_PLAYER_COUNT as i64 {
        warn!(
            "{host} returned a player count of {player_count}, capped to {MAX_PLAYER_COUNT} \
             to keep graph rendering sane"
        );
        MAX_PLAYER_COUNT
    } else if player_count < 0 {
        warn!("{host} returned an invalid player count of {player_count}, set to 0");
        0
    } else {
        player_count as u32
    }
}
