use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of the ingestion feed, observable through a `watch` channel.
///
/// ```text
/// Idle -> Connecting -> Live
/// Connecting -(auth)-> Failed
/// Connecting -(rate limit | transient)-> Reconnecting
/// Live -(frame error | drop)-> Reconnecting -> Connecting
/// any -> Stopped
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubscriptionState {
    Idle,
    Connecting,
    Live,
    Reconnecting {
        /// 1-based attempt number since the last time the feed was live.
        attempt: u32,
        next_retry_at: DateTime<Utc>,
    },
    Failed {
        reason: String,
    },
    Stopped,
}

impl SubscriptionState {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Stopped)
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Live => f.write_str("live"),
            Self::Reconnecting {
                attempt,
                next_retry_at,
            } => write!(
                f,
                "reconnecting (attempt {attempt}, next at {})",
                next_retry_at.format("%H:%M:%S")
            ),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}
