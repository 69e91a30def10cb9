// ── Core error types ──
//
// Consumers of the ingestion engine never see HTTP status codes or socket
// errors. `From<pulsewire_api::Error>` folds transport failures into the
// four retry classes plus startup and configuration errors.

use std::time::Duration;

use pulsewire_api::ErrorKind;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Terminal ─────────────────────────────────────────────────────
    /// Token rejected. Never retried.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Retried internally ───────────────────────────────────────────
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("Malformed payload: {message}")]
    Malformed { message: String },

    // ── Startup ──────────────────────────────────────────────────────
    /// No data (or no piggyback feed) within the allotted time.
    #[error("Not ready: {reason}")]
    NotReady { reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pulsewire_api::Error> for CoreError {
    fn from(err: pulsewire_api::Error) -> Self {
        let kind = err.kind();
        match err {
            pulsewire_api::Error::Authentication { message } => {
                CoreError::Authentication { message }
            }
            pulsewire_api::Error::RateLimited { retry_after_secs } => CoreError::RateLimited {
                message: "provider asked to slow down".into(),
                retry_after: retry_after_secs.map(Duration::from_secs),
            },
            pulsewire_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            other => {
                let message = other.to_string();
                match kind {
                    ErrorKind::Auth => CoreError::Authentication { message },
                    ErrorKind::RateLimited => CoreError::RateLimited {
                        message,
                        retry_after: None,
                    },
                    ErrorKind::Transient => CoreError::Transient { message },
                    ErrorKind::Malformed => CoreError::Malformed { message },
                }
            }
        }
    }
}
