//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use pulsewire_config::ConfigError;
use pulsewire_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(pulsewire::auth_failed),
        help(
            "The token was rejected. Create a new one at https://developer.tibber.com\n\
             Then run: pulsewire config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(pulsewire::no_credentials),
        help(
            "Store one with: pulsewire config set-token\n\
             Or pass --token, or set PULSEWIRE_TOKEN."
        )
    )]
    NoCredentials { profile: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the telemetry service: {message}")]
    #[diagnostic(
        code(pulsewire::connection_failed),
        help("Check network access. Run with -vv to see each request.")
    )]
    ConnectionFailed { message: String },

    #[error("Rate limited by the telemetry service: {message}")]
    #[diagnostic(
        code(pulsewire::rate_limited),
        help("Wait a minute before retrying. Avoid running several watchers per token.")
    )]
    RateLimited { message: String },

    #[error("Unexpected response: {message}")]
    #[diagnostic(code(pulsewire::malformed))]
    Malformed { message: String },

    // ── Startup ──────────────────────────────────────────────────────
    #[error("No data: {reason}")]
    #[diagnostic(
        code(pulsewire::not_ready),
        help(
            "The meter may be offline or the home may not stream realtime data.\n\
             Try a longer --wait, or poll a device with --device."
        )
    )]
    NotReady { reason: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(pulsewire::not_found),
        help("Run: pulsewire {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pulsewire::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pulsewire::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pulsewire config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No home selected")]
    #[diagnostic(
        code(pulsewire::no_home),
        help(
            "Pass --home <ID>, set PULSEWIRE_HOME, or run: pulsewire config init\n\
             Config file: {path}"
        )
    )]
    NoHome { path: String },

    #[error("Profile '{name}' already exists")]
    #[diagnostic(
        code(pulsewire::profile_exists),
        help("Use --force to overwrite it.")
    )]
    ProfileExists { name: String },

    #[error(transparent)]
    #[diagnostic(code(pulsewire::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(pulsewire::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ConnectionFailed { .. } | Self::RateLimited { .. } => exit_code::CONNECTION,
            Self::NotReady { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoHome { .. } | Self::ProfileExists { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Authentication { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::RateLimited { message, .. } => CliError::RateLimited { message },
            CoreError::Transient { message } => CliError::ConnectionFailed { message },
            CoreError::Malformed { message } => CliError::Malformed { message },
            CoreError::NotReady { reason } => CliError::NotReady { reason },
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
        }
    }
}

impl From<pulsewire_api::Error> for CliError {
    fn from(err: pulsewire_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}
