//! Shared configuration for pulsewire tools.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `pulsewire_core::IngestConfig`. The CLI layers its flag
//! overrides on top of what this crate produces.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pulsewire_core::{Endpoints, IngestConfig, RealtimeMode, ReconnectConfig};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable consulted last when resolving a token.
pub const TOKEN_ENV: &str = "PULSEWIRE_TOKEN";

const ENV_PREFIX: &str = "PULSEWIRE_";
const KEYRING_SERVICE: &str = "pulsewire";
const DEFAULT_PROFILE: &str = "default";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named profiles, one per home.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// `requested`, else the configured default, else `"default"`.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Startup wait for the first snapshot, in seconds.
    #[serde(default = "default_first_data_timeout")]
    pub first_data_timeout: u64,

    #[serde(default)]
    pub realtime: RealtimeMode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            first_data_timeout: default_first_data_timeout(),
            realtime: RealtimeMode::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_first_data_timeout() -> u64 {
    90
}

/// A named profile: one home, optionally one device, plus tuning.
///
/// Durations are whole seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub home_id: Option<String>,

    /// Data API device to poll when the home has no realtime stream.
    pub device_id: Option<String>,

    /// API token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    pub realtime: Option<RealtimeMode>,

    /// Websocket override; otherwise the service-advertised endpoint.
    pub websocket_url: Option<String>,
    pub graphql_url: Option<String>,
    pub data_api_url: Option<String>,

    pub timeout: Option<u64>,
    pub first_data_timeout: Option<u64>,
    pub reconnect_delay: Option<u64>,
    pub max_reconnect_delay: Option<u64>,
    pub device_poll_interval: Option<u64>,
    pub live_poll_interval: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "pulsewire", "pulsewire").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("pulsewire");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then the config file, then `PULSEWIRE_*` variables.
///
/// Nested keys use `__` in variable names, e.g.
/// `PULSEWIRE_DEFAULTS__OUTPUT=json`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Like [`load_config`] with an explicit file. A missing file is not an
/// error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Where tokens can come from besides the profile itself.
pub trait CredentialStore {
    fn env_var(&self, name: &str) -> Option<String>;
    fn keyring_token(&self, profile_name: &str) -> Option<String>;
}

/// Process environment and the OS keyring.
pub struct SystemCredentials;

impl CredentialStore for SystemCredentials {
    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    fn keyring_token(&self, profile_name: &str) -> Option<String> {
        keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
            .ok()?
            .get_password()
            .ok()
    }
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

/// Which step of the chain produced the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    ProfileEnv(String),
    Keyring,
    Plaintext,
    DefaultEnv,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfileEnv(var) => write!(f, "env ${var}"),
            Self::Keyring => f.write_str("keyring"),
            Self::Plaintext => f.write_str("config file"),
            Self::DefaultEnv => write!(f, "env ${TOKEN_ENV}"),
        }
    }
}

#[derive(Debug)]
pub struct ResolvedToken {
    pub secret: SecretString,
    pub source: TokenSource,
}

/// Resolve a token: profile `token_env`, keyring, plaintext, then
/// `PULSEWIRE_TOKEN`.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<ResolvedToken, ConfigError> {
    resolve_token_with(profile, profile_name, &SystemCredentials)
}

pub fn resolve_token_with(
    profile: &Profile,
    profile_name: &str,
    store: &impl CredentialStore,
) -> Result<ResolvedToken, ConfigError> {
    let found = |secret: String, source: TokenSource| ResolvedToken {
        secret: SecretString::from(secret),
        source,
    };

    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Some(val) = store.env_var(env_name) {
            return Ok(found(val, TokenSource::ProfileEnv(env_name.clone())));
        }
    }

    // 2. System keyring
    if let Some(secret) = store.keyring_token(profile_name) {
        return Ok(found(secret, TokenSource::Keyring));
    }

    // 3. Plaintext in config
    if let Some(token) = profile.token.as_ref().filter(|t| !t.trim().is_empty()) {
        return Ok(found(token.clone(), TokenSource::Plaintext));
    }

    // 4. Well-known env var
    if let Some(val) = store.env_var(TOKEN_ENV) {
        return Ok(found(val, TokenSource::DefaultEnv));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the OS keyring for `profile_name`.
pub fn save_token_to_keyring(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(token)?;
    Ok(())
}

// ── IngestConfig construction ───────────────────────────────────────

/// Resolve the token and build an [`IngestConfig`] from a profile.
pub fn profile_to_ingest_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<IngestConfig, ConfigError> {
    let token = resolve_token(profile, profile_name)?.secret;
    build_ingest_config(profile, defaults, token)
}

/// Build an [`IngestConfig`] from a profile and an already resolved token.
pub fn build_ingest_config(
    profile: &Profile,
    defaults: &Defaults,
    token: SecretString,
) -> Result<IngestConfig, ConfigError> {
    let home_id = profile
        .home_id
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("home_id", "required (run `pulsewire homes` to find it)"))?;

    let mut config = IngestConfig::new(token, home_id);
    config.device_id = profile
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned);
    config.realtime = profile.realtime.unwrap_or(defaults.realtime);

    config.endpoints = build_endpoints(profile)?;

    config.request_timeout = secs("timeout", profile.timeout.unwrap_or(defaults.timeout))?;
    config.first_data_timeout = secs(
        "first_data_timeout",
        profile.first_data_timeout.unwrap_or(defaults.first_data_timeout),
    )?;

    let reconnect = ReconnectConfig::default();
    let initial_delay = match profile.reconnect_delay {
        Some(s) => secs("reconnect_delay", s)?,
        None => reconnect.initial_delay,
    };
    let max_delay = match profile.max_reconnect_delay {
        Some(s) => secs("max_reconnect_delay", s)?,
        None => initial_delay.max(reconnect.max_delay),
    };
    if max_delay < initial_delay {
        return Err(invalid(
            "max_reconnect_delay",
            "must not be shorter than reconnect_delay",
        ));
    }
    config.reconnect = ReconnectConfig {
        initial_delay,
        max_delay,
    };

    if let Some(s) = profile.device_poll_interval {
        config.device_poll_interval = secs("device_poll_interval", s)?;
    }
    if let Some(s) = profile.live_poll_interval {
        config.live_poll_interval = secs("live_poll_interval", s)?;
    }

    Ok(config)
}

/// Service endpoints of a profile, with defaults for unset URLs.
pub fn build_endpoints(profile: &Profile) -> Result<Endpoints, ConfigError> {
    let mut endpoints = Endpoints::default();
    if let Some(ref url) = profile.data_api_url {
        endpoints.data_api = check_url("data_api_url", url, &["http", "https"])?;
    }
    if let Some(ref url) = profile.graphql_url {
        endpoints.graphql = check_url("graphql_url", url, &["http", "https"])?;
    }
    if let Some(ref url) = profile.websocket_url {
        endpoints.websocket = Some(check_url("websocket_url", url, &["ws", "wss"])?);
    }
    Ok(endpoints)
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<String, ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(field, format!("{value}: {e}")))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(
            field,
            format!("{value}: expected scheme {}", schemes.join(" or ")),
        ));
    }
    Ok(value.to_owned())
}

fn secs(field: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(value))
}
