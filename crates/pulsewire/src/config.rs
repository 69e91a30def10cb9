//! CLI configuration: thin wrapper around `pulsewire_config`.
//!
//! Adds the flag overrides from `GlobalOpts` (--profile, --token, --home,
//! --timeout) and the per-command ingestion flags on top of the shared
//! profile resolution.

use std::time::Duration;

use secrecy::SecretString;

use pulsewire_api::{TelemetryClient, TransportConfig};
use pulsewire_config::{Config, Defaults, Profile};
use pulsewire_core::{IngestConfig, RealtimeMode};

use crate::cli::{GlobalOpts, IngestArgs, RealtimeArg};
use crate::error::CliError;

pub use pulsewire_config::{config_path, load_config_or_default, save_config};

/// The profile a command runs against, after flag overrides.
#[derive(Debug)]
pub struct ActiveProfile {
    pub name: String,
    pub profile: Profile,
    pub defaults: Defaults,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Look up the active profile and apply global flag overrides.
///
/// A missing profile is only an error when it was asked for by name;
/// otherwise commands run from flags and environment alone.
pub fn active_profile(global: &GlobalOpts) -> Result<ActiveProfile, CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profile(&name) {
        Ok(p) => p.clone(),
        Err(e) if global.profile.is_some() => return Err(e.into()),
        Err(_) => {
            tracing::debug!(profile = %name, "no such profile, using flags and environment");
            Profile::default()
        }
    };

    if let Some(ref home) = global.home {
        profile.home_id = Some(home.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok(ActiveProfile {
        name,
        profile,
        defaults: cfg.defaults,
    })
}

impl ActiveProfile {
    /// `--token` wins over the profile's resolution chain.
    pub fn token(&self, global: &GlobalOpts) -> Result<SecretString, CliError> {
        if let Some(ref token) = global.token {
            return Ok(SecretString::from(token.clone()));
        }
        let resolved = pulsewire_config::resolve_token(&self.profile, &self.name)?;
        tracing::debug!(profile = %self.name, source = %resolved.source, "resolved token");
        Ok(resolved.secret)
    }

    pub fn home_id(&self) -> Option<&str> {
        self.profile
            .home_id
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    pub fn require_home(&self) -> Result<&str, CliError> {
        self.home_id().ok_or_else(|| CliError::NoHome {
            path: config_path().display().to_string(),
        })
    }

    /// Apply per-command ingestion flags.
    pub fn apply_ingest_args(&mut self, args: &IngestArgs) {
        if let Some(ref device) = args.device {
            self.profile.device_id = Some(device.clone());
        }
        if let Some(realtime) = args.realtime {
            self.profile.realtime = Some(match realtime {
                RealtimeArg::Auto => RealtimeMode::Auto,
                RealtimeArg::Always => RealtimeMode::Always,
                RealtimeArg::Never => RealtimeMode::Never,
            });
        }
    }

    /// Build the coordinator configuration for this profile.
    pub fn ingest_config(&self, global: &GlobalOpts) -> Result<IngestConfig, CliError> {
        self.require_home()?;
        let token = self.token(global)?;
        Ok(pulsewire_config::build_ingest_config(
            &self.profile,
            &self.defaults,
            token,
        )?)
    }

    /// API client for one-shot queries (no home required).
    pub fn api_client(&self, global: &GlobalOpts) -> Result<TelemetryClient, CliError> {
        let token = self.token(global)?;
        let endpoints = pulsewire_config::build_endpoints(&self.profile)?;
        let transport = TransportConfig {
            timeout: Duration::from_secs(
                self.profile.timeout.unwrap_or(self.defaults.timeout).max(1),
            ),
            ..TransportConfig::default()
        };
        Ok(TelemetryClient::new(&endpoints.to_api(), token, &transport)?)
    }
}
