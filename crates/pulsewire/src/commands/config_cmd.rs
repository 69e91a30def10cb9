//! Config subcommand handlers.

use std::io::BufRead;

use pulsewire_config::{Config, Profile};
use pulsewire_core::Home;

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config::{self, ActiveProfile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}

fn format_config_redacted(cfg: &Config) -> String {
    toml::to_string_pretty(&redacted(cfg))
        .unwrap_or_else(|e| format!("# failed to render config: {e}"))
}

/// Pick a home for a new profile: first realtime-capable, else first.
fn pick_home(homes: &[Home]) -> Option<&Home> {
    homes
        .iter()
        .find(|h| h.realtime_capable)
        .or_else(|| homes.first())
}

fn read_token_from_stdin() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

fn non_empty(field: &str, token: String) -> Result<String, CliError> {
    if token.trim().is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(token.trim().to_owned())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                global.output,
                &redacted(&cfg),
                format_config_redacted,
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);

            let name = config::active_profile_name(global, &cfg);
            if let Ok(profile) = cfg.profile(&name) {
                match pulsewire_config::resolve_token(profile, &name) {
                    Ok(resolved) => {
                        eprintln!("Profile '{name}' token from {}", resolved.source);
                    }
                    Err(_) => eprintln!("Profile '{name}' has no token"),
                }
            }
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init(init) => init_profile(init, global).await,

        ConfigCommand::SetToken { token } => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            let token = match token {
                Some(t) => t,
                None => read_token_from_stdin()?,
            };
            let token = non_empty("token", token)?;
            pulsewire_config::save_token_to_keyring(&name, &token)?;
            if !global.quiet {
                eprintln!("Token for profile '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

async fn init_profile(init: ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let name = config::active_profile_name(global, &cfg);
    if cfg.profiles.contains_key(&name) && !init.force {
        return Err(CliError::ProfileExists { name });
    }

    let mut profile = Profile {
        home_id: init.home_id.or_else(|| global.home.clone()),
        device_id: init.device,
        token_env: init.token_env,
        timeout: global.timeout,
        ..Profile::default()
    };
    if init.plaintext {
        profile.token.clone_from(&global.token);
    }

    if profile.home_id.is_none() {
        let probe = ActiveProfile {
            name: name.clone(),
            profile: profile.clone(),
            defaults: cfg.defaults.clone(),
        };
        let homes: Vec<Home> = probe
            .api_client(global)?
            .list_homes()
            .await?
            .into_iter()
            .map(Home::from)
            .collect();
        let home = pick_home(&homes).ok_or_else(|| CliError::NotFound {
            resource_type: "home".into(),
            identifier: "(any)".into(),
            list_command: "homes".into(),
        })?;
        if !global.quiet {
            eprintln!("Using home {} ({})", home.display_name, home.id);
        }
        profile.home_id = Some(home.id.clone());
    }

    if let (Some(token), false) = (&global.token, init.plaintext) {
        pulsewire_config::save_token_to_keyring(&name, token)?;
        if !global.quiet {
            eprintln!("Token stored in system keyring");
        }
    }

    cfg.profiles.insert(name.clone(), profile);
    let default_missing = cfg
        .default_profile
        .as_ref()
        .is_none_or(|d| !cfg.profiles.contains_key(d));
    if init.default || default_missing {
        cfg.default_profile = Some(name.clone());
    }
    let path = config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!("Profile '{name}' written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn home(id: &str, realtime: bool) -> Home {
        Home {
            id: id.into(),
            display_name: id.to_uppercase(),
            realtime_capable: realtime,
        }
    }

    #[test]
    fn redaction_masks_plaintext_tokens_only() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                home_id: Some("h-1".into()),
                token: Some("super-secret".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert(
            "cabin".into(),
            Profile {
                token_env: Some("CABIN_TOKEN".into()),
                ..Profile::default()
            },
        );

        let out = format_config_redacted(&cfg);
        assert!(!out.contains("super-secret"));
        assert!(out.contains(MASK));
        assert!(out.contains("CABIN_TOKEN"));
        assert_eq!(redacted(&cfg).profiles["cabin"].token, None);
    }

    #[test]
    fn realtime_home_is_preferred() {
        let homes = vec![home("a", false), home("b", true)];
        assert_eq!(pick_home(&homes).unwrap().id, "b");
        let homes = vec![home("a", false)];
        assert_eq!(pick_home(&homes).unwrap().id, "a");
        assert!(pick_home(&[]).is_none());
    }

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(non_empty("token", "  \n".into()).is_err());
        assert_eq!(non_empty("token", " abc \n".into()).unwrap(), "abc");
    }
}
