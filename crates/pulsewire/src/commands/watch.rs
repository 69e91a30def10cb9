//! `pulsewire watch`: print every update until Ctrl-C.
//!
//! Table output becomes one line per update; structured formats emit one
//! compact document per update (JSON lines, YAML documents).

use chrono::Local;
use futures_util::StreamExt;
use serde::Serialize;

use pulsewire_core::{CanonicalMeasurement, IngestionCoordinator, Snapshot, normalize};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct Update<'a> {
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    measurements: &'a [CanonicalMeasurement],
}

/// `HH:MM:SS  power_total=1200 W  power_l1=400 W`
fn update_line(snapshot: &Snapshot, measurements: &[CanonicalMeasurement], color: bool) -> String {
    let time = snapshot
        .timestamp
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let fields: Vec<String> = measurements
        .iter()
        .map(|m| {
            format!(
                "{}={}",
                output::key_label(&m.key, color),
                util::format_measurement(m)
            )
        })
        .collect();
    format!("{time}  {}", fields.join("  "))
}

fn render_update(
    format: OutputFormat,
    snapshot: &Snapshot,
    raw: bool,
    color: bool,
) -> Result<String, CliError> {
    if raw {
        return match format {
            OutputFormat::Table | OutputFormat::Plain => Ok(snapshot
                .capabilities
                .values()
                .map(|c| format!("{}={}", c.raw_id, util::format_value(&c.value)))
                .collect::<Vec<_>>()
                .join(" ")),
            OutputFormat::Yaml => serde_yaml::to_string(snapshot)
                .map(|doc| format!("---\n{doc}"))
                .map_err(|e| CliError::Render(e.to_string())),
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(snapshot, true),
        };
    }

    let measurements = normalize::project(snapshot);
    match format {
        OutputFormat::Table => Ok(update_line(snapshot, &measurements, color)),
        OutputFormat::Plain => Ok(measurements
            .iter()
            .map(util::plain_measurement)
            .collect::<Vec<_>>()
            .join(" ")),
        OutputFormat::Yaml => serde_yaml::to_string(&Update {
            timestamp: snapshot.timestamp,
            measurements: &measurements,
        })
        .map(|doc| format!("---\n{doc}"))
        .map_err(|e| CliError::Render(e.to_string())),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(
            &Update {
                timestamp: snapshot.timestamp,
                measurements: &measurements,
            },
            true,
        ),
    }
}

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut active = config::active_profile(global)?;
    active.apply_ingest_args(&args.ingest);
    let ingest = active.ingest_config(global)?;
    let first_data_timeout = ingest.first_data_timeout;

    let coordinator = IngestionCoordinator::new(ingest);
    coordinator.start().await?;
    if let Err(e) = coordinator.wait_for_first_data(first_data_timeout).await {
        return Err(util::stop_with(&coordinator, e).await);
    }
    if let Some(mode) = coordinator.mode() {
        tracing::info!(%mode, "watching");
    }

    let color = output::should_color(global.color);
    let result = print_updates(&coordinator, &args, global, color).await;
    coordinator.stop().await;
    result
}

async fn print_updates(
    coordinator: &IngestionCoordinator,
    args: &WatchArgs,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let mut snapshots = coordinator.snapshots();
    let mut states = coordinator.subscribe_state();
    let deadline = args.duration.map(|d| tokio::time::Instant::now() + d);
    let until_deadline = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(until_deadline);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                tracing::info!("interrupted");
                return Ok(());
            }
            () = &mut until_deadline => return Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = states.borrow_and_update().clone();
                tracing::info!(%state, "feed state");
                if state.is_terminal() {
                    return match coordinator.store().failure() {
                        Some(err) => Err(err.into()),
                        None => Ok(()),
                    };
                }
            }
            next = snapshots.next() => {
                let Some(snapshot) = next else {
                    return Ok(());
                };
                if snapshot.is_empty() {
                    continue;
                }
                let line = render_update(global.output, &snapshot, args.ingest.raw, color)?;
                output::print_output(&line, global.quiet);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use pulsewire_core::Capability;

    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
            [
                Capability::new("power", json!(1200)),
                Capability::new("powerPhase1", json!(400)),
                Capability::new("timestamp", json!("2026-05-01T12:00:00Z")),
            ],
        )
    }

    #[test]
    fn plain_update_is_one_line_of_pairs() {
        let line = render_update(OutputFormat::Plain, &snapshot(), false, false).unwrap();
        assert_eq!(line, "power_total=1200W power_l1=400W");
    }

    #[test]
    fn json_update_is_a_single_line() {
        let line = render_update(OutputFormat::Json, &snapshot(), false, false).unwrap();
        assert!(!line.contains('\n'));
        let doc: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(doc["measurements"][0]["key"], "power_total");
    }

    #[test]
    fn raw_update_keeps_vendor_names() {
        let line = render_update(OutputFormat::Table, &snapshot(), true, false).unwrap();
        assert!(line.contains("powerPhase1=400"));
        assert!(line.contains("timestamp=2026-05-01T12:00:00Z"));
    }

    #[test]
    fn table_line_lists_keys_with_units() {
        let line = render_update(OutputFormat::Table, &snapshot(), false, false).unwrap();
        assert!(line.ends_with("power_total=1200 W  power_l1=400 W"));
    }
}
