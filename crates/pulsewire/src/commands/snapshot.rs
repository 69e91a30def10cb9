//! `pulsewire snapshot`: wait for the first data and print it once.

use pulsewire_core::{Capability, Diagnostics, IngestionCoordinator};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util::{self, CapabilityRow, MeasurementRow};

fn diagnostics_detail(d: &Diagnostics) -> String {
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".into());
    output::detail_lines(&[
        ("Home", d.home_id.clone()),
        ("Device", or_dash(d.device_id.clone())),
        ("Mode", or_dash(d.mode.as_ref().map(ToString::to_string))),
        ("Owns connection", d.owns_connection.to_string()),
        ("State", d.state.to_string()),
        ("Token", d.token.to_owned()),
        ("Last update", or_dash(d.last_update.map(|t| t.to_rfc3339()))),
        ("Listeners", d.listener_count.to_string()),
        ("Last error", or_dash(d.last_error.clone())),
        ("Keys", d.available_keys.join(", ")),
    ])
}

pub async fn handle(args: SnapshotArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut active = config::active_profile(global)?;
    active.apply_ingest_args(&args.ingest);
    let ingest = active.ingest_config(global)?;
    let wait = args.wait.unwrap_or(ingest.first_data_timeout);

    let coordinator = IngestionCoordinator::new(ingest);
    coordinator.start().await?;
    let snapshot = match coordinator.wait_for_first_data(wait).await {
        Ok(snapshot) => snapshot,
        Err(e) => return Err(util::stop_with(&coordinator, e).await),
    };

    let out = if args.diagnostics {
        output::render_single(global.output, &coordinator.diagnostics(), diagnostics_detail, |d| {
            d.state.to_string()
        })
    } else if args.ingest.raw {
        let fields: Vec<Capability> = snapshot.capabilities.values().cloned().collect();
        output::render_list(global.output, &fields, |c| CapabilityRow::from(c), |c| {
            format!("{}={}", c.raw_id, util::format_value(&c.value))
        })
    } else {
        let measurements = coordinator.measurements();
        output::render_list(
            global.output,
            &measurements,
            |m| MeasurementRow::from(m),
            util::plain_measurement,
        )
    };
    coordinator.stop().await;

    output::print_output(&out?, global.quiet);
    Ok(())
}
