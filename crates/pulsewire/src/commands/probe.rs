//! `pulsewire probe`: list homes, subscribe to one for a while and report
//! which fields the meter actually sends.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tabled::{Table, settings::Style};

use pulsewire_core::normalize::canonical_token;
use pulsewire_core::{CapabilityTable, Home, IngestionCoordinator, RealtimeMode, listener};

use crate::cli::{GlobalOpts, ProbeArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::homes::{HomeRow, home_row};

/// Which per-phase quantities were observed, by canonical key.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCoverage {
    pub power: Vec<String>,
    pub voltage: Vec<String>,
    pub current: Vec<String>,
}

impl PhaseCoverage {
    /// Classify raw field names through the built-in capability table.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let table = CapabilityTable::builtin();
        let keys: BTreeSet<String> = fields
            .into_iter()
            .filter_map(|f| table.lookup(&canonical_token(f)))
            .map(|spec| spec.key.clone())
            .collect();

        let phases = |quantity: &str| -> Vec<String> {
            (1..=3)
                .map(|n| format!("{quantity}_l{n}"))
                .filter(|k| keys.contains(k))
                .collect()
        };
        Self {
            power: phases("power"),
            voltage: phases("voltage"),
            current: phases("current"),
        }
    }

    /// Voltage or current per phase. Power per phase alone does not count:
    /// every meter reports it.
    pub fn detected(&self) -> bool {
        !self.voltage.is_empty() || !self.current.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    homes: Vec<Home>,
    home_id: Option<String>,
    duration_secs: u64,
    updates: usize,
    fields: Vec<String>,
    phases: PhaseCoverage,
    per_phase_detected: bool,
}

fn report_detail(report: &ProbeReport, color: bool) -> String {
    let homes: Vec<HomeRow> = report.homes.iter().map(|h| home_row(h, color)).collect();
    let table = Table::new(homes).with(Style::rounded()).to_string();

    let Some(ref home_id) = report.home_id else {
        return format!("{table}\nNo home has realtime enabled; probe skipped.");
    };

    let list = |v: &[String]| {
        if v.is_empty() {
            "-".to_owned()
        } else {
            v.join(", ")
        }
    };
    let summary = output::detail_lines(&[
        ("Home", home_id.clone()),
        ("Listened", format!("{}s", report.duration_secs)),
        ("Updates", report.updates.to_string()),
        (
            "Fields",
            format!("({}) {}", report.fields.len(), report.fields.join(", ")),
        ),
        ("Phase power", list(&report.phases.power)),
        ("Phase voltage", list(&report.phases.voltage)),
        ("Phase current", list(&report.phases.current)),
        ("Per-phase", output::flag(report.per_phase_detected, color)),
    ]);
    format!("{table}\n\n{summary}")
}

pub async fn handle(args: ProbeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut active = config::active_profile(global)?;
    let client = active.api_client(global)?;
    let homes: Vec<Home> = client
        .list_homes()
        .await?
        .into_iter()
        .map(Home::from)
        .collect();

    let target = match active.home_id() {
        Some(id) => {
            if !homes.iter().any(|h| h.id == id) {
                return Err(CliError::NotFound {
                    resource_type: "home".into(),
                    identifier: id.to_owned(),
                    list_command: "homes".into(),
                });
            }
            Some(id.to_owned())
        }
        None => homes
            .iter()
            .find(|h| h.realtime_capable)
            .map(|h| h.id.clone()),
    };

    let mut report = ProbeReport {
        homes,
        home_id: target.clone(),
        duration_secs: args.duration.as_secs(),
        updates: 0,
        fields: Vec::new(),
        phases: PhaseCoverage::default(),
        per_phase_detected: false,
    };

    if let Some(home_id) = target {
        active.profile.home_id = Some(home_id);
        active.profile.realtime = Some(RealtimeMode::Always);
        let ingest = active.ingest_config(global)?;

        let coordinator = IngestionCoordinator::new(ingest);
        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        coordinator.add_listener(listener(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }));

        coordinator.start().await?;
        if !global.quiet {
            eprintln!("Listening for {}...", humantime::format_duration(args.duration));
        }
        tokio::select! {
            () = tokio::time::sleep(args.duration) => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        }

        let failure = coordinator.store().failure();
        report.fields = coordinator.known_capabilities();
        report.updates = updates.load(Ordering::Relaxed);
        coordinator.stop().await;

        if let Some(err) = failure.filter(pulsewire_core::CoreError::is_auth) {
            return Err(err.into());
        }
        report.phases = PhaseCoverage::from_fields(report.fields.iter().map(String::as_str));
        report.per_phase_detected = report.phases.detected();
    }

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &report,
        |r| report_detail(r, color),
        |r| r.fields.join("\n"),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
