//! `pulsewire devices`: data API devices of the selected home.

use tabled::{Table, Tabled, settings::Style};

use pulsewire_core::Device;

use crate::cli::{DevicesArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util::CapabilityRow;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Fields")]
    fields: usize,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            label: d.label.clone(),
            fields: d.capabilities.len(),
        }
    }
}

/// Device label followed by a capability table.
fn device_detail(device: &Device) -> String {
    let header = format!("{} ({})", device.label, device.id);
    if device.capabilities.is_empty() {
        return format!("{header}\n  (no capabilities)");
    }
    let rows: Vec<CapabilityRow> = device.capabilities.iter().map(CapabilityRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    format!("{header}\n{table}")
}

pub async fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let active = config::active_profile(global)?;
    let home_id = active.require_home()?.to_owned();
    let client = active.api_client(global)?;

    let devices: Vec<Device> = client
        .list_devices(&home_id)
        .await?
        .iter()
        .map(|d| Device::from_response(&home_id, d))
        .collect();

    if devices.is_empty() {
        tracing::warn!(home = %home_id, "home has no data API devices");
    }

    // Structured formats always carry capabilities; the flag only expands
    // the table view.
    let out = if args.capabilities && global.output == OutputFormat::Table {
        devices
            .iter()
            .map(device_detail)
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        output::render_list(global.output, &devices, |d| DeviceRow::from(d), |d| {
            d.id.clone()
        })?
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
