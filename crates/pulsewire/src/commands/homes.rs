//! `pulsewire homes`: homes visible to the token.

use tabled::Tabled;

use pulsewire_core::Home;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
pub(super) struct HomeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Realtime")]
    realtime: String,
}

pub(super) fn home_row(home: &Home, color: bool) -> HomeRow {
    HomeRow {
        id: home.id.clone(),
        name: home.display_name.clone(),
        realtime: output::flag(home.realtime_capable, color),
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let active = config::active_profile(global)?;
    let client = active.api_client(global)?;

    let homes: Vec<Home> = client
        .list_homes()
        .await?
        .into_iter()
        .map(Home::from)
        .collect();
    tracing::info!(count = homes.len(), "listed homes");

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &homes,
        |h| home_row(h, color),
        |h| h.id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
