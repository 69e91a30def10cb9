//! Command handlers.

pub mod config_cmd;
pub mod devices;
pub mod homes;
pub mod probe;
pub mod snapshot;
pub mod watch;

mod util;

use clap::CommandFactory;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    tracing::debug!(command = ?cmd, "dispatching command");
    match cmd {
        Command::Homes => homes::handle(global).await,
        Command::Devices(args) => devices::handle(args, global).await,
        Command::Snapshot(args) => snapshot::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Probe(args) => probe::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global).await,
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "pulsewire",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
