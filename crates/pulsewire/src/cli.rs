//! Clap derive structures for the `pulsewire` CLI.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pulsewire -- realtime electricity meter telemetry from Tibber
#[derive(Debug, Parser)]
#[command(
    name = "pulsewire",
    version,
    about = "Stream and inspect Tibber meter telemetry",
    long_about = "Reads live measurements for a Tibber home.\n\n\
        Uses the realtime subscription when the home supports it and falls\n\
        back to polling otherwise. Field names are normalized to canonical\n\
        sensor keys (power_total, power_l1, energy_total, ...).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "PULSEWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API token (overrides profile, keyring and environment)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Home ID (overrides profile)
    #[arg(long, env = "PULSEWIRE_HOME", global = true)]
    pub home: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PULSEWIRE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PULSEWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List homes visible to the token
    #[command(alias = "h")]
    Homes,

    /// List devices of a home
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Wait for the first snapshot and print normalized measurements
    #[command(alias = "snap", alias = "s")]
    Snapshot(SnapshotArgs),

    /// Print normalized measurements on every update until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Subscribe for a while and report every field the meter sends
    Probe(ProbeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Ingestion arguments ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RealtimeArg {
    /// Ask the service whether the home streams realtime data
    Auto,
    /// Subscribe without asking
    Always,
    /// Poll only
    Never,
}

/// Options shared by commands that run an ingestion coordinator.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Data API device to poll (overrides profile)
    #[arg(long)]
    pub device: Option<String>,

    /// Realtime selection (overrides profile)
    #[arg(long)]
    pub realtime: Option<RealtimeArg>,

    /// Show raw provider fields instead of normalized measurements
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Include each device's current capability values
    #[arg(long, short = 'c')]
    pub capabilities: bool,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,

    /// How long to wait for the first data (e.g. 90s, 2m)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub wait: Option<Duration>,

    /// Print coordinator diagnostics instead of measurements
    #[arg(long)]
    pub diagnostics: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub ingest: IngestArgs,

    /// Stop after this long instead of waiting for Ctrl-C
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// How long to listen (e.g. 30s, 2m)
    #[arg(long, short = 'd', default_value = "30s", value_parser = humantime::parse_duration)]
    pub duration: Duration,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the configuration (tokens redacted)
    Show,

    /// Print the config file path
    Path,

    /// Write a profile for a home
    Init(ConfigInitArgs),

    /// Store a token in the system keyring for the active profile
    SetToken {
        /// Token value (read from stdin when omitted)
        token: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Home ID for the profile (defaults to --home, then the first
    /// realtime-capable home visible to the token)
    #[arg(long = "home-id")]
    pub home_id: Option<String>,

    /// Data API device to poll when realtime is unavailable
    #[arg(long)]
    pub device: Option<String>,

    /// Environment variable holding the token
    #[arg(long)]
    pub token_env: Option<String>,

    /// Write --token into the config file instead of the keyring
    #[arg(long)]
    pub plaintext: bool,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,

    /// Overwrite an existing profile
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
