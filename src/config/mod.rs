pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "geo-sentinel")]
#[command(about = "Geophysical and space-weather command center")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "geo-sentinel.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Poll every feed once, export and exit
    #[arg(long)]
    pub once: bool,

    /// Faster seismic polling with time-series and frequency tracking
    #[arg(long)]
    pub advanced: bool,

    /// Replay USGS events from this day (YYYY-MM-DD)
    #[arg(long)]
    pub playback_start: Option<NaiveDate>,

    /// Last replayed day, inclusive (defaults to the start day)
    #[arg(long, requires = "playback_start")]
    pub playback_end: Option<NaiveDate>,

    /// Print the situation report after the run
    #[arg(long)]
    pub sitrep: bool,

    /// Override output directory from config
    #[arg(long)]
    pub output_path: Option<String>,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Dry run - show the resolved configuration without polling
    #[arg(long)]
    pub dry_run: bool,
}
