pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "roster-import")]
#[command(about = "Imports the student roster feed into the student database")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "roster-import.toml")]
    pub config: String,

    /// Override the feed path from the configuration
    #[arg(long)]
    pub feed: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Parse and validate the feed without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}
