use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(
    name = "folio",
    version,
    about = "Daily profile aggregation service for a portfolio site"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service and, when enabled, the cron worker.
    Serve(Box<ServeArgs>),
    /// Run the profile update once and print the outcome as JSON.
    Refresh(RefreshArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the runtime environment (development|production).
    #[arg(long = "environment", value_name = "ENV")]
    pub environment: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the key-value store REST endpoint.
    #[arg(long = "kv-url", value_name = "URL")]
    pub kv_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub runtime: RuntimeOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Toggle the in-process cron worker.
    #[arg(
        long = "cron-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cron_enabled: Option<bool>,

    /// Override the cron expression (seconds field first).
    #[arg(long = "cron-schedule", value_name = "EXPR")]
    pub cron_schedule: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Pretty-print the JSON outcome.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub pretty: bool,
}
