use std::path::PathBuf;

use clap::{Args, Parser, builder::BoolishValueParser};

/// Command-line arguments for the quay binary.
#[derive(Debug, Parser)]
#[command(
    name = "quay",
    version,
    about = "Cache-first resource intermediary with versioned cache generations"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUAY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the origin that misses are fetched from.
    #[arg(long = "origin-url", value_name = "URL")]
    pub origin_url: Option<String>,

    /// Override the origin connect timeout.
    #[arg(long = "origin-connect-timeout-seconds", value_name = "SECONDS")]
    pub origin_connect_timeout_seconds: Option<u64>,

    /// Override the current cache generation name.
    #[arg(long = "cache-generation", value_name = "NAME")]
    pub cache_generation: Option<String>,

    /// Replace the precache manifest (comma separated).
    #[arg(long = "cache-precache", value_name = "PATHS", value_delimiter = ',')]
    pub cache_precache: Option<Vec<String>>,

    /// Replace the excluded hosts (comma separated).
    #[arg(long = "cache-excluded-hosts", value_name = "HOSTS", value_delimiter = ',')]
    pub cache_excluded_hosts: Option<Vec<String>>,

    /// Override the cacheability match mode (exact|suffix).
    #[arg(long = "cache-match-mode", value_name = "MODE")]
    pub cache_match_mode: Option<String>,

    /// Override the document served for the scope root.
    #[arg(long = "cache-default-document", value_name = "FILE")]
    pub cache_default_document: Option<String>,

    /// Override the control endpoint prefix.
    #[arg(long = "control-prefix", value_name = "PATH")]
    pub control_prefix: Option<String>,
}
