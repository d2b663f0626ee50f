//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::{DEFAULT_DOCUMENT, MatchMode};
use crate::domain::{Generation, PrecacheManifest};

mod cli;

pub use cli::{CliArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quay";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ORIGIN_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_GENERATION: &str = "quay-cache-v1";
const DEFAULT_CONTROL_PREFIX: &str = "/_quay";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub origin: OriginSettings,
    pub cache: CacheSettings,
    pub control: ControlSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct OriginSettings {
    /// Base URL; always ends with `/` so relative entries resolve beneath it.
    pub url: Url,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub generation: Generation,
    pub precache: PrecacheManifest,
    pub excluded_hosts: Vec<String>,
    pub match_mode: MatchMode,
    pub default_document: String,
}

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub prefix: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("QUAY")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cache.precache")
            .with_list_parse_key("cache.excluded_hosts")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_serve_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    origin: RawOriginSettings,
    cache: RawCacheSettings,
    control: RawControlSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.origin_url.as_ref() {
            self.origin.url = Some(url.clone());
        }
        if let Some(seconds) = overrides.origin_connect_timeout_seconds {
            self.origin.connect_timeout_seconds = Some(seconds);
        }
        if let Some(generation) = overrides.cache_generation.as_ref() {
            self.cache.generation = Some(generation.clone());
        }
        if let Some(precache) = overrides.cache_precache.as_ref() {
            self.cache.precache = Some(precache.clone());
        }
        if let Some(hosts) = overrides.cache_excluded_hosts.as_ref() {
            self.cache.excluded_hosts = Some(hosts.clone());
        }
        if let Some(mode) = overrides.cache_match_mode.as_ref() {
            self.cache.match_mode = Some(mode.clone());
        }
        if let Some(document) = overrides.cache_default_document.as_ref() {
            self.cache.default_document = Some(document.clone());
        }
        if let Some(prefix) = overrides.control_prefix.as_ref() {
            self.control.prefix = Some(prefix.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            origin,
            cache,
            control,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            origin: build_origin_settings(origin)?,
            cache: build_cache_settings(cache)?,
            control: build_control_settings(control)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let raw_url = origin
        .url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string());

    let mut url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("origin.url", format!("`{raw_url}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "origin.url",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid("origin.url", "must be a base URL"));
    }
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    let timeout_secs = origin
        .connect_timeout_seconds
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "origin.connect_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(OriginSettings {
        url,
        connect_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let generation = Generation::parse(
        cache
            .generation
            .as_deref()
            .unwrap_or(DEFAULT_GENERATION),
    )
    .map_err(|err| LoadError::invalid("cache.generation", err.to_string()))?;

    let match_mode = match cache.match_mode.as_deref().map(str::trim) {
        None | Some("exact") => MatchMode::Exact,
        Some("suffix") => MatchMode::Suffix,
        Some(other) => {
            return Err(LoadError::invalid(
                "cache.match_mode",
                format!("expected `exact` or `suffix`, got `{other}`"),
            ));
        }
    };

    let default_document = cache
        .default_document
        .map(|value| value.trim().trim_start_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_DOCUMENT.to_string());
    if default_document.is_empty() {
        return Err(LoadError::invalid(
            "cache.default_document",
            "must not be empty",
        ));
    }

    let excluded_hosts = cache
        .excluded_hosts
        .unwrap_or_default()
        .into_iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect();

    Ok(CacheSettings {
        generation,
        precache: PrecacheManifest::new(cache.precache.unwrap_or_default()),
        excluded_hosts,
        match_mode,
        default_document,
    })
}

fn build_control_settings(control: RawControlSettings) -> Result<ControlSettings, LoadError> {
    let prefix = control
        .prefix
        .unwrap_or_else(|| DEFAULT_CONTROL_PREFIX.to_string());
    let prefix = prefix.trim().trim_end_matches('/').to_string();
    if !prefix.starts_with('/') {
        return Err(LoadError::invalid(
            "control.prefix",
            "must start with `/` and name a path below the root",
        ));
    }
    Ok(ControlSettings { prefix })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    url: Option<String>,
    connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    generation: Option<String>,
    precache: Option<Vec<String>>,
    excluded_hosts: Option<Vec<String>>,
    match_mode: Option<String>,
    default_document: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawControlSettings {
    prefix: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
