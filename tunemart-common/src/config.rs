//! Configuration loading and resolution
//!
//! Every setting follows the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: a warning is logged
//! and the compiled defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Environment variable overriding the backend endpoint
pub const ENDPOINT_ENV: &str = "TUNEMART_ENDPOINT";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TUNEMART_ROOT_FOLDER";

/// Name of the session file stored under the root folder
pub const SESSION_FILE_NAME: &str = "session.json";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file path
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Backend base URL (e.g. `https://api.tunemart.example`)
    pub endpoint: Option<String>,
    /// Path of the GraphQL endpoint relative to `endpoint`
    pub graphql_path: Option<String>,
    /// Path of the token refresh endpoint relative to `endpoint`
    pub refresh_path: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Folder holding the persisted session
    pub root_folder: Option<PathBuf>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load the config file, falling back to defaults on any failure, and
    /// log the outcome immediately
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let (config, source) = Self::locate_and_load(path);
        source.log();
        config
    }

    /// Load the config file without logging
    ///
    /// `None` means "use the platform default location". The returned
    /// [`ConfigSource`] records what happened so the caller can log it once
    /// a subscriber is installed.
    pub fn locate_and_load(path: Option<&Path>) -> (Self, ConfigSource) {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return (Self::default(), ConfigSource::Compiled),
            },
        };

        if !path.exists() {
            return (Self::default(), ConfigSource::NotFound { path, explicit });
        }

        match Self::load(&path) {
            Ok(config) => (config, ConfigSource::Loaded(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Invalid {
                    path,
                    reason: e.to_string(),
                },
            ),
        }
    }
}

/// Where the TOML settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No platform config directory
    Compiled,
    /// No file at `path`. `explicit` is set when the path came from the user.
    NotFound { path: PathBuf, explicit: bool },
    Loaded(PathBuf),
    /// File exists but could not be read or parsed; defaults apply
    Invalid { path: PathBuf, reason: String },
}

impl ConfigSource {
    /// Report the outcome. A missing default file is expected and only
    /// logged at debug level.
    pub fn log(&self) {
        match self {
            ConfigSource::Compiled => {
                debug!("No platform config directory; using compiled defaults")
            }
            ConfigSource::NotFound { path, explicit: true } => {
                warn!("Config file {} not found; using defaults", path.display())
            }
            ConfigSource::NotFound { path, explicit: false } => {
                debug!("No config file at {}; using defaults", path.display())
            }
            ConfigSource::Loaded(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Invalid { path, reason } => {
                warn!("Ignoring config file {}: {}", path.display(), reason)
            }
        }
    }
}

/// Platform config file location: `<config_dir>/tunemart/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunemart").join("config.toml"))
}

/// Compiled fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub endpoint: String,
    pub graphql_path: String,
    pub refresh_path: String,
    pub timeout: Duration,
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("tunemart"))
            .unwrap_or_else(|| PathBuf::from("./tunemart_data"));

        Self {
            endpoint: "http://localhost:4000".to_string(),
            graphql_path: "/graphql".to_string(),
            refresh_path: "/auth/refresh-token".to_string(),
            timeout: Duration::from_secs(30),
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub root_folder: Option<PathBuf>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Validated backend base URL
    pub endpoint: Url,
    pub graphql_path: String,
    pub refresh_path: String,
    pub timeout: Duration,
    pub root_folder: PathBuf,
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Resolve every setting from CLI overrides, environment and TOML
    pub fn resolve(overrides: &ConfigOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let endpoint = resolve_endpoint(overrides.endpoint.as_deref(), toml_config, &defaults);
        let endpoint = parse_endpoint(&endpoint)?;

        let root_folder = resolve_root_folder(overrides.root_folder.as_deref(), toml_config, &defaults);

        let timeout = match toml_config.timeout_secs {
            Some(0) => {
                return Err(Error::Config(
                    "timeout_secs must be greater than zero".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let mut logging = toml_config.logging.clone();
        if logging.level.trim().is_empty() {
            logging.level = defaults.log_level;
        }

        Ok(Self {
            endpoint,
            graphql_path: normalize_path(toml_config.graphql_path.as_deref(), &defaults.graphql_path),
            refresh_path: normalize_path(toml_config.refresh_path.as_deref(), &defaults.refresh_path),
            timeout,
            root_folder,
            logging,
        })
    }

    /// Base URL as configured, without a trailing slash
    pub fn endpoint_str(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }

    /// Full URL of the GraphQL endpoint
    pub fn graphql_url(&self) -> String {
        format!("{}{}", self.endpoint_str(), self.graphql_path)
    }

    /// Full URL of the token refresh endpoint
    pub fn refresh_url(&self) -> String {
        format!("{}{}", self.endpoint_str(), self.refresh_path)
    }

    /// Location of the persisted session
    pub fn session_file(&self) -> PathBuf {
        self.root_folder.join(SESSION_FILE_NAME)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_endpoint(
    cli_arg: Option<&str>,
    toml_config: &TomlConfig,
    defaults: &CompiledDefaults,
) -> String {
    if let Some(endpoint) = cli_arg {
        debug!("Endpoint from command line");
        return endpoint.to_string();
    }
    if let Some(endpoint) = non_empty_env(ENDPOINT_ENV) {
        debug!("Endpoint from {}", ENDPOINT_ENV);
        return endpoint;
    }
    if let Some(endpoint) = &toml_config.endpoint {
        debug!("Endpoint from TOML config");
        return endpoint.clone();
    }
    defaults.endpoint.clone()
}

fn resolve_root_folder(
    cli_arg: Option<&Path>,
    toml_config: &TomlConfig,
    defaults: &CompiledDefaults,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Some(path) = non_empty_env(ROOT_FOLDER_ENV) {
        return PathBuf::from(path);
    }
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }
    defaults.root_folder.clone()
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid endpoint URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "Unsupported endpoint scheme '{}' (expected http or https)",
            other
        ))),
    }
}

fn normalize_path(configured: Option<&str>, default: &str) -> String {
    let path = configured.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(default);
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_adds_leading_slash() {
        assert_eq!(normalize_path(Some("graphql"), "/x"), "/graphql");
        assert_eq!(normalize_path(Some("/gql"), "/x"), "/gql");
        assert_eq!(normalize_path(Some("  "), "/graphql"), "/graphql");
        assert_eq!(normalize_path(None, "/graphql"), "/graphql");
    }

    #[test]
    fn test_parse_endpoint_rejects_non_http() {
        assert!(parse_endpoint("https://api.example.com").is_ok());
        assert!(matches!(
            parse_endpoint("ftp://example.com"),
            Err(Error::Config(_))
        ));
        assert!(matches!(parse_endpoint("not a url"), Err(Error::Config(_))));
    }

    #[test]
    fn test_logging_defaults() {
        let config: TomlConfig = toml::from_str("[logging]\nfile = \"/tmp/x.log\"").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/x.log")));
    }
}
