use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use homeboard_config::load_with_imports;
use homeboard_config::Diagnostic;
use homeboard_config::Diagnostics;
use homeboard_config::Error;
use homeboard_config::FirstWins;
use homeboard_config::SourceInfo;
use homeboard_config::ValidationError;
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use super::partial::merge;
use super::partial::plaintext_token_warning;
use super::partial::MergedConfig;
use super::partial::PartialConfig;

/// Environment variable the hub token is read from when the config has none
pub const TOKEN_ENV: &str = "HA_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_STORAGE_PATH: &str = "./homeboard-data";
const DEFAULT_LISTEN: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8566;

#[derive(Debug, Default, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub hub: HubConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub api: ApiConfig,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"homeboard::hub" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Base URL of the hub's REST API; required unless `demo` is set
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Serve the built-in demo house instead of talking to a hub
    pub demo: bool,
    /// Switch to the demo house when the hub can't be reached
    pub demo_fallback: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            demo: false,
            demo_fallback: false,
        }
    }
}

impl HubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured token, else `$HA_TOKEN`
    pub fn resolve_token(&self) -> Option<String> {
        self.resolve_token_with(std::env::var(TOKEN_ENV).ok())
    }

    fn resolve_token_with(&self, from_env: Option<String>) -> Option<String> {
        self.token
            .clone()
            .or(from_env)
            .filter(|token| !token.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON file per stored key
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORAGE_PATH),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Configuration for running against the built-in demo house only
    pub fn demo() -> Self {
        let mut config = Config::default();
        config.hub.demo = true;
        config
    }

    /// Load configuration from one or more TOML files.
    ///
    /// Imports are resolved, files are merged first-wins and the result is
    /// validated. Every problem found is collected: `Ok` carries any warnings,
    /// `Err` carries all errors and warnings together.
    pub fn from_files(paths: &[PathBuf]) -> Result<(Self, Diagnostics), Diagnostics> {
        let configs: Vec<PartialConfig> = load_with_imports(paths)
            .map_err(|e| Diagnostics(vec![Diagnostic::Error(Error::Load(e))]))?;

        let (merged, merger) = merge(configs);
        Self::from_merged(merged, merger)
    }

    fn from_merged(
        merged: MergedConfig,
        merger: FirstWins,
    ) -> Result<(Self, Diagnostics), Diagnostics> {
        let mut errors = Vec::new();

        // Errors pointing at where a field was defined, when it was
        let invalid = |field: &str, message: String| {
            let location = merger.location(field);
            Diagnostic::Error(Error::Validation(ValidationError {
                field_path: field.to_string(),
                message,
                span: location.map(|at| at.span.clone()),
                source: location.map(|at| SourceInfo {
                    file_path: at.file_path.clone(),
                    content: at.content.clone(),
                }),
            }))
        };

        let hub = HubConfig {
            url: merged.hub_url,
            token: merged.hub_token,
            timeout_secs: merged.hub_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            demo: merged.hub_demo.unwrap_or(false),
            demo_fallback: merged.hub_demo_fallback.unwrap_or(false),
        };
        match &hub.url {
            None if !hub.demo => errors.push(Diagnostic::Error(Error::Validation(
                ValidationError::detached("hub.url", "hub.url is required unless hub.demo = true"),
            ))),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                errors.push(invalid(
                    "hub.url",
                    format!("'{}' must start with http:// or https://", url),
                ));
            }
            _ => {}
        }
        if hub.timeout_secs == 0 {
            errors.push(invalid(
                "hub.timeout_secs",
                "timeout must be greater than 0".to_string(),
            ));
        }

        let sync = SyncConfig {
            interval_secs: merged
                .sync_interval_secs
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
        };
        if sync.interval_secs == 0 {
            errors.push(invalid(
                "sync.interval_secs",
                "interval must be greater than 0".to_string(),
            ));
        }

        let api = ApiConfig {
            listen: merged
                .api_listen
                .unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            port: merged.api_port.unwrap_or(DEFAULT_PORT),
        };
        if api.listen.parse::<IpAddr>().is_err() {
            errors.push(invalid(
                "api.listen",
                format!("'{}' is not an IP address", api.listen),
            ));
        }

        let config = Config {
            logging: LoggingConfig {
                level: merged.log_level.unwrap_or_default(),
                overrides: merged.log_overrides,
            },
            hub,
            storage: merged
                .storage_path
                .map(|path| StorageConfig {
                    path: PathBuf::from(path),
                })
                .unwrap_or_default(),
            sync,
            api,
        };

        let token_warning = plaintext_token_warning(&merger);
        let mut diagnostics = merger.into_diagnostics();
        diagnostics.extend(token_warning);
        diagnostics.extend(errors);

        let diagnostics = Diagnostics(diagnostics);
        if diagnostics.has_errors() {
            Err(diagnostics)
        } else {
            Ok((config, diagnostics))
        }
    }
}
