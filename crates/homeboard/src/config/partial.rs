use std::collections::HashMap;
use std::path::PathBuf;

use homeboard_config::Diagnostic;
use homeboard_config::FirstWins;
use homeboard_config::PartialFile;
use homeboard_config::SourceInfo;
use homeboard_config::SourceSpan;
use homeboard_config::Warning;
use serde::Deserialize;
use toml::Spanned;

use super::LogLevel;

/// One config file as written, every field optional
#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub hub: Option<PartialHubConfig>,
    pub storage: Option<PartialStorageConfig>,
    pub sync: Option<PartialSyncConfig>,
    pub api: Option<PartialApiConfig>,

    /// Source information for error reporting (not serialized)
    #[serde(skip)]
    pub source: Option<SourceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, Spanned<LogLevel>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialHubConfig {
    pub url: Option<Spanned<String>>,
    pub token: Option<Spanned<String>>,
    pub timeout_secs: Option<Spanned<u64>>,
    pub demo: Option<Spanned<bool>>,
    pub demo_fallback: Option<Spanned<bool>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialStorageConfig {
    pub path: Option<Spanned<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialSyncConfig {
    pub interval_secs: Option<Spanned<u64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialApiConfig {
    pub listen: Option<Spanned<String>>,
    pub port: Option<Spanned<u16>>,
}

impl PartialFile for PartialConfig {
    fn imports(&self) -> &[String] {
        &self.imports
    }

    fn attach_source(&mut self, source: SourceInfo) {
        self.source = Some(source);
    }

    fn is_empty(&self) -> bool {
        self.imports.is_empty()
            && self.logging.is_none()
            && self.hub.is_none()
            && self.storage.is_none()
            && self.sync.is_none()
            && self.api.is_none()
    }
}

/// Every scalar after first-wins merging
#[derive(Debug, Default)]
pub struct MergedConfig {
    pub log_level: Option<LogLevel>,
    pub log_overrides: HashMap<String, LogLevel>,
    pub hub_url: Option<String>,
    pub hub_token: Option<String>,
    pub hub_timeout_secs: Option<u64>,
    pub hub_demo: Option<bool>,
    pub hub_demo_fallback: Option<bool>,
    pub storage_path: Option<String>,
    pub sync_interval_secs: Option<u64>,
    pub api_listen: Option<String>,
    pub api_port: Option<u16>,
}

/// Merge files in load order. The first file to set a field wins; later
/// definitions are reported as conflicts.
///
/// Returns the merged values and the merger, which still knows where each
/// field was defined.
pub fn merge<I>(configs: I) -> (MergedConfig, FirstWins)
where
    I: IntoIterator<Item = PartialConfig>,
{
    let mut merged = MergedConfig::default();
    let mut merger = FirstWins::new();

    for config in configs {
        let source = config.source.clone().unwrap_or_else(|| SourceInfo {
            file_path: PathBuf::from("<unknown>"),
            content: String::new(),
        });
        if config.is_empty() {
            merger.empty_file(source.file_path.clone());
        }

        macro_rules! claim {
            ($field:expr, $what:expr, $slot:expr, $spanned:expr) => {{
                let spanned = $spanned;
                let at = SourceSpan::new(&source, spanned.span());
                merger.claim($field, $what, $slot, spanned.into_inner(), at);
            }};
        }

        if let Some(logging) = config.logging {
            if let Some(level) = logging.level {
                claim!("logging.level", "Logging level", &mut merged.log_level, level);
            }
            for (target, level) in logging.overrides.unwrap_or_default() {
                let field = format!("logging.overrides.{}", target);
                let what = format!("Logging override for '{}'", target);
                let mut slot = None;
                claim!(&field, &what, &mut slot, level);
                if let Some(level) = slot {
                    merged.log_overrides.insert(target, level);
                }
            }
        }

        if let Some(hub) = config.hub {
            if let Some(url) = hub.url {
                claim!("hub.url", "Hub URL", &mut merged.hub_url, url);
            }
            if let Some(token) = hub.token {
                claim!("hub.token", "Hub token", &mut merged.hub_token, token);
            }
            if let Some(timeout) = hub.timeout_secs {
                claim!("hub.timeout_secs", "Hub timeout", &mut merged.hub_timeout_secs, timeout);
            }
            if let Some(demo) = hub.demo {
                claim!("hub.demo", "Demo mode", &mut merged.hub_demo, demo);
            }
            if let Some(fallback) = hub.demo_fallback {
                claim!(
                    "hub.demo_fallback",
                    "Demo fallback",
                    &mut merged.hub_demo_fallback,
                    fallback
                );
            }
        }

        if let Some(path) = config.storage.and_then(|s| s.path) {
            claim!("storage.path", "Storage path", &mut merged.storage_path, path);
        }

        if let Some(interval) = config.sync.and_then(|s| s.interval_secs) {
            claim!(
                "sync.interval_secs",
                "Sync interval",
                &mut merged.sync_interval_secs,
                interval
            );
        }

        if let Some(api) = config.api {
            if let Some(listen) = api.listen {
                claim!("api.listen", "API listen address", &mut merged.api_listen, listen);
            }
            if let Some(port) = api.port {
                claim!("api.port", "API port", &mut merged.api_port, port);
            }
        }
    }

    (merged, merger)
}

/// Warn about a hub token written into a config file
pub fn plaintext_token_warning(merger: &FirstWins) -> Option<Diagnostic> {
    merger.location("hub.token").map(|at| {
        Diagnostic::Warning(Warning::PlaintextSecret {
            field_path: "hub.token".to_string(),
            hint: "set the HA_TOKEN environment variable instead".to_string(),
            at: at.clone(),
        })
    })
}
