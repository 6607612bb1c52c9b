//! Colour themes and the persisted theme choice.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::storage::load_json;
use crate::storage::save_json;
use crate::storage::Storage;
use crate::storage::StorageError;
use crate::storage::THEME_KEY;

pub const DEFAULT_THEME: &str = "blue";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeColors {
    pub primary: &'static str,
    pub secondary: &'static str,
    pub background: &'static str,
    pub surface: &'static str,
    pub text: &'static str,
    pub text_secondary: &'static str,
    pub accent: &'static str,
    pub border: &'static str,
    pub success: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
}

impl ThemeColors {
    /// `(key, value)` pairs in declaration order, keys as used in CSS
    pub fn entries(&self) -> [(&'static str, &'static str); 11] {
        [
            ("primary", self.primary),
            ("secondary", self.secondary),
            ("background", self.background),
            ("surface", self.surface),
            ("text", self.text),
            ("textSecondary", self.text_secondary),
            ("accent", self.accent),
            ("border", self.border),
            ("success", self.success),
            ("warning", self.warning),
            ("error", self.error),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeGradients {
    pub background: &'static str,
    pub header: &'static str,
    pub card: &'static str,
}

impl ThemeGradients {
    pub fn entries(&self) -> [(&'static str, &'static str); 3] {
        [
            ("background", self.background),
            ("header", self.header),
            ("card", self.card),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    pub colors: ThemeColors,
    pub gradients: ThemeGradients,
}

pub static THEMES: [Theme; 5] = [
    Theme {
        id: "blue",
        name: "🌊 Ocean Blue",
        colors: ThemeColors {
            primary: "#3b82f6",
            secondary: "#1e40af",
            background: "#0f172a",
            surface: "rgba(59, 130, 246, 0.1)",
            text: "#ffffff",
            text_secondary: "#94a3b8",
            accent: "#06b6d4",
            border: "rgba(59, 130, 246, 0.2)",
            success: "#10b981",
            warning: "#f59e0b",
            error: "#ef4444",
        },
        gradients: ThemeGradients {
            background: "linear-gradient(135deg, #1e3c72 0%, #2a5298 100%)",
            header: "linear-gradient(90deg, #1e40af 0%, #3b82f6 100%)",
            card: "linear-gradient(145deg, rgba(59, 130, 246, 0.15), rgba(30, 64, 175, 0.1))",
        },
    },
    Theme {
        id: "dark",
        name: "🌙 Dark Night",
        colors: ThemeColors {
            primary: "#6366f1",
            secondary: "#4338ca",
            background: "#0a0a0a",
            surface: "rgba(99, 102, 241, 0.1)",
            text: "#ffffff",
            text_secondary: "#a1a1aa",
            accent: "#8b5cf6",
            border: "rgba(99, 102, 241, 0.2)",
            success: "#22c55e",
            warning: "#eab308",
            error: "#dc2626",
        },
        gradients: ThemeGradients {
            background: "linear-gradient(135deg, #0a0a0a 0%, #1a1a1a 100%)",
            header: "linear-gradient(90deg, #4338ca 0%, #6366f1 100%)",
            card: "linear-gradient(145deg, rgba(99, 102, 241, 0.15), rgba(67, 56, 202, 0.1))",
        },
    },
    Theme {
        id: "purple",
        name: "🔮 Royal Purple",
        colors: ThemeColors {
            primary: "#8b5cf6",
            secondary: "#7c3aed",
            background: "#1a0b2e",
            surface: "rgba(139, 92, 246, 0.1)",
            text: "#ffffff",
            text_secondary: "#c4b5fd",
            accent: "#a855f7",
            border: "rgba(139, 92, 246, 0.2)",
            success: "#34d399",
            warning: "#fbbf24",
            error: "#f87171",
        },
        gradients: ThemeGradients {
            background: "linear-gradient(135deg, #1a0b2e 0%, #16213e 100%)",
            header: "linear-gradient(90deg, #7c3aed 0%, #8b5cf6 100%)",
            card: "linear-gradient(145deg, rgba(139, 92, 246, 0.15), rgba(124, 58, 237, 0.1))",
        },
    },
    Theme {
        id: "green",
        name: "🌿 Nature Green",
        colors: ThemeColors {
            primary: "#10b981",
            secondary: "#059669",
            background: "#0c1f17",
            surface: "rgba(16, 185, 129, 0.1)",
            text: "#ffffff",
            text_secondary: "#86efac",
            accent: "#34d399",
            border: "rgba(16, 185, 129, 0.2)",
            success: "#22c55e",
            warning: "#f59e0b",
            error: "#ef4444",
        },
        gradients: ThemeGradients {
            background: "linear-gradient(135deg, #0c1f17 0%, #1e3a2e 100%)",
            header: "linear-gradient(90deg, #059669 0%, #10b981 100%)",
            card: "linear-gradient(145deg, rgba(16, 185, 129, 0.15), rgba(5, 150, 105, 0.1))",
        },
    },
    Theme {
        id: "orange",
        name: "🔥 Sunset Orange",
        colors: ThemeColors {
            primary: "#f97316",
            secondary: "#ea580c",
            background: "#1c1917",
            surface: "rgba(249, 115, 22, 0.1)",
            text: "#ffffff",
            text_secondary: "#fdba74",
            accent: "#fb923c",
            border: "rgba(249, 115, 22, 0.2)",
            success: "#65a30d",
            warning: "#eab308",
            error: "#dc2626",
        },
        gradients: ThemeGradients {
            background: "linear-gradient(135deg, #1c1917 0%, #431407 100%)",
            header: "linear-gradient(90deg, #ea580c 0%, #f97316 100%)",
            card: "linear-gradient(145deg, rgba(249, 115, 22, 0.15), rgba(234, 88, 12, 0.1))",
        },
    },
];

pub fn theme_by_id(id: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|t| t.id == id)
}

fn default_theme() -> &'static Theme {
    &THEMES[0]
}

/// Render a theme as CSS custom properties, one per line
pub fn css_variables(theme: &Theme) -> String {
    let colors = theme
        .colors
        .entries()
        .into_iter()
        .map(|(key, value)| format!("--theme-{}: {};", key, value));
    let gradients = theme
        .gradients
        .entries()
        .into_iter()
        .map(|(key, value)| format!("--theme-gradient-{}: {};", key, value));
    colors.chain(gradients).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("unknown theme '{0}'")]
    Unknown(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The current theme, backed by storage
pub struct ThemeStore {
    storage: Arc<dyn Storage>,
    current: &'static Theme,
}

impl ThemeStore {
    pub fn load(storage: Arc<dyn Storage>) -> Result<Self, ThemeError> {
        let saved: Option<String> = load_json(storage.as_ref(), THEME_KEY)?;
        let current = match saved.as_deref().map(|id| (id, theme_by_id(id))) {
            Some((_, Some(theme))) => theme,
            Some((id, None)) => {
                warn!("Saved theme '{}' is unknown, using {}", id, DEFAULT_THEME);
                default_theme()
            }
            None => default_theme(),
        };
        Ok(Self { storage, current })
    }

    pub fn current(&self) -> &'static Theme {
        self.current
    }

    pub fn set_theme(&mut self, id: &str) -> Result<&'static Theme, ThemeError> {
        let theme = theme_by_id(id).ok_or_else(|| ThemeError::Unknown(id.to_string()))?;
        save_json(self.storage.as_ref(), THEME_KEY, theme.id)?;
        self.current = theme;
        info!("Theme set to {}", theme.name);
        Ok(theme)
    }
}
