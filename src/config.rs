use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::RemoteConfig;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Environment variables that override the remote section at load time
pub const ENV_ENDPOINT: &str = "TASKFLOW_ENDPOINT";
pub const ENV_PROJECT_ID: &str = "TASKFLOW_PROJECT_ID";
pub const ENV_PUBLIC_KEY: &str = "TASKFLOW_PUBLIC_KEY";
pub const ENV_SESSION_TOKEN: &str = "TASKFLOW_SESSION_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Key-value slot in a local SQLite file
    #[default]
    Local,
    /// Hosted record API
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendKind,
    /// Empty means the profile's data directory
    #[serde(default)]
    pub database_path: String,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
    #[serde(default)]
    pub themes: HashMap<String, Theme>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_new")]
    pub new: String,
    #[serde(default = "default_edit")]
    pub edit: String,
    #[serde(default = "default_save")]
    pub save: String,
    #[serde(default = "default_delete")]
    pub delete: String,
    #[serde(default = "default_search")]
    pub search: String,
    #[serde(default = "default_toggle_status")]
    pub toggle_status: String,
    #[serde(default = "default_filter_next")]
    pub filter_next: String,
    #[serde(default = "default_filter_prev")]
    pub filter_prev: String,
    #[serde(default = "default_list_up")]
    pub list_up: String,
    #[serde(default = "default_list_down")]
    pub list_down: String,
    #[serde(default = "default_toggle_theme")]
    pub toggle_theme: String,
    #[serde(default = "default_reload")]
    pub reload: String,
    #[serde(default = "default_help")]
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    /// Empty means derived from `highlight_bg`
    #[serde(default = "default_highlight_fg")]
    pub highlight_fg: String,
    #[serde(default = "default_accent")]
    pub accent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            database_path: String::new(),
            remote: RemoteConfig::default(),
            key_bindings: KeyBindings::default(),
            current_theme: default_current_theme(),
            themes: HashMap::new(),
            log_level: default_log_level(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: default_quit(),
            new: default_new(),
            edit: default_edit(),
            save: default_save(),
            delete: default_delete(),
            search: default_search(),
            toggle_status: default_toggle_status(),
            filter_next: default_filter_next(),
            filter_prev: default_filter_prev(),
            list_up: default_list_up(),
            list_down: default_list_down(),
            toggle_theme: default_toggle_theme(),
            reload: default_reload(),
            help: default_help(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            highlight_fg: default_highlight_fg(),
            accent: default_accent(),
        }
    }
}

impl Theme {
    /// Preset themes that are always available
    pub fn get_preset_themes() -> HashMap<String, Theme> {
        let mut themes = HashMap::new();

        themes.insert("default".to_string(), Theme::default());

        themes.insert("dark".to_string(), Theme {
            fg: "white".to_string(),
            bg: "#0f172a".to_string(),
            highlight_bg: "#6366f1".to_string(),
            highlight_fg: String::new(),
            accent: "cyan".to_string(),
        });

        themes.insert("light".to_string(), Theme {
            fg: "black".to_string(),
            bg: "white".to_string(),
            highlight_bg: "#4f46e5".to_string(),
            highlight_fg: String::new(),
            accent: "blue".to_string(),
        });

        themes
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_new() -> String {
    "n".to_string()
}

fn default_edit() -> String {
    "e".to_string()
}

fn default_save() -> String {
    "Ctrl+s".to_string()
}

fn default_delete() -> String {
    "d".to_string()
}

fn default_search() -> String {
    "/".to_string()
}

fn default_toggle_status() -> String {
    "Space".to_string()
}

fn default_filter_next() -> String {
    "f".to_string()
}

fn default_filter_prev() -> String {
    "F".to_string()
}

fn default_list_up() -> String {
    "k".to_string()
}

fn default_list_down() -> String {
    "j".to_string()
}

fn default_toggle_theme() -> String {
    "t".to_string()
}

fn default_reload() -> String {
    "r".to_string()
}

fn default_help() -> String {
    "F1".to_string()
}

fn default_current_theme() -> String {
    "default".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_highlight_fg() -> String {
    "white".to_string()
}

fn default_accent() -> String {
    "magenta".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration for `profile`, creating the default file if missing.
    /// Environment overrides are applied afterwards.
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from_path(&config_path, profile)
    }

    /// Load configuration from an explicit file, creating it with defaults if missing
    pub fn load_from_path(config_path: &Path, profile: utils::Profile) -> Result<Self, ConfigError> {
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            toml::from_str::<Config>(&contents)?
        } else {
            let mut config = Config::default();
            config.save_to_path(config_path)?;
            tracing::info!(path = %config_path.display(), "wrote default config");
            config
        };

        if config.database_path.trim().is_empty() {
            config.database_path = Self::default_database_path_for_profile(profile);
        }
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Replace remote settings with any values `lookup` provides
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.remote.endpoint = endpoint;
        }
        if let Some(project_id) = non_empty(ENV_PROJECT_ID) {
            self.remote.project_id = project_id;
        }
        if let Some(public_key) = non_empty(ENV_PUBLIC_KEY) {
            self.remote.public_key = public_key;
        }
        if let Some(token) = non_empty(ENV_SESSION_TOKEN) {
            self.remote.session_token = Some(token);
        }
    }

    /// Save configuration to `config_path`, creating parent directories
    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        match utils::get_data_dir(profile) {
            Some(data_dir) => data_dir.join("taskflow.db").to_string_lossy().to_string(),
            None => format!("~/.local/share/{}/taskflow.db", profile.app_name()),
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Get the currently active theme.
    /// An empty `highlight_fg` is calculated from `highlight_bg`.
    pub fn get_active_theme(&self) -> Theme {
        self.resolve_theme(&self.current_theme)
    }

    /// Look up a theme by name (user-defined first), falling back to the default preset
    pub fn resolve_theme(&self, name: &str) -> Theme {
        use crate::tui::widgets::color::{format_color_for_display, get_contrast_text_color, parse_color};

        let presets = Theme::get_preset_themes();
        let mut theme = self
            .themes
            .get(name)
            .or_else(|| presets.get(name))
            .cloned()
            .unwrap_or_default();

        if theme.highlight_fg.is_empty() {
            let highlight_bg_color = parse_color(&theme.highlight_bg);
            let calculated_fg = get_contrast_text_color(highlight_bg_color);
            theme.highlight_fg = format_color_for_display(&calculated_fg);
        }

        theme
    }
}
