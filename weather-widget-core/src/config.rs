use anyhow::{Context, Result, anyhow};
use chrono::Locale;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::provider::ProviderId;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Widget behaviour and HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Locale for forecast weekday names, e.g. "pt_BR" or "en_US".
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Shown when a search matches no city.
    #[serde(default = "default_no_results_message")]
    pub no_results_message: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Condition text language forwarded to the API, e.g. "pt".
    #[serde(default)]
    pub lang: Option<String>,
}

fn default_locale() -> String {
    "pt_BR".to_string()
}

const fn default_forecast_days() -> u8 {
    7
}

fn default_no_results_message() -> String {
    "Nenhuma cidade encontrada".to_string()
}

fn default_base_url() -> String {
    "https://api.weatherapi.com/v1".to_string()
}

const fn default_timeout() -> u64 {
    10
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            forecast_days: default_forecast_days(),
            no_results_message: default_no_results_message(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            lang: None,
        }
    }
}

impl WidgetConfig {
    pub fn locale(&self) -> Result<Locale> {
        Locale::try_from(self.locale.as_str()).map_err(|_| {
            anyhow!(
                "Unknown locale '{}' in widget config. Use a name like \"pt_BR\" or \"en_US\".",
                self.locale
            )
        })
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "weatherapi".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.weatherapi]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub widget: WidgetConfig,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weather-widget configure <provider>` (e.g. `weather-widget configure weatherapi`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-widget", "weather-widget-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key; the first configured provider becomes the default.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
    }
}
