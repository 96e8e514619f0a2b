use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::path::Path;

use super::Settings;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub struct ShardrunConfig {
    figment: Figment,
}

impl ShardrunConfig {
    /// Load the merged configuration
    ///
    /// Priority, lowest first:
    /// 1. embedded defaults
    /// 2. `~/.config/shardrun/config.toml`
    /// 3. `./shardrun.toml`
    /// 4. `custom_config`, format chosen by extension
    /// 5. `SHARDRUN_` environment variables, `__` separating sections
    pub fn load(custom_config: Option<&str>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG))
            .merge(Toml::file(Self::user_config_path()))
            .merge(Toml::file("shardrun.toml"));

        if let Some(custom_path) = custom_config {
            if !Path::new(custom_path).exists() {
                bail!("Config file not found: {custom_path}");
            }
            tracing::trace!("CONFIG LOAD: Merging {}", custom_path);
            figment = match Path::new(custom_path).extension().and_then(|e| e.to_str()) {
                Some("json") => figment.merge(Json::file(custom_path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(custom_path)),
                _ => figment.merge(Toml::file(custom_path)),
            };
        }

        // Environment variables always have highest priority
        figment = figment.merge(Env::prefixed("SHARDRUN_").split("__"));

        Ok(ShardrunConfig { figment })
    }

    /// Extract the typed settings
    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .context("Invalid shardrun configuration")
    }

    /// Get a nested object/section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        let value = self.figment.extract_inner(path)?;
        Ok(value)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        let value = self.figment.extract()?;
        Ok(value)
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/shardrun/config.toml"),
            Err(_) => "~/.config/shardrun/config.toml".to_string(),
        }
    }
}
