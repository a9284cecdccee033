//! Configuration Loader (Figment-based)
//!
//! Merge order:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/repoprobe/config.toml)
//! 3. Project config (.repoprobe/config.toml)
//! 4. Environment variables (REPOPROBE_* prefix, `__` for nesting)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use tracing::{debug, info};

use super::types::Config;
use crate::types::{ProbeError, Result};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the full resolution chain.
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // REPOPROBE_REASONING__MODE=cli -> reasoning.mode
        figment = figment.merge(Env::prefixed("REPOPROBE_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| ProbeError::Config(format!("configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from one explicit file, on top of defaults only.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ProbeError::Config(format!("configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("repoprobe"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".repoprobe/config.toml")
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".repoprobe")
    }

    /// Create the project config directory with a commented default file.
    pub fn init_project() -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    fn default_project_config() -> &'static str {
        r#"# repoprobe project configuration.
# Values here override global defaults; REPOPROBE_* env vars override both.

[reasoning]
# "api" needs reasoning.api_key (or REPOPROBE_REASONING__API_KEY);
# "cli" needs the reasoning CLI on PATH or reasoning.cli_binary set.
mode = "api"
model = "claude-sonnet-4-20250514"
timeout_secs = 900

[acquisition]
# Byte and wall-clock budgets for the full-history clone attempt.
max_bytes = 2147483648
timeout_secs = 600

[storage]
database_path = "repoprobe.db"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [reasoning]
            mode = "cli"
            model = "claude-opus-4"

            [acquisition]
            timeout_secs = 120
            "#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.reasoning.mode, crate::types::ReasoningMode::Cli);
        assert_eq!(config.reasoning.model, "claude-opus-4");
        assert_eq!(config.acquisition.timeout_secs, 120);
        // Untouched values keep their defaults.
        assert_eq!(
            config.acquisition.max_bytes,
            crate::constants::acquisition::DEFAULT_MAX_BYTES
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[acquisition]\nmax_bytes = 0\n").unwrap();

        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_default_project_config_parses() {
        let parsed: toml::Value =
            toml::from_str(ConfigLoader::default_project_config()).unwrap();
        assert!(parsed.get("reasoning").is_some());
    }
}
