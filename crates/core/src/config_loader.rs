use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering defaults, TOML, environment
    /// variables, and JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration rooted at a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        Self::load_layered(path, None)
    }

    /// Loads application configuration with a specific profile.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::load_layered("config/Config.toml", Some(profile))
    }

    /// Layers `path`, then `Config.{profile}.toml` from the same directory,
    /// then `APP_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or a value has the
    /// wrong type.
    pub fn load_layered(path: &str, profile: Option<&str>) -> Result<AppConfig> {
        let mut figment = Self::base(path);
        if let Some(profile) = profile {
            let dir = Path::new(path).parent().unwrap_or_else(|| Path::new(""));
            figment = figment.merge(Toml::file(dir.join(format!("Config.{profile}.toml"))));
        }

        let config: AppConfig = figment
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()?;

        Ok(config)
    }

    fn base(path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path))
    }
}
