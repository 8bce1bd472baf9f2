use crate::config::SentinelConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering the built-in defaults, an optional
    /// TOML file, and `SENTINEL_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be parsed or a
    /// value fails to deserialize.
    pub fn load(path: &str) -> Result<SentinelConfig> {
        let config: SentinelConfig = Figment::new()
            .merge(Serialized::defaults(SentinelConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()?;

        Ok(config)
    }
}
