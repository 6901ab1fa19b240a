use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

const TOKEN_ENV: &str = "TUNEBOT_TOKEN";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    /// Music is disabled when this section is absent.
    #[serde(default)]
    pub lavalink: Option<LavalinkConfig>,
    #[serde(default)]
    pub music: MusicConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        let mut config = Self::parse(&config_str)?;

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            config.bot.token = token;
        }
        if config.bot.token.is_empty() {
            return Err(format!("no bot token in {} and {} is unset", config_path, TOKEN_ENV).into());
        }

        Ok(config)
    }

    pub fn parse(raw: &str) -> AnyResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn music_available(&self) -> bool {
        self.lavalink.is_some()
    }
}
