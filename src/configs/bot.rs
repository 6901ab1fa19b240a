use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    /// Bot token. `TUNEBOT_TOKEN` overrides this at load time.
    #[serde(default)]
    pub token: String,
    /// Deployment label shown by the startup banner, e.g. `main` or `dev`.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Register slash commands on this guild only (instant updates while developing).
    #[serde(default)]
    pub dev_guild_id: Option<crate::common::GuildId>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            environment: default_environment(),
            dev_guild_id: None,
        }
    }
}

fn default_environment() -> String {
    "main".to_string()
}
