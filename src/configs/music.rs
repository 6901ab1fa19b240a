use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::RoleId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MusicConfig {
    /// Members holding this role may not control playback.
    #[serde(default)]
    pub dj_blocked_role_id: Option<RoleId>,
    /// Seconds of silence before the bot leaves the voice channel.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds to wait for the gateway to confirm a voice join or leave.
    #[serde(default = "default_voice_connect_timeout_secs")]
    pub voice_connect_timeout_secs: u64,
    #[serde(default = "default_player_volume")]
    pub default_volume: u16,
}

impl MusicConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn voice_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.voice_connect_timeout_secs)
    }
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            dj_blocked_role_id: None,
            idle_timeout_secs: default_idle_timeout_secs(),
            voice_connect_timeout_secs: default_voice_connect_timeout_secs(),
            default_volume: default_player_volume(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_voice_connect_timeout_secs() -> u64 {
    15
}

fn default_player_volume() -> u16 {
    100
}
