use serde::{Deserialize, Serialize};

use crate::{
    common::{ApplicationId, ChannelId, GuildId, InteractionId, RoleId, UserId},
    music::{VoiceServerEvent, VoiceStateEvent},
};

// Gateway opcodes
pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_VOICE_STATE_UPDATE: u8 = 4;
pub const OP_RESUME: u8 = 6;
pub const OP_RECONNECT: u8 = 7;
pub const OP_INVALID_SESSION: u8 = 9;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

/// Intents: GUILDS (1<<0) + GUILD_VOICE_STATES (1<<7)
pub const INTENTS: u64 = 129;

#[derive(Debug, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Option<serde_json::Value>,
    pub s: Option<u64>,
    pub t: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayCommand {
    pub op: u8,
    pub d: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct HelloData {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReadyData {
    pub session_id: String,
    pub resume_gateway_url: String,
    pub user: User,
    pub application: ReadyApplication,
}

#[derive(Debug, Deserialize)]
pub struct ReadyApplication {
    pub id: ApplicationId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceStateData {
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    pub session_id: String,
}

impl VoiceStateData {
    /// `None` for voice states outside a guild. `guild_id` is also missing
    /// inside GUILD_CREATE, where the caller supplies it.
    pub fn to_event(&self, guild_id: Option<GuildId>) -> Option<VoiceStateEvent> {
        Some(VoiceStateEvent {
            guild_id: self.guild_id.or(guild_id)?,
            user_id: self.user_id,
            channel_id: self.channel_id,
            session_id: self.session_id.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceServerData {
    pub guild_id: GuildId,
    pub token: String,
    pub endpoint: Option<String>,
}

impl From<VoiceServerData> for VoiceServerEvent {
    fn from(data: VoiceServerData) -> Self {
        Self {
            guild_id: data.guild_id,
            token: data.token,
            endpoint: data.endpoint,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuildCreateData {
    pub id: GuildId,
    #[serde(default)]
    pub voice_states: Vec<VoiceStateData>,
}

pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub application_id: ApplicationId,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub member: Option<Member>,
    /// Set instead of `member` in DMs.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl Interaction {
    pub fn user_id(&self) -> Option<UserId> {
        self.member
            .as_ref()
            .map(|m| m.user.id)
            .or_else(|| self.user.as_ref().map(|u| u.id))
    }

    pub fn roles(&self) -> &[RoleId] {
        self.member.as_ref().map(|m| m.roles.as_slice()).unwrap_or(&[])
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.name.as_str())
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.data
            .as_ref()?
            .options
            .iter()
            .find(|o| o.name == name)?
            .value
            .as_ref()?
            .as_str()
    }
}
