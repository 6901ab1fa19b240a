//! Slash commands: their registration payload, the invocation context and
//! the music command handlers.

pub mod music;
pub mod stats;

use serde_json::{Value, json};

use crate::common::{ChannelId, GuildId, RoleId, UserId};

pub use music::MusicCommands;

/// STRING option type.
const OPTION_STRING: u8 = 3;

/// Text sent back to the invoking member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Who invoked a command and where.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    pub roles: Vec<RoleId>,
    /// The member's current voice channel, if they are in one.
    pub voice_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    Skip,
    Pause,
    Resume,
    Queue,
    Stop,
    NodeStats,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Play,
        Command::Skip,
        Command::Pause,
        Command::Resume,
        Command::Queue,
        Command::Stop,
        Command::NodeStats,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Play => "play",
            Command::Skip => "skip",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Queue => "queue",
            Command::Stop => "stop",
            Command::NodeStats => "lavalinkstats",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Command::Play => "Queue music from YouTube or YouTube Music",
            Command::Skip => "Skip the currently playing track",
            Command::Pause => "Pause the current track",
            Command::Resume => "Resume playback if paused",
            Command::Queue => "Show the current music queue",
            Command::Stop => "Stop playback and clear the queue",
            Command::NodeStats => "Show Lavalink node statistics",
        }
    }

    fn definition(self) -> Value {
        let mut definition = json!({
            "name": self.name(),
            "description": self.description(),
            "type": 1,
        });
        if self == Command::Play {
            definition["options"] = json!([{
                "name": "query",
                "description": "YouTube or YouTube Music link, or search terms",
                "type": OPTION_STRING,
                "required": true,
            }]);
        }
        definition
    }
}

/// Body for the bulk-overwrite commands route.
pub fn command_definitions() -> Value {
    Value::Array(Command::ALL.into_iter().map(Command::definition).collect())
}
