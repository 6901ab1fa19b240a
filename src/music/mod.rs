//! Per-guild music sessions: voice connection lifecycle, idle disconnects and
//! the glue between gateway/node events and session state.

pub mod bridge;
pub mod handshake;
pub mod idle;
pub mod registry;
pub mod search;
pub mod session;
pub mod waiter;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    common::{ChannelId, GuildId, MusicResult, UserId},
    protocol::{LoadResult, Stats, Track, TrackEndReason},
};

pub use bridge::NodeEventBridge;
pub use handshake::VoiceHandshake;
pub use idle::{IdlePhase, IdleTimer};
pub use registry::SessionRegistry;
pub use search::{load_tracks, normalize_query};
pub use session::{GuildSession, SessionState};
pub use waiter::{Waiter, Waiters};

/// Outbound half of the chat gateway as seen by the music subsystem.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// The bot's own user id, `None` until the gateway reported READY.
    fn bot_user_id(&self) -> Option<UserId>;

    /// Sends an op 4 voice state update. Returns once the frame is queued,
    /// not when the platform acknowledged it.
    async fn send_voice_state_update(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        muted: bool,
        deafened: bool,
    ) -> MusicResult<()>;
}

/// A guild's player on the audio node.
#[async_trait]
pub trait NodePlayer: Send + Sync {
    fn guild_id(&self) -> GuildId;
    fn current(&self) -> Option<Track>;
    /// Upcoming tracks in play order.
    fn queue(&self) -> Vec<Track>;
    fn queue_len(&self) -> usize;
    fn is_playing(&self) -> bool;
    fn paused(&self) -> bool;
    fn volume(&self) -> u16;

    fn add(&self, track: Track);
    fn clear_queue(&self);

    /// Starts the next queued track, or stops when the queue is empty.
    async fn play(&self) -> MusicResult<()>;
    async fn skip(&self) -> MusicResult<()>;
    async fn set_pause(&self, paused: bool) -> MusicResult<()>;
    async fn set_volume(&self, volume: u16) -> MusicResult<()>;
    async fn stop(&self) -> MusicResult<()>;
}

/// The remote audio node: track lookup plus the per-guild players it hosts.
#[async_trait]
pub trait AudioNode: Send + Sync {
    fn name(&self) -> String;

    /// Whether the node's event socket is currently up.
    fn is_available(&self) -> bool;

    /// Resolves an identifier (`ytsearch:...` or a URL) without any
    /// normalisation.
    async fn search_tracks(&self, identifier: &str) -> MusicResult<LoadResult>;

    fn player(&self, guild_id: GuildId) -> Option<Arc<dyn NodePlayer>>;

    /// Returns the existing player or creates one.
    fn create_player(&self, guild_id: GuildId) -> Arc<dyn NodePlayer>;

    async fn remove_player(&self, guild_id: GuildId) -> MusicResult<()>;

    async fn stats(&self) -> MusicResult<Stats>;
}

/// Inbound `VOICE_STATE_UPDATE`, reduced to what the handshake matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceStateEvent {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub channel_id: Option<ChannelId>,
    pub session_id: String,
}

/// Inbound `VOICE_SERVER_UPDATE`. `endpoint` is `None` while the platform is
/// reallocating the voice server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceServerEvent {
    pub guild_id: GuildId,
    pub token: String,
    pub endpoint: Option<String>,
}

/// Player lifecycle events the node reports for a guild.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    TrackStart {
        guild_id: GuildId,
        track: Track,
    },
    TrackEnd {
        guild_id: GuildId,
        reason: TrackEndReason,
    },
    QueueEnd {
        guild_id: GuildId,
    },
    TrackException {
        guild_id: GuildId,
        message: String,
    },
    TrackStuck {
        guild_id: GuildId,
        threshold_ms: u64,
    },
    SocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
    },
}

impl PlaybackEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackStart { guild_id, .. }
            | Self::TrackEnd { guild_id, .. }
            | Self::QueueEnd { guild_id }
            | Self::TrackException { guild_id, .. }
            | Self::TrackStuck { guild_id, .. }
            | Self::SocketClosed { guild_id, .. } => *guild_id,
        }
    }
}
