//! Lavalink v4 client: REST calls, the event websocket and the per-guild
//! players with their local queues.

pub mod player;
pub mod rest;
pub mod socket;
pub mod voice;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    common::{GuildId, MusicError, MusicResult, UserId},
    configs::LavalinkConfig,
    music::{AudioNode, NodePlayer, PlaybackEvent, VoiceServerEvent, VoiceStateEvent},
    protocol::{IncomingMessage, LoadResult, NodeEvent, Stats, VoiceState},
};

use self::{
    player::{LavalinkPlayer, TrackEndAction},
    rest::RestClient,
    voice::VoiceForwarder,
};

/// Seconds the node keeps our session after the websocket drops.
const RESUME_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("node returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("not connected to the node yet")]
    NotReady,
}

impl From<NodeError> for MusicError {
    fn from(e: NodeError) -> Self {
        MusicError::Node(e.to_string())
    }
}

pub struct NodeClient {
    config: LavalinkConfig,
    rest: Arc<RestClient>,
    players: DashMap<GuildId, Arc<LavalinkPlayer>>,
    voice: VoiceForwarder,
    last_stats: RwLock<Option<Stats>>,
    events: flume::Sender<PlaybackEvent>,
    started: AtomicBool,
    available: AtomicBool,
    cancel: CancellationToken,
}

impl NodeClient {
    /// Creates the client and the receiving end of its playback events.
    pub fn new(
        config: LavalinkConfig,
        http: reqwest::Client,
    ) -> (Arc<Self>, flume::Receiver<PlaybackEvent>) {
        let (events, receiver) = flume::unbounded();
        let client = Arc::new(Self {
            rest: Arc::new(RestClient::new(http, &config)),
            config,
            players: DashMap::new(),
            voice: VoiceForwarder::default(),
            last_stats: RwLock::new(None),
            events,
            started: AtomicBool::new(false),
            available: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });
        (client, receiver)
    }

    /// Opens the event websocket once the bot's user id is known. Later calls
    /// are ignored.
    pub fn start(self: &Arc<Self>, user_id: UserId) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!(
            "Connecting to Lavalink node at {} (region {})",
            self.config.websocket_url(),
            self.config.region
        );
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = socket::run(client, user_id).await {
                error!("Lavalink connection gave up: {}", e);
            }
        });
        true
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn config(&self) -> &LavalinkConfig {
        &self.config
    }

    pub(crate) fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn lavalink_player(&self, guild_id: GuildId) -> Option<Arc<LavalinkPlayer>> {
        self.players.get(&guild_id).map(|p| p.value().clone())
    }

    /// Feeds the bot's own voice state into the pending voice update.
    pub async fn forward_voice_state(&self, event: &VoiceStateEvent) {
        info!(
            "[{}] forwarding VOICE_STATE_UPDATE (channel={:?}, session={})",
            event.guild_id, event.channel_id, event.session_id
        );
        if let Some(voice) = self.voice.on_voice_state(event) {
            self.push_voice(event.guild_id, voice).await;
        }
    }

    pub async fn forward_voice_server(&self, event: &VoiceServerEvent) {
        info!(
            "[{}] forwarding VOICE_SERVER_UPDATE (endpoint={:?})",
            event.guild_id, event.endpoint
        );
        if let Some(voice) = self.voice.on_voice_server(event) {
            self.push_voice(event.guild_id, voice).await;
        }
    }

    async fn push_voice(&self, guild_id: GuildId, voice: VoiceState) {
        let Some(player) = self.lavalink_player(guild_id) else {
            debug!("[{}] voice update ready but no player yet", guild_id);
            return;
        };
        if let Err(e) = player.update_voice(voice).await {
            error!("[{}] error forwarding voice update to Lavalink: {}", guild_id, e);
        }
    }

    pub(crate) async fn handle_message(&self, message: IncomingMessage) {
        match message {
            IncomingMessage::Ready {
                resumed,
                session_id,
            } => self.on_ready(resumed, session_id).await,
            IncomingMessage::PlayerUpdate { guild_id, state } => {
                if let Some(player) = self.lavalink_player(guild_id) {
                    player.update_state(&state);
                }
            }
            IncomingMessage::Stats { stats } => {
                debug!(
                    "Lavalink stats: {}/{} players playing",
                    stats.playing_players, stats.players
                );
                *self.last_stats.write() = Some(stats);
            }
            IncomingMessage::Event { event } => self.handle_event(event).await,
            IncomingMessage::Unknown => debug!("Ignoring unknown Lavalink op"),
        }
    }

    async fn on_ready(&self, resumed: bool, session_id: String) {
        info!(
            "Lavalink session ready: {} (resumed={})",
            session_id, resumed
        );
        self.rest.set_session_id(Some(session_id));
        self.set_available(true);

        if let Err(e) = self.rest.configure_resuming(RESUME_TIMEOUT_SECS).await {
            warn!("Failed to enable session resuming: {}", e);
        }

        if resumed {
            return;
        }
        let players: Vec<Arc<LavalinkPlayer>> =
            self.players.iter().map(|p| p.value().clone()).collect();
        for player in players {
            if let Err(e) = player.resync().await {
                warn!("[{}] failed to restore player: {}", player.guild_id(), e);
            }
        }
    }

    async fn handle_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::TrackStart { guild_id, track } => {
                self.emit(PlaybackEvent::TrackStart { guild_id, track });
            }
            NodeEvent::TrackEnd {
                guild_id,
                track,
                reason,
            } => {
                let player = self.lavalink_player(guild_id);
                let action = player
                    .as_ref()
                    .map(|p| p.on_track_end(&track, reason))
                    .unwrap_or(TrackEndAction::None);

                self.emit(PlaybackEvent::TrackEnd { guild_id, reason });

                match (action, player) {
                    (TrackEndAction::Advance, Some(player)) => {
                        if let Err(e) = player.play().await {
                            warn!("[{}] failed to start next track: {}", guild_id, e);
                        }
                    }
                    (TrackEndAction::QueueEnded, _) => {
                        self.emit(PlaybackEvent::QueueEnd { guild_id });
                    }
                    _ => {}
                }
            }
            NodeEvent::TrackException {
                guild_id,
                exception,
                ..
            } => {
                self.emit(PlaybackEvent::TrackException {
                    guild_id,
                    message: exception.to_string(),
                });
            }
            NodeEvent::TrackStuck {
                guild_id,
                threshold_ms,
                ..
            } => {
                self.emit(PlaybackEvent::TrackStuck {
                    guild_id,
                    threshold_ms,
                });
            }
            NodeEvent::WebSocketClosed {
                guild_id,
                code,
                reason,
                by_remote,
            } => {
                debug!(
                    "[{}] voice websocket closed (by_remote={})",
                    guild_id, by_remote
                );
                self.emit(PlaybackEvent::SocketClosed {
                    guild_id,
                    code,
                    reason,
                });
            }
            NodeEvent::Unknown => debug!("Ignoring unknown Lavalink event"),
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            warn!("Playback event receiver is gone");
        }
    }
}

#[async_trait]
impl AudioNode for NodeClient {
    fn name(&self) -> String {
        self.config.node_name()
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn search_tracks(&self, identifier: &str) -> MusicResult<LoadResult> {
        Ok(self.rest.load_tracks(identifier).await?)
    }

    fn player(&self, guild_id: GuildId) -> Option<Arc<dyn NodePlayer>> {
        self.lavalink_player(guild_id)
            .map(|player| player as Arc<dyn NodePlayer>)
    }

    fn create_player(&self, guild_id: GuildId) -> Arc<dyn NodePlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("[{}] creating player", guild_id);
                Arc::new(LavalinkPlayer::new(
                    guild_id,
                    self.rest.clone(),
                    self.events.clone(),
                ))
            })
            .value()
            .clone()
    }

    async fn remove_player(&self, guild_id: GuildId) -> MusicResult<()> {
        self.voice.forget(guild_id);
        if self.players.remove(&guild_id).is_none() {
            return Ok(());
        }
        match self.rest.destroy_player(guild_id).await {
            Ok(()) | Err(NodeError::NotReady) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn stats(&self) -> MusicResult<Stats> {
        match self.rest.stats().await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                let cached = self.last_stats.read().clone();
                cached.ok_or_else(|| e.into())
            }
        }
    }
}
