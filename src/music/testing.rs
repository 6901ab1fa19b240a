//! In-memory gateway and node doubles for the music tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::{
    common::{ChannelId, GuildId, MusicError, MusicResult, UserId},
    music::{
        AudioNode, NodePlayer, VoiceGateway, VoiceHandshake, VoiceServerEvent, VoiceStateEvent,
    },
    protocol::{LoadResult, Stats, Track},
};

pub(crate) const BOT_USER: UserId = UserId(999);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckMode {
    /// Voice state and voice server arrive as soon as the request is sent.
    Immediate,
    /// Only the voice state arrives.
    StateOnly,
    Never,
    /// The outbound send itself fails.
    Fail,
}

pub(crate) struct MockGateway {
    bot_user: Mutex<Option<UserId>>,
    mode: Mutex<AckMode>,
    calls: Mutex<Vec<(GuildId, Option<ChannelId>)>>,
    handshake: Mutex<Weak<VoiceHandshake>>,
}

impl MockGateway {
    pub(crate) fn with_handshake(mode: AckMode) -> (Arc<Self>, Arc<VoiceHandshake>) {
        let gateway = Arc::new(Self {
            bot_user: Mutex::new(Some(BOT_USER)),
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
            handshake: Mutex::new(Weak::new()),
        });
        let handshake = Arc::new(VoiceHandshake::new(gateway.clone()));
        *gateway.handshake.lock() = Arc::downgrade(&handshake);
        (gateway, handshake)
    }

    pub(crate) fn set_mode(&self, mode: AckMode) {
        *self.mode.lock() = mode;
    }

    pub(crate) fn set_bot_user(&self, user: Option<UserId>) {
        *self.bot_user.lock() = user;
    }

    pub(crate) fn calls(&self) -> Vec<(GuildId, Option<ChannelId>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl VoiceGateway for MockGateway {
    fn bot_user_id(&self) -> Option<UserId> {
        *self.bot_user.lock()
    }

    async fn send_voice_state_update(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        _muted: bool,
        _deafened: bool,
    ) -> MusicResult<()> {
        self.calls.lock().push((guild_id, channel_id));

        let mode = *self.mode.lock();
        match mode {
            AckMode::Fail => return Err(MusicError::Gateway("socket closed".into())),
            AckMode::Never => return Ok(()),
            AckMode::Immediate | AckMode::StateOnly => {}
        }

        let Some(handshake) = self.handshake.lock().upgrade() else {
            return Ok(());
        };
        handshake.handle_voice_state(&VoiceStateEvent {
            guild_id,
            user_id: BOT_USER,
            channel_id,
            session_id: "mock-session".into(),
        });
        if mode == AckMode::Immediate && channel_id.is_some() {
            handshake.handle_voice_server(&VoiceServerEvent {
                guild_id,
                token: "mock-token".into(),
                endpoint: Some("us-east1.discord.media:443".into()),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct PlayerInner {
    current: Option<Track>,
    queue: VecDeque<Track>,
    paused: bool,
    volume: u16,
}

pub(crate) struct MockPlayer {
    guild_id: GuildId,
    inner: Mutex<PlayerInner>,
    plays: AtomicUsize,
    stops: AtomicUsize,
    fail_volume: bool,
    fail_play: bool,
}

impl MockPlayer {
    fn new(guild_id: GuildId, fail_volume: bool, fail_play: bool) -> Self {
        Self {
            guild_id,
            inner: Mutex::new(PlayerInner {
                volume: 100,
                ..Default::default()
            }),
            plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_volume,
            fail_play,
        }
    }

    pub(crate) fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Simulates the current track ending on the node.
    pub(crate) fn finish_current(&self) {
        self.inner.lock().current = None;
    }
}

#[async_trait]
impl NodePlayer for MockPlayer {
    fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    fn current(&self) -> Option<Track> {
        self.inner.lock().current.clone()
    }

    fn queue(&self) -> Vec<Track> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    fn is_playing(&self) -> bool {
        self.inner.lock().current.is_some()
    }

    fn paused(&self) -> bool {
        self.inner.lock().paused
    }

    fn volume(&self) -> u16 {
        self.inner.lock().volume
    }

    fn add(&self, track: Track) {
        self.inner.lock().queue.push_back(track);
    }

    fn clear_queue(&self) {
        self.inner.lock().queue.clear();
    }

    async fn play(&self) -> MusicResult<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.current = inner.queue.pop_front();
        inner.paused = false;
        if self.fail_play {
            inner.current = None;
            return Err(MusicError::Node("play rejected".into()));
        }
        Ok(())
    }

    async fn skip(&self) -> MusicResult<()> {
        self.play().await
    }

    async fn set_pause(&self, paused: bool) -> MusicResult<()> {
        self.inner.lock().paused = paused;
        Ok(())
    }

    async fn set_volume(&self, volume: u16) -> MusicResult<()> {
        if self.fail_volume {
            return Err(MusicError::Node("volume rejected".into()));
        }
        self.inner.lock().volume = volume;
        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().current = None;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockNode {
    players: DashMap<GuildId, Arc<MockPlayer>>,
    removed: Mutex<Vec<GuildId>>,
    load_result: Mutex<Option<MusicResult<LoadResult>>>,
    identifiers: Mutex<Vec<String>>,
    stats: Mutex<Option<Stats>>,
    offline: AtomicBool,
    fail_volume: bool,
    fail_play: bool,
}

impl MockNode {
    pub(crate) fn failing_volume() -> Self {
        Self {
            fail_volume: true,
            ..Default::default()
        }
    }

    pub(crate) fn failing_play() -> Self {
        Self {
            fail_play: true,
            ..Default::default()
        }
    }

    pub(crate) fn mock_player(&self, guild_id: GuildId) -> Option<Arc<MockPlayer>> {
        self.players.get(&guild_id).map(|p| p.value().clone())
    }

    pub(crate) fn removed(&self) -> Vec<GuildId> {
        self.removed.lock().clone()
    }

    pub(crate) fn set_load_result(&self, result: MusicResult<LoadResult>) {
        *self.load_result.lock() = Some(result);
    }

    pub(crate) fn identifiers(&self) -> Vec<String> {
        self.identifiers.lock().clone()
    }

    pub(crate) fn set_stats(&self, stats: Stats) {
        *self.stats.lock() = Some(stats);
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioNode for MockNode {
    fn name(&self) -> String {
        "mock-node".to_string()
    }

    fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    async fn search_tracks(&self, identifier: &str) -> MusicResult<LoadResult> {
        self.identifiers.lock().push(identifier.to_string());
        self.load_result
            .lock()
            .clone()
            .unwrap_or(Ok(LoadResult::Empty {}))
    }

    fn player(&self, guild_id: GuildId) -> Option<Arc<dyn NodePlayer>> {
        self.mock_player(guild_id)
            .map(|player| player as Arc<dyn NodePlayer>)
    }

    fn create_player(&self, guild_id: GuildId) -> Arc<dyn NodePlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| Arc::new(MockPlayer::new(guild_id, self.fail_volume, self.fail_play)))
            .value()
            .clone()
    }

    async fn remove_player(&self, guild_id: GuildId) -> MusicResult<()> {
        self.players.remove(&guild_id);
        self.removed.lock().push(guild_id);
        Ok(())
    }

    async fn stats(&self) -> MusicResult<Stats> {
        self.stats
            .lock()
            .clone()
            .ok_or_else(|| MusicError::Node("stats unavailable".into()))
    }
}
