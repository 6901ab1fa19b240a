use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    common::{GuildId, MusicResult},
    music::{NodePlayer, PlaybackEvent},
    node::rest::RestClient,
    protocol::{PlayerState, PlayerUpdate, Track, TrackEndReason, VoiceState},
};

const MAX_VOLUME: u16 = 1000;

#[derive(Default)]
struct Inner {
    current: Option<Track>,
    queue: VecDeque<Track>,
    paused: bool,
    volume: u16,
    position: u64,
    connected: bool,
    voice: Option<VoiceState>,
}

/// What the node client should do after a track ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndAction {
    /// Start the next queued track.
    Advance,
    /// The queue ran dry.
    QueueEnded,
    None,
}

/// A guild player hosted on the node. The queue lives here; the node only
/// knows the track that is currently playing.
pub struct LavalinkPlayer {
    guild_id: GuildId,
    rest: Arc<RestClient>,
    events: flume::Sender<PlaybackEvent>,
    inner: Mutex<Inner>,
}

impl LavalinkPlayer {
    pub fn new(
        guild_id: GuildId,
        rest: Arc<RestClient>,
        events: flume::Sender<PlaybackEvent>,
    ) -> Self {
        Self {
            guild_id,
            rest,
            events,
            inner: Mutex::new(Inner {
                volume: 100,
                ..Default::default()
            }),
        }
    }

    pub fn position(&self) -> u64 {
        self.inner.lock().position
    }

    pub fn voice(&self) -> Option<VoiceState> {
        self.inner.lock().voice.clone()
    }

    pub fn update_state(&self, state: &PlayerState) {
        let mut inner = self.inner.lock();
        inner.position = state.position;
        inner.connected = state.connected;
    }

    /// Sends the voice connection details to the node.
    pub async fn update_voice(&self, voice: VoiceState) -> MusicResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.voice.as_ref() == Some(&voice) {
                return Ok(());
            }
            inner.voice = Some(voice.clone());
        }
        debug!("[{}] sending voice update to node", self.guild_id);
        self.patch(PlayerUpdate {
            voice: Some(voice),
            ..Default::default()
        })
        .await
    }

    /// Re-sends voice and the current track after the node lost its session.
    pub async fn resync(&self) -> MusicResult<()> {
        let (voice, current, paused, volume) = {
            let inner = self.inner.lock();
            (
                inner.voice.clone(),
                inner.current.clone(),
                inner.paused,
                inner.volume,
            )
        };
        let Some(voice) = voice else {
            return Ok(());
        };

        let mut update = match current {
            Some(track) => PlayerUpdate::play(track.encoded, track.user_data),
            None => PlayerUpdate::default(),
        };
        update.voice = Some(voice);
        update.paused = Some(paused);
        update.volume = Some(volume);
        self.patch(update).await
    }

    /// Clears the ended track if it is still current. Only a natural finish
    /// advances the queue; failed loads are advanced by the exception
    /// handler.
    pub fn on_track_end(&self, track: &Track, reason: TrackEndReason) -> TrackEndAction {
        let mut inner = self.inner.lock();
        let still_current = inner
            .current
            .as_ref()
            .is_some_and(|current| current.encoded == track.encoded);
        if !still_current {
            return TrackEndAction::None;
        }
        inner.current = None;

        if reason != TrackEndReason::Finished {
            return TrackEndAction::None;
        }
        if inner.queue.is_empty() {
            TrackEndAction::QueueEnded
        } else {
            TrackEndAction::Advance
        }
    }

    async fn patch(&self, update: PlayerUpdate) -> MusicResult<()> {
        Ok(self.rest.update_player(self.guild_id, &update).await?)
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            warn!("[{}] playback event receiver is gone", self.guild_id);
        }
    }
}

#[async_trait]
impl NodePlayer for LavalinkPlayer {
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
        let next = {
            let mut inner = self.inner.lock();
            let next = inner.queue.pop_front();
            inner.current = next.clone();
            if next.is_some() {
                inner.paused = false;
            }
            next
        };

        let Some(track) = next else {
            self.stop().await?;
            self.emit(PlaybackEvent::QueueEnd {
                guild_id: self.guild_id,
            });
            return Ok(());
        };

        debug!("[{}] playing '{}'", self.guild_id, track.info.title);
        let encoded = track.encoded.clone();
        let result = self
            .patch(PlayerUpdate::play(track.encoded, track.user_data))
            .await;

        if result.is_err() {
            let mut inner = self.inner.lock();
            if inner
                .current
                .as_ref()
                .is_some_and(|current| current.encoded == encoded)
            {
                inner.current = None;
            }
        }
        result
    }

    async fn skip(&self) -> MusicResult<()> {
        self.play().await
    }

    async fn set_pause(&self, paused: bool) -> MusicResult<()> {
        self.patch(PlayerUpdate {
            paused: Some(paused),
            ..Default::default()
        })
        .await?;
        self.inner.lock().paused = paused;
        Ok(())
    }

    async fn set_volume(&self, volume: u16) -> MusicResult<()> {
        let volume = volume.min(MAX_VOLUME);
        self.patch(PlayerUpdate {
            volume: Some(volume),
            ..Default::default()
        })
        .await?;
        self.inner.lock().volume = volume;
        Ok(())
    }

    async fn stop(&self) -> MusicResult<()> {
        self.inner.lock().current = None;
        self.patch(PlayerUpdate::stop()).await
    }
}
