use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    common::{ChannelId, GuildId, MusicError, MusicResult},
    configs::MusicConfig,
    music::{AudioNode, IdlePhase, IdleTimer, VoiceHandshake},
    protocol::Track,
};

/// Connection state of a guild session.
///
/// `Closed` is terminal: the session has been torn down and removed from the
/// registry, and a fresh session must be created for further use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting { channel_id: ChannelId },
    Connected { channel_id: ChannelId },
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub idle: Duration,
    pub connect: Duration,
}

impl From<&MusicConfig> for SessionTimeouts {
    fn from(config: &MusicConfig) -> Self {
        Self {
            idle: config.idle_timeout(),
            connect: config.voice_connect_timeout(),
        }
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self::from(&MusicConfig::default())
    }
}

pub type CleanupFn = Box<dyn Fn(&GuildSession) + Send + Sync>;

/// One guild's voice connection and idle-disconnect lifecycle.
///
/// State reads and fast-path checks use a short synchronous lock. Anything
/// that awaits the gateway or the node while acting on that state runs under
/// `op_lock`, so handshakes, teardown, idle fires and enqueues never
/// interleave for the same guild.
///
/// A session that replaced a closed one for the same guild holds on to it
/// until that teardown has finished. The node player is keyed by guild, so
/// the old teardown must not overlap a new connection.
pub struct GuildSession {
    guild_id: GuildId,
    state: Mutex<SessionState>,
    op_lock: tokio::sync::Mutex<()>,
    predecessor: Mutex<Option<Arc<GuildSession>>>,
    idle: IdleTimer,
    handshake: Arc<VoiceHandshake>,
    node: Arc<dyn AudioNode>,
    timeouts: SessionTimeouts,
    cleanup: CleanupFn,
}

impl GuildSession {
    pub fn new(
        guild_id: GuildId,
        handshake: Arc<VoiceHandshake>,
        node: Arc<dyn AudioNode>,
        timeouts: SessionTimeouts,
        cleanup: CleanupFn,
    ) -> Self {
        Self {
            guild_id,
            state: Mutex::new(SessionState::Disconnected),
            op_lock: tokio::sync::Mutex::new(()),
            predecessor: Mutex::new(None),
            idle: IdleTimer::new(),
            handshake,
            node,
            timeouts,
            cleanup,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn connected_channel(&self) -> Option<ChannelId> {
        match self.state() {
            SessionState::Connected { channel_id } => Some(channel_id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    pub fn idle_phase(&self) -> IdlePhase {
        self.idle.phase()
    }

    /// Records the closed session this one replaces.
    pub(crate) fn follow(&self, predecessor: Arc<GuildSession>) {
        *self.predecessor.lock() = Some(predecessor);
    }

    /// Waits until the replaced session released the guild's voice
    /// connection and player. Its teardown holds its `op_lock` throughout.
    async fn await_predecessor(&self) {
        let Some(predecessor) = self.predecessor.lock().take() else {
            return;
        };
        if predecessor.op_lock.try_lock().is_err() {
            debug!(
                "[{}] waiting for the previous session to finish closing",
                self.guild_id
            );
        }
        let _released = predecessor.op_lock.lock().await;
    }

    /// Joins `channel_id` using the configured connect timeout.
    pub async fn ensure_connected(&self, channel_id: ChannelId) -> MusicResult<()> {
        self.ensure_connected_within(channel_id, self.timeouts.connect)
            .await
    }

    /// Joins (or moves to) `channel_id`, waiting up to `timeout` for the
    /// gateway to confirm. A no-op when already connected there.
    ///
    /// The guild's node player is created before the join request. On failure
    /// the state returns to what it was before the attempt, and the player is
    /// left for the caller to release with [`disconnect`](Self::disconnect).
    pub async fn ensure_connected_within(
        &self,
        channel_id: ChannelId,
        timeout: Duration,
    ) -> MusicResult<()> {
        if self.check_connect(channel_id)? {
            return Ok(());
        }

        let _op = self.op_lock.lock().await;

        let previous = {
            let mut state = self.state.lock();
            if Self::connect_target_reached(*state, channel_id)? {
                return Ok(());
            }
            std::mem::replace(&mut *state, SessionState::Connecting { channel_id })
        };
        let mut restore = RestoreOnDrop {
            state: &self.state,
            previous: Some(previous),
        };
        self.await_predecessor().await;
        // Voice credentials forwarded during the handshake attach to this player.
        self.node.create_player(self.guild_id);

        info!(
            "[{}] requesting voice connection to channel {}",
            self.guild_id, channel_id
        );

        match self
            .handshake
            .request(self.guild_id, Some(channel_id), timeout)
            .await
        {
            Ok(()) => {
                restore.previous = None;
                *self.state.lock() = SessionState::Connected { channel_id };
                info!("[{}] connected to voice channel {}", self.guild_id, channel_id);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "[{}] voice connection to channel {} failed: {}",
                    self.guild_id, channel_id, e
                );
                Err(e)
            }
        }
    }

    /// Fast path outside the operation lock.
    fn check_connect(&self, channel_id: ChannelId) -> MusicResult<bool> {
        let state = self.state();
        if let SessionState::Connecting { .. } = state {
            return Err(MusicError::Busy);
        }
        Self::connect_target_reached(state, channel_id)
    }

    fn connect_target_reached(state: SessionState, channel_id: ChannelId) -> MusicResult<bool> {
        match state {
            SessionState::Closed => Err(MusicError::SessionClosed),
            SessionState::Connecting { .. } => Err(MusicError::Busy),
            SessionState::Connected { channel_id: current } => Ok(current == channel_id),
            SessionState::Disconnected => Ok(false),
        }
    }

    /// Leaves voice, releases the node player and removes this session from
    /// its registry. Failures along the way are logged. Calling it again is a
    /// no-op.
    pub async fn disconnect(&self) {
        self.idle.cancel();
        let _op = self.op_lock.lock().await;
        self.disconnect_locked().await;
    }

    async fn disconnect_locked(&self) {
        self.await_predecessor().await;
        let previous = {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                return;
            }
            std::mem::replace(&mut *state, SessionState::Closed)
        };
        self.idle.cancel();

        if let SessionState::Connected { channel_id } = previous {
            debug!("[{}] leaving voice channel {}", self.guild_id, channel_id);
            if let Err(e) = self
                .handshake
                .request(self.guild_id, None, self.timeouts.connect)
                .await
            {
                warn!(
                    "[{}] failed to disconnect voice session: {}",
                    self.guild_id, e
                );
            }
        }

        if let Some(player) = self.node.player(self.guild_id) {
            if let Err(e) = player.stop().await {
                debug!("[{}] failed to stop player: {}", self.guild_id, e);
            }
            if let Err(e) = self.node.remove_player(self.guild_id).await {
                warn!("[{}] failed to remove player: {}", self.guild_id, e);
            }
        }

        info!("[{}] music session closed", self.guild_id);
        (self.cleanup)(self);
    }

    /// Arms the idle disconnect. No-op when already armed, firing, or closed.
    pub fn start_idle_timer(self: &Arc<Self>) -> bool {
        if self.is_closed() {
            return false;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let delay = self.timeouts.idle;
        let armed = self.idle.arm(move |generation| {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(session) = weak.upgrade() {
                    session.fire_idle(generation).await;
                }
            })
        });

        if armed {
            debug!(
                "[{}] idle timer armed for {}s",
                self.guild_id,
                delay.as_secs()
            );
        }
        armed
    }

    pub fn cancel_idle_timer(&self) -> bool {
        let cancelled = self.idle.cancel();
        if cancelled {
            debug!("[{}] idle timer cancelled", self.guild_id);
        }
        cancelled
    }

    async fn fire_idle(self: Arc<Self>, generation: u64) {
        if !self.idle.begin_firing(generation) {
            return;
        }

        let op = self.op_lock.lock().await;

        let busy = self
            .node
            .player(self.guild_id)
            .is_some_and(|player| player.is_playing() || player.queue_len() > 0);

        if busy {
            info!(
                "[{}] idle timer aborted because playback resumed",
                self.guild_id
            );
            let rearm = self.idle.finish_firing(generation);
            drop(op);
            if rearm {
                self.start_idle_timer();
            }
            return;
        }

        info!(
            "[{}] nothing played for {}s, leaving voice",
            self.guild_id,
            self.timeouts.idle.as_secs()
        );
        self.disconnect_locked().await;
        self.idle.finish_firing(generation);
    }

    /// Appends tracks to the guild's player and starts playback if nothing is
    /// playing. Returns whether playback was started.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> MusicResult<bool> {
        let _op = self.op_lock.lock().await;

        if !matches!(self.state(), SessionState::Connected { .. }) {
            return Err(MusicError::SessionClosed);
        }

        let player = self.node.create_player(self.guild_id);
        let count = tracks.len();
        for track in tracks {
            player.add(track);
        }
        self.idle.cancel();
        debug!("[{}] queued {} track(s)", self.guild_id, count);

        if player.is_playing() {
            return Ok(false);
        }
        if let Err(e) = player.play().await {
            // Nothing is playing, so queued tracks would never start.
            player.clear_queue();
            return Err(e);
        }
        Ok(true)
    }
}

impl std::fmt::Debug for GuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildSession")
            .field("guild_id", &self.guild_id)
            .field("state", &self.state())
            .field("idle", &self.idle.phase())
            .finish()
    }
}

/// Puts the pre-handshake state back unless disarmed, including when the
/// connecting future is dropped mid-handshake.
struct RestoreOnDrop<'a> {
    state: &'a Mutex<SessionState>,
    previous: Option<SessionState>,
}

impl Drop for RestoreOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::Connecting { .. }) {
                *state = previous;
            }
        }
    }
}
