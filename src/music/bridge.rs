use tracing::{debug, info, warn};

use crate::music::{PlaybackEvent, SessionRegistry};

/// Applies node playback events to guild sessions: playback arms and disarms
/// the idle timer, failed tracks advance the queue.
///
/// Every handler tolerates repeats and reordering. Events for guilds without
/// a live session are dropped.
#[derive(Clone)]
pub struct NodeEventBridge {
    registry: SessionRegistry,
}

impl NodeEventBridge {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Applies events in arrival order until every sender is gone.
    pub async fn run(self, events: flume::Receiver<PlaybackEvent>) {
        while let Ok(event) = events.recv_async().await {
            self.handle(&event).await;
        }
        debug!("Playback event channel closed");
    }

    pub async fn handle(&self, event: &PlaybackEvent) {
        let guild_id = event.guild_id();
        let Some(session) = self.registry.active(guild_id) else {
            debug!("[{}] no music session for {:?}", guild_id, event);
            return;
        };
        let player = self.registry.node().player(guild_id);

        match event {
            PlaybackEvent::TrackStart { track, .. } => {
                info!(
                    "[{}] now playing '{}' by {}",
                    guild_id, track.info.title, track.info.author
                );
                session.cancel_idle_timer();
            }
            PlaybackEvent::TrackEnd { reason, .. } => {
                debug!("[{}] track ended ({:?})", guild_id, reason);
                if player.is_some_and(|p| p.is_playing() || p.queue_len() > 0) {
                    return;
                }
                session.start_idle_timer();
            }
            PlaybackEvent::QueueEnd { .. } => {
                debug!("[{}] queue finished", guild_id);
                session.start_idle_timer();
            }
            PlaybackEvent::TrackException { message, .. } => {
                warn!("[{}] track exception: {}", guild_id, message);
                match player.filter(|p| p.queue_len() > 0) {
                    Some(player) => {
                        if let Err(e) = player.play().await {
                            warn!("[{}] failed to advance after exception: {}", guild_id, e);
                            session.start_idle_timer();
                        }
                    }
                    None => {
                        session.start_idle_timer();
                    }
                }
            }
            PlaybackEvent::TrackStuck { threshold_ms, .. } => {
                warn!("[{}] track stuck for {}ms", guild_id, threshold_ms);
            }
            PlaybackEvent::SocketClosed { code, reason, .. } => {
                warn!(
                    "[{}] voice socket closed by Discord (code={}, reason={})",
                    guild_id, code, reason
                );
            }
        }
    }
}
