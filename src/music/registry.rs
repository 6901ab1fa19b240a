use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, info};

use crate::{
    common::GuildId,
    music::{
        AudioNode, GuildSession, VoiceHandshake,
        session::{CleanupFn, SessionTimeouts},
    },
};

type SessionMap = DashMap<GuildId, Arc<GuildSession>>;

/// Owns every live guild session.
///
/// Entries are inserted by [`get_or_create`](Self::get_or_create) and removed
/// only by the cleanup callback each session runs at the end of its own
/// teardown. Removal checks pointer identity, so a late cleanup from an old
/// session never evicts its replacement.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<SessionMap>,
    handshake: Arc<VoiceHandshake>,
    node: Arc<dyn AudioNode>,
    timeouts: SessionTimeouts,
}

impl SessionRegistry {
    pub fn new(
        handshake: Arc<VoiceHandshake>,
        node: Arc<dyn AudioNode>,
        timeouts: SessionTimeouts,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            handshake,
            node,
            timeouts,
        }
    }

    pub fn handshake(&self) -> &Arc<VoiceHandshake> {
        &self.handshake
    }

    pub fn node(&self) -> &Arc<dyn AudioNode> {
        &self.node
    }

    /// Returns the guild's session, creating it on first use. A session that
    /// already closed but has not finished its cleanup yet is replaced; the
    /// replacement waits for that cleanup before touching voice or the player.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildSession> {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    debug!("[{}] replacing closed music session", guild_id);
                    let session = self.new_session(guild_id);
                    session.follow(entry.get().clone());
                    entry.insert(session);
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                debug!("[{}] creating music session", guild_id);
                entry.insert(self.new_session(guild_id)).clone()
            }
        }
    }

    pub fn active(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions
            .get(&guild_id)
            .map(|entry| entry.value().clone())
            .filter(|session| !session.is_closed())
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Disconnects every session, used on shutdown.
    pub async fn disconnect_all(&self) {
        let sessions: Vec<Arc<GuildSession>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        if sessions.is_empty() {
            return;
        }

        info!("Disconnecting {} music session(s)", sessions.len());
        futures::future::join_all(sessions.iter().map(|s| s.disconnect())).await;
    }

    fn new_session(&self, guild_id: GuildId) -> Arc<GuildSession> {
        let sessions = Arc::downgrade(&self.sessions);
        let cleanup: CleanupFn = Box::new(move |session: &GuildSession| {
            let Some(sessions) = sessions.upgrade() else {
                return;
            };
            let removed = sessions.remove_if(&session.guild_id(), |_, current| {
                std::ptr::eq(Arc::as_ptr(current), session)
            });
            if removed.is_some() {
                debug!("[{}] music session removed", session.guild_id());
            }
        });

        Arc::new(GuildSession::new(
            guild_id,
            self.handshake.clone(),
            self.node.clone(),
            self.timeouts,
            cleanup,
        ))
    }
}
