use std::{sync::Arc, time::Duration};

use tokio::time::Instant;
use tracing::debug;

use crate::{
    common::{ChannelId, GuildId, MusicError, MusicResult},
    music::{VoiceGateway, VoiceServerEvent, VoiceStateEvent, Waiter, Waiters},
};

/// Voice join/leave requests that wait for the gateway to confirm them.
///
/// A join is confirmed by the bot's own voice state landing in the target
/// channel plus a voice server assignment for the guild. A leave only needs the
/// voice state with no channel.
pub struct VoiceHandshake {
    gateway: Arc<dyn VoiceGateway>,
    states: Waiters<VoiceStateEvent>,
    servers: Waiters<VoiceServerEvent>,
}

impl VoiceHandshake {
    pub fn new(gateway: Arc<dyn VoiceGateway>) -> Self {
        Self {
            gateway,
            states: Waiters::new(),
            servers: Waiters::new(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn VoiceGateway> {
        &self.gateway
    }

    pub fn handle_voice_state(&self, event: &VoiceStateEvent) -> usize {
        self.states.dispatch(event)
    }

    pub fn handle_voice_server(&self, event: &VoiceServerEvent) -> usize {
        self.servers.dispatch(event)
    }

    /// Moves the bot to `channel_id` (or out of voice with `None`) and waits
    /// for the acknowledgement. Both waits share one deadline.
    pub async fn request(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        timeout: Duration,
    ) -> MusicResult<()> {
        let bot_id = self.gateway.bot_user_id().ok_or(MusicError::NotReady)?;

        let state_waiter = self.states.register(move |event| {
            event.guild_id == guild_id && event.user_id == bot_id && event.channel_id == channel_id
        });
        let server_waiter = channel_id.map(|_| {
            self.servers
                .register(move |event: &VoiceServerEvent| event.guild_id == guild_id)
        });

        self.gateway
            .send_voice_state_update(guild_id, channel_id, false, false)
            .await?;

        let deadline = Instant::now() + timeout;
        tokio::try_join!(
            expect(state_waiter, deadline),
            async {
                match server_waiter {
                    Some(waiter) => expect(waiter, deadline).await.map(|_| ()),
                    None => Ok(()),
                }
            }
        )?;

        debug!("[{}] voice handshake acknowledged (channel={:?})", guild_id, channel_id);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pending_waiters(&self) -> (usize, usize) {
        (self.states.pending(), self.servers.pending())
    }
}

async fn expect<E>(waiter: Waiter<E>, deadline: Instant) -> MusicResult<E> {
    waiter.wait_until(deadline).await.ok_or(MusicError::Timeout)
}
