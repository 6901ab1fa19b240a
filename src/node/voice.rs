use dashmap::DashMap;

use crate::{
    common::GuildId,
    music::{VoiceServerEvent, VoiceStateEvent},
    protocol::VoiceState,
};

#[derive(Default)]
struct PendingVoice {
    session_id: Option<String>,
    server: Option<(String, String)>,
}

impl PendingVoice {
    fn complete(&self) -> Option<VoiceState> {
        let session_id = self.session_id.clone()?;
        let (token, endpoint) = self.server.clone()?;
        Some(VoiceState {
            token,
            endpoint,
            session_id,
        })
    }
}

/// Pairs the bot's voice session id with the voice server assignment. The
/// node needs both halves before it can open the voice connection.
#[derive(Default)]
pub struct VoiceForwarder {
    pending: DashMap<GuildId, PendingVoice>,
}

impl VoiceForwarder {
    /// Records the bot's own voice state. Leaving voice forgets the guild.
    pub fn on_voice_state(&self, event: &VoiceStateEvent) -> Option<VoiceState> {
        if event.channel_id.is_none() {
            self.pending.remove(&event.guild_id);
            return None;
        }

        let mut entry = self.pending.entry(event.guild_id).or_default();
        entry.session_id = Some(event.session_id.clone());
        entry.complete()
    }

    /// Records a voice server assignment. A missing endpoint means the server
    /// is being reallocated; wait for the next update.
    pub fn on_voice_server(&self, event: &VoiceServerEvent) -> Option<VoiceState> {
        let endpoint = event.endpoint.clone()?;
        let mut entry = self.pending.entry(event.guild_id).or_default();
        entry.server = Some((event.token.clone(), endpoint));
        entry.complete()
    }

    pub fn forget(&self, guild_id: GuildId) {
        self.pending.remove(&guild_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ChannelId, UserId};

    fn state(channel: Option<u64>) -> VoiceStateEvent {
        VoiceStateEvent {
            guild_id: GuildId(1),
            user_id: UserId(2),
            channel_id: channel.map(ChannelId),
            session_id: "abc".into(),
        }
    }

    fn server(endpoint: Option<&str>) -> VoiceServerEvent {
        VoiceServerEvent {
            guild_id: GuildId(1),
            token: "tok".into(),
            endpoint: endpoint.map(str::to_string),
        }
    }

    #[test]
    fn test_completes_in_either_order() {
        let forwarder = VoiceForwarder::default();
        assert!(forwarder.on_voice_server(&server(Some("us1.discord.media"))).is_none());
        let voice = forwarder.on_voice_state(&state(Some(10))).unwrap();
        assert_eq!(voice.session_id, "abc");
        assert_eq!(voice.endpoint, "us1.discord.media");

        let forwarder = VoiceForwarder::default();
        assert!(forwarder.on_voice_state(&state(Some(10))).is_none());
        assert!(forwarder.on_voice_server(&server(Some("us1.discord.media"))).is_some());
    }

    #[test]
    fn test_null_endpoint_waits() {
        let forwarder = VoiceForwarder::default();
        forwarder.on_voice_state(&state(Some(10)));
        assert!(forwarder.on_voice_server(&server(None)).is_none());
    }

    #[test]
    fn test_leaving_forgets_guild() {
        let forwarder = VoiceForwarder::default();
        forwarder.on_voice_server(&server(Some("us1.discord.media")));
        assert!(forwarder.on_voice_state(&state(None)).is_none());
        assert!(forwarder.on_voice_state(&state(Some(10))).is_none());
    }
}
