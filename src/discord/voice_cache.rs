use dashmap::DashMap;

use crate::{
    common::{ChannelId, GuildId, UserId},
    music::VoiceStateEvent,
};

/// Which voice channel each member currently sits in, fed by GUILD_CREATE
/// and VOICE_STATE_UPDATE.
#[derive(Default)]
pub struct VoiceStateCache {
    channels: DashMap<(GuildId, UserId), ChannelId>,
}

impl VoiceStateCache {
    pub fn update(&self, event: &VoiceStateEvent) {
        let key = (event.guild_id, event.user_id);
        match event.channel_id {
            Some(channel_id) => {
                self.channels.insert(key, channel_id);
            }
            None => {
                self.channels.remove(&key);
            }
        }
    }

    pub fn channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.channels.get(&(guild_id, user_id)).map(|c| *c)
    }

    /// Drops a guild's entries before GUILD_CREATE repopulates them.
    pub fn clear_guild(&self, guild_id: GuildId) {
        self.channels.retain(|(guild, _), _| *guild != guild_id);
    }
}
