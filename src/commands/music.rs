use tracing::{debug, error, info, warn};

use crate::{
    commands::{CommandContext, Reply, stats::format_node_stats},
    common::{ChannelId, GuildId, MusicError, UserId, format::format_duration},
    configs::MusicConfig,
    music::{SessionRegistry, load_tracks},
    protocol::{LoadResult, Track},
};

const NOT_CONFIGURED: &str =
    "Music playback isn't configured. Set the Lavalink environment variables and restart the bot.";
const DJ_BLOCKED: &str = "You can't use music commands while holding the blocked DJ role.";
const QUEUE_PREVIEW: usize = 10;

/// A `/play` that passed its checks and may be deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
}

/// Handlers behind the music slash commands. Each returns the reply to send;
/// `None` for the registry means no audio node is configured.
pub struct MusicCommands {
    registry: Option<SessionRegistry>,
    config: MusicConfig,
}

impl MusicCommands {
    pub fn new(registry: Option<SessionRegistry>, config: MusicConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> Option<&SessionRegistry> {
        self.registry.as_ref()
    }

    fn has_music_control(&self, ctx: &CommandContext) -> bool {
        match self.config.dj_blocked_role_id {
            Some(blocked) => !ctx.roles.contains(&blocked),
            None => true,
        }
    }

    /// Permission, configuration and guild checks shared by the controlling
    /// commands, in that order.
    fn controlling(
        &self,
        ctx: &CommandContext,
        outside_guild: &str,
    ) -> Result<(&SessionRegistry, GuildId), Reply> {
        if !self.has_music_control(ctx) {
            return Err(Reply::ephemeral(DJ_BLOCKED));
        }
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| Reply::ephemeral(NOT_CONFIGURED))?;
        let guild_id = ctx
            .guild_id
            .ok_or_else(|| Reply::ephemeral(outside_guild))?;
        Ok((registry, guild_id))
    }

    /// Everything `/play` checks before acknowledging the interaction.
    pub fn check_play(&self, ctx: &CommandContext) -> Result<PlayRequest, Reply> {
        let (_, guild_id) =
            self.controlling(ctx, "This command can only be used inside a server.")?;
        let channel_id = ctx.voice_channel.ok_or_else(|| {
            Reply::ephemeral("Join a voice channel first, then ask me to play music.")
        })?;
        Ok(PlayRequest {
            guild_id,
            channel_id,
            user_id: ctx.user_id,
        })
    }

    /// Joins the member's channel, resolves `query` and queues the result.
    pub async fn play(&self, request: PlayRequest, query: &str) -> Reply {
        let Some(registry) = self.registry.as_ref() else {
            return Reply::ephemeral(NOT_CONFIGURED);
        };
        let guild_id = request.guild_id;

        let mut session = registry.get_or_create(guild_id);
        session.cancel_idle_timer();

        let mut connected = session.ensure_connected(request.channel_id).await;
        if connected == Err(MusicError::SessionClosed) {
            // Torn down by /stop or the idle timer between lookup and connect.
            debug!("[{}] session closed underneath /play, retrying once", guild_id);
            session = registry.get_or_create(guild_id);
            connected = session.ensure_connected(request.channel_id).await;
        }

        if let Err(e) = connected {
            let reply = match &e {
                MusicError::Timeout => {
                    "I couldn't join that voice chat in time. Please try again.".to_string()
                }
                MusicError::Gateway(_) => {
                    error!(
                        "[{}] failed to connect to voice channel {}: {}",
                        guild_id, request.channel_id, e
                    );
                    "I couldn't join that voice chat. Check my permissions and try again."
                        .to_string()
                }
                _ => {
                    error!("[{}] unable to process voice connection: {}", guild_id, e);
                    e.to_string()
                }
            };
            // Another /play owns the in-flight handshake.
            if e != MusicError::Busy {
                session.disconnect().await;
            }
            return Reply::ephemeral(reply);
        }

        let player = registry.node().create_player(guild_id);
        if player.volume() != self.config.default_volume {
            if let Err(e) = player.set_volume(self.config.default_volume).await {
                warn!(
                    "[{}] unable to set player volume to {}: {}",
                    guild_id, self.config.default_volume, e
                );
            }
        }

        let result = match load_tracks(registry.node().as_ref(), query).await {
            Ok(result) => result,
            Err(e) => {
                if !player.is_playing() && player.queue_len() == 0 {
                    session.start_idle_timer();
                }
                return Reply::ephemeral(format!("I couldn't load that track: {}", e));
            }
        };

        let (tracks, reply) = queued_reply(result, request.user_id);
        match session.enqueue(tracks).await {
            Ok(started) => {
                debug!("[{}] queued (started playback: {})", guild_id, started);
                Reply::public(reply)
            }
            Err(e) => {
                warn!("[{}] failed to queue tracks: {}", guild_id, e);
                session.start_idle_timer();
                Reply::ephemeral(e.to_string())
            }
        }
    }

    pub async fn skip(&self, ctx: &CommandContext) -> Reply {
        let (registry, guild_id) = match self.controlling(ctx, "This only works inside a server.") {
            Ok(checked) => checked,
            Err(reply) => return reply,
        };
        let Some(player) = registry.node().player(guild_id).filter(|p| p.current().is_some())
        else {
            return Reply::ephemeral("Nothing is playing to skip.");
        };
        match player.skip().await {
            Ok(()) => Reply::public("Skipped the current track."),
            Err(e) => Reply::ephemeral(e.to_string()),
        }
    }

    pub async fn pause(&self, ctx: &CommandContext) -> Reply {
        let (registry, guild_id) = match self.controlling(ctx, "This only works inside a server.") {
            Ok(checked) => checked,
            Err(reply) => return reply,
        };
        let Some(player) = registry
            .node()
            .player(guild_id)
            .filter(|p| p.is_playing() && !p.paused())
        else {
            return Reply::ephemeral("There's nothing playing to pause.");
        };
        match player.set_pause(true).await {
            Ok(()) => Reply::public("Paused the music."),
            Err(e) => Reply::ephemeral(e.to_string()),
        }
    }

    pub async fn resume(&self, ctx: &CommandContext) -> Reply {
        let (registry, guild_id) = match self.controlling(ctx, "This only works inside a server.") {
            Ok(checked) => checked,
            Err(reply) => return reply,
        };
        let Some(player) = registry.node().player(guild_id).filter(|p| p.paused()) else {
            return Reply::ephemeral("I'm not paused right now.");
        };
        match player.set_pause(false).await {
            Ok(()) => Reply::public("Resumed playback."),
            Err(e) => Reply::ephemeral(e.to_string()),
        }
    }

    /// Open to everyone, including holders of the blocked role.
    pub fn queue(&self, ctx: &CommandContext) -> Reply {
        let Some(registry) = self.registry.as_ref() else {
            return Reply::ephemeral(NOT_CONFIGURED);
        };
        let Some(guild_id) = ctx.guild_id else {
            return Reply::ephemeral("This command must be used inside a server.");
        };

        let player = registry.node().player(guild_id);
        let current = player.as_ref().and_then(|p| p.current());
        let upcoming = player.as_ref().map(|p| p.queue()).unwrap_or_default();
        if current.is_none() && upcoming.is_empty() {
            return Reply::public("Nothing is queued up right now.");
        }

        let mut lines = Vec::new();
        if let Some(track) = &current {
            lines.push(format!("**Now playing:** {}", describe(track)));
        }
        if !upcoming.is_empty() {
            lines.push(String::new());
            lines.push("**Up next:**".to_string());
            for (i, track) in upcoming.iter().take(QUEUE_PREVIEW).enumerate() {
                lines.push(format!("{}. {}", i + 1, describe(track)));
            }
            if upcoming.len() > QUEUE_PREVIEW {
                lines.push(format!("...and {} more.", upcoming.len() - QUEUE_PREVIEW));
            }
        }
        Reply::public(lines.join("\n"))
    }

    pub async fn stop(&self, ctx: &CommandContext) -> Reply {
        let (registry, guild_id) = match self.controlling(ctx, "Use this inside a server.") {
            Ok(checked) => checked,
            Err(reply) => return reply,
        };

        let player = registry.node().player(guild_id);
        let session = registry.active(guild_id);
        if player.is_none() && session.is_none() {
            return Reply::ephemeral("There's no active music session to stop.");
        }

        if let Some(player) = player {
            player.clear_queue();
            if let Err(e) = player.stop().await {
                debug!("[{}] failed to stop player: {}", guild_id, e);
            }
            if let Err(e) = registry.node().remove_player(guild_id).await {
                warn!("[{}] failed to remove player: {}", guild_id, e);
            }
        }
        if let Some(session) = session {
            session.disconnect().await;
        }

        info!("[{}] music stopped by {}", guild_id, ctx.user_id);
        Reply::public("Music stopped and the bot left the voice channel.")
    }

    pub async fn node_stats(&self) -> Reply {
        let Some(registry) = self.registry.as_ref() else {
            return Reply::ephemeral(NOT_CONFIGURED);
        };
        let node = registry.node();
        let name = node.name();

        let stats = match node.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("Unable to refresh Lavalink stats for {}: {}", name, e);
                None
            }
        };
        Reply::ephemeral(format_node_stats(&name, node.is_available(), stats.as_ref()))
    }
}

/// Queue line: title, length and the requester mention.
fn describe(track: &Track) -> String {
    let mut line = format!(
        "{} (`{}`)",
        track.info.title,
        format_duration(track.duration_ms())
    );
    if let Some(requester) = track.requester() {
        line.push_str(&format!(" • requested by <@{}>", requester));
    }
    line
}

/// Tags the tracks with their requester and builds the confirmation. Search
/// results queue only the best match.
fn queued_reply(result: LoadResult, user_id: UserId) -> (Vec<Track>, String) {
    let (name, mut tracks) = match result {
        LoadResult::Playlist(playlist) => (Some(playlist.info.name), playlist.tracks),
        LoadResult::Track(track) => (None, vec![track]),
        LoadResult::Search(tracks) => (None, tracks.into_iter().take(1).collect()),
        LoadResult::Empty {} | LoadResult::Error(_) => (None, Vec::new()),
    };
    for track in &mut tracks {
        track.set_requester(user_id);
    }

    let reply = match (name, tracks.first()) {
        (Some(name), _) => format!(
            "Queued playlist **{}** with {} tracks for <@{}>",
            name,
            tracks.len(),
            user_id
        ),
        (None, Some(track)) => {
            let mut reply = format!(
                "Queued **{}** (`{}`) for <@{}>",
                track.info.title,
                format_duration(track.duration_ms()),
                user_id
            );
            if let Some(uri) = &track.info.uri {
                reply.push_str(&format!("\n<{}>", uri));
            }
            reply
        }
        (None, None) => String::new(),
    };
    (tracks, reply)
}
