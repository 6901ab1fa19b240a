//! Routes gateway dispatches to the voice cache, the voice handshake, the
//! audio node and the slash command handlers.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, error, info, warn};

use crate::{
    commands::{Command, CommandContext, MusicCommands, Reply, command_definitions},
    common::{ApplicationId, GuildId, UserId},
    discord::{
        DiscordError, DiscordRest, GatewayEvent, Interaction, VoiceStateCache,
        payloads::INTERACTION_APPLICATION_COMMAND,
    },
    music::{VoiceServerEvent, VoiceStateEvent},
    node::NodeClient,
};

pub struct Dispatcher {
    rest: Arc<DiscordRest>,
    voice_cache: VoiceStateCache,
    commands: MusicCommands,
    node: Option<Arc<NodeClient>>,
    dev_guild_id: Option<GuildId>,
    registered: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        rest: Arc<DiscordRest>,
        commands: MusicCommands,
        node: Option<Arc<NodeClient>>,
        dev_guild_id: Option<GuildId>,
    ) -> Self {
        Self {
            rest,
            voice_cache: VoiceStateCache::default(),
            commands,
            node,
            dev_guild_id,
            registered: AtomicBool::new(false),
        }
    }

    /// Consumes gateway events until the gateway is dropped. Interactions run
    /// on their own tasks; voice events are applied in order.
    pub async fn run(self: Arc<Self>, events: flume::Receiver<GatewayEvent>) {
        while let Ok(event) = events.recv_async().await {
            self.handle_event(event).await;
        }
        debug!("Gateway event channel closed");
    }

    pub async fn handle_event(self: &Arc<Self>, event: GatewayEvent) {
        match event {
            GatewayEvent::Ready {
                user_id,
                application_id,
            } => self.on_ready(user_id, application_id),
            GatewayEvent::VoiceStateUpdate(event) => self.on_voice_state(&event).await,
            GatewayEvent::VoiceServerUpdate(event) => self.on_voice_server(&event).await,
            GatewayEvent::GuildCreate {
                guild_id,
                voice_states,
            } => {
                self.voice_cache.clear_guild(guild_id);
                for state in &voice_states {
                    self.voice_cache.update(state);
                }
                debug!("[{}] cached {} voice states", guild_id, voice_states.len());
            }
            GatewayEvent::InteractionCreate(interaction) => {
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    dispatcher.handle_interaction(*interaction).await;
                });
            }
        }
    }

    fn on_ready(self: &Arc<Self>, user_id: UserId, application_id: ApplicationId) {
        if let Some(node) = &self.node {
            node.start(user_id);
        }

        if self.registered.swap(true, Ordering::SeqCst) {
            return;
        }
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let guild_id = dispatcher.dev_guild_id;
            match dispatcher
                .rest
                .register_commands(application_id, guild_id, &command_definitions())
                .await
            {
                Ok(()) => info!(
                    "Registered slash commands ({})",
                    guild_id.map_or("global".to_string(), |g| format!("guild {}", g))
                ),
                Err(e) => {
                    error!("Failed to register slash commands: {}", e);
                    dispatcher.registered.store(false, Ordering::SeqCst);
                }
            }
        });
    }

    fn is_bot(&self, user_id: UserId) -> bool {
        self.commands
            .registry()
            .and_then(|r| r.handshake().gateway().bot_user_id())
            == Some(user_id)
    }

    async fn on_voice_state(&self, event: &VoiceStateEvent) {
        self.voice_cache.update(event);
        if !self.is_bot(event.user_id) {
            return;
        }

        if let Some(registry) = self.commands.registry() {
            registry.handshake().handle_voice_state(event);
        }
        if let Some(node) = &self.node {
            node.forward_voice_state(event).await;
        }
    }

    async fn on_voice_server(&self, event: &VoiceServerEvent) {
        if let Some(registry) = self.commands.registry() {
            registry.handshake().handle_voice_server(event);
        }
        if let Some(node) = &self.node {
            node.forward_voice_server(event).await;
        }
    }

    fn context(&self, interaction: &Interaction, user_id: UserId) -> CommandContext {
        CommandContext {
            guild_id: interaction.guild_id,
            user_id,
            roles: interaction.roles().to_vec(),
            voice_channel: interaction
                .guild_id
                .and_then(|guild_id| self.voice_cache.channel_of(guild_id, user_id)),
        }
    }

    async fn handle_interaction(&self, interaction: Interaction) {
        if interaction.kind != INTERACTION_APPLICATION_COMMAND {
            return;
        }
        let Some(name) = interaction.command_name() else {
            return;
        };
        let Some(command) = Command::from_name(name) else {
            debug!("Ignoring unknown command /{}", name);
            return;
        };
        let Some(user_id) = interaction.user_id() else {
            warn!("Interaction {} has no invoking user", interaction.id);
            return;
        };

        let ctx = self.context(&interaction, user_id);
        debug!("/{} from {} in {:?}", name, user_id, ctx.guild_id);

        let result = match command {
            Command::Play => self.play(&interaction, &ctx).await,
            Command::NodeStats => self.node_stats(&interaction).await,
            Command::Skip => self.respond(&interaction, self.commands.skip(&ctx).await).await,
            Command::Pause => self.respond(&interaction, self.commands.pause(&ctx).await).await,
            Command::Resume => self.respond(&interaction, self.commands.resume(&ctx).await).await,
            Command::Queue => self.respond(&interaction, self.commands.queue(&ctx)).await,
            Command::Stop => self.respond(&interaction, self.commands.stop(&ctx).await).await,
        };

        if let Err(e) = result {
            warn!("Failed to answer /{}: {}", name, e);
        }
    }

    async fn respond(&self, interaction: &Interaction, reply: Reply) -> Result<(), DiscordError> {
        self.rest
            .respond(interaction.id, &interaction.token, &reply)
            .await
    }

    /// Answers a deferred interaction. Ephemeral replies cannot replace a
    /// public placeholder, so they go out as a followup instead.
    async fn deliver(&self, interaction: &Interaction, reply: Reply) -> Result<(), DiscordError> {
        let (app, token) = (interaction.application_id, interaction.token.as_str());
        if !reply.ephemeral {
            return self.rest.edit_original(app, token, &reply.content).await;
        }
        self.rest.followup(app, token, &reply).await?;
        self.rest.delete_original(app, token).await
    }

    async fn play(&self, interaction: &Interaction, ctx: &CommandContext) -> Result<(), DiscordError> {
        let request = match self.commands.check_play(ctx) {
            Ok(request) => request,
            Err(reply) => return self.respond(interaction, reply).await,
        };

        // Joining voice and loading tracks can outlast the 3s response window.
        self.rest
            .defer(interaction.id, &interaction.token, false)
            .await?;
        let query = interaction.option_str("query").unwrap_or_default();
        let reply = self.commands.play(request, query).await;
        self.deliver(interaction, reply).await
    }

    async fn node_stats(&self, interaction: &Interaction) -> Result<(), DiscordError> {
        if self.commands.registry().is_none() {
            return self
                .respond(interaction, self.commands.node_stats().await)
                .await;
        }

        self.rest
            .defer(interaction.id, &interaction.token, true)
            .await?;
        let reply = self.commands.node_stats().await;
        self.rest
            .edit_original(interaction.application_id, &interaction.token, &reply.content)
            .await
    }
}
