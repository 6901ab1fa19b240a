use std::sync::Arc;

use tracing::{error, info, warn};
use tunebot::{
    commands::MusicCommands,
    common::{
        AnyResult, HttpClient,
        banner::{BannerInfo, print_banner},
        logger,
    },
    configs::Config,
    discord::{DiscordGateway, DiscordRest},
    dispatcher::Dispatcher,
    music::{NodeEventBridge, SessionRegistry, VoiceHandshake, session::SessionTimeouts},
    node::NodeClient,
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(config.logging.as_ref());
    let node_name = config.lavalink.as_ref().map(|l| l.node_name());
    print_banner(&BannerInfo::default(), &config.bot.environment, node_name.as_deref());

    let http = HttpClient::new()?;
    let (gateway, gateway_events) = DiscordGateway::new(config.bot.token.clone());
    let handshake = Arc::new(VoiceHandshake::new(gateway.clone()));

    let (node, registry) = match &config.lavalink {
        Some(lavalink) => {
            let (node, playback_events) = NodeClient::new(lavalink.clone(), http.clone());
            let registry = SessionRegistry::new(
                handshake,
                node.clone(),
                SessionTimeouts::from(&config.music),
            );
            tokio::spawn(NodeEventBridge::new(registry.clone()).run(playback_events));
            (Some(node), Some(registry))
        }
        None => {
            warn!("No [lavalink] section configured, music commands are disabled");
            (None, None)
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(DiscordRest::new(http, config.bot.token.clone())),
        MusicCommands::new(registry.clone(), config.music.clone()),
        node.clone(),
        config.bot.dev_guild_id,
    ));
    tokio::spawn(dispatcher.run(gateway_events));

    let gateway_task = tokio::spawn(gateway.clone().run());
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        result = gateway_task => match result {
            Ok(Ok(())) => info!("Discord gateway stopped"),
            Ok(Err(e)) => error!("Discord gateway stopped: {}", e),
            Err(e) => error!("Discord gateway task failed: {}", e),
        },
    }

    if let Some(registry) = &registry {
        info!("Leaving {} voice session(s)", registry.len());
        registry.disconnect_all().await;
    }
    if let Some(node) = &node {
        node.shutdown();
    }
    gateway.shutdown();

    Ok(())
}
