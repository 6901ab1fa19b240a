//! Discord side of the bot: the gateway connection, the REST routes for
//! slash commands and the member voice state cache.

pub mod gateway;
pub mod payloads;
pub mod rest;
pub mod voice_cache;

pub use gateway::{DiscordGateway, GatewayEvent};
pub use payloads::Interaction;
pub use rest::{DiscordError, DiscordRest};
pub use voice_cache::VoiceStateCache;
