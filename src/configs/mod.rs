pub mod base;
pub mod bot;
pub mod lavalink;
pub mod logging;
pub mod music;

pub use base::*;
pub use bot::*;
pub use lavalink::*;
pub use logging::*;
pub use music::*;
