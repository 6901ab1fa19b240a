//! Lavalink v4 wire types, as consumed by the node client.

pub mod events;
pub mod player;
pub mod stats;
pub mod tracks;

pub use events::*;
pub use player::*;
pub use stats::*;
pub use tracks::*;
