pub mod commands;
pub mod common;
pub mod configs;
pub mod discord;
pub mod dispatcher;
pub mod music;
pub mod node;
pub mod protocol;
