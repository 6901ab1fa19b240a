use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exception severity levels reported by the audio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Common,
    Suspicious,
    Fault,
}

/// Errors surfaced by the music subsystem.
///
/// The `Display` text of each variant is written to be shown to users as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MusicError {
    #[error("Music playback isn't configured.")]
    NotConfigured,

    #[error("Bot user is not ready yet. Try again in a moment.")]
    NotReady,

    #[error("Please provide a search term or link.")]
    EmptyQuery,

    #[error("No matches found for that query.")]
    NoMatches,

    #[error("Lavalink error: {0}")]
    LoadFailed(String),

    /// The voice handshake was not acknowledged within the configured window.
    #[error("Timed out waiting for the voice connection.")]
    Timeout,

    #[error("Voice gateway error: {0}")]
    Gateway(String),

    #[error("Audio node error: {0}")]
    Node(String),

    /// The session was torn down while the caller still held it.
    #[error("The music session ended. Please try again.")]
    SessionClosed,

    /// Another voice handshake for this guild is still in flight.
    #[error("I'm still joining a voice channel. Please try again in a moment.")]
    Busy,
}

pub type MusicResult<T> = Result<T, MusicError>;
