use serde::{Deserialize, Serialize};

use crate::{
    common::{GuildId, Severity},
    protocol::{stats::Stats, tracks::Track},
};

/// Messages the node sends over its websocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum IncomingMessage {
    #[serde(rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate { guild_id: GuildId, state: PlayerState },
    Stats {
        #[serde(flatten)]
        stats: Stats,
    },
    Event {
        #[serde(flatten)]
        event: NodeEvent,
    },
    #[serde(other)]
    Unknown,
}

/// Player lifecycle events emitted by the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    #[serde(rename = "TrackStartEvent", rename_all = "camelCase")]
    TrackStart { guild_id: GuildId, track: Track },

    #[serde(rename = "TrackEndEvent", rename_all = "camelCase")]
    TrackEnd {
        guild_id: GuildId,
        track: Track,
        reason: TrackEndReason,
    },

    #[serde(rename = "TrackExceptionEvent", rename_all = "camelCase")]
    TrackException {
        guild_id: GuildId,
        track: Track,
        exception: TrackException,
    },

    #[serde(rename = "TrackStuckEvent", rename_all = "camelCase")]
    TrackStuck {
        guild_id: GuildId,
        track: Track,
        threshold_ms: u64,
    },

    #[serde(rename = "WebSocketClosedEvent", rename_all = "camelCase")]
    WebSocketClosed {
        guild_id: GuildId,
        code: u16,
        reason: String,
        by_remote: bool,
    },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackException {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}

impl std::fmt::Display for TrackException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({:?}): {}", message, self.severity, self.cause),
            None => write!(f, "{:?}: {}", self.severity, self.cause),
        }
    }
}

/// Periodic player state pushed by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub time: u64,
    pub position: u64,
    pub connected: bool,
    /// Voice gateway ping in milliseconds. -1 if not connected.
    pub ping: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACK: &str = r#"{
        "encoded": "QAAAjQIA",
        "info": {
            "identifier": "abc",
            "isSeekable": true,
            "author": "Artist",
            "length": 1000,
            "isStream": false,
            "position": 0,
            "title": "Song",
            "uri": null,
            "sourceName": "youtube"
        }
    }"#;

    #[test]
    fn test_ready_message() {
        let msg: IncomingMessage =
            serde_json::from_str(r#"{"op":"ready","resumed":false,"sessionId":"la3kfsdf5eafe848"}"#)
                .unwrap();
        match msg {
            IncomingMessage::Ready { resumed, session_id } => {
                assert!(!resumed);
                assert_eq!(session_id, "la3kfsdf5eafe848");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_track_end_event() {
        let raw = format!(
            r#"{{"op":"event","type":"TrackEndEvent","guildId":"42","track":{},"reason":"finished"}}"#,
            TRACK
        );
        let msg: IncomingMessage = serde_json::from_str(&raw).unwrap();
        match msg {
            IncomingMessage::Event {
                event: NodeEvent::TrackEnd { guild_id, reason, track },
            } => {
                assert_eq!(guild_id, GuildId(42));
                assert_eq!(reason, TrackEndReason::Finished);
                assert_eq!(track.info.title, "Song");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_track_exception_event() {
        let raw = format!(
            r#"{{"op":"event","type":"TrackExceptionEvent","guildId":"7","track":{},
                "exception":{{"message":"Something broke","severity":"fault","cause":"io"}}}}"#,
            TRACK
        );
        let msg: IncomingMessage = serde_json::from_str(&raw).unwrap();
        let IncomingMessage::Event {
            event: NodeEvent::TrackException { exception, .. },
        } = msg
        else {
            panic!("expected exception event");
        };
        assert_eq!(exception.severity, Severity::Fault);
        assert_eq!(exception.to_string(), "Something broke (Fault): io");
    }

    #[test]
    fn test_unknown_ops_and_events_are_tolerated() {
        let msg: IncomingMessage = serde_json::from_str(r#"{"op":"somethingNew"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Unknown));

        let msg: IncomingMessage =
            serde_json::from_str(r#"{"op":"event","type":"LyricsFoundEvent","guildId":"1"}"#).unwrap();
        assert!(matches!(
            msg,
            IncomingMessage::Event {
                event: NodeEvent::Unknown
            }
        ));
    }
}
