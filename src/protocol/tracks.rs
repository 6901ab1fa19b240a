use serde::{Deserialize, Serialize};

use crate::common::{Severity, UserId};

/// A single audio track with encoded data and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Opaque base64 blob the node uses to play the track.
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    /// Client-side data attached to the track. We keep the requester here.
    #[serde(default = "default_json_object")]
    pub user_data: serde_json::Value,
}

fn default_json_object() -> serde_json::Value {
    serde_json::json!({})
}

impl Track {
    pub fn set_requester(&mut self, user: UserId) {
        if !self.user_data.is_object() {
            self.user_data = default_json_object();
        }
        self.user_data["requester"] = serde_json::Value::String(user.to_string());
    }

    pub fn requester(&self) -> Option<UserId> {
        self.user_data
            .get("requester")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Track length for display; `None` for live streams.
    pub fn duration_ms(&self) -> Option<u64> {
        (!self.info.is_stream).then_some(self.info.length)
    }
}

/// Metadata for an audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duration in milliseconds. 0 for streams.
    pub length: u64,
    pub is_stream: bool,
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    pub source_name: String,
}

/// Result of `GET /v4/loadtracks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResult {
    Track(Track),
    Playlist(PlaylistData),
    Search(Vec<Track>),
    Empty {},
    Error(LoadError),
}

impl LoadResult {
    pub fn tracks(&self) -> &[Track] {
        match self {
            Self::Track(track) => std::slice::from_ref(track),
            Self::Playlist(playlist) => &playlist.tracks,
            Self::Search(tracks) => tracks,
            Self::Empty {} | Self::Error(_) => &[],
        }
    }

    pub fn is_playlist(&self) -> bool {
        matches!(self, Self::Playlist(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    #[serde(default = "default_json_object")]
    pub plugin_info: serde_json::Value,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    /// Index of the selected track, or -1 if none.
    pub selected_track: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadError {
    pub message: Option<String>,
    pub severity: Severity,
    pub cause: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_track(title: &str) -> Track {
        Track {
            encoded: format!("QAAA{}", title.len()),
            info: TrackInfo {
                identifier: title.to_lowercase().replace(' ', "-"),
                is_seekable: true,
                author: "Rick Astley".to_string(),
                length: 212_000,
                is_stream: false,
                position: 0,
                title: title.to_string(),
                uri: Some(format!("https://www.youtube.com/watch?v={}", title.len())),
                artwork_url: None,
                isrc: None,
                source_name: "youtube".to_string(),
            },
            plugin_info: default_json_object(),
            user_data: default_json_object(),
        }
    }

    #[test]
    fn test_search_result_deserializes() {
        let raw = r#"{
            "loadType": "search",
            "data": [{
                "encoded": "QAAAjQIAJVJpY2s=",
                "info": {
                    "identifier": "dQw4w9WgXcQ",
                    "isSeekable": true,
                    "author": "RickAstleyVEVO",
                    "length": 212000,
                    "isStream": false,
                    "position": 0,
                    "title": "Rick Astley - Never Gonna Give You Up",
                    "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                    "artworkUrl": null,
                    "isrc": null,
                    "sourceName": "youtube"
                },
                "pluginInfo": {},
                "userData": {}
            }]
        }"#;
        let result: LoadResult = serde_json::from_str(raw).unwrap();
        assert!(!result.is_playlist());
        assert_eq!(result.tracks().len(), 1);
        assert_eq!(result.tracks()[0].info.identifier, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_empty_and_error_results() {
        let empty: LoadResult = serde_json::from_str(r#"{"loadType":"empty","data":{}}"#).unwrap();
        assert!(empty.tracks().is_empty());

        let error: LoadResult = serde_json::from_str(
            r#"{"loadType":"error","data":{"message":"Video unavailable","severity":"common","cause":"boom"}}"#,
        )
        .unwrap();
        match error {
            LoadResult::Error(e) => {
                assert_eq!(e.message.as_deref(), Some("Video unavailable"));
                assert_eq!(e.severity, Severity::Common);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_requester_roundtrips_through_user_data() {
        let mut track = sample_track("Never Gonna Give You Up");
        assert_eq!(track.requester(), None);
        track.set_requester(UserId(99));
        assert_eq!(track.requester(), Some(UserId(99)));
        assert_eq!(track.user_data["requester"], "99");
    }

    #[test]
    fn test_stream_has_no_duration() {
        let mut track = sample_track("Lofi Radio");
        assert_eq!(track.duration_ms(), Some(212_000));
        track.info.is_stream = true;
        assert_eq!(track.duration_ms(), None);
    }
}
