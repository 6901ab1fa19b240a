use serde::Serialize;

/// Body of `PATCH /v4/sessions/{sessionId}/players/{guildId}`.
/// Absent fields are left untouched by the node.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdateTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
}

/// `encoded: null` stops the current track.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrack {
    pub encoded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

impl PlayerUpdate {
    pub fn play(encoded: String, user_data: serde_json::Value) -> Self {
        Self {
            track: Some(UpdateTrack {
                encoded: Some(encoded),
                user_data: Some(user_data),
            }),
            paused: Some(false),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            track: Some(UpdateTrack {
                encoded: None,
                user_data: None,
            }),
            ..Default::default()
        }
    }
}

/// Voice connection details forwarded from the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}
