use parking_lot::RwLock;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    common::GuildId,
    configs::LavalinkConfig,
    node::NodeError,
    protocol::{LoadResult, PlayerUpdate, Stats},
};

/// Error body returned by the node for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: Option<String>,
}

/// REST half of the node connection. The websocket `ready` op supplies the
/// session id that player routes are scoped to.
pub struct RestClient {
    http: reqwest::Client,
    base: String,
    password: String,
    session_id: RwLock<Option<String>>,
}

impl RestClient {
    pub fn new(http: reqwest::Client, config: &LavalinkConfig) -> Self {
        Self {
            http,
            base: config.rest_base(),
            password: config.password.clone(),
            session_id: RwLock::new(None),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write() = session_id;
    }

    fn require_session(&self) -> Result<String, NodeError> {
        self.session_id().ok_or(NodeError::NotReady)
    }

    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult, NodeError> {
        let url = format!(
            "{}/loadtracks?identifier={}",
            self.base,
            urlencoding::encode(identifier)
        );
        self.send_json(self.http.get(url)).await
    }

    pub async fn update_player(
        &self,
        guild_id: GuildId,
        update: &PlayerUpdate,
    ) -> Result<(), NodeError> {
        let session_id = self.require_session()?;
        let url = format!("{}/sessions/{}/players/{}", self.base, session_id, guild_id);
        debug!("[{}] PATCH player {:?}", guild_id, update);
        self.send(self.http.patch(url).json(update)).await
    }

    pub async fn destroy_player(&self, guild_id: GuildId) -> Result<(), NodeError> {
        let session_id = self.require_session()?;
        let url = format!("{}/sessions/{}/players/{}", self.base, session_id, guild_id);
        self.send(self.http.delete(url)).await
    }

    /// Keeps the session alive on the node for `timeout_secs` after the
    /// websocket drops, so a reconnect can resume it.
    pub async fn configure_resuming(&self, timeout_secs: u64) -> Result<(), NodeError> {
        let session_id = self.require_session()?;
        let url = format!("{}/sessions/{}", self.base, session_id);
        let body = serde_json::json!({ "resuming": true, "timeout": timeout_secs });
        self.send(self.http.patch(url).json(&body)).await
    }

    pub async fn stats(&self) -> Result<Stats, NodeError> {
        self.send_json(self.http.get(format!("{}/stats", self.base)))
            .await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), NodeError> {
        self.execute(request).await.map(|_| ())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, NodeError> {
        Ok(self.execute(request).await?.json::<T>().await?)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, NodeError> {
        let response = request
            .header("Authorization", &self.password)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message.unwrap_or(body.error),
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        Err(NodeError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
