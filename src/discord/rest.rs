use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::{
    commands::Reply,
    common::{ApplicationId, GuildId, InteractionId},
};

const API_BASE: &str = "https://discord.com/api/v10";

const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
const CALLBACK_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
const FLAG_EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Discord returned {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// The handful of REST routes the bot needs: command registration and
/// interaction responses.
pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
}

fn message_body(reply: &Reply) -> Value {
    let mut body = json!({ "content": reply.content });
    if reply.ephemeral {
        body["flags"] = json!(FLAG_EPHEMERAL);
    }
    body
}

impl DiscordRest {
    pub fn new(http: reqwest::Client, token: String) -> Self {
        Self { http, token }
    }

    /// Overwrites the application's commands, on one guild when `guild_id`
    /// is set (visible immediately) or globally.
    pub async fn register_commands(
        &self,
        application_id: ApplicationId,
        guild_id: Option<GuildId>,
        commands: &Value,
    ) -> Result<(), DiscordError> {
        let url = match guild_id {
            Some(guild_id) => format!(
                "{}/applications/{}/guilds/{}/commands",
                API_BASE, application_id, guild_id
            ),
            None => format!("{}/applications/{}/commands", API_BASE, application_id),
        };
        self.execute(self.http.put(url).json(commands)).await
    }

    pub async fn respond(
        &self,
        interaction_id: InteractionId,
        token: &str,
        reply: &Reply,
    ) -> Result<(), DiscordError> {
        let body = json!({
            "type": CALLBACK_CHANNEL_MESSAGE,
            "data": message_body(reply),
        });
        self.execute(self.http.post(self.callback_url(interaction_id, token)).json(&body))
            .await
    }

    /// Acknowledges the interaction; the answer follows via `edit_original`
    /// or `followup`.
    pub async fn defer(
        &self,
        interaction_id: InteractionId,
        token: &str,
        ephemeral: bool,
    ) -> Result<(), DiscordError> {
        let mut body = json!({ "type": CALLBACK_DEFERRED_CHANNEL_MESSAGE });
        if ephemeral {
            body["data"] = json!({ "flags": FLAG_EPHEMERAL });
        }
        self.execute(self.http.post(self.callback_url(interaction_id, token)).json(&body))
            .await
    }

    pub async fn edit_original(
        &self,
        application_id: ApplicationId,
        token: &str,
        content: &str,
    ) -> Result<(), DiscordError> {
        let url = format!("{}/messages/@original", self.webhook_url(application_id, token));
        self.execute(self.http.patch(url).json(&json!({ "content": content })))
            .await
    }

    pub async fn delete_original(
        &self,
        application_id: ApplicationId,
        token: &str,
    ) -> Result<(), DiscordError> {
        let url = format!("{}/messages/@original", self.webhook_url(application_id, token));
        self.execute(self.http.delete(url)).await
    }

    pub async fn followup(
        &self,
        application_id: ApplicationId,
        token: &str,
        reply: &Reply,
    ) -> Result<(), DiscordError> {
        let url = self.webhook_url(application_id, token);
        self.execute(self.http.post(url).json(&message_body(reply)))
            .await
    }

    fn callback_url(&self, interaction_id: InteractionId, token: &str) -> String {
        format!("{}/interactions/{}/{}/callback", API_BASE, interaction_id, token)
    }

    fn webhook_url(&self, application_id: ApplicationId, token: &str) -> String {
        format!("{}/webhooks/{}/{}", API_BASE, application_id, token)
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<(), DiscordError> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        debug!("Discord REST call failed with {}: {}", status, message);
        Err(DiscordError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
