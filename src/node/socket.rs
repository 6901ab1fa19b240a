use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    http::HeaderValue,
    protocol::Message,
};
use tracing::{debug, error, info, warn};

use crate::{
    common::{AnyResult, UserId, backoff::Backoff},
    node::NodeClient,
    protocol::IncomingMessage,
};

const BACKOFF_BASE_MS: u64 = 1_000;
const CLIENT_NAME: &str = concat!("tunebot/", env!("CARGO_PKG_VERSION"));

/// What the reconnect loop should do after a connection ends.
enum SocketOutcome {
    Reconnect,
    Shutdown,
}

/// Keeps the node websocket connected until the client is shut down.
pub(super) async fn run(client: Arc<NodeClient>, user_id: UserId) -> AnyResult<()> {
    let mut backoff = Backoff::new(BACKOFF_BASE_MS, None);

    loop {
        if client.cancel_token().is_cancelled() {
            return Ok(());
        }

        match connect(&client, user_id, &mut backoff).await {
            Ok(SocketOutcome::Shutdown) => {
                debug!("Lavalink socket shutting down cleanly");
                return Ok(());
            }
            Ok(SocketOutcome::Reconnect) => {
                let delay = backoff.next();
                warn!("Lavalink socket closed. Reconnecting in {:?}", delay);
                sleep_or_cancel(&client, delay).await;
            }
            Err(e) => {
                let delay = backoff.next();
                warn!(
                    "Lavalink connection error (attempt {}): {}. Retrying in {:?}",
                    backoff.attempt(),
                    e,
                    delay
                );
                sleep_or_cancel(&client, delay).await;
            }
        }
    }
}

async fn sleep_or_cancel(client: &NodeClient, delay: std::time::Duration) {
    tokio::select! {
        _ = client.cancel_token().cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

async fn connect(
    client: &NodeClient,
    user_id: UserId,
    backoff: &mut Backoff,
) -> AnyResult<SocketOutcome> {
    let url = client.config().websocket_url();
    let mut request = url.as_str().into_client_request()?;
    {
        let headers = request.headers_mut();
        headers.insert("Authorization", HeaderValue::from_str(&client.config().password)?);
        headers.insert("User-Id", HeaderValue::from_str(&user_id.to_string())?);
        headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));
        if let Some(session_id) = client.rest().session_id() {
            debug!("Attempting to resume Lavalink session {}", session_id);
            headers.insert("Session-Id", HeaderValue::from_str(&session_id)?);
        }
    }

    let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
    let (mut write, mut read) = ws_stream.split();
    info!("Connected to Lavalink websocket at {}", url);
    backoff.reset();

    let outcome = loop {
        tokio::select! {
            _ = client.cancel_token().cancelled() => {
                break SocketOutcome::Shutdown;
            }
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("Lavalink WS read error: {}", e);
                        break SocketOutcome::Reconnect;
                    }
                    None => {
                        debug!("Lavalink WS stream ended");
                        break SocketOutcome::Reconnect;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<IncomingMessage>(text.as_str()) {
                        Ok(message) => client.handle_message(message).await,
                        Err(e) => error!("Failed to parse Lavalink message: {} - Text: {}", e, text.as_str()),
                    },
                    Message::Close(frame) => {
                        let (code, reason) = frame
                            .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                            .unwrap_or((1000, "No reason".into()));
                        info!("Lavalink WS closed: code={}, reason='{}'", code, reason);
                        break SocketOutcome::Reconnect;
                    }
                    _ => {}
                }
            }
        }
    };

    client.set_available(false);
    if let SocketOutcome::Shutdown = outcome {
        let _ = write.send(Message::Close(None)).await;
    }
    Ok(outcome)
}
