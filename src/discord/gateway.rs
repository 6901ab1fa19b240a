use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    common::{AnyResult, ApplicationId, ChannelId, GuildId, MusicError, MusicResult, UserId, backoff::Backoff},
    music::{VoiceGateway, VoiceServerEvent, VoiceStateEvent},
};

use super::payloads::{
    GatewayCommand, GatewayPayload, GuildCreateData, HelloData, INTENTS, Interaction,
    OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO, OP_IDENTIFY, OP_INVALID_SESSION,
    OP_RECONNECT, OP_RESUME, OP_VOICE_STATE_UPDATE, ReadyData, VoiceServerData, VoiceStateData,
};

const GATEWAY_URL: &str = "wss://gateway.discord.gg";
const GATEWAY_QUERY: &str = "/?v=10&encoding=json";
const BACKOFF_BASE_MS: u64 = 1_000;

/// Close codes after which reconnecting cannot succeed.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

/// Gateway dispatches the rest of the bot consumes.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready {
        user_id: UserId,
        application_id: ApplicationId,
    },
    VoiceStateUpdate(VoiceStateEvent),
    VoiceServerUpdate(VoiceServerEvent),
    GuildCreate {
        guild_id: GuildId,
        voice_states: Vec<VoiceStateEvent>,
    },
    InteractionCreate(Box<Interaction>),
}

/// A decoded dispatch. READY and RESUMED also update the connection state.
#[derive(Debug)]
enum Dispatch {
    Ready(ReadyData),
    Resumed,
    Event(GatewayEvent),
}

fn decode_dispatch(name: &str, data: serde_json::Value) -> serde_json::Result<Option<Dispatch>> {
    let dispatch = match name {
        "READY" => Dispatch::Ready(serde_json::from_value(data)?),
        "RESUMED" => Dispatch::Resumed,
        "VOICE_STATE_UPDATE" => {
            let state: VoiceStateData = serde_json::from_value(data)?;
            match state.to_event(None) {
                Some(event) => Dispatch::Event(GatewayEvent::VoiceStateUpdate(event)),
                None => return Ok(None),
            }
        }
        "VOICE_SERVER_UPDATE" => {
            let server: VoiceServerData = serde_json::from_value(data)?;
            Dispatch::Event(GatewayEvent::VoiceServerUpdate(server.into()))
        }
        "GUILD_CREATE" => {
            let guild: GuildCreateData = serde_json::from_value(data)?;
            let voice_states = guild
                .voice_states
                .iter()
                .filter_map(|state| state.to_event(Some(guild.id)))
                .collect();
            Dispatch::Event(GatewayEvent::GuildCreate {
                guild_id: guild.id,
                voice_states,
            })
        }
        "INTERACTION_CREATE" => {
            Dispatch::Event(GatewayEvent::InteractionCreate(Box::new(serde_json::from_value(data)?)))
        }
        _ => return Ok(None),
    };
    Ok(Some(dispatch))
}

/// What is needed to resume the last session after a reconnect.
#[derive(Default)]
struct ResumeState {
    session_id: Option<String>,
    resume_url: Option<String>,
    sequence: Option<u64>,
}

impl ResumeState {
    fn url(&self) -> String {
        let base = match (&self.session_id, &self.resume_url) {
            (Some(_), Some(url)) => url.trim_end_matches('/'),
            _ => GATEWAY_URL,
        };
        format!("{}{}", base, GATEWAY_QUERY)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

enum SocketOutcome {
    Reconnect,
    Shutdown,
    Fatal(u16),
}

/// Discord gateway connection: identify/resume, heartbeats and the outbound
/// op 4 queue. Dispatches are published on the event channel.
pub struct DiscordGateway {
    token: String,
    bot_user: RwLock<Option<UserId>>,
    resume: Mutex<ResumeState>,
    connected: AtomicBool,
    outbound_tx: flume::Sender<String>,
    outbound_rx: flume::Receiver<String>,
    events: flume::Sender<GatewayEvent>,
    cancel: CancellationToken,
}

impl DiscordGateway {
    pub fn new(token: String) -> (Arc<Self>, flume::Receiver<GatewayEvent>) {
        let (outbound_tx, outbound_rx) = flume::unbounded();
        let (events, receiver) = flume::unbounded();
        let gateway = Arc::new(Self {
            token,
            bot_user: RwLock::new(None),
            resume: Mutex::new(ResumeState::default()),
            connected: AtomicBool::new(false),
            outbound_tx,
            outbound_rx,
            events,
            cancel: CancellationToken::new(),
        });
        (gateway, receiver)
    }

    /// Keeps the gateway connected until `shutdown` or a fatal close code.
    pub async fn run(self: Arc<Self>) -> AnyResult<()> {
        let mut backoff = Backoff::new(BACKOFF_BASE_MS, None);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let outcome = self.connect(&mut backoff).await;
            self.connected.store(false, Ordering::SeqCst);

            match outcome {
                Ok(SocketOutcome::Shutdown) => {
                    debug!("Discord gateway shutting down cleanly");
                    return Ok(());
                }
                Ok(SocketOutcome::Fatal(code)) => {
                    return Err(format!("Discord gateway closed with fatal code {}", code).into());
                }
                Ok(SocketOutcome::Reconnect) => {
                    let delay = backoff.next();
                    info!("Discord gateway disconnected. Reconnecting in {:?}", delay);
                    self.sleep_or_cancel(delay).await;
                }
                Err(e) => {
                    let delay = backoff.next();
                    warn!(
                        "Discord gateway error (attempt {}): {}. Retrying in {:?}",
                        backoff.attempt(),
                        e,
                        delay
                    );
                    self.sleep_or_cancel(delay).await;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn sleep_or_cancel(&self, delay: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    async fn connect(&self, backoff: &mut Backoff) -> AnyResult<SocketOutcome> {
        let url = self.resume.lock().url();
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();
        info!("Connected to Discord gateway at {}", url);

        let heartbeat_ms = wait_for_hello(&mut read).await?;
        debug!("Received HELLO, heartbeat interval: {}ms", heartbeat_ms);

        let handshake = self.identify_or_resume();
        write.send(Message::Text(handshake.into())).await?;

        // Frames queued while we were offline would act on stale state.
        for stale in self.outbound_rx.drain() {
            debug!("Dropping queued gateway frame from previous connection: {}", stale);
        }

        let interval = Duration::from_millis(heartbeat_ms);
        let jitter = rand::thread_rng().gen_range(0.0..1.0);
        let mut heartbeat =
            tokio::time::interval_at(Instant::now() + interval.mul_f64(jitter), interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut acked = true;

        let outcome = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break SocketOutcome::Shutdown,

                _ = heartbeat.tick() => {
                    if !acked {
                        warn!("Discord gateway missed a heartbeat ACK, reconnecting");
                        break SocketOutcome::Reconnect;
                    }
                    acked = false;
                    if let Err(e) = write.send(Message::Text(self.heartbeat().into())).await {
                        warn!("Failed to send heartbeat: {}", e);
                        break SocketOutcome::Reconnect;
                    }
                }

                frame = self.outbound_rx.recv_async() => {
                    let Ok(frame) = frame else { break SocketOutcome::Shutdown };
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        warn!("Failed to send gateway frame: {}", e);
                        break SocketOutcome::Reconnect;
                    }
                }

                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!("Discord gateway read error: {}", e);
                            break SocketOutcome::Reconnect;
                        }
                        None => {
                            debug!("Discord gateway stream ended");
                            break SocketOutcome::Reconnect;
                        }
                    };

                    match msg {
                        Message::Text(text) => {
                            let payload = match serde_json::from_str::<GatewayPayload>(text.as_str()) {
                                Ok(payload) => payload,
                                Err(e) => {
                                    error!("Failed to parse gateway payload: {}", e);
                                    continue;
                                }
                            };
                            if let Some(seq) = payload.s {
                                self.resume.lock().sequence = Some(seq);
                            }

                            match payload.op {
                                OP_DISPATCH => {
                                    if let (Some(name), Some(data)) = (payload.t, payload.d) {
                                        self.handle_dispatch(&name, data, backoff);
                                    }
                                }
                                OP_HEARTBEAT => {
                                    if let Err(e) = write.send(Message::Text(self.heartbeat().into())).await {
                                        warn!("Failed to answer heartbeat request: {}", e);
                                        break SocketOutcome::Reconnect;
                                    }
                                }
                                OP_HEARTBEAT_ACK => acked = true,
                                OP_RECONNECT => {
                                    info!("Discord requested a reconnect");
                                    break SocketOutcome::Reconnect;
                                }
                                OP_INVALID_SESSION => {
                                    let resumable = payload.d.and_then(|v| v.as_bool()).unwrap_or(false);
                                    if !resumable {
                                        info!("Discord session invalidated, identifying from scratch");
                                        self.resume.lock().reset();
                                    }
                                    break SocketOutcome::Reconnect;
                                }
                                op => debug!("Unhandled gateway opcode: {}", op),
                            }
                        }
                        Message::Close(frame) => {
                            let (code, reason) = frame
                                .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                                .unwrap_or((1000, "No reason".into()));
                            info!("Discord gateway closed: code={}, reason='{}'", code, reason);
                            if FATAL_CLOSE_CODES.contains(&code) {
                                break SocketOutcome::Fatal(code);
                            }
                            break SocketOutcome::Reconnect;
                        }
                        _ => {}
                    }
                }
            }
        };

        if let SocketOutcome::Shutdown = outcome {
            let _ = write.send(Message::Close(None)).await;
        }
        Ok(outcome)
    }

    fn identify_or_resume(&self) -> String {
        let resume = self.resume.lock();
        let command = match (&resume.session_id, resume.sequence) {
            (Some(session_id), Some(seq)) => {
                info!("Resuming Discord session {}", session_id);
                GatewayCommand {
                    op: OP_RESUME,
                    d: json!({
                        "token": self.token,
                        "session_id": session_id,
                        "seq": seq,
                    }),
                }
            }
            _ => {
                info!("Identifying with Discord gateway");
                GatewayCommand {
                    op: OP_IDENTIFY,
                    d: json!({
                        "token": self.token,
                        "intents": INTENTS,
                        "properties": {
                            "os": std::env::consts::OS,
                            "browser": "tunebot",
                            "device": "tunebot",
                        },
                    }),
                }
            }
        };
        json!(command).to_string()
    }

    fn heartbeat(&self) -> String {
        json!({ "op": OP_HEARTBEAT, "d": self.resume.lock().sequence }).to_string()
    }

    fn handle_dispatch(&self, name: &str, data: serde_json::Value, backoff: &mut Backoff) {
        let dispatch = match decode_dispatch(name, data) {
            Ok(Some(dispatch)) => dispatch,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to decode {} dispatch: {}", name, e);
                return;
            }
        };

        match dispatch {
            Dispatch::Ready(ready) => {
                info!("READY: logged in as {} ({})", ready.user.username, ready.user.id);
                {
                    let mut resume = self.resume.lock();
                    resume.session_id = Some(ready.session_id);
                    resume.resume_url = Some(ready.resume_gateway_url);
                }
                *self.bot_user.write() = Some(ready.user.id);
                self.connected.store(true, Ordering::SeqCst);
                backoff.reset();
                self.publish(GatewayEvent::Ready {
                    user_id: ready.user.id,
                    application_id: ready.application.id,
                });
            }
            Dispatch::Resumed => {
                info!("Discord session resumed");
                self.connected.store(true, Ordering::SeqCst);
                backoff.reset();
            }
            Dispatch::Event(event) => self.publish(event),
        }
    }

    fn publish(&self, event: GatewayEvent) {
        if self.events.send(event).is_err() {
            warn!("Gateway event receiver is gone");
        }
    }
}

async fn wait_for_hello<S>(read: &mut S) -> AnyResult<u64>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        if let Message::Text(text) = msg? {
            let payload: GatewayPayload = serde_json::from_str(text.as_str())?;
            if payload.op == OP_HELLO {
                let hello: HelloData =
                    serde_json::from_value(payload.d.ok_or("HELLO payload missing data")?)?;
                return Ok(hello.heartbeat_interval);
            }
        }
    }
    Err("Gateway closed before sending HELLO".into())
}

#[async_trait]
impl VoiceGateway for DiscordGateway {
    fn bot_user_id(&self) -> Option<UserId> {
        *self.bot_user.read()
    }

    async fn send_voice_state_update(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        muted: bool,
        deafened: bool,
    ) -> MusicResult<()> {
        if !self.is_connected() {
            return Err(MusicError::Gateway("not connected to Discord".into()));
        }

        let command = GatewayCommand {
            op: OP_VOICE_STATE_UPDATE,
            d: json!({
                "guild_id": guild_id,
                "channel_id": channel_id,
                "self_mute": muted,
                "self_deaf": deafened,
            }),
        };
        debug!("[{}] sending voice state update (channel={:?})", guild_id, channel_id);
        self.outbound_tx
            .send(json!(command).to_string())
            .map_err(|e| MusicError::Gateway(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ready() {
        let data = json!({
            "session_id": "abc",
            "resume_gateway_url": "wss://resume.discord.gg",
            "user": {"id": "42", "username": "tunebot"},
            "application": {"id": "7"},
        });
        match decode_dispatch("READY", data).unwrap() {
            Some(Dispatch::Ready(ready)) => {
                assert_eq!(ready.user.id, UserId(42));
                assert_eq!(ready.application.id, ApplicationId(7));
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_decode_guild_create_fills_guild_id() {
        let data = json!({
            "id": "1",
            "voice_states": [
                {"channel_id": "10", "user_id": "5", "session_id": "s"},
            ],
        });
        match decode_dispatch("GUILD_CREATE", data).unwrap() {
            Some(Dispatch::Event(GatewayEvent::GuildCreate {
                guild_id,
                voice_states,
            })) => {
                assert_eq!(guild_id, GuildId(1));
                assert_eq!(voice_states.len(), 1);
                assert_eq!(voice_states[0].guild_id, GuildId(1));
            }
            other => panic!("unexpected dispatch: {:?}", other),
        }
    }

    #[test]
    fn test_decode_ignores_other_dispatches() {
        assert!(decode_dispatch("TYPING_START", json!({})).unwrap().is_none());
        // A DM voice state has no guild.
        let dm = json!({"channel_id": null, "user_id": "5", "session_id": "s"});
        assert!(decode_dispatch("VOICE_STATE_UPDATE", dm).unwrap().is_none());
    }

    #[test]
    fn test_resume_url() {
        let mut state = ResumeState::default();
        assert_eq!(state.url(), "wss://gateway.discord.gg/?v=10&encoding=json");

        state.session_id = Some("abc".into());
        state.resume_url = Some("wss://resume.discord.gg/".into());
        assert_eq!(state.url(), "wss://resume.discord.gg/?v=10&encoding=json");

        state.reset();
        assert!(state.session_id.is_none());
    }

    #[test]
    fn test_identify_then_resume() {
        let (gateway, _events) = DiscordGateway::new("secret".into());
        let identify: serde_json::Value =
            serde_json::from_str(&gateway.identify_or_resume()).unwrap();
        assert_eq!(identify["op"], OP_IDENTIFY);
        assert_eq!(identify["d"]["intents"], INTENTS);

        {
            let mut resume = gateway.resume.lock();
            resume.session_id = Some("abc".into());
            resume.sequence = Some(12);
        }
        let resume: serde_json::Value = serde_json::from_str(&gateway.identify_or_resume()).unwrap();
        assert_eq!(resume["op"], OP_RESUME);
        assert_eq!(resume["d"]["seq"], 12);
    }

    #[tokio::test]
    async fn test_voice_update_requires_connection() {
        let (gateway, _events) = DiscordGateway::new("secret".into());
        let err = gateway
            .send_voice_state_update(GuildId(1), Some(ChannelId(2)), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MusicError::Gateway(_)));

        gateway.connected.store(true, Ordering::SeqCst);
        gateway
            .send_voice_state_update(GuildId(1), Some(ChannelId(2)), false, false)
            .await
            .unwrap();
        let frame: serde_json::Value =
            serde_json::from_str(&gateway.outbound_rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["op"], OP_VOICE_STATE_UPDATE);
        assert_eq!(frame["d"]["channel_id"], "2");
        assert_eq!(frame["d"]["self_deaf"], false);
    }
}
