//! Manages the lifecycle of one relay session, from the caller's WebSocket
//! upgrade through realtime-service negotiation to teardown.

use super::{
    RelayError,
    events::{
        ClientEvent, ConversationItem, InputAudioTranscription, SessionConfig, TurnDetection,
    },
    protocol::{FrameKind, StreamFrame},
    relay::EventRouter,
    tools::{ToolInvoker, tool_schema},
};
use crate::{config::Config, state::AppState};
use anyhow::Context;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::{net::TcpStream, sync::Mutex, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

pub(super) type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(super) type UpstreamSink = SplitSink<UpstreamStream, WsMessage>;
pub(super) type UpstreamSource = SplitStream<UpstreamStream>;

/// The text item that makes the assistant speak first.
const GREETING_PROMPT: &str = "You are having a conversation with a user. Greet the user with a \
     quick cheery message asking how you can help them find results on their search query.";

const INPUT_AUDIO_FORMAT: &str = "pcm16";
const TRANSCRIPTION_MODEL: &str = "whisper-1";

// Server VAD tuning. Fixed for every session.
const VAD_THRESHOLD: f32 = 0.6;
const VAD_PREFIX_PADDING_MS: u32 = 200;
const VAD_SILENCE_DURATION_MS: u32 = 300;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual caller connection.
///
/// Establishes the realtime session, then pumps caller audio upstream until
/// either side disconnects. The spawned relay task handles everything coming
/// back the other way.
#[instrument(name = "relay_session", skip_all, fields(conversation_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conversation_id = Uuid::new_v4();
    tracing::Span::current().record("conversation_id", tracing::field::display(conversation_id));
    info!("New caller connection. Connecting to the realtime service...");

    let (user_tx, user_rx) = socket.split();
    let user_tx = Arc::new(Mutex::new(user_tx));

    let session = match RelaySession::start(&state, conversation_id, user_tx).await {
        Ok(session) => session,
        Err(e) => {
            // The caller protocol has no error frame; a failed setup just
            // ends the connection.
            error!(error = ?e, "Failed to establish realtime session");
            return;
        }
    };

    session.forward_caller_audio(user_rx).await;
    session.shutdown().await;
}

/// One active conversation: the upstream connection plus the relay task that
/// services its event stream.
struct RelaySession {
    conversation_id: Uuid,
    upstream_tx: Arc<Mutex<UpstreamSink>>,
    relay_task: JoinHandle<()>,
}

impl RelaySession {
    /// Connects, negotiates capabilities, kicks off the greeting, and spawns
    /// the relay's receive loop.
    async fn start(
        state: &Arc<AppState>,
        conversation_id: Uuid,
        user_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    ) -> Result<Self, RelayError> {
        let config = &state.config;
        let ws_stream = connect(config).await.map_err(RelayError::Setup)?;
        let (mut upstream_tx, upstream_rx) = ws_stream.split();
        info!("Connected to the realtime service.");

        // Capability negotiation precedes all other traffic.
        send_event(
            &mut upstream_tx,
            &ClientEvent::SessionUpdate {
                session: session_config(config),
            },
        )
        .await?;

        // The assistant greets first: one content item, then a separate
        // response-creation request.
        send_event(
            &mut upstream_tx,
            &ClientEvent::ConversationItemCreate {
                item: ConversationItem::system_text(GREETING_PROMPT, conversation_id.to_string()),
            },
        )
        .await?;
        send_event(&mut upstream_tx, &ClientEvent::ResponseCreate { response: None }).await?;

        let upstream_tx = Arc::new(Mutex::new(upstream_tx));
        let router = EventRouter::new(ToolInvoker::new(
            state.search.clone(),
            state.sms.clone(),
            config.sms_from_number.clone(),
            config.sms_to_number.clone(),
        ));

        let relay_task = tokio::spawn(
            {
                let upstream_tx = upstream_tx.clone();
                async move {
                    if let Err(e) = router.run(upstream_rx, upstream_tx, user_tx).await {
                        error!(error = ?e, "Relay terminated with error");
                    }
                }
            }
            .instrument(tracing::info_span!("relay_loop")),
        );

        Ok(Self {
            conversation_id,
            upstream_tx,
            relay_task,
        })
    }

    /// The caller-facing flow: every inbound audio chunk is appended to the
    /// session's input buffer verbatim. Runs until the caller disconnects or
    /// the upstream connection dies under us.
    async fn forward_caller_audio(&self, mut user_rx: SplitStream<WebSocket>) {
        while let Some(message) = user_rx.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    error!(error = ?e, "Error receiving from caller WebSocket");
                    break;
                }
            };

            let audio = match message {
                Message::Binary(data) => Some(BASE64_STANDARD.encode(&data)),
                Message::Text(text) => match serde_json::from_str::<StreamFrame>(&text) {
                    Ok(frame) if frame.kind == FrameKind::AudioData => {
                        frame.audio_data.map(|audio| audio.data)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        warn!(error = %e, "ignoring undecodable caller frame");
                        None
                    }
                },
                Message::Close(_) => {
                    info!("Caller sent close frame. Shutting down session.");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => None,
            };

            if let Some(audio) = audio {
                if let Err(e) = self.append_audio(audio).await {
                    error!(error = ?e, "Failed to forward caller audio; ending session");
                    break;
                }
            }
        }
    }

    async fn append_audio(&self, audio: String) -> Result<(), RelayError> {
        let json = serde_json::to_string(&ClientEvent::InputAudioBufferAppend { audio })?;
        self.upstream_tx
            .lock()
            .await
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| RelayError::Transport(e.into()))
    }

    /// Cancels the relay task and releases both connection handles. A
    /// cancelled join is the normal teardown path, not an error.
    async fn shutdown(self) {
        self.relay_task.abort();
        if let Err(e) = self.relay_task.await {
            if !e.is_cancelled() {
                error!(error = ?e, "relay task failed during teardown");
            }
        }
        info!(conversation_id = %self.conversation_id, "Caller connection closed and relay session terminated.");
    }
}

async fn connect(config: &Config) -> anyhow::Result<UpstreamStream> {
    let url = format!(
        "{}?model={}",
        config.realtime_api_url, config.realtime_model
    );
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", config.openai_api_key).parse()?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse()?);

    let (ws_stream, _) = connect_async(request)
        .await
        .context("Failed to connect to the realtime service")?;
    Ok(ws_stream)
}

/// Sends one client event during session setup. Each event is its own
/// message.
async fn send_event(sink: &mut UpstreamSink, event: &ClientEvent) -> Result<(), RelayError> {
    let json = serde_json::to_string(event)?;
    sink.send(WsMessage::Text(json.into()))
        .await
        .map_err(|e| RelayError::Setup(e.into()))
}

/// Builds the one-time negotiation payload from the loaded configuration.
fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        voice: config.voice.clone(),
        instructions: config.instructions.clone(),
        input_audio_format: INPUT_AUDIO_FORMAT.to_string(),
        input_audio_transcription: InputAudioTranscription {
            model: TRANSCRIPTION_MODEL.to_string(),
        },
        turn_detection: TurnDetection::ServerVad {
            threshold: VAD_THRESHOLD,
            prefix_padding_ms: VAD_PREFIX_PADDING_MS,
            silence_duration_ms: VAD_SILENCE_DURATION_MS,
        },
        tools: tool_schema(),
    }
}
