//! The event router: classifies every event the realtime service emits and
//! dispatches its effects.
//!
//! The receive loop owns the service stream exclusively; it is the only
//! writer of the pending-call table and the turn gate. Failures while
//! handling one event are logged and contained; only a broken stream, a
//! failed transport send, or cancellation end the relay.

use super::{
    RelayError,
    calls::CallTable,
    events::{ClientEvent, ServerEvent},
    gate::TurnGate,
    protocol::StreamFrame,
    tools::ToolInvoker,
};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::session::{UpstreamSink, UpstreamSource};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

/// One side effect of handling an event, performed in order.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Effect {
    /// Send a frame to the caller's transport.
    User(StreamFrame),
    /// Send a client event into the session stream, as its own message.
    Upstream(ClientEvent),
}

pub(super) struct EventRouter {
    gate: TurnGate,
    calls: CallTable,
    tools: ToolInvoker,
}

impl EventRouter {
    pub(super) fn new(tools: ToolInvoker) -> Self {
        Self {
            gate: TurnGate::new(),
            calls: CallTable::new(),
            tools,
        }
    }

    /// Drives the relay until the service stream ends, a transport breaks,
    /// or the owning session cancels the task.
    pub(super) async fn run(
        mut self,
        mut upstream_rx: UpstreamSource,
        upstream_tx: Arc<Mutex<UpstreamSink>>,
        user_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    ) -> Result<(), RelayError> {
        while let Some(message) = upstream_rx.next().await {
            // A stream-level error means the connection is unusable.
            let message = message?;
            match message {
                WsMessage::Text(text) => {
                    let event = match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            // Contained: one undecodable payload does not end
                            // the conversation.
                            warn!(error = %e, "skipping undecodable service event");
                            continue;
                        }
                    };
                    for effect in self.on_event(event).await {
                        perform(effect, &upstream_tx, &user_tx).await?;
                    }
                }
                WsMessage::Close(frame) => {
                    info!(?frame, "session stream closed by service");
                    break;
                }
                _ => {}
            }
        }
        // Abandoned call identifiers are dropped, nothing fires for them.
        self.calls.clear();
        Ok(())
    }

    /// Classifies one event and returns the effects to perform, in order.
    async fn on_event(&mut self, event: ServerEvent) -> Vec<Effect> {
        match event {
            ServerEvent::SessionCreated { session } => {
                info!(session_id = %session.id, "session created");
                Vec::new()
            }
            ServerEvent::Error { error } => {
                // Non-fatal: the service reports errors for individual
                // operations while the stream keeps going.
                error!(kind = ?error.error_type, message = ?error.message, "service error event");
                Vec::new()
            }
            ServerEvent::InputAudioBufferCleared => {
                debug!("input audio buffer cleared");
                Vec::new()
            }
            ServerEvent::SpeechStarted { audio_start_ms } => {
                info!(audio_start_ms, "voice activity detection started");
                if self.gate.interrupt() {
                    vec![Effect::User(StreamFrame::stop())]
                } else {
                    Vec::new()
                }
            }
            ServerEvent::SpeechStopped { audio_end_ms } => {
                debug!(audio_end_ms, "voice activity detection stopped");
                self.gate.speech_stopped();
                Vec::new()
            }
            ServerEvent::TranscriptionCompleted { transcript } => {
                info!(%transcript, "user transcript");
                Vec::new()
            }
            ServerEvent::TranscriptionFailed { error } => {
                error!(message = ?error.message, "input transcription failed");
                Vec::new()
            }
            ServerEvent::ResponseDone { response } => {
                info!(response_id = %response.id, status = ?response.status, "response done");
                if let Some(details) = response.status_details {
                    info!(%details, "response status details");
                }
                Vec::new()
            }
            ServerEvent::AudioTranscriptDone { transcript } => {
                info!(%transcript, "assistant transcript");
                Vec::new()
            }
            ServerEvent::AudioDelta { delta } => {
                // Deltas are forwarded even while the caller holds the turn;
                // the StopAudio frame is the only barge-in signal.
                self.gate.audio_delta();
                vec![Effect::User(StreamFrame::audio(delta))]
            }
            ServerEvent::OutputItemAdded { item } => {
                if item.item_type == "function_call" {
                    if let Some(call_id) = item.call_id.as_deref() {
                        self.calls.observe(call_id, item.name);
                    }
                }
                Vec::new()
            }
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => self.handle_tool_call(call_id, name, arguments).await,
            ServerEvent::Unknown => Vec::new(),
        }
    }

    async fn handle_tool_call(
        &mut self,
        call_id: String,
        name: Option<String>,
        arguments: String,
    ) -> Vec<Effect> {
        self.calls.record_arguments(&call_id, name, &arguments);

        let Some(function) = self.calls.function_name(&call_id).map(str::to_string) else {
            warn!(%call_id, "function call completed without a function name");
            self.calls.complete(&call_id);
            return Vec::new();
        };
        info!(function = %function, %call_id, arguments = %arguments, "dispatching tool call");

        let effects = match self.tools.dispatch(&function, &call_id, &arguments).await {
            Ok(events) => events.into_iter().map(Effect::Upstream).collect(),
            Err(e) => {
                // Contained at the dispatch boundary: the relay keeps serving
                // other events.
                error!(function = %function, %call_id, error = %e, "tool dispatch failed");
                Vec::new()
            }
        };
        self.calls.complete(&call_id);
        effects
    }
}

/// Sends one effect on its transport. Send failures are fatal to the session.
async fn perform(
    effect: Effect,
    upstream_tx: &Arc<Mutex<UpstreamSink>>,
    user_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) -> Result<(), RelayError> {
    match effect {
        Effect::User(frame) => {
            let json = serde_json::to_string(&frame)?;
            user_tx
                .lock()
                .await
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| RelayError::Transport(e.into()))?;
        }
        Effect::Upstream(event) => {
            let json = serde_json::to_string(&event)?;
            upstream_tx
                .lock()
                .await
                .send(WsMessage::Text(json.into()))
                .await
                .map_err(|e| RelayError::Transport(e.into()))?;
        }
    }
    Ok(())
}
