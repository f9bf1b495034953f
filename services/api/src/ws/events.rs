//! Wire events exchanged with the realtime conversation service.
//!
//! Both directions are JSON messages discriminated by a `type` field.
//! `ClientEvent` covers the four message kinds the relay sends; `ServerEvent`
//! covers every event kind the relay reacts to, with a reserved `Unknown`
//! fallback arm so unrecognized kinds are ignored instead of failing the
//! stream.

use serde::{Deserialize, Serialize};

// --- Session configuration ---

/// The one-time session configuration sent during capability negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub voice: String,
    pub instructions: String,
    pub input_audio_format: String,
    pub input_audio_transcription: InputAudioTranscription,
    pub turn_detection: TurnDetection,
    pub tools: Vec<ToolDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        threshold: f32,
        prefix_padding_ms: u32,
        silence_duration_ms: u32,
    },
}

/// One function exposed to the conversational model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// --- Conversation items ---

/// A conversation content item, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ConversationItem {
    /// A system-authored text item, tagged with the given identifier.
    pub fn system_text(text: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("system".to_string()),
            content: Some(vec![ContentPart {
                part_type: "input_text".to_string(),
                text: Some(text.into()),
            }]),
            call_id: Some(call_id.into()),
            name: None,
            output: None,
        }
    }

    /// The output of a tool invocation, answering the given call identifier.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            role: None,
            content: None,
            call_id: Some(call_id.into()),
            name: None,
            output: Some(output.into()),
        }
    }
}

// --- Client events (relay -> service) ---

/// Overrides applied to one response-creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
}

/// Messages the relay sends into the session stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append one base64 audio chunk to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Ask the service to start generating a response. Always sent as its own
    /// message, never combined with an item creation.
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

// --- Server events (service -> relay) ---

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseInfo {
    pub id: String,
    pub status: Option<String>,
    pub status_details: Option<serde_json::Value>,
}

/// Events emitted by the realtime conversation service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared,

    /// Server VAD detected the caller starting to speak.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted { transcript: String },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed { error: ApiError },

    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseInfo },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone { transcript: String },

    /// One base64 chunk of assistant audio.
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    /// Announces a response output item; for `function_call` items this is
    /// the first sighting of a call identifier.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: ConversationItem },

    /// Terminal event of a tool invocation: the full argument payload.
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        #[serde(default)]
        name: Option<String>,
        arguments: String,
    },

    /// Reserved arm for every event kind the relay does not react to.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> SessionConfig {
        SessionConfig {
            voice: "alloy".to_string(),
            instructions: "Help people search the web.".to_string(),
            input_audio_format: "pcm16".to_string(),
            input_audio_transcription: InputAudioTranscription {
                model: "whisper-1".to_string(),
            },
            turn_detection: TurnDetection::ServerVad {
                threshold: 0.6,
                prefix_padding_ms: 200,
                silence_duration_ms: 300,
            },
            tools: vec![ToolDef {
                tool_type: "function".to_string(),
                name: "get_result".to_string(),
                description: "Get results based on the search query.".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }),
            }],
        }
    }

    #[test]
    fn session_update_round_trips() {
        let event = ClientEvent::SessionUpdate {
            session: sample_config(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"session.update""#));
        assert!(json.contains(r#""type":"server_vad""#));

        let parsed: ClientEvent = serde_json::from_str(&json).unwrap();
        let ClientEvent::SessionUpdate { session } = parsed else {
            panic!("wrong event kind");
        };
        assert_eq!(session, sample_config());
        assert_eq!(session.voice, "alloy");
        assert_eq!(session.input_audio_format, "pcm16");
        let TurnDetection::ServerVad {
            threshold,
            prefix_padding_ms,
            silence_duration_ms,
        } = session.turn_detection;
        assert_eq!(threshold, 0.6);
        assert_eq!(prefix_padding_ms, 200);
        assert_eq!(silence_duration_ms, 300);
    }

    #[test]
    fn bare_response_create_omits_overrides() {
        let event = ClientEvent::ResponseCreate { response: None };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn function_call_output_item_serializes_with_call_id() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output("call-7", "Here is a link for you: x"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"conversation.item.create""#));
        assert!(json.contains(r#""call_id":"call-7""#));
        assert!(json.contains(r#""output":"Here is a link for you: x""#));
        // Absent optional fields stay off the wire entirely.
        assert!(!json.contains("role"));
    }

    #[test]
    fn speech_started_event_parses() {
        let json = r#"{"type":"input_audio_buffer.speech_started","event_id":"ev1","audio_start_ms":420,"item_id":"item_1"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ServerEvent::SpeechStarted { audio_start_ms: 420 });
    }

    #[test]
    fn function_call_arguments_done_parses_without_name() {
        let json = r#"{"type":"response.function_call_arguments.done","response_id":"r1","item_id":"i1","output_index":0,"call_id":"call-1","arguments":"{\"query\":\"rust\"}"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ServerEvent::FunctionCallArgumentsDone {
                call_id: "call-1".to_string(),
                name: None,
                arguments: r#"{"query":"rust"}"#.to_string(),
            }
        );
    }

    #[test]
    fn output_item_added_parses_function_call_item() {
        let json = r#"{"type":"response.output_item.added","response_id":"r1","output_index":0,"item":{"id":"i1","type":"function_call","status":"in_progress","name":"get_result","call_id":"call-1","arguments":""}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        let ServerEvent::OutputItemAdded { item } = event else {
            panic!("wrong event kind");
        };
        assert_eq!(item.item_type, "function_call");
        assert_eq!(item.name.as_deref(), Some("get_result"));
        assert_eq!(item.call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn unrecognized_kinds_fall_back_to_unknown() {
        for json in [
            r#"{"type":"rate_limits.updated","rate_limits":[]}"#,
            r#"{"type":"response.audio.done","response_id":"r1"}"#,
            r#"{"type":"some.future.event"}"#,
        ] {
            let event: ServerEvent = serde_json::from_str(json).unwrap();
            assert_eq!(event, ServerEvent::Unknown);
        }
    }
}
