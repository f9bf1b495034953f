//! Defines the JSON frame format exchanged with the caller's media transport.
//!
//! The transport speaks exactly two outbound frame shapes:
//!
//! ```json
//! {"Kind": "AudioData", "AudioData": {"Data": "<base64>"}, "StopAudio": null}
//! {"Kind": "StopAudio", "AudioData": null, "StopAudio": {}}
//! ```
//!
//! Inbound audio arrives either as the same `AudioData` frame or as a raw
//! binary PCM16 message.

use serde::{Deserialize, Serialize};

/// One frame on the caller's media transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamFrame {
    #[serde(rename = "Kind")]
    pub kind: FrameKind,
    #[serde(rename = "AudioData")]
    pub audio_data: Option<AudioData>,
    #[serde(rename = "StopAudio")]
    pub stop_audio: Option<StopAudio>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    AudioData,
    StopAudio,
}

/// A chunk of base64-encoded PCM16 audio.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    #[serde(rename = "Data")]
    pub data: String,
}

/// Instructs the caller's transport to discard queued assistant audio.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopAudio {}

impl StreamFrame {
    /// Wraps one base64 audio payload for playback.
    pub fn audio(data: String) -> Self {
        Self {
            kind: FrameKind::AudioData,
            audio_data: Some(AudioData { data }),
            stop_audio: None,
        }
    }

    /// The barge-in control frame.
    pub fn stop() -> Self {
        Self {
            kind: FrameKind::StopAudio,
            audio_data: None,
            stop_audio: Some(StopAudio {}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_frame_has_exact_wire_shape() {
        let frame = StreamFrame::audio("Zm9v".to_string());
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(
            json,
            r#"{"Kind":"AudioData","AudioData":{"Data":"Zm9v"},"StopAudio":null}"#
        );
    }

    #[test]
    fn stop_frame_has_exact_wire_shape() {
        let frame = StreamFrame::stop();
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"Kind":"StopAudio","AudioData":null,"StopAudio":{}}"#);
    }

    #[test]
    fn inbound_audio_frame_parses() {
        let json = r#"{"Kind":"AudioData","AudioData":{"Data":"UENNMTY="},"StopAudio":null}"#;
        let frame: StreamFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.kind, FrameKind::AudioData);
        assert_eq!(frame.audio_data.unwrap().data, "UENNMTY=");
    }

    #[test]
    fn frames_round_trip() {
        for frame in [StreamFrame::audio("YQ==".to_string()), StreamFrame::stop()] {
            let json = serde_json::to_string(&frame).unwrap();
            let parsed: StreamFrame = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, frame);
        }
    }
}
