//! WebSocket Relay
//!
//! This module contains the core logic for relaying one live voice
//! conversation between a caller and the realtime conversation service. It is
//! structured into submodules for clarity:
//!
//! - `protocol`: the JSON frame format spoken to the caller's transport.
//! - `events`: the wire events spoken to the realtime conversation service.
//! - `session`: session lifecycle, from negotiation to teardown.
//! - `relay`: the event router that classifies and dispatches service events.
//! - `gate`: turn-taking discipline (stopping playback on barge-in).
//! - `calls`: correlation of asynchronous tool calls by call identifier.
//! - `tools`: dispatch of the search and SMS tool invocations.

pub mod calls;
pub mod events;
pub mod gate;
pub mod protocol;
mod relay;
pub mod session;
mod tools;

pub use session::ws_handler;

/// Failures raised by the relay, split by how far they propagate.
///
/// `Setup` aborts session start. `Stream` and `Transport` invalidate the
/// session and terminate it. Anything scoped to a single event (undecodable
/// payloads, tool failures) is logged and contained where it happens and
/// never surfaces as a variant here.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to establish realtime session: {0}")]
    Setup(#[source] anyhow::Error),
    #[error("session stream failed: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to send on a transport: {0}")]
    Transport(#[source] anyhow::Error),
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}
