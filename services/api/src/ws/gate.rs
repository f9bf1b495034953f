//! Turn-taking discipline for assistant playback.
//!
//! The conversation is half-duplex from the caller's point of view: either
//! the assistant's audio is playing or the caller is speaking. The gate
//! tracks which side holds the turn and decides when a barge-in must emit
//! the one StopAudio control frame.

/// Whose audio currently holds the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AiSpeaking,
    UserSpeaking,
}

#[derive(Debug)]
pub struct TurnGate {
    state: TurnState,
}

impl TurnGate {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The caller started speaking. Returns `true` when a StopAudio frame
    /// must be sent: exactly once per barge-in, never again while the caller
    /// already holds the turn.
    pub fn interrupt(&mut self) -> bool {
        if self.state == TurnState::UserSpeaking {
            return false;
        }
        self.state = TurnState::UserSpeaking;
        true
    }

    /// The caller stopped speaking; the turn is up for grabs again.
    pub fn speech_stopped(&mut self) {
        self.state = TurnState::Idle;
    }

    /// Assistant audio was forwarded. Straggler deltas arriving while the
    /// caller holds the turn do not take it back.
    pub fn audio_delta(&mut self) {
        if self.state != TurnState::UserSpeaking {
            self.state = TurnState::AiSpeaking;
        }
    }
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_interrupt_requests_a_stop_frame() {
        let mut gate = TurnGate::new();
        gate.audio_delta();
        assert_eq!(gate.state(), TurnState::AiSpeaking);
        assert!(gate.interrupt());
        assert_eq!(gate.state(), TurnState::UserSpeaking);
    }

    #[test]
    fn consecutive_interrupts_emit_only_one_stop() {
        let mut gate = TurnGate::new();
        assert!(gate.interrupt());
        assert!(!gate.interrupt());
        assert!(!gate.interrupt());
    }

    #[test]
    fn interrupt_fires_again_after_speech_stopped() {
        let mut gate = TurnGate::new();
        assert!(gate.interrupt());
        gate.speech_stopped();
        assert!(gate.interrupt());
    }

    #[test]
    fn straggler_deltas_do_not_steal_the_user_turn() {
        let mut gate = TurnGate::new();
        assert!(gate.interrupt());
        gate.audio_delta();
        assert_eq!(gate.state(), TurnState::UserSpeaking);
        // A second speech-start within the same user turn stays silent.
        assert!(!gate.interrupt());
    }
}
