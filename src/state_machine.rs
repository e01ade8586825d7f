//! State machine for a recording session
//!
//! This module implements the controller-side state machine using a
//! single-writer pattern. All state transitions go through the `reduce()`
//! function, which returns a new state and a list of effects to execute.

use crate::audio::CapturedAudio;

/// Controller-side state of one recording session.
/// This is the authoritative state - all transitions go through the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// Nothing has been captured yet
    #[default]
    Uninitialized,
    Recording,
    /// Stopped; may resume until the engine hands its buffer over
    Paused,
    /// The buffer was handed over. Terminal.
    Finished,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Uninitialized => "uninitialized",
            RecordingState::Recording => "recording",
            RecordingState::Paused => "paused",
            RecordingState::Finished => "finished",
        }
    }
}

/// Events that can trigger state transitions.
/// These come from the user (start/stop) or from the capture engine.
#[derive(Debug)]
pub enum Event {
    StartRequested,
    StopRequested,
    /// Engine filled its buffer
    CapacityReached { recorded_frames: usize },
    /// Engine disarmed and handed its buffer over
    RecordingComplete(CapturedAudio),
}

/// Effects to be executed after a state transition.
#[derive(Debug)]
pub enum Effect {
    /// Send `SetArmed` to the engine
    SetArmed(bool),
    /// Pass the handed-over buffer to the encoder
    Encode(CapturedAudio),
}

/// Transitions the engine should never be able to cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Completion arrived for a session that was never armed
    CompletionWhileUninitialized,
    /// A second completion arrived for a finished session
    DuplicateCompletion,
    /// Capacity was reported for a session that was never armed
    CapacityWhileUninitialized,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvariantViolation::CompletionWhileUninitialized => {
                write!(f, "Recording completed before it was ever started")
            }
            InvariantViolation::DuplicateCompletion => {
                write!(f, "Recording completed twice")
            }
            InvariantViolation::CapacityWhileUninitialized => {
                write!(f, "Capacity reached before recording was ever started")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Reducer function: (state, event) -> (next_state, effects)
///
/// Key rules:
/// - Never mutate state directly
/// - Redundant start/stop requests are no-ops, not errors
/// - Engine events that could only come from a broken engine are errors
pub fn reduce(
    state: RecordingState,
    event: Event,
) -> Result<(RecordingState, Vec<Effect>), InvariantViolation> {
    use Effect::*;
    use Event::*;
    use RecordingState::*;

    let transition = match (state, event) {
        // -----------------
        // Start
        // -----------------
        (Uninitialized, StartRequested) | (Paused, StartRequested) => {
            (Recording, vec![SetArmed(true)])
        }
        (Recording, StartRequested) => (Recording, vec![]),

        // -----------------
        // Stop
        // -----------------
        (Recording, StopRequested) => (Paused, vec![SetArmed(false)]),
        (Uninitialized, StopRequested) | (Paused, StopRequested) => (state, vec![]),

        // -----------------
        // Capacity: finalize implicitly
        // -----------------
        (Recording, CapacityReached { .. }) => (Paused, vec![SetArmed(false)]),
        (Paused, CapacityReached { .. }) => (Paused, vec![]),
        (Uninitialized, CapacityReached { .. }) => {
            return Err(InvariantViolation::CapacityWhileUninitialized)
        }

        // -----------------
        // Completion
        // -----------------
        (Recording, RecordingComplete(capture)) | (Paused, RecordingComplete(capture)) => {
            (Finished, vec![Encode(capture)])
        }
        (Uninitialized, RecordingComplete(_)) => {
            return Err(InvariantViolation::CompletionWhileUninitialized)
        }
        (Finished, RecordingComplete(_)) => return Err(InvariantViolation::DuplicateCompletion),

        // -----------------
        // Finished is terminal
        // -----------------
        (Finished, _) => (Finished, vec![]),
    };

    Ok(transition)
}
