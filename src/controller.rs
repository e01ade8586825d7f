//! Recording controller
//!
//! Runs on the non-real-time side. Feeds user requests and engine
//! notifications through the reducer, sends the resulting commands to the
//! engine, and hands the finished capture to the encoder.

use uuid::Uuid;

use crate::audio::{
    AudioError, ChannelClosed, ControlCommand, ControllerPort, EncodeError, Encoder,
    EngineNotification, RecordingProperties,
};
use crate::state_machine::{reduce, Effect, Event, InvariantViolation, RecordingState};

/// Errors surfaced to the controller's caller.
#[derive(Debug, Clone)]
pub enum RecorderError {
    /// The engine side of the control channel is gone
    ChannelClosed,
    /// The session already handed its buffer over
    AlreadyFinished,
    /// The engine reported something it never should have
    InvariantViolation(InvariantViolation),
    Encode(EncodeError),
    Device(AudioError),
    /// Writing the exported file failed
    Io(String),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::ChannelClosed => write!(f, "Capture engine is no longer running"),
            RecorderError::AlreadyFinished => write!(f, "Recording has already finished"),
            RecorderError::InvariantViolation(v) => write!(f, "Invariant violated: {}", v),
            RecorderError::Encode(e) => write!(f, "Encoding failed: {}", e),
            RecorderError::Device(e) => write!(f, "Audio device error: {}", e),
            RecorderError::Io(e) => write!(f, "Failed to save recording: {}", e),
        }
    }
}

impl std::error::Error for RecorderError {}

impl From<ChannelClosed> for RecorderError {
    fn from(_: ChannelClosed) -> Self {
        RecorderError::ChannelClosed
    }
}

impl From<InvariantViolation> for RecorderError {
    fn from(v: InvariantViolation) -> Self {
        RecorderError::InvariantViolation(v)
    }
}

impl From<EncodeError> for RecorderError {
    fn from(e: EncodeError) -> Self {
        RecorderError::Encode(e)
    }
}

impl From<AudioError> for RecorderError {
    fn from(e: AudioError) -> Self {
        RecorderError::Device(e)
    }
}

impl From<std::io::Error> for RecorderError {
    fn from(e: std::io::Error) -> Self {
        RecorderError::Io(e.to_string())
    }
}

/// Latest visualizer reading forwarded from the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    pub sample_sum: f64,
    pub recorded_frames: usize,
}

/// An encoded recording ready to be written out.
#[derive(Debug, Clone)]
pub struct EncodedRecording {
    pub recording_id: Uuid,
    pub bytes: Vec<u8>,
    pub recorded_frames: usize,
    pub sample_rate: u32,
    pub channels: usize,
}

impl EncodedRecording {
    pub fn duration_secs(&self) -> f64 {
        self.recorded_frames as f64 / self.sample_rate as f64
    }
}

/// What a processed engine notification amounted to.
#[derive(Debug, Clone)]
pub enum ControllerUpdate {
    Level(LevelReading),
    CapacityReached { recorded_frames: usize },
    Finished(EncodedRecording),
}

pub struct RecordingController<E: Encoder> {
    recording_id: Uuid,
    state: RecordingState,
    properties: RecordingProperties,
    port: ControllerPort,
    encoder: E,
    level: Option<LevelReading>,
}

impl<E: Encoder> RecordingController<E> {
    pub fn new(properties: RecordingProperties, port: ControllerPort, encoder: E) -> Self {
        let recording_id = Uuid::new_v4();
        log::debug!(
            "Recording {} set up: {} channels, {} Hz, {} frames max",
            recording_id,
            properties.number_of_channels(),
            properties.sample_rate(),
            properties.max_frame_count()
        );

        Self {
            recording_id,
            state: RecordingState::default(),
            properties,
            port,
            encoder,
            level: None,
        }
    }

    pub fn recording_id(&self) -> Uuid {
        self.recording_id
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Most recent level reading, if the engine has published one
    pub fn level(&self) -> Option<LevelReading> {
        self.level
    }

    /// Start or resume capture. A no-op while already recording.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        self.dispatch(Event::StartRequested).await?;
        Ok(())
    }

    /// Pause capture. A no-op unless recording.
    ///
    /// The engine answers a real stop with its buffer; collect it with
    /// [`next_update`](Self::next_update) or use [`finish`](Self::finish).
    pub async fn stop(&mut self) -> Result<(), RecorderError> {
        self.dispatch(Event::StopRequested).await?;
        Ok(())
    }

    /// Wait for the next engine notification and apply it.
    pub async fn next_update(&mut self) -> Result<ControllerUpdate, RecorderError> {
        let notification = self.port.recv().await.ok_or(RecorderError::ChannelClosed)?;
        self.apply(notification).await
    }

    /// Stop and wait until the engine's buffer has been encoded.
    ///
    /// Fails with `AlreadyFinished` once the buffer was handed over, including
    /// when encoding it failed: a spent engine never answers again.
    pub async fn finish(&mut self) -> Result<EncodedRecording, RecorderError> {
        if self.state == RecordingState::Finished {
            return Err(RecorderError::AlreadyFinished);
        }

        self.stop().await?;

        if self.state == RecordingState::Uninitialized {
            // Never armed, so the engine will never answer
            return Err(EncodeError::NoFrames.into());
        }

        loop {
            if let ControllerUpdate::Finished(recording) = self.next_update().await? {
                return Ok(recording);
            }
        }
    }

    async fn apply(
        &mut self,
        notification: EngineNotification,
    ) -> Result<ControllerUpdate, RecorderError> {
        match notification {
            EngineNotification::Level {
                sample_sum,
                recorded_frames,
            } => {
                let reading = LevelReading {
                    sample_sum,
                    recorded_frames,
                };
                self.level = Some(reading);
                Ok(ControllerUpdate::Level(reading))
            }
            EngineNotification::CapacityReached { recorded_frames } => {
                log::warn!(
                    "Recording {} reached capacity at {} frames ({:.1}s), finalizing",
                    self.recording_id,
                    recorded_frames,
                    self.properties.frames_to_secs(recorded_frames)
                );
                self.dispatch(Event::CapacityReached { recorded_frames })
                    .await?;
                Ok(ControllerUpdate::CapacityReached { recorded_frames })
            }
            EngineNotification::RecordingComplete(capture) => {
                let recording = self
                    .dispatch(Event::RecordingComplete(capture))
                    .await?
                    .ok_or(RecorderError::InvariantViolation(
                        InvariantViolation::DuplicateCompletion,
                    ))?;
                Ok(ControllerUpdate::Finished(recording))
            }
        }
    }

    /// Run one event through the reducer and execute its effects.
    /// Returns the encoded recording when the event finished the session.
    async fn dispatch(&mut self, event: Event) -> Result<Option<EncodedRecording>, RecorderError> {
        log::debug!("Recording {}: {:?}", self.recording_id, event);

        let (next, effects) = reduce(self.state, event).map_err(|v| {
            log::error!("Recording {}: {} (state {})", self.recording_id, v, self.state.as_str());
            v
        })?;

        if next != self.state {
            log::info!(
                "Recording {}: {} -> {}",
                self.recording_id,
                self.state.as_str(),
                next.as_str()
            );
        }
        self.state = next;

        let mut finished = None;
        for effect in effects {
            match effect {
                Effect::SetArmed(armed) => {
                    self.port.send(ControlCommand::SetArmed { armed }).await?;
                }
                Effect::Encode(capture) => {
                    let bytes = self.encoder.encode(
                        &capture.channel_buffers,
                        self.properties.sample_rate(),
                        capture.recorded_frames,
                    )?;
                    log::info!(
                        "Recording {} encoded: {} frames, {} bytes",
                        self.recording_id,
                        capture.recorded_frames,
                        bytes.len()
                    );
                    finished = Some(EncodedRecording {
                        recording_id: self.recording_id,
                        bytes,
                        recorded_frames: capture.recorded_frames,
                        sample_rate: self.properties.sample_rate(),
                        channels: capture.number_of_channels(),
                    });
                }
            }
        }

        Ok(finished)
    }
}
