//! Audio capture module for mic-capture
//!
//! This module holds the real-time capture core (buffer, engine, control
//! channel) plus the device and encoder collaborators.
//! Uses CPAL for audio capture and hound for WAV encoding.

mod capture_buffer;
mod control;
mod device;
mod engine;
mod paths;
mod properties;
mod quantum;
mod wav;

/// Frames per quantum handed to the capture engine
pub const QUANTUM_FRAMES: usize = 128;

pub use capture_buffer::{CapturedAudio, RingCaptureBuffer, WriteError};
pub use control::{
    control_channel, ChannelClosed, ControlCommand, ControllerPort, EngineNotification, EnginePort,
};
pub use device::{AudioError, CaptureStream, InputDevice};
pub use engine::{ArmState, CaptureEngine, DEFAULT_LEVEL_UPDATES_PER_SEC};
pub use paths::{default_output_dir, generate_wav_path};
pub use properties::{RecordingProperties, MAX_DURATION_SECS};
pub use quantum::QuantumAssembler;
pub use wav::{write_wav_file, EncodeError, Encoder, WavEncoder, WavFormat};
