//! Microphone input via CPAL
//!
//! `InputDevice` negotiates a stream configuration with an input device and
//! runs a [`CaptureEngine`] inside the device callback. Samples arrive in
//! whatever block size the backend picks; a [`QuantumAssembler`] re-blocks
//! them into fixed quanta before they reach the engine.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, Stream, StreamConfig};

use super::engine::CaptureEngine;
use super::quantum::QuantumAssembler;
use super::RecordingProperties;

/// Errors that can occur while acquiring or running the input device.
#[derive(Debug, Clone)]
pub enum AudioError {
    NoInputDevice,
    NoSupportedConfig,
    UnsupportedSampleFormat(String),
    StreamCreationFailed(String),
    InvalidProperties(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoInputDevice => write!(f, "No audio input device found"),
            AudioError::NoSupportedConfig => write!(f, "No supported audio configuration"),
            AudioError::UnsupportedSampleFormat(format) => {
                write!(f, "Unsupported sample format: {}", format)
            }
            AudioError::StreamCreationFailed(e) => {
                write!(f, "Failed to create audio stream: {}", e)
            }
            AudioError::InvalidProperties(e) => write!(f, "Invalid recording properties: {}", e),
        }
    }
}

impl std::error::Error for AudioError {}

/// Handle to a running input stream.
/// When dropped, the stream stops and the engine inside it is freed.
pub struct CaptureStream {
    _stream: Stream,
}

/// An input device with its negotiated stream configuration.
pub struct InputDevice {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl InputDevice {
    /// Open the input device whose name contains `name` (case-insensitive),
    /// or the host default when `name` is `None` or nothing matches.
    pub fn open(name: Option<&str>) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let named = name.and_then(|pattern| {
            let pattern = pattern.to_lowercase();
            let found = host.input_devices().ok()?.find(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&pattern))
                    .unwrap_or(false)
            });
            if found.is_none() {
                log::warn!("No input device matching '{}', using default", pattern);
            }
            found
        });

        let device = match named {
            Some(device) => device,
            None => host
                .default_input_device()
                .ok_or(AudioError::NoInputDevice)?,
        };

        log::info!("Using audio input device: {:?}", device.name());

        let supported_config = device
            .default_input_config()
            .map_err(|_| AudioError::NoSupportedConfig)?;

        log::info!(
            "Audio config: {} Hz, {} channels, {:?}",
            supported_config.sample_rate().0,
            supported_config.channels(),
            supported_config.sample_format()
        );

        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Recording properties for this device with room for `max_duration_secs`.
    pub fn recording_properties(
        &self,
        max_duration_secs: u32,
    ) -> Result<RecordingProperties, AudioError> {
        RecordingProperties::with_max_duration(
            self.channels() as usize,
            self.sample_rate(),
            max_duration_secs,
        )
    }

    /// Start the input stream with `engine` running in its callback.
    pub fn start(&self, engine: CaptureEngine) -> Result<CaptureStream, AudioError> {
        let stream = match self.sample_format {
            SampleFormat::I16 => self.build_stream_typed::<i16>(engine)?,
            SampleFormat::U16 => self.build_stream_typed::<u16>(engine)?,
            SampleFormat::F32 => self.build_stream_typed::<f32>(engine)?,
            other => return Err(AudioError::UnsupportedSampleFormat(format!("{:?}", other))),
        };

        stream.play().map_err(|e| {
            AudioError::StreamCreationFailed(format!("Failed to start stream: {}", e))
        })?;

        log::info!("Input stream started");
        Ok(CaptureStream { _stream: stream })
    }

    fn build_stream_typed<T>(&self, mut engine: CaptureEngine) -> Result<Stream, AudioError>
    where
        T: cpal::SizedSample + Send + 'static,
        f32: FromSample<T>,
    {
        let err_fn = |err| log::error!("Audio stream error: {}", err);
        let mut assembler = QuantumAssembler::new(
            self.config.channels as usize,
            engine.properties().number_of_channels(),
        );

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    assembler.push_interleaved(data, |quantum| {
                        engine.process(quantum);
                    });
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamCreationFailed(e.to_string()))
    }
}
