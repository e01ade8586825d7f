//! WAV export of a finished capture using hound
//!
//! Channels are interleaved frame by frame into an in-memory RIFF/WAVE
//! container. 32-bit float keeps the captured samples bit-exact; 16-bit PCM
//! is available for players that do not handle float WAV.

use std::io::Cursor;
use std::path::Path;

use hound::{WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

/// Sample encoding of the exported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WavFormat {
    #[default]
    Float32,
    Int16,
}

impl WavFormat {
    fn spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        match self {
            WavFormat::Float32 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
            WavFormat::Int16 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
        }
    }
}

impl std::str::FromStr for WavFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float32" | "f32" => Ok(WavFormat::Float32),
            "int16" | "i16" => Ok(WavFormat::Int16),
            other => Err(format!("Unknown WAV format '{}' (expected float32 or int16)", other)),
        }
    }
}

/// Errors that can occur while encoding a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    NoFrames,
    ChannelMismatch { expected: usize, actual: usize },
    ShortChannel { channel: usize, len: usize, recorded_frames: usize },
    WriteFailed(String),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::NoFrames => write!(f, "Nothing was recorded"),
            EncodeError::ChannelMismatch { expected, actual } => {
                write!(f, "Expected {} channels, got {}", expected, actual)
            }
            EncodeError::ShortChannel {
                channel,
                len,
                recorded_frames,
            } => write!(
                f,
                "Channel {} holds {} frames but {} were recorded",
                channel, len, recorded_frames
            ),
            EncodeError::WriteFailed(e) => write!(f, "Failed to write WAV data: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {}

impl From<hound::Error> for EncodeError {
    fn from(e: hound::Error) -> Self {
        EncodeError::WriteFailed(e.to_string())
    }
}

/// Turns captured per-channel buffers into an audio container.
pub trait Encoder {
    /// Encode the first `recorded_frames` frames of every channel.
    fn encode(
        &self,
        channel_buffers: &[Vec<f32>],
        sample_rate: u32,
        recorded_frames: usize,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// WAV encoder for a fixed channel count.
#[derive(Debug, Clone)]
pub struct WavEncoder {
    channels: usize,
    format: WavFormat,
}

impl WavEncoder {
    pub fn new(channels: usize, format: WavFormat) -> Self {
        Self { channels, format }
    }

    fn validate(
        &self,
        channel_buffers: &[Vec<f32>],
        recorded_frames: usize,
    ) -> Result<(), EncodeError> {
        if recorded_frames == 0 {
            return Err(EncodeError::NoFrames);
        }
        if channel_buffers.len() != self.channels {
            return Err(EncodeError::ChannelMismatch {
                expected: self.channels,
                actual: channel_buffers.len(),
            });
        }
        if let Some((channel, data)) = channel_buffers
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() < recorded_frames)
        {
            return Err(EncodeError::ShortChannel {
                channel,
                len: data.len(),
                recorded_frames,
            });
        }
        Ok(())
    }
}

impl Encoder for WavEncoder {
    fn encode(
        &self,
        channel_buffers: &[Vec<f32>],
        sample_rate: u32,
        recorded_frames: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        self.validate(channel_buffers, recorded_frames)?;

        let channels = u16::try_from(self.channels).map_err(|_| EncodeError::ChannelMismatch {
            expected: u16::MAX as usize,
            actual: self.channels,
        })?;
        let spec = self.format.spec(channels, sample_rate);

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for frame in 0..recorded_frames {
                for data in channel_buffers {
                    match self.format {
                        WavFormat::Float32 => writer.write_sample(data[frame])?,
                        WavFormat::Int16 => writer.write_sample(sample_to_i16(data[frame]))?,
                    }
                }
            }
            writer.finalize()?;
        }

        log::debug!(
            "Encoded {} frames x {} channels at {} Hz as {:?} WAV",
            recorded_frames,
            self.channels,
            sample_rate,
            self.format
        );
        Ok(cursor.into_inner())
    }
}

/// Write an encoded recording to disk, creating parent directories.
pub fn write_wav_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Convert a float sample to i16 for 16-bit PCM.
fn sample_to_i16(sample: f32) -> i16 {
    // Clamp and convert to i16
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_ramp(frames: usize) -> Vec<Vec<f32>> {
        vec![
            (0..frames).map(|i| i as f32 / frames as f32).collect(),
            (0..frames).map(|i| -(i as f32) / frames as f32).collect(),
        ]
    }

    #[test]
    fn test_sample_to_i16() {
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(1.0), i16::MAX);
        assert_eq!(sample_to_i16(-1.0), -i16::MAX);

        // Test clamping
        assert_eq!(sample_to_i16(2.0), i16::MAX);
        assert_eq!(sample_to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn test_float_wav_round_trips_samples() {
        let buffers = stereo_ramp(100);
        let bytes = WavEncoder::new(2, WavFormat::Float32)
            .encode(&buffers, 48000, 60)
            .unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(reader.duration(), 60);

        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 120);
        assert_eq!(samples[2], buffers[0][1]);
        assert_eq!(samples[3], buffers[1][1]);
    }

    #[test]
    fn test_int16_wav_header() {
        let bytes = WavEncoder::new(1, WavFormat::Int16)
            .encode(&[vec![1.0, -1.0, 0.0]], 16000, 3)
            .unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn test_zero_frames_is_an_error() {
        let err = WavEncoder::new(2, WavFormat::Float32)
            .encode(&stereo_ramp(10), 48000, 0)
            .unwrap_err();
        assert_eq!(err, EncodeError::NoFrames);
    }

    #[test]
    fn test_channel_mismatch_is_an_error() {
        let err = WavEncoder::new(1, WavFormat::Float32)
            .encode(&stereo_ramp(10), 48000, 10)
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::ChannelMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_short_channel_is_an_error() {
        let buffers = vec![vec![0.0; 10], vec![0.0; 5]];
        let err = WavEncoder::new(2, WavFormat::Float32)
            .encode(&buffers, 48000, 8)
            .unwrap_err();
        assert!(matches!(err, EncodeError::ShortChannel { channel: 1, .. }));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("float32".parse::<WavFormat>().unwrap(), WavFormat::Float32);
        assert_eq!("I16".parse::<WavFormat>().unwrap(), WavFormat::Int16);
        assert!("mp3".parse::<WavFormat>().is_err());
    }

    #[test]
    fn test_write_wav_file_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.wav");
        write_wav_file(&path, b"RIFF").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
    }
}
