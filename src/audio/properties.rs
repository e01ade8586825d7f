//! Fixed recording parameters negotiated once per session

use serde::Serialize;

use super::AudioError;

/// Longest recording a single session may allocate for
pub const MAX_DURATION_SECS: u32 = 60 * 60;

/// Channel count, sample rate and frame capacity of one recording session.
///
/// Set once before the first quantum is processed and never changed
/// afterwards. The capture buffer is sized from these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingProperties {
    number_of_channels: usize,
    sample_rate: u32,
    max_frame_count: usize,
}

impl RecordingProperties {
    /// Create validated properties. Every field must be positive.
    pub fn new(
        number_of_channels: usize,
        sample_rate: u32,
        max_frame_count: usize,
    ) -> Result<Self, AudioError> {
        if number_of_channels == 0 {
            return Err(AudioError::InvalidProperties(
                "channel count must be positive".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidProperties(
                "sample rate must be positive".to_string(),
            ));
        }
        if max_frame_count == 0 {
            return Err(AudioError::InvalidProperties(
                "frame capacity must be positive".to_string(),
            ));
        }

        Ok(Self {
            number_of_channels,
            sample_rate,
            max_frame_count,
        })
    }

    /// Properties whose capacity holds `max_duration_secs` of audio.
    ///
    /// Durations above [`MAX_DURATION_SECS`] are rejected rather than
    /// attempting an allocation that cannot succeed.
    pub fn with_max_duration(
        number_of_channels: usize,
        sample_rate: u32,
        max_duration_secs: u32,
    ) -> Result<Self, AudioError> {
        if max_duration_secs > MAX_DURATION_SECS {
            return Err(AudioError::InvalidProperties(format!(
                "maximum duration {}s exceeds the {}s limit",
                max_duration_secs, MAX_DURATION_SECS
            )));
        }

        let max_frame_count = (sample_rate as usize)
            .checked_mul(max_duration_secs as usize)
            .ok_or_else(|| {
                AudioError::InvalidProperties(format!(
                    "{}s at {} Hz overflows the frame count",
                    max_duration_secs, sample_rate
                ))
            })?;
        Self::new(number_of_channels, sample_rate, max_frame_count)
    }

    pub fn number_of_channels(&self) -> usize {
        self.number_of_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn max_frame_count(&self) -> usize {
        self.max_frame_count
    }

    /// Duration of `frames` frames in seconds at this sample rate
    pub fn frames_to_secs(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_fields() {
        assert!(RecordingProperties::new(0, 48000, 10).is_err());
        assert!(RecordingProperties::new(2, 0, 10).is_err());
        assert!(RecordingProperties::new(2, 48000, 0).is_err());
        assert!(RecordingProperties::new(2, 48000, 10).is_ok());
    }

    #[test]
    fn max_duration_scales_with_sample_rate() {
        let props = RecordingProperties::with_max_duration(1, 48000, 300).unwrap();
        assert_eq!(props.max_frame_count(), 48000 * 300);
        assert_eq!(props.frames_to_secs(24000), 0.5);
    }

    #[test]
    fn oversized_duration_is_rejected() {
        let err = RecordingProperties::with_max_duration(1, 48000, 100_000_000).unwrap_err();
        assert!(matches!(err, AudioError::InvalidProperties(_)));

        assert!(RecordingProperties::with_max_duration(1, 48000, MAX_DURATION_SECS + 1).is_err());
        let props = RecordingProperties::with_max_duration(1, 48000, MAX_DURATION_SECS).unwrap();
        assert_eq!(props.max_frame_count(), 48000 * 3600);
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert!(RecordingProperties::with_max_duration(1, 48000, 0).is_err());
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let props = RecordingProperties::new(2, 44100, 1000).unwrap();
        let json = serde_json::to_value(props).unwrap();
        assert_eq!(json["numberOfChannels"], 2);
        assert_eq!(json["sampleRate"], 44100);
        assert_eq!(json["maxFrameCount"], 1000);
    }
}
