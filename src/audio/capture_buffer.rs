//! Fixed-capacity planar capture storage
//!
//! One independently allocated `Vec<f32>` per channel, sized once at setup,
//! plus a single write cursor shared by all channels. Writes past the end are
//! rejected instead of wrapping, so a full buffer simply stops accepting audio.
//!
//! # Memory Budget
//!
//! At 48kHz stereo f32 with the default 300s capacity:
//! - Per channel: 14,400,000 frames × 4 bytes = 57.6 MB
//! - Total: 115.2 MB, allocated up front

use serde::{Deserialize, Serialize};

use super::RecordingProperties;

/// Reason a single-sample write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The offset is at or past the buffer capacity
    BufferFull { offset: usize, capacity: usize },
    /// The channel index does not exist in this buffer
    NoSuchChannel { channel: usize, channels: usize },
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::BufferFull { offset, capacity } => {
                write!(f, "Capture buffer full (offset {} >= capacity {})", offset, capacity)
            }
            WriteError::NoSuchChannel { channel, channels } => {
                write!(f, "Channel {} out of range ({} channels)", channel, channels)
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Capture storage owned by the real-time engine.
///
/// Thread-safety: This struct is NOT internally synchronized. The engine is
/// its only writer; ownership moves to the controller via [`snapshot`].
///
/// [`snapshot`]: RingCaptureBuffer::snapshot
#[derive(Debug)]
pub struct RingCaptureBuffer {
    channels: Vec<Vec<f32>>,
    capacity: usize,
    recorded_frames: usize,
}

impl RingCaptureBuffer {
    /// Allocate `capacity` zeroed frames for each of `number_of_channels` channels.
    pub fn new(number_of_channels: usize, capacity: usize) -> Self {
        let channels = (0..number_of_channels)
            .map(|_| vec![0.0f32; capacity])
            .collect();

        Self {
            channels,
            capacity,
            recorded_frames: 0,
        }
    }

    pub fn with_properties(properties: &RecordingProperties) -> Self {
        Self::new(
            properties.number_of_channels(),
            properties.max_frame_count(),
        )
    }

    /// Store one sample at `offset` frames into `channel`.
    ///
    /// Does not move the cursor; see [`advance`](Self::advance).
    #[inline]
    pub fn write(&mut self, channel: usize, offset: usize, sample: f32) -> Result<(), WriteError> {
        if offset >= self.capacity {
            return Err(WriteError::BufferFull {
                offset,
                capacity: self.capacity,
            });
        }

        let channels = self.channels.len();
        let data = self
            .channels
            .get_mut(channel)
            .ok_or(WriteError::NoSuchChannel { channel, channels })?;
        data[offset] = sample;
        Ok(())
    }

    /// Advance the shared cursor by `frames`, clamped at capacity.
    /// Returns the number of frames actually advanced.
    #[inline]
    pub fn advance(&mut self, frames: usize) -> usize {
        let advanced = frames.min(self.remaining_frames());
        self.recorded_frames += advanced;
        advanced
    }

    pub fn recorded_frames(&self) -> usize {
        self.recorded_frames
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn remaining_frames(&self) -> usize {
        self.capacity - self.recorded_frames
    }

    pub fn is_full(&self) -> bool {
        self.recorded_frames >= self.capacity
    }

    /// Full storage of one channel, including frames past the cursor
    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Hand the storage and current cursor over as an owned snapshot.
    pub fn snapshot(self) -> CapturedAudio {
        CapturedAudio {
            channel_buffers: self.channels,
            recorded_frames: self.recorded_frames,
        }
    }
}

/// The buffer contents handed to the controller when a recording completes.
///
/// `channel_buffers` keep their full capacity; only the first
/// `recorded_frames` frames of each hold captured audio.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedAudio {
    pub channel_buffers: Vec<Vec<f32>>,
    pub recorded_frames: usize,
}

impl CapturedAudio {
    pub fn number_of_channels(&self) -> usize {
        self.channel_buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded_frames == 0
    }

    /// Captured samples of one channel, truncated at `recorded_frames`
    pub fn recorded_channel(&self, channel: usize) -> Option<&[f32]> {
        self.channel_buffers
            .get(channel)
            .map(|data| &data[..self.recorded_frames.min(data.len())])
    }
}

// Channel buffers can hold millions of samples; keep log lines readable.
impl std::fmt::Debug for CapturedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedAudio")
            .field("channels", &self.channel_buffers.len())
            .field("recorded_frames", &self.recorded_frames)
            .finish()
    }
}
