//! Re-blocking of device callbacks into fixed-size planar quanta
//!
//! Input devices deliver interleaved buffers of whatever size the backend
//! chooses. The capture engine expects planar quanta of exactly
//! [`QUANTUM_FRAMES`] frames, so the assembler deinterleaves into a
//! preallocated scratch block and hands it on each time it fills up.

use cpal::{FromSample, Sample};

use super::QUANTUM_FRAMES;

pub struct QuantumAssembler {
    /// Channels per interleaved input frame
    device_channels: usize,
    scratch: Vec<Vec<f32>>,
    filled: usize,
}

impl QuantumAssembler {
    /// `device_channels` is the interleave stride of the incoming data;
    /// `capture_channels` is how many of those channels are kept.
    pub fn new(device_channels: usize, capture_channels: usize) -> Self {
        Self {
            device_channels: device_channels.max(1),
            scratch: vec![vec![0.0f32; QUANTUM_FRAMES]; capture_channels],
            filled: 0,
        }
    }

    /// Deinterleave `data`, calling `on_quantum` for every completed quantum.
    ///
    /// Frames that do not complete a quantum stay buffered for the next call.
    /// A trailing partial frame (fewer samples than channels) is discarded.
    pub fn push_interleaved<T, F>(&mut self, data: &[T], mut on_quantum: F)
    where
        T: Sample,
        f32: FromSample<T>,
        F: FnMut(&[Vec<f32>]),
    {
        for frame in data.chunks_exact(self.device_channels) {
            for (channel, &sample) in frame.iter().enumerate().take(self.scratch.len()) {
                self.scratch[channel][self.filled] = f32::from_sample(sample);
            }
            self.filled += 1;

            if self.filled == QUANTUM_FRAMES {
                on_quantum(&self.scratch);
                self.filled = 0;
            }
        }
    }
}
