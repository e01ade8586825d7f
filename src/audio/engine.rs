//! Real-time capture engine
//!
//! `CaptureEngine::process` runs once per audio quantum on the device thread.
//! It must finish in bounded time: no allocation, no locks, no logging. All
//! interaction with the controller goes through the [`EnginePort`].
//!
//! Per quantum:
//! 1. Retry parked notifications, then apply queued `SetArmed` commands
//! 2. Accumulate sample magnitudes for the visualizer
//! 3. While armed, copy samples into the capture buffer and advance the cursor
//! 4. Report capacity exhaustion once and publish level readings periodically

use super::capture_buffer::RingCaptureBuffer;
use super::control::{ControlCommand, EngineNotification, EnginePort};
use super::RecordingProperties;

/// Default visualizer publish rate, matching a 60fps display
pub const DEFAULT_LEVEL_UPDATES_PER_SEC: u32 = 60;

/// Whether incoming quanta are written to the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmState {
    #[default]
    Disarmed,
    Armed,
}

/// Running sum of sample magnitudes, for display only.
#[derive(Debug, Clone, Copy, Default)]
struct VisualizerAccumulator {
    sample_sum: f64,
}

impl VisualizerAccumulator {
    #[inline]
    fn add(&mut self, sample: f32) {
        self.sample_sum += sample.abs() as f64;
    }
}

pub struct CaptureEngine {
    properties: RecordingProperties,
    /// `None` once handed to the controller
    buffer: Option<RingCaptureBuffer>,
    arm_state: ArmState,
    port: EnginePort,
    visualizer: VisualizerAccumulator,
    /// Frames between level readings; 0 disables them
    level_interval: usize,
    frames_since_level: usize,
    capacity_reported: bool,
}

impl CaptureEngine {
    /// Build an engine and allocate its capture buffer.
    ///
    /// Call this off the real-time thread; it is the only allocation the
    /// engine ever makes.
    pub fn new(properties: RecordingProperties, port: EnginePort) -> Self {
        Self {
            properties,
            buffer: Some(RingCaptureBuffer::with_properties(&properties)),
            arm_state: ArmState::Disarmed,
            port,
            visualizer: VisualizerAccumulator::default(),
            level_interval: level_interval(properties.sample_rate(), DEFAULT_LEVEL_UPDATES_PER_SEC),
            frames_since_level: 0,
            capacity_reported: false,
        }
    }

    /// Override how often `Level` notifications are published (0 disables them).
    pub fn with_level_updates_per_sec(mut self, updates_per_sec: u32) -> Self {
        self.level_interval = level_interval(self.properties.sample_rate(), updates_per_sec);
        self
    }

    /// Process one quantum of planar input (`quantum[channel][frame]`).
    ///
    /// Channels beyond the session's channel count are ignored; missing
    /// channels stay silent. Always returns `true`: the engine never aborts,
    /// it clamps at capacity instead.
    pub fn process<S: AsRef<[f32]>>(&mut self, quantum: &[S]) -> bool {
        self.port.flush();
        self.apply_commands();

        let frames = quantum.first().map_or(0, |c| c.as_ref().len());
        let armed = self.arm_state == ArmState::Armed;
        let start = self.recorded_frames();

        for (channel, samples) in quantum
            .iter()
            .take(self.properties.number_of_channels())
            .enumerate()
        {
            let mut accepting = armed;
            for (i, &sample) in samples.as_ref().iter().enumerate() {
                self.visualizer.add(sample);

                if accepting {
                    if let Some(buffer) = self.buffer.as_mut() {
                        accepting = buffer.write(channel, start + i, sample).is_ok();
                    }
                }
            }
        }

        if armed {
            if let Some(buffer) = self.buffer.as_mut() {
                buffer.advance(frames);
                if buffer.is_full() && !self.capacity_reported {
                    self.capacity_reported = true;
                    let recorded_frames = buffer.recorded_frames();
                    self.port
                        .post(EngineNotification::CapacityReached { recorded_frames });
                }
            }
        }

        self.publish_level(frames);
        true
    }

    pub fn arm_state(&self) -> ArmState {
        self.arm_state
    }

    /// Frames written so far; 0 after the buffer has been handed off.
    pub fn recorded_frames(&self) -> usize {
        self.buffer.as_ref().map_or(0, RingCaptureBuffer::recorded_frames)
    }

    pub fn sample_sum(&self) -> f64 {
        self.visualizer.sample_sum
    }

    /// True once the buffer has been handed to the controller
    pub fn is_spent(&self) -> bool {
        self.buffer.is_none()
    }

    pub fn properties(&self) -> &RecordingProperties {
        &self.properties
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.port.next_command() {
            match command {
                ControlCommand::SetArmed { armed } => self.set_armed(armed),
            }
        }
    }

    fn set_armed(&mut self, armed: bool) {
        match (self.arm_state, armed) {
            (ArmState::Disarmed, true) => {
                // A handed-off buffer is never written again
                if self.buffer.is_some() {
                    self.arm_state = ArmState::Armed;
                }
            }
            (ArmState::Armed, false) => {
                self.arm_state = ArmState::Disarmed;
                if let Some(buffer) = self.buffer.take() {
                    self.port
                        .post(EngineNotification::RecordingComplete(buffer.snapshot()));
                }
            }
            // Redundant command
            _ => {}
        }
    }

    fn publish_level(&mut self, frames: usize) {
        if self.level_interval == 0 {
            return;
        }

        self.frames_since_level += frames;
        if self.frames_since_level >= self.level_interval {
            self.frames_since_level = 0;
            let recorded_frames = self.recorded_frames();
            self.port.post_lossy(EngineNotification::Level {
                sample_sum: self.visualizer.sample_sum,
                recorded_frames,
            });
        }
    }
}

fn level_interval(sample_rate: u32, updates_per_sec: u32) -> usize {
    if updates_per_sec == 0 {
        return 0;
    }
    (sample_rate / updates_per_sec).max(1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::control::{control_channel, ControllerPort};
    use crate::audio::QUANTUM_FRAMES;

    fn engine(channels: usize, capacity: usize) -> (CaptureEngine, ControllerPort) {
        let props = RecordingProperties::new(channels, 48000, capacity).unwrap();
        let (controller, port) = control_channel();
        let engine = CaptureEngine::new(props, port).with_level_updates_per_sec(0);
        (engine, controller)
    }

    fn constant_quantum(channels: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; QUANTUM_FRAMES]; channels]
    }

    async fn set_armed(controller: &ControllerPort, armed: bool) {
        controller
            .send(ControlCommand::SetArmed { armed })
            .await
            .unwrap();
    }

    fn drain(controller: &mut ControllerPort) -> Vec<EngineNotification> {
        let mut out = Vec::new();
        while let Some(n) = controller.try_recv() {
            out.push(n);
        }
        out
    }

    fn completions(notifications: &[EngineNotification]) -> usize {
        notifications
            .iter()
            .filter(|n| matches!(n, EngineNotification::RecordingComplete(_)))
            .count()
    }

    #[tokio::test]
    async fn disarmed_engine_records_nothing() {
        let (mut engine, mut controller) = engine(1, 1024);

        assert!(engine.process(&constant_quantum(1, 0.5)));
        assert_eq!(engine.recorded_frames(), 0);
        assert_eq!(engine.sample_sum(), 0.5 * QUANTUM_FRAMES as f64);

        // Disarm without ever arming: no completion
        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 0.0));
        assert_eq!(completions(&drain(&mut controller)), 0);
    }

    #[tokio::test]
    async fn recorded_frames_track_quanta() {
        let (mut engine, controller) = engine(1, 10_000);
        set_armed(&controller, true).await;

        for n in 1..=5 {
            engine.process(&constant_quantum(1, 0.1));
            assert_eq!(engine.recorded_frames(), n * QUANTUM_FRAMES);
        }
    }

    #[tokio::test]
    async fn capacity_clamps_and_completes_once() {
        let (mut engine, mut controller) = engine(1, 256);
        set_armed(&controller, true).await;

        engine.process(&constant_quantum(1, 1.0));
        engine.process(&constant_quantum(1, 2.0));
        assert_eq!(engine.recorded_frames(), 256);

        // Third quantum is dropped
        engine.process(&constant_quantum(1, 3.0));
        assert_eq!(engine.recorded_frames(), 256);
        assert_eq!(engine.arm_state(), ArmState::Armed);

        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 4.0));

        let notifications = drain(&mut controller);
        assert_eq!(
            notifications[0],
            EngineNotification::CapacityReached {
                recorded_frames: 256
            }
        );
        match &notifications[1] {
            EngineNotification::RecordingComplete(capture) => {
                assert_eq!(capture.recorded_frames, 256);
                assert!(capture.channel_buffers[0][..128].iter().all(|&s| s == 1.0));
                assert!(capture.channel_buffers[0][128..].iter().all(|&s| s == 2.0));
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(notifications.len(), 2);
    }

    #[tokio::test]
    async fn partial_quantum_is_truncated_at_capacity() {
        let (mut engine, mut controller) = engine(2, 200);
        set_armed(&controller, true).await;

        engine.process(&constant_quantum(2, 0.5));
        engine.process(&constant_quantum(2, 0.75));
        assert_eq!(engine.recorded_frames(), 200);

        set_armed(&controller, false).await;
        engine.process(&constant_quantum(2, 0.0));

        let notifications = drain(&mut controller);
        let capture = notifications
            .iter()
            .find_map(|n| match n {
                EngineNotification::RecordingComplete(c) => Some(c.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(capture.recorded_frames, 200);
        for channel in &capture.channel_buffers {
            assert_eq!(channel.len(), 200);
            assert_eq!(channel[127], 0.5);
            assert_eq!(channel[199], 0.75);
        }
    }

    #[tokio::test]
    async fn double_arm_does_not_reset() {
        let (mut engine, mut controller) = engine(1, 4096);

        set_armed(&controller, true).await;
        engine.process(&constant_quantum(1, 0.1));
        set_armed(&controller, true).await;
        engine.process(&constant_quantum(1, 0.1));

        assert_eq!(engine.recorded_frames(), 2 * QUANTUM_FRAMES);
        assert_eq!(completions(&drain(&mut controller)), 0);
    }

    #[tokio::test]
    async fn double_disarm_emits_single_completion() {
        let (mut engine, mut controller) = engine(1, 4096);

        set_armed(&controller, true).await;
        engine.process(&constant_quantum(1, 0.1));
        set_armed(&controller, false).await;
        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 0.1));
        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 0.1));

        assert_eq!(completions(&drain(&mut controller)), 1);
        assert!(engine.is_spent());
    }

    #[tokio::test]
    async fn commands_apply_at_quantum_boundaries() {
        let (mut engine, mut controller) = engine(1, 4096);

        // Arm then disarm before the same quantum: the quantum sees the
        // final state only and nothing is written.
        set_armed(&controller, true).await;
        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 0.9));

        let notifications = drain(&mut controller);
        match &notifications[..] {
            [EngineNotification::RecordingComplete(capture)] => {
                assert_eq!(capture.recorded_frames, 0)
            }
            other => panic!("unexpected notifications {:?}", other),
        }
    }

    #[tokio::test]
    async fn rearm_after_handoff_is_ignored() {
        let (mut engine, mut controller) = engine(1, 4096);

        set_armed(&controller, true).await;
        engine.process(&constant_quantum(1, 0.1));
        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 0.1));
        set_armed(&controller, true).await;
        engine.process(&constant_quantum(1, 0.1));

        assert_eq!(engine.arm_state(), ArmState::Disarmed);
        assert_eq!(engine.recorded_frames(), 0);
        assert_eq!(completions(&drain(&mut controller)), 1);
    }

    #[tokio::test]
    async fn snapshot_matches_written_quanta() {
        let (mut engine, mut controller) = engine(2, 300);
        set_armed(&controller, true).await;

        let mut expected: Vec<Vec<f32>> = vec![Vec::new(), Vec::new()];
        for q in 0..3 {
            let quantum: Vec<Vec<f32>> = (0..2)
                .map(|ch| {
                    (0..QUANTUM_FRAMES)
                        .map(|i| (q * 1000 + ch * 10_000 + i) as f32)
                        .collect()
                })
                .collect();
            for ch in 0..2 {
                expected[ch].extend_from_slice(&quantum[ch]);
            }
            engine.process(&quantum);
        }
        for channel in &mut expected {
            channel.truncate(300);
        }

        set_armed(&controller, false).await;
        engine.process(&constant_quantum(2, 0.0));

        let capture = drain(&mut controller)
            .into_iter()
            .find_map(|n| match n {
                EngineNotification::RecordingComplete(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(capture.recorded_frames, 300);
        assert_eq!(capture.channel_buffers, expected);
    }

    #[tokio::test]
    async fn extra_input_channels_are_ignored() {
        let (mut engine, mut controller) = engine(1, 128);
        set_armed(&controller, true).await;

        let quantum = vec![vec![0.25f32; QUANTUM_FRAMES], vec![-1.0f32; QUANTUM_FRAMES]];
        engine.process(&quantum);
        set_armed(&controller, false).await;
        engine.process(&constant_quantum(1, 0.0));

        assert_eq!(engine.sample_sum(), 0.25 * QUANTUM_FRAMES as f64);
        assert_eq!(completions(&drain(&mut controller)), 1);
    }

    #[tokio::test]
    async fn level_readings_are_published() {
        let props = RecordingProperties::new(1, 12_800, 4096).unwrap();
        let (mut controller, port) = control_channel();
        // 12.8kHz / 100 = one reading per 128-frame quantum
        let mut engine = CaptureEngine::new(props, port).with_level_updates_per_sec(100);

        engine.process(&constant_quantum(1, -0.5));
        engine.process(&constant_quantum(1, 0.5));

        let levels: Vec<f64> = drain(&mut controller)
            .into_iter()
            .filter_map(|n| match n {
                EngineNotification::Level { sample_sum, .. } => Some(sample_sum),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![64.0, 128.0]);
    }

    #[test]
    fn level_interval_from_rate() {
        assert_eq!(level_interval(48000, 60), 800);
        assert_eq!(level_interval(48000, 0), 0);
        assert_eq!(level_interval(30, 60), 1);
    }
}
