//! Message path between the controller and the real-time capture engine
//!
//! ```text
//! Controller (async)                       Audio Thread (real-time)
//! ┌──────────────────┐  ControlCommand    ┌────────────────────────┐
//! │ ControllerPort   │──── bounded ────▶  │ EnginePort             │
//! │  send().await    │                    │  next_command()        │
//! │  recv().await    │  ◀─── bounded ──── │  post() / post_lossy() │
//! └──────────────────┘ EngineNotification └────────────────────────┘
//! ```
//!
//! The engine side never blocks and never allocates. Lossless notifications
//! that meet a full queue wait in a preallocated outbox and are retried at the
//! start of the next quantum.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use super::capture_buffer::CapturedAudio;

/// Depth of the controller → engine command queue
pub const COMMAND_QUEUE_DEPTH: usize = 32;

/// Depth of the engine → controller notification queue
pub const NOTIFICATION_QUEUE_DEPTH: usize = 64;

/// Lossless notifications the engine can emit per session:
/// one `CapacityReached` and one `RecordingComplete`.
const OUTBOX_CAPACITY: usize = 4;

/// Controller → engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    SetArmed { armed: bool },
}

/// Engine → controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineNotification {
    /// The engine disarmed and handed its buffer over. Emitted once per session.
    RecordingComplete(CapturedAudio),
    /// The buffer filled up; later samples are dropped until disarmed.
    #[serde(rename_all = "camelCase")]
    CapacityReached { recorded_frames: usize },
    /// Periodic visualizer reading. May be skipped under backpressure.
    #[serde(rename_all = "camelCase")]
    Level {
        sample_sum: f64,
        recorded_frames: usize,
    },
}

/// Returned when the other side of the control channel has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

impl std::fmt::Display for ChannelClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Capture engine control channel closed")
    }
}

impl std::error::Error for ChannelClosed {}

/// Create a connected pair of ports.
pub fn control_channel() -> (ControllerPort, EnginePort) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_QUEUE_DEPTH);

    let controller = ControllerPort {
        commands: command_tx,
        notifications: notify_rx,
    };
    let engine = EnginePort {
        commands: command_rx,
        notifications: notify_tx,
        outbox: VecDeque::with_capacity(OUTBOX_CAPACITY),
        closed: false,
    };

    (controller, engine)
}

/// Controller-side end. May block and allocate.
#[derive(Debug)]
pub struct ControllerPort {
    commands: mpsc::Sender<ControlCommand>,
    notifications: mpsc::Receiver<EngineNotification>,
}

impl ControllerPort {
    /// Queue a command for the engine, waiting if the queue is full.
    pub async fn send(&self, command: ControlCommand) -> Result<(), ChannelClosed> {
        self.commands.send(command).await.map_err(|_| ChannelClosed)
    }

    /// Wait for the next notification. `None` once the engine is gone.
    pub async fn recv(&mut self) -> Option<EngineNotification> {
        self.notifications.recv().await
    }

    /// Take a notification if one is already waiting.
    pub fn try_recv(&mut self) -> Option<EngineNotification> {
        self.notifications.try_recv().ok()
    }
}

/// Engine-side end. Every method is non-blocking and allocation-free.
#[derive(Debug)]
pub struct EnginePort {
    commands: mpsc::Receiver<ControlCommand>,
    notifications: mpsc::Sender<EngineNotification>,
    outbox: VecDeque<EngineNotification>,
    closed: bool,
}

impl EnginePort {
    /// Next pending command in arrival order, if any.
    #[inline]
    pub fn next_command(&mut self) -> Option<ControlCommand> {
        match self.commands.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Post a notification that must not be dropped.
    ///
    /// Queued behind anything already waiting in the outbox so ordering holds.
    pub fn post(&mut self, notification: EngineNotification) {
        self.outbox.push_back(notification);
        self.flush();
    }

    /// Post a notification that may be skipped if delivery would have to wait.
    pub fn post_lossy(&mut self, notification: EngineNotification) {
        if self.closed || !self.outbox.is_empty() {
            return;
        }
        if let Err(TrySendError::Closed(_)) = self.notifications.try_send(notification) {
            self.closed = true;
        }
    }

    /// Retry delivery of outbox entries, oldest first.
    pub fn flush(&mut self) {
        // Once the controller is gone, entries stay parked here so the
        // real-time thread never frees a capture buffer.
        if self.closed {
            return;
        }

        while let Some(notification) = self.outbox.pop_front() {
            match self.notifications.try_send(notification) {
                Ok(()) => {}
                Err(TrySendError::Full(notification)) => {
                    self.outbox.push_front(notification);
                    break;
                }
                Err(TrySendError::Closed(notification)) => {
                    self.outbox.push_front(notification);
                    self.closed = true;
                    break;
                }
            }
        }
    }

    /// Number of lossless notifications still waiting for queue space
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }
}
