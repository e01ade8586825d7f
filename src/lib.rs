pub mod audio;
pub mod controller;
pub mod settings;
pub mod state_machine;

use std::path::PathBuf;

use tokio::sync::mpsc;

use audio::{
    control_channel, default_output_dir, generate_wav_path, write_wav_file, CaptureEngine,
    InputDevice, WavEncoder,
};
use controller::{ControllerUpdate, RecorderError, RecordingController};
use settings::RecorderSettings;

pub use controller::EncodedRecording;

/// One step of the session loop
enum Step {
    Stop,
    Update(ControllerUpdate),
}

/// Record one session from the configured input device.
///
/// Capture starts immediately and runs until `stop_rx` yields (or its sender
/// is dropped) or the capture buffer fills. The encoded WAV is written to
/// `output`, or to a generated path in the configured output directory.
/// `on_progress` receives the recorded duration in seconds at each level
/// update.
///
/// The input stream is not `Send`, so the returned future must be driven on
/// the thread that created it (e.g. a current-thread runtime).
pub async fn record_session(
    settings: &RecorderSettings,
    output: Option<PathBuf>,
    mut stop_rx: mpsc::Receiver<()>,
    mut on_progress: impl FnMut(f64),
) -> Result<PathBuf, RecorderError> {
    let device = InputDevice::open(settings.input_device.as_deref())?;
    let properties = device.recording_properties(settings.max_duration_secs)?;

    let (port, engine_port) = control_channel();
    let engine = CaptureEngine::new(properties, engine_port)
        .with_level_updates_per_sec(settings.level_updates_per_sec);
    let stream = device.start(engine)?;

    let encoder = WavEncoder::new(properties.number_of_channels(), settings.wav_format);
    let mut controller = RecordingController::new(properties, port, encoder);
    controller.start().await?;
    log::info!(
        "Recording {} started ({}s max)",
        controller.recording_id(),
        settings.max_duration_secs
    );

    let mut stop_requested = false;
    let recording = loop {
        let step = tokio::select! {
            biased;
            _ = stop_rx.recv(), if !stop_requested => Step::Stop,
            update = controller.next_update() => Step::Update(update?),
        };

        match step {
            Step::Stop => {
                stop_requested = true;
                controller.stop().await?;
            }
            Step::Update(ControllerUpdate::Level(reading)) => {
                on_progress(properties.frames_to_secs(reading.recorded_frames));
            }
            Step::Update(ControllerUpdate::CapacityReached { .. }) => {}
            Step::Update(ControllerUpdate::Finished(recording)) => break recording,
        }
    };
    drop(stream);

    let path = match output {
        Some(path) => path,
        None => {
            let dir = settings.output_dir.clone().unwrap_or_else(default_output_dir);
            generate_wav_path(&dir, recording.recording_id)?
        }
    };
    write_wav_file(&path, &recording.bytes)?;

    log::info!(
        "Saved {:.1}s recording to {:?}",
        recording.duration_secs(),
        path
    );
    Ok(path)
}
