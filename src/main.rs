use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;

use mic_capture::audio::{WavFormat, MAX_DURATION_SECS};
use mic_capture::record_session;
use mic_capture::settings::{load_settings, save_settings, settings_path, RecorderSettings};

#[derive(Parser)]
#[command(name = "mic-capture")]
#[command(about = "Record the microphone to a WAV file. Press Enter or Ctrl+C to stop.")]
struct Args {
    /// Output WAV file path (default: generated in the recordings directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum recording length in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_DURATION_SECS as i64))]
    max_seconds: Option<u32>,

    /// Sample format of the WAV file: float32 or int16
    #[arg(long)]
    format: Option<WavFormat>,

    /// Use the first input device whose name contains this text
    #[arg(short, long)]
    device: Option<String>,

    /// Settings file (default: <config dir>/mic-capture/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings (file plus flags) back to the settings file
    #[arg(long)]
    save_settings: bool,
}

/// Settings file location plus the settings with command-line overrides applied
fn resolve_settings(args: &Args) -> (Option<PathBuf>, RecorderSettings) {
    let path = match &args.settings {
        Some(path) => Some(path.clone()),
        None => match settings_path() {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Settings: {}", e);
                None
            }
        },
    };

    let mut settings = path.as_deref().map(load_settings).unwrap_or_default();
    if let Some(max_seconds) = args.max_seconds {
        settings.max_duration_secs = max_seconds;
    }
    if let Some(format) = args.format {
        settings.wav_format = format;
    }
    if let Some(device) = &args.device {
        settings.input_device = Some(device.clone());
    }
    (path, settings)
}

/// Request a stop once a line is entered. End of input (e.g. `< /dev/null`)
/// is not a request.
fn watch_for_enter<R: BufRead>(mut input: R, stop_tx: mpsc::Sender<()>) {
    let mut line = String::new();
    if let Ok(n) = input.read_line(&mut line) {
        if n > 0 {
            let _ = stop_tx.blocking_send(());
        }
    }
}

fn main() -> ExitCode {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let args = Args::parse();
    let (settings_file, settings) = resolve_settings(&args);
    log::debug!("Effective settings: {:?}", settings);

    if args.save_settings {
        let Some(path) = settings_file.as_deref() else {
            log::error!("No settings file location; pass --settings");
            return ExitCode::FAILURE;
        };
        if let Err(e) = save_settings(path, &settings) {
            log::error!("Failed to save settings to {:?}: {}", path, e);
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (stop_tx, stop_rx) = mpsc::channel::<()>(4);

    let stdin_tx = stop_tx.clone();
    std::thread::spawn(move || watch_for_enter(std::io::stdin().lock(), stdin_tx));

    let result = runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received Ctrl+C, stopping recording");
                let _ = stop_tx.send(()).await;
            }
        });

        println!("Recording... press Enter or Ctrl+C to stop");
        record_session(&settings, args.output, stop_rx, |secs| {
            print!("\rSize: {:.1}s", secs);
            let _ = std::io::stdout().flush();
        })
        .await
    });

    match result {
        Ok(path) => {
            println!("\nSaved {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!();
            log::error!("Recording failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
