use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::{WavFormat, DEFAULT_LEVEL_UPDATES_PER_SEC};

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR_NAME: &str = "mic-capture";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Capture buffer capacity in seconds. The buffer is allocated up front.
    pub max_duration_secs: u32,

    /// Sample encoding of exported WAV files.
    pub wav_format: WavFormat,

    /// How often the engine publishes a level reading (0 disables them).
    pub level_updates_per_sec: u32,

    /// Substring of the input device name to use instead of the default device.
    pub input_device: Option<String>,

    /// Where recordings are written. Defaults to the local data directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 300,
            wav_format: WavFormat::Float32,
            level_updates_per_sec: DEFAULT_LEVEL_UPDATES_PER_SEC,
            input_device: None,
            output_dir: None,
        }
    }
}

/// Default settings location: `<config_dir>/mic-capture/settings.json`
pub fn settings_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
    Ok(dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings(path: &Path) -> RecorderSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<RecorderSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                RecorderSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecorderSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            RecorderSettings::default()
        }
    }
}

/// Persist `settings` as pretty JSON at `path`, creating its directory.
///
/// The file is replaced in one step via a sibling `.json.tmp`, so readers see
/// either the old settings or the new ones.
pub fn save_settings(path: &Path, settings: &RecorderSettings) -> std::io::Result<()> {
    let mut contents = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    contents.push('\n');

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents)?;
    if let Err(e) = replace_file(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    log::info!("Settings saved to {:?}", path);
    Ok(())
}

fn replace_file(from: &Path, to: &Path) -> std::io::Result<()> {
    // Windows refuses to rename over an existing file
    if cfg!(windows) {
        match std::fs::remove_file(to) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
    }
    std::fs::rename(from, to)
}
