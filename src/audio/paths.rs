//! Output paths for exported recordings
//!
//! Recordings are stored in: ~/.local/share/mic-capture/recordings/

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use uuid::Uuid;

/// Default recordings directory.
/// Returns: <data_local_dir>/mic-capture/recordings/
pub fn default_output_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mic-capture")
        .join("recordings")
}

/// Generate a unique WAV file path inside `dir`, creating it if needed.
/// Format: recording-<YYYYMMDD_HHMMSS>_<uuid>.wav
pub fn generate_wav_path(dir: &Path, recording_id: Uuid) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("recording-{}_{}.wav", timestamp, recording_id);
    Ok(dir.join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_wav_path() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let path = generate_wav_path(&dir.path().join("out"), id).unwrap();

        assert!(path.to_string_lossy().contains(&id.to_string()));
        assert!(path.extension().map(|e| e == "wav").unwrap_or(false));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("recording-"));
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_default_output_dir_contains_expected_path() {
        let dir = default_output_dir();
        let path_str = dir.to_string_lossy();
        assert!(path_str.contains("mic-capture"));
        assert!(path_str.contains("recordings"));
    }
}
