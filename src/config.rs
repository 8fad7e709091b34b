use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Export-request settings — canvas size, frame rate, output path, quality (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub output_path: String,
    pub quality: Quality,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            output_path: "output.mp4".to_string(),
            quality: Quality::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    /// CRF value fed to libx264 for this quality tier.
    pub fn crf(self) -> u8 {
        match self {
            Quality::High => 18,
            Quality::Medium => 23,
            Quality::Low => 28,
        }
    }

    pub fn x264_preset(self) -> &'static str {
        match self {
            Quality::High => "slow",
            Quality::Medium => "medium",
            Quality::Low => "veryfast",
        }
    }
}

/// Process-wide pipeline configuration: binary locations, timeouts, retention policy.
///
/// Mirrors `retro-compositor::config::Config`'s shape: TOML round-trippable,
/// `Default`, and a `validate()` pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ffmpeg: FfmpegConfig,
    pub timeouts: TimeoutConfig,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg: FfmpegConfig::default(),
            timeouts: TimeoutConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;
        Ok(())
    }
}

/// Resolves the `ffmpeg`/`ffprobe` binaries, honoring `FFMPEG_PATH` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok(),
            ffprobe_path: None,
        }
    }
}

impl FfmpegConfig {
    pub fn ffmpeg_binary(&self) -> &str {
        self.ffmpeg_path.as_deref().unwrap_or("ffmpeg")
    }

    pub fn ffprobe_binary(&self) -> &str {
        self.ffprobe_path.as_deref().unwrap_or("ffprobe")
    }
}

/// Per-mode wall-clock ceilings, in seconds. Mode D has no ceiling (§5); the
/// caller is expected to bound it externally, so it is represented as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub mode_a_secs: u64,
    pub mode_b_secs: u64,
    pub mode_c_secs: u64,
    pub mode_d_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            mode_a_secs: 60,
            mode_b_secs: 300,
            mode_c_secs: 300,
            mode_d_secs: None,
        }
    }
}

impl TimeoutConfig {
    fn validate(&self) -> Result<()> {
        if self.mode_a_secs == 0 || self.mode_b_secs == 0 || self.mode_c_secs == 0 {
            return Err(ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "per-mode timeouts must be nonzero",
            )));
        }
        Ok(())
    }
}

/// Session retention policy (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Keep the session tempdir around after a terminal failure, for diagnostics.
    pub keep_on_error: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { keep_on_error: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("qcut.toml");

        let original = Config::default();
        original.save_to_file(&file_path).unwrap();
        let loaded = Config::from_file(&file_path).unwrap();

        assert_eq!(original.timeouts.mode_a_secs, loaded.timeouts.mode_a_secs);
        assert_eq!(original.session.keep_on_error, loaded.session.keep_on_error);
    }

    #[test]
    fn invalid_timeout_rejected() {
        let mut config = Config::default();
        config.timeouts.mode_a_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn quality_crf_ordering() {
        assert!(Quality::High.crf() < Quality::Medium.crf());
        assert!(Quality::Medium.crf() < Quality::Low.crf());
    }
}
