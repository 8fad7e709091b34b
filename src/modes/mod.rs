//! The four export strategies (§4.3–§4.6), in cheap-to-expensive order.

pub mod mode_a;
pub mod mode_b;
pub mod mode_c;
pub mod mode_d;

use crate::error::{ExportError, Result};
use std::path::Path;

/// Converts a path to UTF-8, matching the argv-only contract (no OsString
/// round-tripping through ffmpeg argv).
pub fn path_str(path: &Path) -> Result<String> {
    path.to_str().map(|s| s.to_string()).ok_or_else(|| {
        ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path is not valid UTF-8: {}", path.display()),
        ))
    })
}

/// Escapes a path for inclusion in a concat-demuxer list line:
/// `file '<path>'`, with embedded single quotes escaped per the ffmpeg manual.
pub fn escape_concat_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}

/// Standard H.264/AAC MP4 output encoding args shared by every mode that
/// re-encodes (§6 "Output container: MP4 (H.264 + AAC)").
pub fn output_encoding_args(crf: u8, preset: &str) -> Vec<String> {
    vec![
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        preset.into(),
        "-crf".into(),
        crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-movflags".into(),
        "+faststart".into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_single_quotes_in_concat_paths() {
        assert_eq!(escape_concat_path("/tmp/o'brien.mp4"), r"/tmp/o'\''brien.mp4");
    }

    #[test]
    fn leaves_plain_paths_untouched() {
        assert_eq!(escape_concat_path("/tmp/clip.mp4"), "/tmp/clip.mp4");
    }
}
