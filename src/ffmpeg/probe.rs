use std::path::Path;

use crate::error::{AnalyzerError, Result};

/// The subset of stream metadata the Analyzer needs. Populated by shelling
/// out to `ffprobe`; kept separate from [`crate::timeline::MediaItem`] so the
/// analyzer's pure decision function never has to take a probe dependency
/// directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub pixel_format: String,
    pub duration: f64,
}

/// Runs `ffprobe -show_entries stream=... -of csv=p=0` against one file.
/// Blocking; callers offload this with `spawn_blocking`.
pub fn probe_media(ffprobe_binary: &str, path: &Path) -> Result<ProbeResult> {
    let path_str = path.to_str().ok_or_else(|| {
        AnalyzerError::ProbeFailed(
            path.display().to_string(),
            "path is not valid UTF-8".to_string(),
        )
    })?;

    let output = std::process::Command::new(ffprobe_binary)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,codec_name,pix_fmt:format=duration",
            "-of",
            "csv=p=0",
            path_str,
        ])
        .output()
        .map_err(|e| AnalyzerError::ProbeFailed(path_str.to_string(), e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(AnalyzerError::ProbeFailed(path_str.to_string(), stderr).into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_csv(&stdout)
        .ok_or_else(|| AnalyzerError::ProbeFailed(path_str.to_string(), "unexpected ffprobe output".to_string()).into())
}

fn parse_probe_csv(stdout: &str) -> Option<ProbeResult> {
    let mut lines = stdout.lines();
    let stream_line = lines.next()?;
    let parts: Vec<&str> = stream_line.trim().split(',').collect();
    if parts.len() < 5 {
        return None;
    }

    let width: u32 = parts[0].parse().ok()?;
    let height: u32 = parts[1].parse().ok()?;
    let fps = parse_frame_rate(parts[2])?;
    let codec = parts[3].to_string();
    let pixel_format = parts[4].to_string();

    let duration = lines
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    Some(ProbeResult {
        width,
        height,
        fps,
        codec,
        pixel_format,
        duration,
    })
}

/// `ffprobe` reports frame rate as a rational string like "30000/1001".
fn parse_frame_rate(raw: &str) -> Option<f64> {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        raw.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_frame_rate() {
        assert_eq!(parse_frame_rate("30"), Some(30.0));
    }

    #[test]
    fn parses_ntsc_rational_frame_rate() {
        let fps = parse_frame_rate("30000/1001").unwrap();
        assert!((fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn parses_full_probe_csv() {
        let csv = "1920,1080,30/1,h264,yuv420p\n12.5\n";
        let result = parse_probe_csv(csv).unwrap();
        assert_eq!(result.width, 1920);
        assert_eq!(result.height, 1080);
        assert_eq!(result.fps, 30.0);
        assert_eq!(result.codec, "h264");
        assert_eq!(result.pixel_format, "yuv420p");
        assert_eq!(result.duration, 12.5);
    }

    #[test]
    fn rejects_short_csv() {
        assert!(parse_probe_csv("1920,1080\n").is_none());
    }
}
