//! Mode D — Frame Rendering (§4.6). The universal fallback: a cooperative
//! loop feeds PNG-encoded RGBA frames to an `image2pipe` FFmpeg input, one
//! per `t = i/FPS`, then muxes against the mixed audio track.

use std::io::Write;
use std::process::{Command, Stdio};

use image::{ImageBuffer, Rgba};
use tokio::task;
use tracing::{debug, info};

use crate::audio::{AudioElement, AudioMixer};
use crate::config::ExportSettings;
use crate::effects;
use crate::error::{ExportError, FfmpegError, Result};
use crate::ffmpeg::FfmpegDriver;
use crate::modes::path_str;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::session::Session;
use crate::timeline::EffectBinding;

/// A pure function of timeline time: given `t` in seconds, returns the
/// composited RGBA frame at that instant. Implemented by the embedder's
/// renderer (preview surface or headless canvas); never touched by this crate.
pub trait FrameSource: Send + Sync {
    fn render_at(&self, t: f64) -> Result<Vec<u8>>;
}

/// Encodes one RGBA buffer to PNG bytes.
fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>> {
    let image: ImageBuffer<Rgba<u8>, _> = ImageBuffer::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| {
            ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "frame source returned a buffer of the wrong size",
            ))
        })?;

    let mut bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    Ok(bytes)
}

/// Total frame count for `duration` seconds at `fps`, per §4.6's
/// `i in [0, ceil(totalDuration*FPS))`.
pub fn frame_count(total_duration: f64, fps: u32) -> u64 {
    (total_duration * fps as f64).ceil() as u64
}

/// Runs the per-frame effect filter pass: reads `raw_frame-i.png`, applies the
/// element's compiled filter chain, writes `frame-i.png` (§4.6 step 3).
fn filter_one_frame(ffmpeg_binary: &str, input: &std::path::Path, output: &std::path::Path, chain: &str) -> Result<()> {
    let output_status = Command::new(ffmpeg_binary)
        .args([
            "-i",
            &path_str(input)?,
            "-vf",
            chain,
            "-y",
            &path_str(output)?,
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?;

    if !output_status.status.success() {
        return Err(FfmpegError::NonZeroExit {
            status: output_status.status.code().unwrap_or(-1),
            stderr_tail: String::from_utf8_lossy(&output_status.stderr).to_string(),
        }
        .into());
    }
    Ok(())
}

/// Drives the full Mode D pipeline: renders every frame, optionally re-filters
/// effect-bearing frames through a standalone FFmpeg pass, pipes the result
/// into an `image2pipe` encoder, mixes audio, and muxes.
pub async fn run(
    total_duration: f64,
    settings: &ExportSettings,
    frame_source: &dyn FrameSource,
    per_frame_effects: Option<&EffectBinding>,
    audio_elements: &[AudioElement],
    session: &Session,
    driver: &FfmpegDriver,
    cancel: CancelToken,
    progress: &dyn ProgressSink,
) -> Result<std::path::PathBuf> {
    let total_frames = frame_count(total_duration, settings.fps);
    info!(total_frames, "starting frame rendering");

    let effect_chain = per_frame_effects.map(effects::compile).transpose()?.unwrap_or_default();

    let binary = driver.clone();
    let frames_dir = session.frames_dir();
    let width = settings.width;
    let height = settings.height;

    let mut video_pipe_path = None;
    if !effect_chain.is_empty() {
        // Per-frame FFmpeg filtering variant: stage raw frames to disk,
        // refilter each one, then feed the encoder from the filtered set.
        for i in 0..total_frames {
            if cancel.is_cancelled() {
                return Err(FfmpegError::SpawnFailed("cancelled during frame rendering".to_string()).into());
            }
            let t = i as f64 / settings.fps as f64;
            let rgba = frame_source.render_at(t)?;
            let png = encode_png(width, height, &rgba)?;

            let raw_path = session.raw_frame_path(i as u32);
            std::fs::write(&raw_path, &png)?;

            let filtered_path = session.frame_path(i as u32);
            let ffmpeg_binary = binary.ffmpeg_binary().to_string();
            let chain = effect_chain.clone();
            task::spawn_blocking(move || filter_one_frame(&ffmpeg_binary, &raw_path, &filtered_path, &chain))
                .await
                .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

            progress.report(ProgressEvent {
                percent: (i as f32 / total_frames.max(1) as f32) * 100.0,
                message: format!("rendering frame {i}/{total_frames}"),
            });
        }
        video_pipe_path = Some(frames_dir.join("frame-%04d.png"));
    }

    let video_only_path = session.output_dir().join("video_only.mp4");

    if let Some(pattern) = video_pipe_path {
        let args = vec![
            "-framerate".to_string(),
            settings.fps.to_string(),
            "-i".to_string(),
            path_str(&pattern)?,
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            path_str(&video_only_path)?,
        ];
        driver.run(args, cancel.clone(), progress).await?;
    } else {
        encode_from_stdin_pipe(driver, settings, frame_source, total_frames, session, cancel.clone(), progress, &video_only_path).await?;
    }

    // Audio mixing runs as its own standalone ffmpeg invocation here, so the
    // first audio input is ffmpeg input 0 (unlike Mode C's combined command).
    let (audio_graph, audio_input_args) = AudioMixer::build_filter_complex(audio_elements, 0);
    let mix_path = session.audio_mix_path();
    if !audio_graph.is_empty() {
        let mut args: Vec<String> = Vec::new();
        for input in &audio_input_args {
            args.extend(input.iter().cloned());
        }
        args.push("-filter_complex".to_string());
        args.push(audio_graph);
        args.push("-map".to_string());
        args.push("[mixout]".to_string());
        args.push(path_str(&mix_path)?);
        driver.run(args, cancel.clone(), progress).await?;
    }

    let output_path = session.output_dir().join(&settings.output_path);
    let mut mux_args = vec!["-i".to_string(), path_str(&video_only_path)?];
    if audio_graph_exists(&mix_path) {
        mux_args.push("-i".to_string());
        mux_args.push(path_str(&mix_path)?);
        mux_args.push("-c:v".to_string());
        mux_args.push("copy".to_string());
        mux_args.push("-c:a".to_string());
        mux_args.push("aac".to_string());
        mux_args.push("-b:a".to_string());
        mux_args.push("192k".to_string());
        mux_args.push("-shortest".to_string());
    } else {
        mux_args.push("-c:v".to_string());
        mux_args.push("copy".to_string());
    }
    mux_args.push(path_str(&output_path)?);
    driver.run(mux_args, cancel, progress).await?;

    Ok(output_path)
}

fn audio_graph_exists(mix_path: &std::path::Path) -> bool {
    mix_path.exists()
}

#[allow(clippy::too_many_arguments)]
async fn encode_from_stdin_pipe(
    driver: &FfmpegDriver,
    settings: &ExportSettings,
    frame_source: &dyn FrameSource,
    total_frames: u64,
    session: &Session,
    cancel: CancelToken,
    progress: &dyn ProgressSink,
    output_path: &std::path::Path,
) -> Result<()> {
    let binary = driver.ffmpeg_binary();
    let mut child = Command::new(binary)
        .args([
            "-f",
            "image2pipe",
            "-framerate",
            &settings.fps.to_string(),
            "-i",
            "-",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-y",
            &path_str(output_path)?,
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?;

    let mut stdin = child.stdin.take().expect("stdin was piped");

    for i in 0..total_frames {
        if cancel.is_cancelled() {
            break;
        }
        let t = i as f64 / settings.fps as f64;
        let rgba = frame_source.render_at(t)?;
        let png = encode_png(settings.width, settings.height, &rgba)?;

        if let Err(e) = stdin.write_all(&png) {
            let _ = child.wait();
            return Err(FfmpegError::BrokenPipe {
                stderr_tail: e.to_string(),
            }
            .into());
        }

        progress.report(ProgressEvent {
            percent: (i as f32 / total_frames.max(1) as f32) * 100.0,
            message: format!("encoding frame {i}/{total_frames}"),
        });
    }

    drop(stdin);
    let output = child
        .wait_with_output()
        .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(FfmpegError::NonZeroExit {
            status: output.status.code().unwrap_or(-1),
            stderr_tail: String::from_utf8_lossy(&output.stderr).to_string(),
        }
        .into());
    }

    debug!(total_frames, "frame pipe encode complete");
    let _ = session;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_rounds_up() {
        assert_eq!(frame_count(1.0, 30), 30);
        assert_eq!(frame_count(1.01, 30), 31);
    }

    #[test]
    fn zero_duration_yields_zero_frames() {
        assert_eq!(frame_count(0.0, 30), 0);
    }
}
