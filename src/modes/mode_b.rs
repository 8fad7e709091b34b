//! Mode B — Video Normalization (§4.4). Each clip is independently
//! scaled/padded/fps-normalized, then concat-copied.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use rayon::prelude::*;
use tracing::debug;

use crate::config::ExportSettings;
use crate::error::{ExportError, FfmpegError, Result, TimelineError};
use crate::ffmpeg::FfmpegDriver;
use crate::modes::{escape_concat_path, path_str};
use crate::progress::{CancelToken, ProgressSink};
use crate::timeline::{Element, MediaIndex};

/// `scale + pad + fps` conform filter (§4.4 step 2-3), preserving aspect ratio
/// through letterbox/pillarbox padding.
fn conform_video_filter(width: u32, height: u32, fps: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,fps={fps}",
        w = width,
        h = height,
        fps = fps,
    )
}

/// Normalizes one clip with a blocking `ffmpeg` invocation. Run off the async
/// runtime inside a `rayon` pool, mirroring the teacher's `par_iter_mut` use
/// for CPU-bound per-segment work.
fn normalize_one(
    ffmpeg_binary: &str,
    element: &Element,
    media: &MediaIndex,
    settings: &ExportSettings,
    output_path: &std::path::Path,
) -> Result<()> {
    let media_id = element
        .media_id()
        .expect("mode B only ever normalizes media elements");
    let item = media.get(media_id).ok_or_else(|| TimelineError::DanglingMediaReference {
        element_id: element.id.clone(),
        media_id: media_id.to_string(),
    })?;

    let mut args: Vec<String> = Vec::new();
    if element.is_trimmed() {
        let duration = item.duration - element.trim_end() - element.trim_start();
        args.push("-ss".to_string());
        args.push(element.trim_start().to_string());
        args.push("-t".to_string());
        args.push(duration.to_string());
    }
    args.push("-i".to_string());
    args.push(path_str(&item.path)?);
    args.push("-vf".to_string());
    args.push(conform_video_filter(settings.width, settings.height, settings.fps));
    args.push("-r".to_string());
    args.push(settings.fps.to_string());
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-preset".to_string());
    args.push("ultrafast".to_string());
    args.push("-crf".to_string());
    args.push("18".to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push("-c:a".to_string());
    args.push("copy".to_string());
    args.push("-async".to_string());
    args.push("1".to_string());
    args.push("-y".to_string());
    args.push(path_str(output_path)?);

    debug!(?args, "normalizing clip {media_id}");

    let output = Command::new(ffmpeg_binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(FfmpegError::NonZeroExit {
            status: output.status.code().unwrap_or(-1),
            stderr_tail: String::from_utf8_lossy(&output.stderr).to_string(),
        }
        .into());
    }
    Ok(())
}

/// Normalizes every clip (bounded parallelism via `rayon`'s global pool) then
/// runs a concat-demuxer copy pass over the normalized set, in timeline order.
pub async fn run(
    video_elements: Vec<Element>,
    media: MediaIndex,
    settings: ExportSettings,
    session_frames_dir: PathBuf,
    session_concat_list: PathBuf,
    session_output: PathBuf,
    ffmpeg_binary: String,
    driver: FfmpegDriver,
    cancel: CancelToken,
    progress: Box<dyn ProgressSink>,
) -> Result<PathBuf> {
    let normalized_paths: Vec<PathBuf> = video_elements
        .iter()
        .enumerate()
        .map(|(i, _)| session_frames_dir.join(format!("normalized_{i}.mp4")))
        .collect();

    // Bounded by CPU count (§5): a dedicated pool rather than rayon's global
    // default, so normalization never competes with other rayon users in the
    // same process for threads.
    let outcomes: Vec<Result<()>> = tokio::task::spawn_blocking({
        let video_elements = video_elements.clone();
        let normalized_paths = normalized_paths.clone();
        let ffmpeg_binary = ffmpeg_binary.clone();
        move || {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_cpus::get())
                .build()
                .expect("failed to build normalization thread pool");

            pool.install(|| {
                video_elements
                    .par_iter()
                    .zip(normalized_paths.par_iter())
                    .map(|(element, output_path)| {
                        normalize_one(&ffmpeg_binary, element, &media, &settings, output_path)
                    })
                    .collect()
            })
        }
    })
    .await
    .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    for outcome in outcomes {
        outcome?;
    }

    let mut list_contents = String::new();
    for path in &normalized_paths {
        let absolute = path.canonicalize().unwrap_or_else(|_| path.clone());
        list_contents.push_str(&format!("file '{}'\n", escape_concat_path(&path_str(&absolute)?)));
    }
    std::fs::write(&session_concat_list, list_contents)?;

    let output_path = session_output;
    let args = vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        path_str(&session_concat_list)?,
        "-c".to_string(),
        "copy".to_string(),
        path_str(&output_path)?,
    ];

    driver.run(args, cancel, progress.as_ref()).await?;
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conform_filter_pads_to_target_and_forces_fps() {
        let filter = conform_video_filter(1920, 1080, 30);
        assert_eq!(
            filter,
            "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2:black,fps=30"
        );
    }
}
