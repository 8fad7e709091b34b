//! Mode A — Direct Copy (§4.3). Concat-demuxer copy, no re-encode.

use std::path::PathBuf;

use crate::config::ExportSettings;
use crate::error::{Result, TimelineError};
use crate::ffmpeg::FfmpegDriver;
use crate::modes::{escape_concat_path, path_str};
use crate::progress::{CancelToken, ProgressSink};
use crate::session::Session;
use crate::timeline::MediaIndex;

/// Writes the concat-demuxer list file and invokes
/// `-f concat -safe 0 -i list.txt -c copy output.mp4`.
pub async fn run(
    video_sources: &[String],
    media: &MediaIndex,
    settings: &ExportSettings,
    session: &Session,
    driver: &FfmpegDriver,
    cancel: CancelToken,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    let list_path = session.concat_list_path();
    let mut list_contents = String::new();
    for media_id in video_sources {
        let item = media.get(media_id).ok_or_else(|| TimelineError::DanglingMediaReference {
            element_id: media_id.clone(),
            media_id: media_id.clone(),
        })?;
        let absolute = item
            .path
            .canonicalize()
            .unwrap_or_else(|_| item.path.clone());
        list_contents.push_str(&format!("file '{}'\n", escape_concat_path(&path_str(&absolute)?)));
    }
    std::fs::write(&list_path, list_contents)?;

    let output_path = session.output_dir().join(&settings.output_path);
    let args = vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        path_str(&list_path)?,
        "-c".to_string(),
        "copy".to_string(),
        path_str(&output_path)?,
    ];

    driver.run(args, cancel, progress).await?;
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_list_escapes_quotes_in_paths() {
        let escaped = escape_concat_path("/tmp/o'brien/clip.mp4");
        let line = format!("file '{escaped}'\n");
        assert_eq!(line, "file '/tmp/o'\\''brien/clip.mp4'\n");
    }
}
