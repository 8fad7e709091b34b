//! Mode C — Single-Input + Filter Graph (§4.5). One base video, any number of
//! overlay/text/sticker elements, and per-element effects, composited in a
//! single `-filter_complex` invocation.

use std::path::PathBuf;

use crate::audio::{AudioElement, AudioMixer};
use crate::config::ExportSettings;
use crate::effects;
use crate::error::{DispatchError, Result, TimelineError};
use crate::ffmpeg::FfmpegDriver;
use crate::modes::path_str;
use crate::progress::{CancelToken, ProgressSink};
use crate::session::Session;
use crate::timeline::{Element, ElementKind, MediaIndex};

/// Text escaping for `drawtext`: backslash, colon, and single quote must be
/// escaped or the filter fails to parse (§4.5).
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

fn drawtext_filter(content: &str, x: f32, y: f32, start: f64, end: f64, font_path: &str) -> String {
    format!(
        "drawtext=fontfile='{font}':text='{text}':x={x}:y={y}:enable='between(t,{start},{end})'",
        font = font_path,
        text = escape_drawtext(content),
        x = x,
        y = y,
        start = start,
        end = end,
    )
}

fn overlay_filter(input_label: &str, base_label: &str, x: f32, y: f32, start: f64, end: f64, out_label: &str) -> String {
    format!(
        "{base_label}{input_label}overlay=x={x}:y={y}:enable='between(t,{start},{end})'[{out_label}]",
    )
}

/// Builds and runs the single `-filter_complex` invocation for Mode C.
pub async fn run(
    base_element: &Element,
    overlay_elements: &[Element],
    audio_elements: &[AudioElement],
    media: &MediaIndex,
    settings: &ExportSettings,
    font_resolver: &dyn Fn(&str) -> Option<String>,
    session: &Session,
    driver: &FfmpegDriver,
    cancel: CancelToken,
    progress: &dyn ProgressSink,
) -> Result<PathBuf> {
    let ElementKind::Media {
        media_id,
        trim_start,
        trim_end,
        ..
    } = &base_element.kind
    else {
        return Err(DispatchError::InvalidBaseElement {
            reason: format!("element '{}' is not a Media element", base_element.id),
        }
        .into());
    };
    let base_item = media.get(media_id).ok_or_else(|| TimelineError::DanglingMediaReference {
        element_id: base_element.id.clone(),
        media_id: media_id.clone(),
    })?;

    let mut input_args: Vec<String> = Vec::new();
    if base_element.is_trimmed() {
        let duration = base_item.duration - trim_end - trim_start;
        input_args.push("-ss".to_string());
        input_args.push(trim_start.to_string());
        input_args.push("-t".to_string());
        input_args.push(duration.to_string());
    }
    input_args.push("-i".to_string());
    input_args.push(path_str(&base_item.path)?);

    let mut overlay_inputs: Vec<String> = Vec::new();
    let mut sticker_input_count = 0usize;
    for element in overlay_elements {
        if let Some(media_id) = element.media_id() {
            let item = media.get(media_id).ok_or_else(|| TimelineError::DanglingMediaReference {
                element_id: element.id.clone(),
                media_id: media_id.to_string(),
            })?;
            overlay_inputs.push("-i".to_string());
            overlay_inputs.push(path_str(&item.path)?);
            sticker_input_count += 1;
        }
    }

    let mut filter_nodes: Vec<String> = Vec::new();
    let mut current_video_label = "0:v".to_string();

    if let Some(effects) = base_element.effects() {
        let chain = effects::compile(effects)?;
        if !chain.is_empty() {
            filter_nodes.push(format!("[{current_video_label}]{chain}[veffect]"));
            current_video_label = "veffect".to_string();
        }
    }

    let mut overlay_input_index = 1;
    for element in overlay_elements {
        match &element.kind {
            ElementKind::Text { content, x, y, .. } => {
                let font_path = font_resolver("default").unwrap_or_else(|| "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string());
                let filter = drawtext_filter(content, *x, *y, element.start_time, element.end_time(), &font_path);
                let out_label = format!("v{overlay_input_index}");
                filter_nodes.push(format!("[{current_video_label}]{filter}[{out_label}]"));
                current_video_label = out_label;
            }
            ElementKind::Sticker { transform, .. } => {
                let label = format!("[{}:v]", overlay_input_index);
                let out_label = format!("v{overlay_input_index}");
                filter_nodes.push(overlay_filter(
                    &label,
                    &format!("[{current_video_label}]"),
                    transform.x,
                    transform.y,
                    element.start_time,
                    element.end_time(),
                    &out_label,
                ));
                current_video_label = out_label;
                overlay_input_index += 1;
            }
            _ => {}
        }
    }

    // Input 0 is the base video; inputs 1..=sticker_input_count are the
    // sticker/image overlays pushed above. Audio inputs are appended after
    // both, so the mixer's `[i:a]` labels must be offset past them or they'd
    // bind to the wrong streams.
    let audio_base_index = 1 + sticker_input_count;
    let (audio_graph, audio_input_args) = AudioMixer::build_filter_complex(audio_elements, audio_base_index);
    for args in &audio_input_args {
        overlay_inputs.extend(args.iter().cloned());
    }

    let mut filter_complex = filter_nodes.join(";");
    if !audio_graph.is_empty() {
        if !filter_complex.is_empty() {
            filter_complex.push(';');
        }
        filter_complex.push_str(&audio_graph);
    }

    let output_path = session.output_dir().join(&settings.output_path);

    let mut args = input_args;
    args.extend(overlay_inputs);
    if !filter_complex.is_empty() {
        args.push("-filter_complex".to_string());
        args.push(filter_complex);
        args.push("-map".to_string());
        args.push(format!("[{current_video_label}]"));
        if !audio_graph.is_empty() {
            args.push("-map".to_string());
            args.push("[mixout]".to_string());
        }
    } else {
        args.push("-map".to_string());
        args.push("0:v".to_string());
    }
    args.extend(crate::modes::output_encoding_args(settings.quality.crf(), settings.quality.x264_preset()));
    args.push(path_str(&output_path)?);

    driver.run(args, cancel, progress).await?;
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawtext_escapes_colons_and_quotes() {
        assert_eq!(escape_drawtext("5:30 o'clock"), "5\\:30 o\\'clock");
    }

    #[test]
    fn drawtext_filter_embeds_enable_window() {
        let filter = drawtext_filter("hi", 0.1, 0.2, 1.0, 4.0, "/font.ttf");
        assert!(filter.contains("enable='between(t,1,4)'"));
    }

    #[test]
    fn audio_base_index_accounts_for_base_video_and_stickers() {
        // One base video input plus two sticker inputs means the first audio
        // input must be ffmpeg input 3, not 0.
        let sticker_input_count = 2;
        let audio_base_index = 1 + sticker_input_count;
        let elements = vec![crate::audio::AudioElement {
            file: PathBuf::from("music.mp3"),
            start_time: 0.0,
            trim_start: 0.0,
            trim_end: 0.0,
            duration: 4.0,
            volume: 1.0,
            fade_in: 0.0,
            fade_out: 0.0,
        }];
        let (graph, _) = AudioMixer::build_filter_complex(&elements, audio_base_index);
        assert!(graph.contains("[3:a]"));
    }
}
