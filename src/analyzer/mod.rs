//! Export strategy analysis (§4.1). Pure: a deterministic function of
//! `(Timeline, MediaIndex, ExportSettings)`, with probing delegated to an
//! injected closure so the decision table can be tested without `ffprobe`.

use crate::config::ExportSettings;
use crate::timeline::{ElementKind, MediaIndex, MediaItem, Timeline};

/// The four export strategies, ordered cheap→expensive. Derives `Ord` so
/// "strategy monotonicity" (a downgrade always moves to a stricter index)
/// can be asserted directly in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    DirectCopy,
    Normalization,
    SingleInputFilterGraph,
    FrameRendering,
}

impl Strategy {
    /// The next-most-expensive strategy to fall back to, if any. `FrameRendering`
    /// is terminal — its failure has no further downgrade (§4.2).
    pub fn downgrade(self) -> Option<Strategy> {
        match self {
            Strategy::DirectCopy => Some(Strategy::Normalization),
            Strategy::Normalization => Some(Strategy::SingleInputFilterGraph),
            Strategy::SingleInputFilterGraph => Some(Strategy::FrameRendering),
            Strategy::FrameRendering => None,
        }
    }
}

/// The decision record handed to the dispatcher and (optionally) a UI preview.
#[derive(Debug, Clone)]
pub struct ExportAnalysis {
    pub strategy: Strategy,
    pub can_use_direct_copy: bool,
    pub reason: String,
    pub video_element_count: usize,
    pub has_overlapping_videos: bool,
    pub has_text_elements: bool,
    pub has_stickers: bool,
    pub has_image_elements: bool,
    pub has_effects: bool,
    pub all_videos_have_local_path: bool,
    pub video_sources: Vec<String>,
}

/// Runs the decision algorithm. `probe` resolves a media id to its current
/// metadata snapshot (normally `media.get(id)`, but tests can stub gaps to
/// exercise the probe-failure downgrade path).
pub fn analyze<'a, F>(
    timeline: &Timeline,
    media: &'a MediaIndex,
    settings: &ExportSettings,
    probe: F,
) -> ExportAnalysis
where
    F: Fn(&str) -> Option<&'a MediaItem>,
{
    let video_elements: Vec<_> = timeline.media_elements().collect();
    let video_element_count = video_elements.len();

    let video_sources: Vec<String> = video_elements
        .iter()
        .filter_map(|e| e.media_id().map(|s| s.to_string()))
        .collect();

    let has_overlapping_videos = has_overlap(&video_elements);
    let has_text_elements = timeline
        .overlay_elements()
        .any(|e| matches!(e.kind, ElementKind::Text { .. }));
    let has_stickers = timeline
        .overlay_elements()
        .any(|e| matches!(e.kind, ElementKind::Sticker { .. }));
    let has_image_elements = video_sources.iter().any(|id| {
        probe(id)
            .map(|m| m.kind == crate::timeline::MediaKind::Image)
            .unwrap_or(false)
    });
    let has_effects = video_elements.iter().any(|e| e.has_enabled_effects());
    let has_overlays = has_text_elements || has_stickers || has_image_elements;

    let mut probe_failed = false;
    let items: Vec<Option<&MediaItem>> = video_sources.iter().map(|id| probe(id)).collect();
    let all_videos_have_local_path = items.iter().all(|m| {
        if m.is_none() {
            probe_failed = true;
        }
        m.map(|m| m.path.exists() || !m.path.as_os_str().is_empty())
            .unwrap_or(false)
    });

    let all_probed_videos: Vec<&MediaItem> = items.into_iter().flatten().collect();
    if all_probed_videos.len() != video_sources.len() {
        probe_failed = true;
    }

    let can_use_direct_copy = !probe_failed
        && !has_overlap(&video_elements)
        && !has_overlays
        && !has_effects
        && all_videos_have_local_path
        && video_elements.iter().all(|e| !e.is_trimmed())
        && all_match_target(&all_probed_videos, settings);

    let mut strategy;
    let mut reason;

    if can_use_direct_copy {
        strategy = Strategy::DirectCopy;
        reason = "all clips match target codec/geometry/fps; no overlays or effects".to_string();
    } else if video_element_count > 1
        && !has_overlays
        && !has_effects
        && all_videos_have_local_path
    {
        if all_match_target(&all_probed_videos, settings) {
            strategy = Strategy::DirectCopy;
            reason = "multiple clips, already matching target; concat-copy".to_string();
        } else {
            strategy = Strategy::Normalization;
            reason = "multiple clips with mismatched geometry/fps; normalize then concat".to_string();
        }
    } else if video_element_count == 1 && expressible_as_filters(has_effects, &video_elements) {
        strategy = Strategy::SingleInputFilterGraph;
        reason = "single video with overlays/effects expressible as a filter graph".to_string();
    } else {
        strategy = Strategy::FrameRendering;
        reason = "overlapping clips, transitions, or effects not expressible as filters".to_string();
    }

    // Probe failure downgrades the chosen strategy one step (§4.1 Failure modes).
    if probe_failed {
        if let Some(downgraded) = strategy.downgrade() {
            strategy = downgraded;
            reason = format!("{reason}; downgraded one step after a probe failure");
        }
    }

    ExportAnalysis {
        strategy,
        can_use_direct_copy,
        reason,
        video_element_count,
        has_overlapping_videos,
        has_text_elements,
        has_stickers,
        has_image_elements,
        has_effects,
        all_videos_have_local_path,
        video_sources,
    }
}

fn has_overlap(elements: &[&crate::timeline::Element]) -> bool {
    let mut sorted: Vec<_> = elements.to_vec();
    sorted.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap());
    sorted
        .windows(2)
        .any(|pair| pair[1].start_time < pair[0].end_time())
}

fn all_match_target(items: &[&MediaItem], settings: &ExportSettings) -> bool {
    if items.is_empty() {
        return true;
    }
    let (codec, pix_fmt) = match items.first() {
        Some(first) => (first.codec.clone(), first.pixel_format.clone()),
        None => return true,
    };

    items.iter().all(|m| {
        m.width == Some(settings.width)
            && m.height == Some(settings.height)
            && m.fps.map(|fps| (fps - settings.fps as f64).abs() < 0.01).unwrap_or(false)
            && m.codec == codec
            && m.pixel_format == pix_fmt
    })
}

fn expressible_as_filters(_has_effects: bool, _elements: &[&crate::timeline::Element]) -> bool {
    // All six supported effect kinds (§4.7) and every overlay primitive have a
    // direct filter expression; nothing in the current vocabulary forces a
    // Mode D downgrade at the single-clip case.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Element, ElementKind, MediaKind, Track, TrackKind, Transform};
    use std::path::PathBuf;

    fn settings() -> ExportSettings {
        ExportSettings {
            width: 1920,
            height: 1080,
            fps: 30,
            output_path: "out.mp4".into(),
            quality: crate::config::Quality::High,
        }
    }

    fn matching_item(id: &str) -> MediaItem {
        MediaItem {
            id: id.into(),
            kind: MediaKind::Video,
            path: PathBuf::from(format!("/tmp/{id}.mp4")),
            width: Some(1920),
            height: Some(1080),
            fps: Some(30.0),
            duration: 5.0,
            codec: Some("h264".into()),
            pixel_format: Some("yuv420p".into()),
            audio_sample_rate: Some(48000),
            audio_channels: Some(2),
        }
    }

    fn media_element(id: &str, start: f64, duration: f64, media_id: &str) -> Element {
        Element {
            id: id.into(),
            start_time: start,
            duration,
            kind: ElementKind::Media {
                media_id: media_id.into(),
                trim_start: 0.0,
                trim_end: 0.0,
                transform: Transform::default(),
                effects: None,
            },
        }
    }

    fn single_track_timeline(elements: Vec<Element>) -> Timeline {
        Timeline {
            tracks: vec![Track {
                id: "t1".into(),
                kind: TrackKind::Media,
                index: 0,
                elements,
            }],
        }
    }

    #[test]
    fn scenario_matching_clips_choose_direct_copy() {
        let mut media = MediaIndex::new();
        media.insert(matching_item("a"));
        media.insert(matching_item("b"));

        let timeline = single_track_timeline(vec![
            media_element("e1", 0.0, 5.0, "a"),
            media_element("e2", 5.0, 5.0, "b"),
        ]);

        let analysis = analyze(&timeline, &media, &settings(), |id| media.get(id));
        assert_eq!(analysis.strategy, Strategy::DirectCopy);
        assert!(analysis.can_use_direct_copy);
    }

    #[test]
    fn scenario_mismatched_geometry_chooses_normalization() {
        let mut media = MediaIndex::new();
        media.insert(matching_item("a"));
        let mut mismatched = matching_item("b");
        mismatched.width = Some(1280);
        mismatched.height = Some(720);
        media.insert(mismatched);

        let timeline = single_track_timeline(vec![
            media_element("e1", 0.0, 5.0, "a"),
            media_element("e2", 5.0, 5.0, "b"),
        ]);

        let analysis = analyze(&timeline, &media, &settings(), |id| media.get(id));
        assert_eq!(analysis.strategy, Strategy::Normalization);
        assert!(!analysis.can_use_direct_copy);
    }

    #[test]
    fn scenario_single_clip_with_text_overlay_chooses_filter_graph() {
        let mut media = MediaIndex::new();
        media.insert(matching_item("a"));

        let text = Element {
            id: "t1".into(),
            start_time: 0.0,
            duration: 5.0,
            kind: ElementKind::Text {
                content: "hello".into(),
                style: crate::timeline::TextStyle {
                    font_family: "Arial".into(),
                    font_size: 32.0,
                    font_weight: crate::timeline::FontWeight::Normal,
                    italic: false,
                    color: "#ffffff".into(),
                    background_color: None,
                    align: crate::timeline::TextAlign::Center,
                },
                x: 0.5,
                y: 0.5,
                rotation_degrees: 0.0,
                opacity: 1.0,
            },
        };

        let timeline = single_track_timeline(vec![media_element("e1", 0.0, 5.0, "a"), text]);
        let analysis = analyze(&timeline, &media, &settings(), |id| media.get(id));
        assert_eq!(analysis.strategy, Strategy::SingleInputFilterGraph);
    }

    #[test]
    fn scenario_overlapping_clips_choose_frame_rendering() {
        let mut media = MediaIndex::new();
        media.insert(matching_item("a"));
        media.insert(matching_item("b"));

        let timeline = single_track_timeline(vec![
            media_element("e1", 0.0, 5.0, "a"),
            media_element("e2", 3.0, 5.0, "b"),
        ]);

        let analysis = analyze(&timeline, &media, &settings(), |id| media.get(id));
        assert_eq!(analysis.strategy, Strategy::FrameRendering);
        assert!(analysis.has_overlapping_videos);
    }

    #[test]
    fn scenario_probe_failure_downgrades_one_step() {
        let media = MediaIndex::new();
        let timeline = single_track_timeline(vec![media_element("e1", 0.0, 5.0, "missing")]);

        let analysis = analyze(&timeline, &media, &settings(), |_| None);
        // video_element_count == 1 would otherwise land on SingleInputFilterGraph,
        // but the probe failure downgrades it one step to FrameRendering.
        assert_eq!(analysis.strategy, Strategy::FrameRendering);
    }

    #[test]
    fn strategy_ordering_is_monotonic() {
        assert!(Strategy::DirectCopy < Strategy::Normalization);
        assert!(Strategy::Normalization < Strategy::SingleInputFilterGraph);
        assert!(Strategy::SingleInputFilterGraph < Strategy::FrameRendering);
    }

    #[test]
    fn analysis_is_deterministic() {
        let mut media = MediaIndex::new();
        media.insert(matching_item("a"));
        let timeline = single_track_timeline(vec![media_element("e1", 0.0, 5.0, "a")]);

        let first = analyze(&timeline, &media, &settings(), |id| media.get(id));
        let second = analyze(&timeline, &media, &settings(), |id| media.get(id));
        assert_eq!(first.strategy, second.strategy);
        assert_eq!(first.reason, second.reason);
    }
}
