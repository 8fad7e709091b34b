use crate::error::{Result, TimelineError};
use crate::timeline::media::{MediaIndex, MediaKind};
use crate::timeline::model::{ElementKind, Timeline};

/// Runs every structural invariant from §3 before any subprocess is spawned.
/// Pure: takes only the timeline and the media index, no I/O.
pub fn validate(timeline: &Timeline, media: &MediaIndex) -> Result<()> {
    check_media_references(timeline, media)?;
    check_trims(timeline, media)?;
    check_same_track_overlap(timeline)?;
    Ok(())
}

fn check_media_references(timeline: &Timeline, media: &MediaIndex) -> Result<()> {
    for track in &timeline.tracks {
        for element in &track.elements {
            let Some(media_id) = element.media_id() else {
                continue;
            };
            let Some(item) = media.get(media_id) else {
                return Err(TimelineError::DanglingMediaReference {
                    element_id: element.id.clone(),
                    media_id: media_id.to_string(),
                }
                .into());
            };

            let expected = match &element.kind {
                ElementKind::Media { .. } => vec![MediaKind::Video, MediaKind::Image],
                ElementKind::Sticker { .. } => vec![MediaKind::Image, MediaKind::Video],
                ElementKind::Audio { .. } => vec![MediaKind::Audio, MediaKind::Video],
                ElementKind::Text { .. } | ElementKind::Caption { .. } => continue,
            };

            if !expected.contains(&item.kind) {
                return Err(TimelineError::IncompatibleMediaKind {
                    element_id: element.id.clone(),
                    media_id: media_id.to_string(),
                    actual: item.kind,
                    expected,
                }
                .into());
            }
        }
    }
    Ok(())
}

fn check_trims(timeline: &Timeline, media: &MediaIndex) -> Result<()> {
    for track in &timeline.tracks {
        for element in &track.elements {
            if !element.is_trimmed() {
                continue;
            }
            let Some(media_id) = element.media_id() else {
                continue;
            };
            let Some(item) = media.get(media_id) else {
                continue;
            };
            if element.trim_end() > item.duration {
                return Err(TimelineError::TrimExceedsSource {
                    element_id: element.id.clone(),
                    trim_end_time: element.trim_end(),
                    source_duration: item.duration,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Two elements on the same track must not occupy overlapping time ranges.
/// Different tracks are permitted to overlap freely (that's what tracks are for).
fn check_same_track_overlap(timeline: &Timeline) -> Result<()> {
    for track in &timeline.tracks {
        let mut sorted: Vec<_> = track.elements.iter().collect();
        sorted.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap());

        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if b.start_time < a.end_time() {
                return Err(TimelineError::SameTrackOverlap {
                    track_index: track.index,
                    a: a.id.clone(),
                    b: b.id.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::media::MediaItem;
    use crate::timeline::model::{Element, Track, TrackKind, Transform};
    use std::path::PathBuf;

    fn video_item(id: &str, duration: f64) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            kind: MediaKind::Video,
            path: PathBuf::from(format!("/tmp/{id}.mp4")),
            width: Some(1920),
            height: Some(1080),
            fps: Some(30.0),
            duration,
            codec: Some("h264".to_string()),
            pixel_format: Some("yuv420p".to_string()),
            audio_sample_rate: Some(48000),
            audio_channels: Some(2),
        }
    }

    fn media_element(id: &str, start: f64, duration: f64, media_id: &str) -> Element {
        Element {
            id: id.to_string(),
            start_time: start,
            duration,
            kind: ElementKind::Media {
                media_id: media_id.to_string(),
                trim_start: 0.0,
                trim_end: 0.0,
                transform: Transform::default(),
                effects: None,
            },
        }
    }

    #[test]
    fn accepts_well_formed_timeline() {
        let mut media = MediaIndex::new();
        media.insert(video_item("clip-1", 10.0));

        let timeline = Timeline {
            tracks: vec![Track {
                id: "t1".into(),
                kind: TrackKind::Media,
                index: 0,
                elements: vec![media_element("e1", 0.0, 5.0, "clip-1")],
            }],
        };

        assert!(validate(&timeline, &media).is_ok());
    }

    #[test]
    fn rejects_dangling_media_reference() {
        let media = MediaIndex::new();
        let timeline = Timeline {
            tracks: vec![Track {
                id: "t1".into(),
                kind: TrackKind::Media,
                index: 0,
                elements: vec![media_element("e1", 0.0, 5.0, "missing")],
            }],
        };

        let err = validate(&timeline, &media).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportError::Timeline(TimelineError::DanglingMediaReference { .. })
        ));
    }

    #[test]
    fn rejects_same_track_overlap() {
        let mut media = MediaIndex::new();
        media.insert(video_item("clip-1", 10.0));

        let timeline = Timeline {
            tracks: vec![Track {
                id: "t1".into(),
                kind: TrackKind::Media,
                index: 0,
                elements: vec![
                    media_element("e1", 0.0, 5.0, "clip-1"),
                    media_element("e2", 3.0, 5.0, "clip-1"),
                ],
            }],
        };

        let err = validate(&timeline, &media).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportError::Timeline(TimelineError::SameTrackOverlap { .. })
        ));
    }

    #[test]
    fn allows_overlap_across_tracks() {
        let mut media = MediaIndex::new();
        media.insert(video_item("clip-1", 10.0));
        media.insert(video_item("clip-2", 10.0));

        let timeline = Timeline {
            tracks: vec![
                Track {
                    id: "t1".into(),
                    kind: TrackKind::Media,
                    index: 0,
                    elements: vec![media_element("e1", 0.0, 5.0, "clip-1")],
                },
                Track {
                    id: "t2".into(),
                    kind: TrackKind::Media,
                    index: 1,
                    elements: vec![media_element("e2", 2.0, 5.0, "clip-2")],
                },
            ],
        };

        assert!(validate(&timeline, &media).is_ok());
    }

    #[test]
    fn rejects_trim_exceeding_source_duration() {
        let mut media = MediaIndex::new();
        media.insert(video_item("clip-1", 3.0));

        let element = Element {
            id: "e1".into(),
            start_time: 0.0,
            duration: 5.0,
            kind: ElementKind::Media {
                media_id: "clip-1".into(),
                trim_start: 0.0,
                trim_end: 4.0,
                transform: Transform::default(),
                effects: None,
            },
        };

        let timeline = Timeline {
            tracks: vec![Track {
                id: "t1".into(),
                kind: TrackKind::Media,
                index: 0,
                elements: vec![element],
            }],
        };

        let err = validate(&timeline, &media).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportError::Timeline(TimelineError::TrimExceedsSource { .. })
        ));
    }
}
