use serde::{Deserialize, Serialize};

/// One entry in an effect binding. The six-parameter vocabulary from §4.7,
/// as a closed enum rather than a string-keyed map (REDESIGN FLAGS, §9) —
/// this makes the filter compiler's match exhaustive at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EffectParam {
    /// b ∈ [-100, 100]
    Brightness(f32),
    /// c ∈ [-100, 100]
    Contrast(f32),
    /// s ∈ [-100, 200]
    Saturation(f32),
    /// h ∈ [0, 360]
    Hue(f32),
    /// r ∈ [0, 20]
    Blur(f32),
    /// g ∈ [0, 100]
    Grayscale(f32),
}

/// An ordered set of effects bound to one element. Order is the composition
/// order (earliest-applied first) — the element's stored list order, never a
/// map's iteration order (Open Question #3, §9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectBinding {
    pub id: String,
    pub params: Vec<EffectParam>,
}

impl EffectBinding {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Position/size/rotation/opacity shared by media, sticker, and text elements.
/// `x`, `y`, `width`, `height` are fractions of the canvas (0.0–1.0).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation_degrees: f32,
    pub opacity: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            rotation_degrees: 0.0,
            opacity: 1.0,
        }
    }
}

/// Text styling shared by text and caption elements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub italic: bool,
    pub color: String,
    pub background_color: Option<String>,
    pub align: TextAlign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Discriminated element payload. Each variant carries exactly the fields
/// spec.md §3 lists for that kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementKind {
    Media {
        media_id: String,
        trim_start: f64,
        trim_end: f64,
        transform: Transform,
        effects: Option<EffectBinding>,
    },
    Text {
        content: String,
        style: TextStyle,
        x: f32,
        y: f32,
        rotation_degrees: f32,
        opacity: f32,
    },
    Sticker {
        media_id: String,
        trim_start: f64,
        trim_end: f64,
        transform: Transform,
        effects: Option<EffectBinding>,
    },
    Audio {
        media_id: String,
        trim_start: f64,
        trim_end: f64,
        volume: f32,
        fade_in: f64,
        fade_out: f64,
    },
    Caption {
        text: String,
        end_time: f64,
    },
}

/// A single timed occupant of a track. `start_time`/`duration` are in
/// timeline seconds; `kind` carries the element-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub start_time: f64,
    pub duration: f64,
    pub kind: ElementKind,
}

impl Element {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    pub fn media_id(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Media { media_id, .. }
            | ElementKind::Sticker { media_id, .. }
            | ElementKind::Audio { media_id, .. } => Some(media_id),
            ElementKind::Text { .. } | ElementKind::Caption { .. } => None,
        }
    }

    pub fn effects(&self) -> Option<&EffectBinding> {
        match &self.kind {
            ElementKind::Media { effects, .. } | ElementKind::Sticker { effects, .. } => {
                effects.as_ref()
            }
            _ => None,
        }
    }

    pub fn has_enabled_effects(&self) -> bool {
        self.effects().map(|e| !e.is_empty()).unwrap_or(false)
    }

    pub fn is_media(&self) -> bool {
        matches!(self.kind, ElementKind::Media { .. })
    }

    pub fn is_overlay(&self) -> bool {
        matches!(
            self.kind,
            ElementKind::Text { .. } | ElementKind::Sticker { .. } | ElementKind::Caption { .. }
        )
    }

    pub fn trim_start(&self) -> f64 {
        match &self.kind {
            ElementKind::Media { trim_start, .. }
            | ElementKind::Sticker { trim_start, .. }
            | ElementKind::Audio { trim_start, .. } => *trim_start,
            _ => 0.0,
        }
    }

    pub fn trim_end(&self) -> f64 {
        match &self.kind {
            ElementKind::Media { trim_end, .. }
            | ElementKind::Sticker { trim_end, .. }
            | ElementKind::Audio { trim_end, .. } => *trim_end,
            _ => 0.0,
        }
    }

    pub fn is_trimmed(&self) -> bool {
        self.trim_start() != 0.0 || self.trim_end() != 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Media,
    Text,
    Audio,
    Sticker,
    Caption,
}

/// An ordered sequence of elements. `index` orders media tracks front-to-back
/// (lower = further from camera); audio tracks ignore it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    pub index: i32,
    pub elements: Vec<Element>,
}

impl Track {
    pub fn is_audio(&self) -> bool {
        self.kind == TrackKind::Audio
    }
}

/// The full edit: an ordered sequence of tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    pub tracks: Vec<Track>,
}

impl Timeline {
    pub fn new() -> Self {
        Self { tracks: Vec::new() }
    }

    pub fn media_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| !t.is_audio())
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_audio())
    }

    pub fn media_elements(&self) -> impl Iterator<Item = &Element> {
        self.media_tracks()
            .flat_map(|t| t.elements.iter())
            .filter(|e| e.is_media())
    }

    pub fn overlay_elements(&self) -> impl Iterator<Item = &Element> {
        self.media_tracks()
            .flat_map(|t| t.elements.iter())
            .filter(|e| e.is_overlay())
    }

    /// Independent audio elements (audio tracks), not including video-carried audio.
    pub fn audio_elements(&self) -> impl Iterator<Item = &Element> {
        self.audio_tracks().flat_map(|t| t.elements.iter())
    }

    /// End time of the last element across all tracks.
    pub fn total_duration(&self) -> f64 {
        self.tracks
            .iter()
            .flat_map(|t| t.elements.iter())
            .map(|e| e.end_time())
            .fold(0.0, f64::max)
    }
}
