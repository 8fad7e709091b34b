use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A media item's coarse kind. Video/image elements require `Video`/`Image`;
/// audio tracks accept either `Audio` or `Video` (§3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

/// A stable handle to a file on disk, identified by an id that is unique for
/// the project's lifetime. The export pipeline only ever borrows these —
/// it never mutates or owns the underlying file (§3 Lifecycles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub path: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Intrinsic frame rate, videos only.
    pub fps: Option<f64>,
    pub duration: f64,
    /// Codec tag (e.g. "h264"), videos only. `None` means not yet probed.
    pub codec: Option<String>,
    pub pixel_format: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u16>,
}

impl MediaItem {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// Whether this item's codec/pixel-format/geometry/fps have all been probed.
    pub fn has_full_video_metadata(&self) -> bool {
        self.kind == MediaKind::Video
            && self.codec.is_some()
            && self.pixel_format.is_some()
            && self.width.is_some()
            && self.height.is_some()
            && self.fps.is_some()
    }
}

/// `id -> MediaItem` lookup table. Read-only during export (§5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaIndex(pub HashMap<String, MediaItem>);

impl MediaIndex {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, item: MediaItem) {
        self.0.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&MediaItem> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<MediaItem> for MediaIndex {
    fn from_iter<I: IntoIterator<Item = MediaItem>>(iter: I) -> Self {
        let mut index = Self::new();
        for item in iter {
            index.insert(item);
        }
        index
    }
}
