//! Timeline data model: tracks, elements, media references, and the
//! structural invariants checked before any export strategy runs.

pub mod media;
pub mod model;
pub mod validate;

pub use media::{MediaIndex, MediaItem, MediaKind};
pub use model::{
    Element, ElementKind, EffectBinding, EffectParam, FontWeight, TextAlign, TextStyle, Timeline,
    Track, TrackKind, Transform,
};
pub use validate::validate;
