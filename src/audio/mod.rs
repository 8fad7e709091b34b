//! Audio mixing: per-element filter chains and the combining `amix` graph (§4.8).

pub mod mixer;

pub use mixer::{AudioElement, AudioMixer};
