//! Subprocess driver for `ffmpeg`/`ffprobe`. Argv-only invocation, never a
//! shell string and never the `ffmpeg-next` bindings crate (§4.9).

pub mod driver;
pub mod probe;

pub use driver::FfmpegDriver;
pub use probe::probe_media;
