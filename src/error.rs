use thiserror::Error;

/// Top-level error type for the export core.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("invalid timeline: {0}")]
    Timeline(#[from] TimelineError),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    #[error("effects compiler error: {0}")]
    Effect(#[from] EffectError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results using [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Whether a caller could plausibly retry this export unmodified.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Ffmpeg(FfmpegError::SpawnFailed { .. })
        )
    }

    /// Category string used for the "Failed: <category>: <summary>" user message (§7).
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeline(_) => "invalid timeline",
            Self::Analyzer(_) => "analysis failed",
            Self::Session(_) => "session error",
            Self::Ffmpeg(_) => "encoder error",
            Self::Effect(_) => "effects error",
            Self::Dispatch(_) => "export failed",
            Self::Io(_) => "I/O error",
        }
    }

    pub fn user_message(&self) -> String {
        format!("Export failed: {}: {}", self.category(), self)
    }
}

/// Timeline invariant violations (§7 failure kind 1 — non-retriable).
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("element '{element_id}' references unknown media item '{media_id}'")]
    DanglingMediaReference { element_id: String, media_id: String },

    #[error("element '{element_id}' references media '{media_id}' of kind {actual:?}, expected one of {expected:?}")]
    IncompatibleMediaKind {
        element_id: String,
        media_id: String,
        actual: crate::timeline::media::MediaKind,
        expected: Vec<crate::timeline::media::MediaKind>,
    },

    #[error("element '{element_id}' trim window exceeds source duration ({trim_end_time} > {source_duration})")]
    TrimExceedsSource {
        element_id: String,
        trim_end_time: f64,
        source_duration: f64,
    },

    #[error("elements '{a}' and '{b}' overlap on track {track_index} (same-track overlap is forbidden)")]
    SameTrackOverlap { track_index: i32, a: String, b: String },

    #[error("duplicate media item id '{0}'")]
    DuplicateMediaId(String),
}

/// Analyzer-level errors. The analyzer is documented as never "impossible" (§4.1);
/// this enum exists for the probe-failure downgrade path and is rarely surfaced.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("failed to probe media item '{0}': {1}")]
    ProbeFailed(String, String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to create session directory: {0}")]
    CreateFailed(std::io::Error),

    #[error("failed to clean up session directory {path}: {source}")]
    CleanupFailed { path: String, source: std::io::Error },
}

#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("ffmpeg binary not found (checked {checked})")]
    BinaryNotFound { checked: String },

    #[error("failed to spawn ffmpeg: {0}")]
    SpawnFailed(String),

    #[error("ffmpeg exited with status {status}: {stderr_tail}")]
    NonZeroExit { status: i32, stderr_tail: String },

    #[error("ffmpeg stdin write failed (broken pipe, process likely crashed): {stderr_tail}")]
    BrokenPipe { stderr_tail: String },

    #[error("filter graph failed validation probe: {0}")]
    FilterGraphInvalid(String),
}

#[derive(Error, Debug)]
pub enum EffectError {
    #[error("effect parameter out of range: {param} = {value} (expected {range})")]
    OutOfRange { param: &'static str, value: f32, range: &'static str },
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("frame source rejected frame at t={time}: {reason}")]
    FrameSourceFailed { time: f64, reason: String },

    #[error("all strategies exhausted; final mode {mode:?} failed: {reason}")]
    AllStrategiesFailed { mode: crate::analyzer::Strategy, reason: String },

    #[error("single-input filter-graph strategy requires a media element but {reason}")]
    InvalidBaseElement { reason: String },
}
