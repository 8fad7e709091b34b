//! Strategy dispatcher (§4.2): owns the session, attempts the analyzed
//! strategy, and falls through to successively more expensive strategies on
//! failure. Mode D has no fallback — its failure is terminal.

use std::time::Duration;

use tracing::{info, warn};

use crate::analyzer::{self, Strategy};
use crate::audio::AudioElement;
use crate::config::Config;
use crate::config::ExportSettings;
use crate::error::{DispatchError, ExportError, Result};
use crate::ffmpeg::{probe_media, FfmpegDriver};
use crate::modes::mode_d::FrameSource;
use crate::modes::{mode_a, mode_b, mode_c, mode_d};
use crate::outcome::Outcome;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::session::Session;
use crate::timeline::{self, ElementKind, MediaIndex, Timeline};

pub struct ExportRequest<'a> {
    pub timeline: &'a Timeline,
    pub media: &'a MediaIndex,
    pub settings: &'a ExportSettings,
    pub config: &'a Config,
    pub frame_source: Option<&'a dyn FrameSource>,
    pub font_resolver: &'a dyn Fn(&str) -> Option<String>,
    pub progress: &'a dyn ProgressSink,
    pub cancel: CancelToken,
}

fn timeout_for(config: &Config, strategy: Strategy) -> Option<Duration> {
    match strategy {
        Strategy::DirectCopy => Some(Duration::from_secs(config.timeouts.mode_a_secs)),
        Strategy::Normalization => Some(Duration::from_secs(config.timeouts.mode_b_secs)),
        Strategy::SingleInputFilterGraph => Some(Duration::from_secs(config.timeouts.mode_c_secs)),
        Strategy::FrameRendering => config.timeouts.mode_d_secs.map(Duration::from_secs),
    }
}

/// Collects every audio-bearing input for a timeline: each media (video)
/// element's own audio stream — the data model carries no mute flag, so every
/// video element's audio rides along — followed by independent audio-track
/// elements.
fn collect_audio_elements(timeline: &Timeline, media: &MediaIndex) -> Vec<AudioElement> {
    let mut out = Vec::new();

    for element in timeline.media_elements() {
        if let ElementKind::Media {
            media_id,
            trim_start,
            trim_end,
            ..
        } = &element.kind
        {
            if let Some(item) = media.get(media_id) {
                out.push(AudioElement {
                    file: item.path.clone(),
                    start_time: element.start_time,
                    trim_start: *trim_start,
                    trim_end: *trim_end,
                    duration: element.duration,
                    volume: 1.0,
                    fade_in: 0.0,
                    fade_out: 0.0,
                });
            }
        }
    }

    for element in timeline.audio_elements() {
        if let ElementKind::Audio {
            media_id,
            trim_start,
            trim_end,
            volume,
            fade_in,
            fade_out,
        } = &element.kind
        {
            if let Some(item) = media.get(media_id) {
                out.push(AudioElement {
                    file: item.path.clone(),
                    start_time: element.start_time,
                    trim_start: *trim_start,
                    trim_end: *trim_end,
                    duration: element.duration,
                    volume: *volume,
                    fade_in: *fade_in,
                    fade_out: *fade_out,
                });
            }
        }
    }
    out
}

/// Fills in codec/fps/geometry metadata the media index lacks by shelling out
/// to `ffprobe` (§6), returning a clone of `media` with probed items merged
/// in. Items that fail to probe are left as-is; the analyzer's own
/// probe-failure downgrade handles a still-incomplete item downstream.
async fn enrich_media_index(media: &MediaIndex, driver: &FfmpegDriver) -> MediaIndex {
    let mut enriched = media.clone();
    let incomplete_ids: Vec<String> = media
        .0
        .values()
        .filter(|item| item.is_video() && !item.has_full_video_metadata())
        .map(|item| item.id.clone())
        .collect();

    for id in incomplete_ids {
        let Some(item) = enriched.get(&id).cloned() else {
            continue;
        };
        let ffprobe_binary = driver.ffprobe_binary().to_string();
        let path = item.path.clone();
        let probed = tokio::task::spawn_blocking(move || probe_media(&ffprobe_binary, &path)).await;

        match probed {
            Ok(Ok(probe)) => {
                let mut updated = item;
                updated.width = Some(probe.width);
                updated.height = Some(probe.height);
                updated.fps = Some(probe.fps);
                updated.codec = Some(probe.codec);
                updated.pixel_format = Some(probe.pixel_format);
                if updated.duration <= 0.0 {
                    updated.duration = probe.duration;
                }
                enriched.insert(updated);
            }
            Ok(Err(e)) => warn!(media_id = %id, error = %e, "ffprobe failed to fill missing metadata"),
            Err(e) => warn!(media_id = %id, error = %e, "ffprobe task panicked"),
        }
    }

    enriched
}

/// Runs the full export pipeline: analyze, then attempt strategies in order
/// until one succeeds, the caller cancels, a per-mode timeout elapses, or
/// Mode D itself fails (terminal).
pub async fn dispatch(request: ExportRequest<'_>) -> Result<Outcome> {
    // Every structural invariant (§3) must be checked before any subprocess
    // is spawned (§7 failure kind 1).
    timeline::validate(request.timeline, request.media)?;

    let driver = FfmpegDriver::new(&request.config.ffmpeg);
    let enriched_media = enrich_media_index(request.media, &driver).await;
    let analysis = analyzer::analyze(request.timeline, &enriched_media, request.settings, |id| {
        enriched_media.get(id)
    });

    info!(strategy = ?analysis.strategy, reason = %analysis.reason, "export analyzed");

    let session = Session::open(request.config.session.keep_on_error)?;
    let mut strategy = analysis.strategy;
    let audio_elements = collect_audio_elements(request.timeline, request.media);

    let result = loop {
        if request.cancel.is_cancelled() {
            break Ok(Outcome::Cancelled);
        }

        request.progress.report(ProgressEvent {
            percent: 0.0,
            message: format!("starting {strategy:?}"),
        });

        let attempt = run_with_timeout(
            strategy,
            &request,
            &analysis,
            &audio_elements,
            &session,
            &driver,
        )
        .await;

        match attempt {
            Ok(Some(output_path)) => {
                // A cancellation fired mid-encode still lets `driver.run`
                // return `Ok(())` after terminating the child, so the mode
                // reports a (truncated) output path; re-check the token
                // before trusting that as a genuine success.
                if request.cancel.is_cancelled() {
                    break Ok(Outcome::Cancelled);
                }
                break Ok(Outcome::Success {
                    output_path: output_path.display().to_string(),
                    strategy,
                });
            }
            Ok(None) => break Ok(Outcome::Cancelled),
            Err(AttemptError::TimedOut) => break Ok(Outcome::TimedOut { mode: strategy }),
            Err(AttemptError::Failed(e)) => {
                let Some(next) = strategy.downgrade() else {
                    break Err(DispatchError::AllStrategiesFailed {
                        mode: strategy,
                        reason: e.to_string(),
                    }
                    .into());
                };
                warn!(from = ?strategy, to = ?next, error = %e, "downgrading strategy after failure");
                strategy = next;
            }
        }
    };

    let succeeded = matches!(result, Ok(Outcome::Success { .. }));
    session.close(succeeded)?;
    result
}

enum AttemptError {
    TimedOut,
    Failed(ExportError),
}

async fn run_with_timeout(
    strategy: Strategy,
    request: &ExportRequest<'_>,
    analysis: &analyzer::ExportAnalysis,
    audio_elements: &[AudioElement],
    session: &Session,
    driver: &FfmpegDriver,
) -> std::result::Result<Option<std::path::PathBuf>, AttemptError> {
    let body = run_strategy(strategy, request, analysis, audio_elements, session, driver);

    match timeout_for(request.config, strategy) {
        Some(duration) => match tokio::time::timeout(duration, body).await {
            Ok(Ok(path)) => Ok(path),
            Ok(Err(e)) => Err(AttemptError::Failed(e)),
            Err(_) => Err(AttemptError::TimedOut),
        },
        None => body.await.map_err(AttemptError::Failed),
    }
}

async fn run_strategy(
    strategy: Strategy,
    request: &ExportRequest<'_>,
    analysis: &analyzer::ExportAnalysis,
    audio_elements: &[AudioElement],
    session: &Session,
    driver: &FfmpegDriver,
) -> Result<Option<std::path::PathBuf>> {
    match strategy {
        Strategy::DirectCopy => mode_a::run(
            &analysis.video_sources,
            request.media,
            request.settings,
            session,
            driver,
            request.cancel.clone(),
            request.progress,
        )
        .await
        .map(Some),
        Strategy::Normalization => {
            let elements: Vec<_> = request.timeline.media_elements().cloned().collect();
            mode_b::run(
                elements,
                request.media.clone(),
                request.settings.clone(),
                session.frames_dir(),
                session.concat_list_path(),
                session.output_dir().join(&request.settings.output_path),
                driver.ffmpeg_binary().to_string(),
                driver.clone(),
                request.cancel.clone(),
                Box::new(NoopSink),
            )
            .await
            .map(Some)
        }
        Strategy::SingleInputFilterGraph => {
            let Some(base) = request.timeline.media_elements().next() else {
                return Err(DispatchError::InvalidBaseElement {
                    reason: "the timeline has no media element".to_string(),
                }
                .into());
            };
            let base = base.clone();
            let overlays: Vec<_> = request.timeline.overlay_elements().cloned().collect();
            mode_c::run(
                &base,
                &overlays,
                audio_elements,
                request.media,
                request.settings,
                request.font_resolver,
                session,
                driver,
                request.cancel.clone(),
                request.progress,
            )
            .await
            .map(Some)
        }
        Strategy::FrameRendering => {
            let Some(frame_source) = request.frame_source else {
                return Err(crate::error::DispatchError::FrameSourceFailed {
                    time: 0.0,
                    reason: "no frame source supplied for Mode D".to_string(),
                }
                .into());
            };
            let per_frame_effects = request
                .timeline
                .media_elements()
                .find_map(|e| e.effects())
                .filter(|b| !b.is_empty());
            let total_duration = request.timeline.total_duration();
            mode_d::run(
                total_duration,
                request.settings,
                frame_source,
                per_frame_effects,
                audio_elements,
                session,
                driver,
                request.cancel.clone(),
                request.progress,
            )
            .await
            .map(Some)
        }
    }
}

struct NoopSink;
impl ProgressSink for NoopSink {
    fn report(&self, _event: ProgressEvent) {}
}
