use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::task;
use tracing::{debug, info, warn};

use crate::config::FfmpegConfig;
use crate::error::{ExportError, FfmpegError, Result};
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};

const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(5);

/// Owns the `ffmpeg`/`ffprobe` binary paths and knows how to run one
/// argv-vector invocation to completion, with progress and cancellation.
#[derive(Clone)]
pub struct FfmpegDriver {
    ffmpeg_binary: String,
    ffprobe_binary: String,
}

impl FfmpegDriver {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg_binary: config.ffmpeg_binary().to_string(),
            ffprobe_binary: config.ffprobe_binary().to_string(),
        }
    }

    pub fn check_available(&self) -> bool {
        Command::new(&self.ffmpeg_binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    pub fn ffprobe_binary(&self) -> &str {
        &self.ffprobe_binary
    }

    pub fn ffmpeg_binary(&self) -> &str {
        &self.ffmpeg_binary
    }

    /// Runs one ffmpeg invocation to completion, streaming stderr through
    /// `progress` and honoring `cancel`. Always appends `-y` and `-nostdin`.
    pub async fn run(
        &self,
        args: Vec<String>,
        cancel: CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        if !self.check_available() {
            return Err(FfmpegError::BinaryNotFound {
                checked: self.ffmpeg_binary.clone(),
            }
            .into());
        }

        let binary = self.ffmpeg_binary.clone();
        let mut full_args = args;
        full_args.push("-y".to_string());
        full_args.push("-nostdin".to_string());

        debug!(?full_args, "spawning ffmpeg");

        let mut cmd = Command::new(&binary);
        cmd.args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = task::spawn_blocking(move || cmd.spawn())
            .await
            .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?
            .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?;

        let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
        let stderr = child.stderr.take().expect("stderr was piped");
        std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(std::result::Result::ok) {
                let _ = line_tx.send(line);
            }
        });

        let mut stderr_tail: Vec<String> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child);
                    return Ok(());
                }
                line = tokio::task::spawn_blocking({
                    let rx = line_rx.clone();
                    move || rx.recv_timeout(Duration::from_millis(200))
                }) => {
                    match line {
                        Ok(Ok(line)) => {
                            if let Some(event) = parse_progress(&line) {
                                progress.report(event);
                            }
                            push_tail(&mut stderr_tail, line);
                        }
                        Ok(Err(_)) => {
                            // recv timeout; check whether the child has exited.
                            if let Some(status) = child.try_wait().map_err(|e| {
                                ExportError::Io(e)
                            })? {
                                drain_remaining(&line_rx, &mut stderr_tail);
                                return finish(status, stderr_tail);
                            }
                        }
                        Err(_) => {}
                    }
                }
            }
        }
    }

    /// Spawns `-f lavfi -i testsrc2=0.1 -vf <chain> -f null -` to verify a
    /// filter chain parses before committing to the real invocation (§4.9).
    pub async fn validate_filter_chain(&self, chain: &str) -> Result<()> {
        if chain.is_empty() {
            return Ok(());
        }

        let binary = self.ffmpeg_binary.clone();
        let chain = chain.to_string();
        let output = task::spawn_blocking(move || {
            Command::new(&binary)
                .args([
                    "-f",
                    "lavfi",
                    "-i",
                    "testsrc2=duration=0.1",
                    "-vf",
                    &chain,
                    "-f",
                    "null",
                    "-",
                ])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
        })
        .await
        .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?
        .map_err(|e| FfmpegError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(FfmpegError::FilterGraphInvalid(stderr).into());
        }
        Ok(())
    }
}

fn finish(status: std::process::ExitStatus, stderr_tail: Vec<String>) -> Result<()> {
    if status.success() {
        info!("ffmpeg finished successfully");
        Ok(())
    } else {
        Err(FfmpegError::NonZeroExit {
            status: status.code().unwrap_or(-1),
            stderr_tail: stderr_tail.join("\n"),
        }
        .into())
    }
}

fn push_tail(tail: &mut Vec<String>, line: String) {
    const MAX_LINES: usize = 50;
    tail.push(line);
    if tail.len() > MAX_LINES {
        tail.remove(0);
    }
}

fn drain_remaining(rx: &crossbeam_channel::Receiver<String>, tail: &mut Vec<String>) {
    while let Ok(line) = rx.try_recv() {
        push_tail(tail, line);
    }
}

/// SIGTERM-then-SIGKILL is the documented contract (§4.9); `std::process::Child`
/// only exposes a single unconditional kill primitive (SIGKILL on Unix,
/// TerminateProcess on Windows), so graceful shutdown here is best-effort: we
/// wait briefly for a voluntary exit before forcing it.
fn terminate(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => warn!("error checking child status during cancellation: {e}"),
    }

    let deadline = std::time::Instant::now() + GRACEFUL_SHUTDOWN;
    while std::time::Instant::now() < deadline {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    if let Err(e) = child.kill() {
        warn!("failed to kill ffmpeg child after cancellation: {e}");
    }
    let _ = child.wait();
}

fn parse_progress(line: &str) -> Option<ProgressEvent> {
    if !line.contains("frame=") && !line.contains("time=") {
        return None;
    }
    Some(ProgressEvent {
        percent: -1.0,
        message: line.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_progress_recognizes_frame_lines() {
        let line = "frame=  120 fps= 30 q=28.0 size=    512kB time=00:00:04.00 bitrate= 1048.6kbits/s speed=   1x";
        assert!(parse_progress(line).is_some());
    }

    #[test]
    fn parse_progress_ignores_unrelated_lines() {
        assert!(parse_progress("Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':").is_none());
    }

    #[tokio::test]
    async fn run_reports_binary_not_found_for_bogus_path() {
        let driver = FfmpegDriver {
            ffmpeg_binary: "definitely-not-a-real-ffmpeg-binary".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
        };
        let result = driver
            .run(vec![], CancelToken::new(), &crate::progress::NullProgressSink)
            .await;
        assert!(matches!(result, Err(ExportError::Ffmpeg(FfmpegError::BinaryNotFound { .. }))));
    }
}
