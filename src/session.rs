//! Per-export working directory (§4.10). Owned by the dispatcher; opened
//! before the first strategy attempt and closed after the final outcome.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SessionError};

/// A session's working directory tree: `<tmp>/qcut-export/<sid>/{frames,output}`.
pub struct Session {
    id: Uuid,
    opened_at: DateTime<Utc>,
    root: PathBuf,
    keep_on_error: bool,
    closed: bool,
}

impl Session {
    pub fn open(keep_on_error: bool) -> Result<Self> {
        let id = Uuid::new_v4();
        let opened_at = Utc::now();
        let root = std::env::temp_dir().join("qcut-export").join(id.to_string());

        std::fs::create_dir_all(root.join("frames")).map_err(SessionError::CreateFailed)?;
        std::fs::create_dir_all(root.join("output")).map_err(SessionError::CreateFailed)?;

        info!(session_id = %id, opened_at = %opened_at.to_rfc3339(), path = %root.display(), "opened export session");

        Ok(Self {
            id,
            opened_at,
            root,
            keep_on_error,
            closed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn raw_frame_path(&self, index: u32) -> PathBuf {
        self.frames_dir().join(format!("raw_frame-{index:04}.png"))
    }

    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.frames_dir().join(format!("frame-{index:04}.png"))
    }

    pub fn debug_frame_path(&self, index: u32) -> PathBuf {
        self.frames_dir().join(format!("debug_frame-{index:04}.png"))
    }

    pub fn normalized_clip_path(&self, index: usize) -> PathBuf {
        self.frames_dir().join(format!("normalized_{index}.mp4"))
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.root.join("concat_list.txt")
    }

    pub fn audio_mix_path(&self) -> PathBuf {
        self.output_dir().join("mix.wav")
    }

    /// Removes the session directory on success, or on failure unless
    /// `keep_on_error` was set when the session was opened.
    pub fn close(mut self, succeeded: bool) -> Result<()> {
        self.closed = true;
        let elapsed = Utc::now().signed_duration_since(self.opened_at);
        info!(session_id = %self.id, succeeded, elapsed_ms = elapsed.num_milliseconds(), "closing export session");

        if succeeded || !self.keep_on_error {
            remove_dir(&self.root)?;
        } else {
            warn!(path = %self.root.display(), "keeping session directory for diagnostics");
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed && !self.keep_on_error {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.root.display(), error = %e, "failed to remove session directory on drop");
                }
            }
        }
    }
}

fn remove_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::CleanupFailed {
            path: path.display().to_string(),
            source: e,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_frames_and_output_dirs() {
        let session = Session::open(false).unwrap();
        assert!(session.frames_dir().exists());
        assert!(session.output_dir().exists());
        let root = session.root.clone();
        session.close(true).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn keep_on_error_retains_directory_after_failure() {
        let session = Session::open(true).unwrap();
        let root = session.root.clone();
        session.close(false).unwrap();
        assert!(root.exists());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn failure_without_keep_on_error_removes_directory() {
        let session = Session::open(false).unwrap();
        let root = session.root.clone();
        session.close(false).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn frame_paths_use_expected_naming_convention() {
        let session = Session::open(false).unwrap();
        assert!(session
            .raw_frame_path(7)
            .to_string_lossy()
            .ends_with("raw_frame-0007.png"));
        assert!(session
            .normalized_clip_path(2)
            .to_string_lossy()
            .ends_with("normalized_2.mp4"));
        session.close(true).unwrap();
    }
}
