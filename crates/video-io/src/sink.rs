//! Recording sinks.
//!
//! A sink moves through `Unopened -> Open -> Finalizing -> Closed`. Writes
//! are accepted only while `Open`. `end` starts finalization and returns at
//! once; the completion callback runs later, exactly once, on a worker
//! thread.

use std::path::{Path, PathBuf};

use serde::Serialize;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::PixelFormat;

/// Lifecycle of a recording sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkState {
    Unopened,
    Open,
    Finalizing,
    Closed,
}

/// Stream parameters fixed before `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SinkProperties {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

/// Callback invoked once finalization completes.
pub type FinalizeCallback = Box<dyn FnOnce() + Send + 'static>;

/// Destination that persists processed frames.
pub trait RecordingSink: Send {
    fn set_properties(&mut self, properties: SinkProperties) -> GazerResult<()>;

    /// Open the output stream. Fails with `StreamUnavailable`.
    fn begin(&mut self) -> GazerResult<()>;

    /// Append one tightly packed frame. Valid only while `Open`.
    fn write(&mut self, pixels: &[u8]) -> GazerResult<()>;

    /// Request finalization. Returns `true` if it was started, in which case
    /// `on_complete` will run exactly once. In any other state this is a
    /// no-op that drops the callback uncalled.
    fn end(&mut self, on_complete: FinalizeCallback) -> bool;

    fn state(&self) -> SinkState;

    fn is_open(&self) -> bool {
        self.state() == SinkState::Open
    }

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;
}

/// Output container, chosen from a hint such as ".mov" or "mkv".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mov,
    Mp4,
    Mkv,
}

impl Container {
    pub fn from_hint(hint: &str) -> GazerResult<Self> {
        match hint.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mov" => Ok(Container::Mov),
            "mp4" => Ok(Container::Mp4),
            "mkv" => Ok(Container::Mkv),
            other => Err(GazerError::stream_unavailable(format!(
                "unsupported container '{other}'"
            ))),
        }
    }

    /// GStreamer muxer element.
    pub fn muxer(self) -> &'static str {
        match self {
            Container::Mov => "qtmux",
            Container::Mp4 => "mp4mux",
            Container::Mkv => "matroskamux",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Container::Mov => "mov",
            Container::Mp4 => "mp4",
            Container::Mkv => "mkv",
        }
    }
}

/// Remove a previous recording at `path` so the new one starts clean.
pub fn clear_previous_recording(path: &Path) -> GazerResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Removed previous recording");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Check that a recording can be created at `path`.
pub fn check_destination(path: &Path) -> GazerResult<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(GazerError::stream_unavailable(format!(
            "output directory {} does not exist",
            parent.display()
        )));
    }
    if path.is_dir() {
        return Err(GazerError::stream_unavailable(format!(
            "{} is a directory",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}
