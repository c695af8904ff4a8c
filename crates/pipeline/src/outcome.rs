//! What a pipeline run reports back.

use serde::Serialize;

use gazer_gpu::LoopExit;

/// Fate of the recording sink over a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordingStatus {
    /// No recording sink was configured.
    Disabled,
    /// The sink could not be opened; the run went on without it.
    Skipped { reason: String },
    /// Finalization completed and was observed.
    Finalized { frames: u64 },
    /// Finalization was requested but never signalled completion.
    Incomplete { reason: String },
}

/// Counters for a run that processed at least one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    #[serde(serialize_with = "serialize_exit")]
    pub exit: LoopExit,
    pub presented: u64,
    pub recording: RecordingStatus,
}

fn serialize_exit<S: serde::Serializer>(exit: &LoopExit, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(match exit {
        LoopExit::Exhausted => "exhausted",
        LoopExit::Closed => "closed",
    })
}

/// Result of [`crate::Orchestrator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The first pull returned the end-of-stream sentinel.
    NoFrames,
    Completed(RunSummary),
}

impl RunOutcome {
    /// Process exit status: 0 for a completed run, -1 when no frames were
    /// available.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NoFrames => -1,
            RunOutcome::Completed(_) => 0,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::NoFrames => None,
            RunOutcome::Completed(summary) => Some(summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(RunOutcome::NoFrames.exit_code(), -1);
        let done = RunOutcome::Completed(RunSummary {
            frames: 3,
            exit: LoopExit::Exhausted,
            presented: 0,
            recording: RecordingStatus::Disabled,
        });
        assert_eq!(done.exit_code(), 0);
        assert_eq!(done.summary().unwrap().frames, 3);
        assert!(RunOutcome::NoFrames.summary().is_none());
    }
}
