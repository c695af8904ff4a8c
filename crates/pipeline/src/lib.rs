//! Gazer Pipeline
//!
//! [`Orchestrator`] composes a frame source, a GPU context, texture ingest,
//! a frame processor and the optional display and recording taps into one
//! frame loop, and owns the shutdown rendezvous with recording
//! finalization.

pub mod orchestrator;
pub mod outcome;
pub mod taps;

pub use orchestrator::{Orchestrator, ProcessorFactory, StageContext};
pub use outcome::{RecordingStatus, RunOutcome, RunSummary};
pub use taps::{DisplayTap, OutputTap, OutputTaps, RecordingTap};
