//! Run timing for the frame loop.
//!
//! [`RunClock`] anchors a run to a monotonic start instant. [`RateGate`]
//! limits periodic work (the throughput log) to a fixed frequency, and
//! [`ThroughputMeter`] combines both into a frames-per-second report.

use std::time::Instant;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Monotonic run time with the wall-clock moment the run began.
#[derive(Debug, Clone)]
pub struct RunClock {
    started: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Nanoseconds since [`RunClock::start`], saturating at `u64::MAX`.
    pub fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Wall-clock start as RFC 3339.
    pub fn started_at(&self) -> String {
        self.started_at.to_rfc3339()
    }
}

/// Opens at most once per period. The first call always opens.
#[derive(Debug)]
pub struct RateGate {
    period_ns: u64,
    next_open_ns: Option<u64>,
}

impl RateGate {
    pub fn per_second(hz: u32) -> Self {
        Self {
            period_ns: NANOS_PER_SEC / u64::from(hz.max(1)),
            next_open_ns: None,
        }
    }

    /// Returns true when `now_ns` has reached the next opening, and schedules
    /// the one after it.
    pub fn try_open(&mut self, now_ns: u64) -> bool {
        if self.next_open_ns.is_some_and(|due| now_ns < due) {
            return false;
        }
        self.next_open_ns = Some(now_ns.saturating_add(self.period_ns));
        true
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }
}

/// Frames-per-second measurement over one reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    /// Frames processed since the run started.
    pub total_frames: u64,
    pub fps: f64,
}

/// Counts processed frames and produces a report at most `report_hz` times
/// per second.
#[derive(Debug)]
pub struct ThroughputMeter {
    clock: RunClock,
    gate: RateGate,
    total_frames: u64,
    window: (u64, u64),
}

impl ThroughputMeter {
    pub fn new(report_hz: u32) -> Self {
        let mut gate = RateGate::per_second(report_hz);
        // First report only after a full window.
        gate.try_open(0);
        Self {
            clock: RunClock::start(),
            gate,
            total_frames: 0,
            window: (0, 0),
        }
    }

    pub fn record_frame(&mut self) -> Option<ThroughputReport> {
        let now = self.clock.elapsed_ns();
        self.record_frame_at(now)
    }

    /// Record one processed frame at an explicit run time.
    pub fn record_frame_at(&mut self, now_ns: u64) -> Option<ThroughputReport> {
        self.total_frames += 1;
        if !self.gate.try_open(now_ns) {
            return None;
        }

        let (since_ns, since_frames) = self.window;
        self.window = (now_ns, self.total_frames);
        let span_secs = now_ns.saturating_sub(since_ns).max(1) as f64 / NANOS_PER_SEC as f64;

        Some(ThroughputReport {
            total_frames: self.total_frames,
            fps: (self.total_frames - since_frames) as f64 / span_secs,
        })
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn clock(&self) -> &RunClock {
        &self.clock
    }
}
