//! JSONL log of per-frame analysis results.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use gazer_common::error::{GazerError, GazerResult};
use gazer_processing::FrameAnalysis;

pub const ANALYSIS_LOG_FILE: &str = "analysis.jsonl";

/// Lines between flushes.
const FLUSH_EVERY: u64 = 100;

/// Writes one JSON object per line.
pub struct AnalysisWriter<W: Write> {
    writer: BufWriter<W>,
    lines: u64,
}

impl<W: Write> AnalysisWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
            lines: 0,
        }
    }

    pub fn write(&mut self, result: &FrameAnalysis) -> GazerResult<()> {
        let json = serde_json::to_string(result)?;
        writeln!(self.writer, "{json}")?;
        self.lines += 1;
        if self.lines % FLUSH_EVERY == 0 {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> GazerResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }
}

/// Background thread draining the analysis channel into a file.
///
/// The thread ends when every sender is dropped.
pub struct AnalysisLog {
    handle: JoinHandle<GazerResult<u64>>,
}

impl AnalysisLog {
    pub fn spawn(path: &Path, results: Receiver<FrameAnalysis>) -> GazerResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let handle = std::thread::Builder::new()
            .name("gazer-analysis-log".to_string())
            .spawn(move || drain(file, results))?;
        Ok(Self { handle })
    }

    /// Wait for the writer to drain and return the number of lines written.
    pub fn finish(self) -> GazerResult<u64> {
        self.handle
            .join()
            .map_err(|_| GazerError::Other(anyhow::anyhow!("analysis log writer panicked")))?
    }
}

fn drain(file: File, results: Receiver<FrameAnalysis>) -> GazerResult<u64> {
    let mut writer = AnalysisWriter::new(file);
    for result in results.iter() {
        writer.write(&result)?;
    }
    writer.flush()?;
    Ok(writer.lines())
}
