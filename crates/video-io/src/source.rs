//! Frame sources.

use std::path::PathBuf;

use gazer_common::error::{GazerError, GazerResult};
use gazer_frame_model::{Frame, PixelFormat};

use crate::gst_source::GstFrameSource;
use crate::synthetic::SyntheticSource;

/// Produces indexed frames from a video stream.
///
/// `pull` is idempotent for the index of the most recent frame, so a caller
/// may peek at frame 0 and pull it again. End of stream is reported by a
/// frame with an empty pixel buffer, after which every further pull returns
/// the sentinel again.
pub trait FrameSource: Send {
    /// Human-readable identifier for logs.
    fn describe(&self) -> &str;

    fn output_format(&self) -> PixelFormat;

    /// Choose the channel order of produced frames. Must be called before
    /// the first pull.
    fn set_output_format(&mut self, format: PixelFormat) -> GazerResult<()>;

    fn pull(&mut self, index: u64) -> GazerResult<Frame>;
}

/// A parsed source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    /// `synthetic://WxH?frames=N`
    Synthetic { width: u32, height: u32, frames: u64 },
    /// A URI GStreamer can open (`rtsp://`, `file://`, `http://`, ...).
    Uri(String),
    File(PathBuf),
}

pub const SYNTHETIC_SCHEME: &str = "synthetic://";

const DEFAULT_SYNTHETIC_FRAMES: u64 = 90;

impl SourceId {
    pub fn parse(identifier: &str) -> GazerResult<Self> {
        if let Some(rest) = identifier.strip_prefix(SYNTHETIC_SCHEME) {
            return parse_synthetic(rest);
        }
        if identifier.contains("://") {
            return Ok(SourceId::Uri(identifier.to_string()));
        }
        if identifier.is_empty() {
            return Err(GazerError::source("empty source identifier"));
        }
        Ok(SourceId::File(PathBuf::from(identifier)))
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, SourceId::Synthetic { .. })
    }
}

fn parse_synthetic(rest: &str) -> GazerResult<SourceId> {
    let invalid = || {
        GazerError::source(format!(
            "invalid synthetic source '{SYNTHETIC_SCHEME}{rest}', expected {SYNTHETIC_SCHEME}WxH?frames=N"
        ))
    };

    let (size, query) = match rest.split_once('?') {
        Some((size, query)) => (size, Some(query)),
        None => (rest, None),
    };
    let (w, h) = size.split_once('x').ok_or_else(invalid)?;
    let width: u32 = w.parse().map_err(|_| invalid())?;
    let height: u32 = h.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }

    let mut frames = DEFAULT_SYNTHETIC_FRAMES;
    for pair in query.into_iter().flat_map(|q| q.split('&')) {
        match pair.split_once('=') {
            Some(("frames", n)) => frames = n.parse().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        }
    }

    Ok(SourceId::Synthetic {
        width,
        height,
        frames,
    })
}

/// Open a source for `identifier`.
///
/// Files must exist. Decoding starts lazily on the first pull.
pub fn open_source(identifier: &str) -> GazerResult<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match SourceId::parse(identifier)? {
        SourceId::Synthetic {
            width,
            height,
            frames,
        } => Box::new(SyntheticSource::new(width, height, frames)),
        SourceId::Uri(uri) => Box::new(GstFrameSource::from_uri(&uri)),
        SourceId::File(path) => {
            if !path.exists() {
                return Err(GazerError::FileNotFound { path });
            }
            Box::new(GstFrameSource::from_file(&path))
        }
    };
    tracing::info!(source = source.describe(), "Frame source opened");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_synthetic_identifiers() {
        assert_eq!(
            SourceId::parse("synthetic://320x240?frames=5").unwrap(),
            SourceId::Synthetic {
                width: 320,
                height: 240,
                frames: 5
            }
        );
        assert_eq!(
            SourceId::parse("synthetic://16x8").unwrap(),
            SourceId::Synthetic {
                width: 16,
                height: 8,
                frames: DEFAULT_SYNTHETIC_FRAMES
            }
        );
        assert!(SourceId::parse("synthetic://16x8?frames=0")
            .unwrap()
            .is_synthetic());
    }

    #[test]
    fn rejects_malformed_synthetic_identifiers() {
        for bad in [
            "synthetic://",
            "synthetic://0x10",
            "synthetic://10",
            "synthetic://10x10?fps=3",
            "synthetic://10x10?frames=many",
        ] {
            assert!(SourceId::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn uris_and_files() {
        assert_eq!(
            SourceId::parse("rtsp://cam/stream").unwrap(),
            SourceId::Uri("rtsp://cam/stream".into())
        );
        assert_eq!(
            SourceId::parse("clip.mp4").unwrap(),
            SourceId::File(PathBuf::from("clip.mp4"))
        );
        assert!(SourceId::parse("").is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let err = open_source(missing.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, GazerError::FileNotFound { .. }));
    }

    #[test]
    fn opens_synthetic_source() {
        let mut source = open_source("synthetic://8x4?frames=2").unwrap();
        assert_eq!(source.pull(0).unwrap().width, 8);
        assert!(source.pull(2).unwrap().is_end_of_stream());
    }
}
