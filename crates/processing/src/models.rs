//! Model files handed to the frame processor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gazer_common::error::{GazerError, GazerResult};

/// Paths to the detector and tracker models.
///
/// The contents are opaque to the pipeline. Every path is optional; a path
/// that is given must name a readable, non-empty file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub detector: Option<PathBuf>,
    pub detector_mean: Option<PathBuf>,
    pub regressor: Option<PathBuf>,
    pub eye: Option<PathBuf>,
}

impl ModelBundle {
    /// `(role, path)` for every model that was given.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &Path)> {
        [
            ("detector", self.detector.as_deref()),
            ("detector_mean", self.detector_mean.as_deref()),
            ("regressor", self.regressor.as_deref()),
            ("eye", self.eye.as_deref()),
        ]
        .into_iter()
        .filter_map(|(role, path)| path.map(|p| (role, p)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Check that every given model exists and is a non-empty file.
    pub fn validate(&self) -> GazerResult<()> {
        for (role, path) in self.entries() {
            let meta = std::fs::metadata(path).map_err(|_| GazerError::FileNotFound {
                path: path.to_path_buf(),
            })?;
            if !meta.is_file() {
                return Err(GazerError::config(format!(
                    "{role} model {} is not a file",
                    path.display()
                )));
            }
            if meta.len() == 0 {
                return Err(GazerError::config(format!(
                    "{role} model {} is empty",
                    path.display()
                )));
            }
            std::fs::File::open(path)?;
        }
        Ok(())
    }
}
