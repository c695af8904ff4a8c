//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GazerError, GazerResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GazerConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// GPU device selection.
    pub gpu: GpuConfig,

    /// Movie output defaults.
    pub recording: RecordingDefaults,

    /// Frame analysis defaults.
    pub processing: ProcessingDefaults,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gazer=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// Which device backs the GPU context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuBackendKind {
    /// Hardware adapter when available, software otherwise.
    #[default]
    Auto,
    /// Host-memory textures, always available.
    Software,
    /// wgpu hardware adapter; fails if none is found.
    Wgpu,
}

impl std::str::FromStr for GpuBackendKind {
    type Err = GazerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "software" | "cpu" => Ok(Self::Software),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            other => Err(GazerError::config(format!(
                "Unknown GPU backend: {other}. Use: auto, software, wgpu"
            ))),
        }
    }
}

/// GPU context configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Device backend.
    pub backend: GpuBackendKind,

    /// Logical name of the context; used as the window title.
    pub context_name: String,

    /// Initial surface size before the first frame is seen.
    pub initial_width: u32,
    pub initial_height: u32,
}

/// Movie output parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// File name created inside the output directory.
    pub file_name: String,

    /// Container hint passed to the sink (".mov", ".mp4", ".mkv").
    pub container: String,

    /// Nominal frame rate stamped on recorded frames.
    pub fps: u32,

    /// Encoder bitrate in kbit/s.
    pub bitrate_kbps: u32,
}

/// Frame analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingDefaults {
    /// Frame-difference motion analysis.
    pub motion: bool,

    /// Bright blob localisation.
    pub blobs: bool,

    /// Paint analysis results onto the output frame.
    pub overlay: bool,

    /// Per-pixel luma difference counted as motion.
    pub motion_threshold: u8,

    /// Worker threads for analysis (0 = one per core).
    pub threads: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            backend: GpuBackendKind::Auto,
            context_name: "gazer".to_string(),
            initial_width: 640,
            initial_height: 480,
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            file_name: "movie.mov".to_string(),
            container: ".mov".to_string(),
            fps: 30,
            bitrate_kbps: 8000,
        }
    }
}

impl Default for ProcessingDefaults {
    fn default() -> Self {
        Self {
            motion: true,
            blobs: false,
            overlay: true,
            motion_threshold: 24,
            threads: 0,
        }
    }
}

impl GazerConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> GazerResult<Self> {
        if !path.exists() {
            return Err(GazerError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gazer").join("config.json")
}
