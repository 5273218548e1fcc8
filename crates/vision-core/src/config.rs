use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vision_detection::depth::DEFAULT_DEPTH_SCALE;
use vision_detection::morphology::DEFAULT_KERNEL_SIZE;
use vision_detection::region::DEFAULT_MIN_AREA;
use vision_detection::{
    default_palette, BoundingBox, ColorSpec, DepthFuser, PaletteDetector, PaletteError, Refinement,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid detection settings: {0}")]
    Palette(#[from] PaletteError),

    #[error("depth scale must be positive and finite, got {0}")]
    DepthScale(f64),
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub source: SourceConfig,
    pub detection: DetectionConfig,
    pub depth: DepthConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub color_dir: PathBuf,
    pub depth_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub timeout_ms: u64,
    pub loop_frames: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub kernel_size: usize,
    pub erode: bool,
    pub min_area: usize,
    pub colors: Vec<ColorSpec>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DepthConfig {
    pub enabled: bool,
    pub scale: f64,
    /// Fixed region to report; the centered 20x20 window when unset.
    pub roi: Option<BoundingBox>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            color_dir: PathBuf::from("frames/color"),
            depth_dir: None,
            width: 640,
            height: 480,
            fps: 30,
            timeout_ms: 5000,
            loop_frames: false,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            kernel_size: DEFAULT_KERNEL_SIZE,
            erode: false,
            min_area: DEFAULT_MIN_AREA,
            colors: default_palette(),
        }
    }
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: DEFAULT_DEPTH_SCALE,
            roi: None,
        }
    }
}

impl Config {
    // Load config from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    // Load default config
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::from_file(DEFAULT_CONFIG_PATH)
    }

    /// Loads `path` if given, otherwise the default file, falling back to the
    /// built-in settings only when the default file is missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::load_default() {
                Ok(cfg) => Ok(cfg),
                Err(ConfigError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    tracing::warn!(
                        path = DEFAULT_CONFIG_PATH,
                        "Config file not found, using default configuration"
                    );
                    Ok(Config::default())
                }
                Err(e) => Err(e),
            },
        }
    }

    pub fn refinement(&self) -> Refinement {
        Refinement {
            kernel_size: self.detection.kernel_size,
            erode: self.detection.erode,
        }
    }

    /// Validates the palette and tunables into a ready detector.
    pub fn build_detector(&self) -> Result<PaletteDetector, ConfigError> {
        Ok(PaletteDetector::from_specs(
            &self.detection.colors,
            self.refinement(),
            self.detection.min_area,
        )?)
    }

    /// `None` when depth fusion is turned off.
    pub fn build_depth_fuser(&self) -> Result<Option<DepthFuser>, ConfigError> {
        if !self.depth.enabled {
            return Ok(None);
        }
        if !(self.depth.scale.is_finite() && self.depth.scale > 0.0) {
            return Err(ConfigError::DepthScale(self.depth.scale));
        }
        Ok(Some(DepthFuser::new(self.depth.scale)))
    }
}
