use crate::config::SourceConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vision_detection::{Frame, FrameConfig, FrameError, PixelFormat};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{path} is {color_type:?}, depth frames must be 16-bit grayscale")]
    DepthFormat {
        path: PathBuf,
        color_type: image::ColorType,
    },

    #[error("no frames found in {0}")]
    NoFrames(PathBuf),

    #[error("stream has not been started")]
    NotStarted,

    #[error("end of stream")]
    EndOfStream,

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl SourceError {
    /// Errors confined to one frame; the stream itself is still usable.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            SourceError::Decode { .. } | SourceError::DepthFormat { .. } | SourceError::Frame(_)
        )
    }
}

/// Stream settings handed to `FrameSource::start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub enable_depth: bool,
}

impl From<&SourceConfig> for StreamConfig {
    fn from(cfg: &SourceConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
            enable_depth: cfg.depth_dir.is_some(),
        }
    }
}

/// A color frame and, when depth streaming is on, its paired depth frame.
#[derive(Clone, Debug)]
pub struct FramePair {
    pub color: Frame,
    pub depth: Option<Frame>,
}

pub trait FrameSource {
    fn start(&mut self, config: &StreamConfig) -> Result<(), SourceError>;

    /// `Ok(None)` means no frame is ready yet; callers retry.
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<FramePair>, SourceError>;

    fn stop(&mut self);
}

/// Started stream that stops its source when dropped, on every exit path.
pub struct ActiveStream<'a, S: FrameSource> {
    source: &'a mut S,
}

impl<'a, S: FrameSource> ActiveStream<'a, S> {
    pub fn start(source: &'a mut S, config: &StreamConfig) -> Result<Self, SourceError> {
        if let Err(e) = source.start(config) {
            // release whatever a partial start acquired
            source.stop();
            return Err(e);
        }
        tracing::info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            depth = config.enable_depth,
            "Stream started"
        );
        Ok(Self { source })
    }

    pub fn next_frame(&mut self, timeout: Duration) -> Result<Option<FramePair>, SourceError> {
        self.source.next_frame(timeout)
    }
}

impl<S: FrameSource> Drop for ActiveStream<'_, S> {
    fn drop(&mut self) {
        self.source.stop();
        tracing::info!("Stream stopped");
    }
}

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replays still images from disk as a stream.
///
/// Color images are decoded to RGB8; depth images must be 16-bit grayscale
/// in millimeters. Depth files pair with color files by sorted position.
pub struct ImageSequenceSource {
    color_dir: PathBuf,
    depth_dir: Option<PathBuf>,
    loop_frames: bool,
    color_files: Vec<PathBuf>,
    depth_files: Vec<PathBuf>,
    cursor: usize,
    started: bool,
}

impl ImageSequenceSource {
    pub fn new(color_dir: impl Into<PathBuf>, depth_dir: Option<PathBuf>) -> Self {
        Self {
            color_dir: color_dir.into(),
            depth_dir,
            loop_frames: false,
            color_files: Vec::new(),
            depth_files: Vec::new(),
            cursor: 0,
            started: false,
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Self {
        Self::new(cfg.color_dir.clone(), cfg.depth_dir.clone()).looping(cfg.loop_frames)
    }

    pub fn looping(mut self, loop_frames: bool) -> Self {
        self.loop_frames = loop_frames;
        self
    }

    pub fn len(&self) -> usize {
        self.color_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.color_files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn start(&mut self, config: &StreamConfig) -> Result<(), SourceError> {
        self.color_files = list_images(&self.color_dir)?;
        if self.color_files.is_empty() {
            return Err(SourceError::NoFrames(self.color_dir.clone()));
        }

        self.depth_files = match (&self.depth_dir, config.enable_depth) {
            (Some(dir), true) => list_images(dir)?,
            _ => Vec::new(),
        };
        if config.enable_depth && self.depth_files.len() < self.color_files.len() {
            tracing::warn!(
                color = self.color_files.len(),
                depth = self.depth_files.len(),
                "Fewer depth frames than color frames"
            );
        }

        self.cursor = 0;
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<FramePair>, SourceError> {
        if !self.started {
            return Err(SourceError::NotStarted);
        }
        if self.cursor >= self.color_files.len() {
            if !self.loop_frames {
                return Err(SourceError::EndOfStream);
            }
            self.cursor = 0;
        }

        let idx = self.cursor;
        self.cursor += 1;

        let color = load_color(&self.color_files[idx])?;
        // a bad depth image only costs this frame its distances
        let depth = self.depth_files.get(idx).and_then(|path| match load_depth(path) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable depth frame");
                None
            }
        });
        Ok(Some(FramePair { color, depth }))
    }

    fn stop(&mut self) {
        self.started = false;
        self.color_files.clear();
        self.depth_files.clear();
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = fs::read_dir(dir).map_err(|source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| SourceError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode(path: &Path) -> Result<image::DynamicImage, SourceError> {
    image::open(path).map_err(|source| SourceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_color(path: &Path) -> Result<Frame, SourceError> {
    let rgb = decode(path)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(FrameConfig {
        data: rgb.into_raw(),
        width,
        height,
        format: PixelFormat::RGB8,
    })?)
}

pub fn load_depth(path: &Path) -> Result<Frame, SourceError> {
    let luma = match decode(path)? {
        image::DynamicImage::ImageLuma16(luma) => luma,
        other => {
            return Err(SourceError::DepthFormat {
                path: path.to_path_buf(),
                color_type: other.color(),
            })
        }
    };
    let (width, height) = luma.dimensions();
    Ok(Frame::from_depth(luma.as_raw(), width, height)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_config(enable_depth: bool) -> StreamConfig {
        StreamConfig {
            width: 4,
            height: 4,
            fps: 30,
            enable_depth,
        }
    }

    #[test]
    fn next_frame_before_start_fails() {
        let mut source = ImageSequenceSource::new("nowhere", None);
        assert!(matches!(
            source.next_frame(Duration::from_millis(10)),
            Err(SourceError::NotStarted)
        ));
    }

    #[test]
    fn start_on_missing_directory_fails() {
        let mut source = ImageSequenceSource::new("definitely/not/here", None);
        assert!(matches!(
            source.start(&stream_config(false)),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn start_on_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(dir.path(), None);
        assert!(matches!(
            source.start(&stream_config(false)),
            Err(SourceError::NoFrames(_))
        ));
    }

    #[test]
    fn load_depth_rejects_8_bit_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.png");
        image::GrayImage::from_pixel(4, 4, image::Luma([10u8]))
            .save(&path)
            .unwrap();
        assert!(matches!(
            load_depth(&path),
            Err(SourceError::DepthFormat {
                color_type: image::ColorType::L8,
                ..
            })
        ));
    }

    #[test]
    fn load_depth_keeps_16_bit_millimeters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.png");
        image::ImageBuffer::<image::Luma<u16>, _>::from_pixel(4, 4, image::Luma([10u16]))
            .save(&path)
            .unwrap();
        let frame = load_depth(&path).unwrap();
        assert_eq!(frame.depth_at(0, 0), Some(10));
    }

    #[test]
    fn stream_config_enables_depth_only_with_a_directory() {
        let mut cfg = SourceConfig::default();
        assert!(!StreamConfig::from(&cfg).enable_depth);
        cfg.depth_dir = Some(PathBuf::from("frames/depth"));
        assert!(StreamConfig::from(&cfg).enable_depth);
    }
}
