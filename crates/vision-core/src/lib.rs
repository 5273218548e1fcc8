pub mod config;
pub mod detection;
pub mod logging;
pub mod source;

pub use config::{Config, ConfigError};
pub use detection::{FrameReport, LocatedDetection, Pipeline, PipelineError, RunSummary, StopSignal};
pub use source::{ActiveStream, FramePair, FrameSource, ImageSequenceSource, SourceError, StreamConfig};
