use crate::source::{ActiveStream, FramePair, FrameSource, SourceError, StreamConfig};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use vision_detection::{BoundingBox, DepthFuser, Detection, DistanceStats, PaletteDetector};

/// Side length of the default depth window centered on the frame.
pub const DEFAULT_ROI_SIZE: u32 = 20;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame source failed: {0}")]
    Source(#[from] SourceError),
}

/// Cooperative stop flag, checked between frames.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LocatedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    pub distance: Option<DistanceStats>,
}

/// Everything the pipeline learned from one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub index: u64,
    pub detections: Vec<LocatedDetection>,
    pub roi_distance: Option<DistanceStats>,
    /// Set when the color frame was rejected; `detections` is then empty.
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub skipped: u64,
    pub detections: u64,
}

pub struct Pipeline {
    detector: PaletteDetector,
    depth: Option<DepthFuser>,
    roi: Option<BoundingBox>,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(detector: PaletteDetector) -> Self {
        Self {
            detector,
            depth: None,
            roi: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_depth(mut self, fuser: DepthFuser, roi: Option<BoundingBox>) -> Self {
        self.depth = Some(fuser);
        self.roi = roi;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs detection and depth fusion for one frame pair.
    ///
    /// Never fails: a rejected color frame yields an empty detection list and
    /// the reason in `error`.
    pub fn process(&self, index: u64, pair: &FramePair) -> FrameReport {
        let color_dims = (pair.color.width, pair.color.height);

        let (detections, error) = match self.detector.detect(&pair.color) {
            Ok(found) => (found, None),
            Err(e) => {
                tracing::warn!(frame = index, error = %e, "Skipping frame");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let depth = self.depth.as_ref().zip(pair.depth.as_ref());

        let detections = detections
            .into_iter()
            .map(|detection| {
                let distance = depth.and_then(|(fuser, frame)| {
                    fuser
                        .fuse_region(frame, &detection.region, color_dims)
                        .unwrap_or_else(|e| {
                            tracing::warn!(frame = index, error = %e, "Depth fusion failed");
                            None
                        })
                });
                tracing::debug!(
                    frame = index,
                    label = %detection.label,
                    area = detection.region.area,
                    bbox = ?detection.region.bbox,
                    distance_m = ?distance.map(|d| d.mean),
                    "Detection"
                );
                LocatedDetection {
                    detection,
                    distance,
                }
            })
            .collect();

        let roi_distance = depth.and_then(|(fuser, frame)| {
            let roi = self.roi.unwrap_or_else(|| {
                BoundingBox::centered(frame.width, frame.height, DEFAULT_ROI_SIZE, DEFAULT_ROI_SIZE)
            });
            match fuser.fuse(frame, roi) {
                Ok(Some(stats)) => Some(stats),
                Ok(None) => {
                    tracing::debug!(frame = index, "No valid distances in the selected range");
                    None
                }
                Err(e) => {
                    tracing::warn!(frame = index, error = %e, "Depth fusion failed");
                    None
                }
            }
        });

        FrameReport {
            index,
            detections,
            roi_distance,
            error,
        }
    }

    /// Pulls frames until the source ends or `stop` is triggered, handing each
    /// report to `on_report`. The source is stopped on every exit path.
    pub fn run<S, F>(
        &self,
        source: &mut S,
        stream: &StreamConfig,
        stop: &StopSignal,
        max_frames: Option<u64>,
        mut on_report: F,
    ) -> Result<RunSummary, PipelineError>
    where
        S: FrameSource,
        F: FnMut(&FrameReport),
    {
        let mut active = ActiveStream::start(source, stream)?;
        let mut summary = RunSummary::default();

        // Throughput window
        let mut window_frames: u64 = 0;
        let mut window_detections: u64 = 0;
        let mut last_log = Instant::now();

        while !stop.is_triggered() && max_frames.map_or(true, |max| summary.frames < max) {
            let pair = match active.next_frame(self.timeout) {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(SourceError::EndOfStream) => {
                    tracing::info!("End of stream");
                    break;
                }
                Err(e) if e.is_frame_local() => {
                    tracing::warn!(frame = summary.frames, error = %e, "Dropping unreadable frame");
                    summary.frames += 1;
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let report = self.process(summary.frames, &pair);
            summary.frames += 1;
            if report.error.is_some() {
                summary.skipped += 1;
            }
            summary.detections += report.detections.len() as u64;
            window_frames += 1;
            window_detections += report.detections.len() as u64;

            on_report(&report);

            if last_log.elapsed() >= Duration::from_secs(1) {
                tracing::info!(
                    frames_in_window = window_frames,
                    detections_in_window = window_detections,
                    total_frames = summary.frames,
                );
                window_frames = 0;
                window_detections = 0;
                last_log = Instant::now();
            }
        }

        if stop.is_triggered() {
            tracing::info!("Stop requested");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let handle = stop.clone();
        assert!(!stop.is_triggered());
        handle.trigger();
        assert!(stop.is_triggered());
    }
}
