use crate::frame::{Frame, FrameError, PixelFormat};
use crate::region::{BoundingBox, Region};
use serde::{Deserialize, Serialize};

/// Millimeters to meters, the usual depth unit of structured-light cameras.
pub const DEFAULT_DEPTH_SCALE: f64 = 0.001;

/// Distance summary over the nonzero depth samples of a region, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthFuser {
    scale: f64,
}

impl Default for DepthFuser {
    fn default() -> Self {
        Self {
            scale: DEFAULT_DEPTH_SCALE,
        }
    }
}

impl DepthFuser {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Statistics over `roi` clipped to the depth frame.
    ///
    /// Zero readings mean "no depth" and are skipped. Returns `Ok(None)` when
    /// nothing valid remains, including an ROI entirely outside the frame.
    pub fn fuse(&self, depth: &Frame, roi: BoundingBox) -> Result<Option<DistanceStats>, FrameError> {
        depth.validate()?;
        if depth.format != PixelFormat::DEPTH16 {
            return Err(FrameError::InvalidFormat {
                expected: "16-bit depth frame",
                actual: depth.format,
            });
        }

        let Some(roi) = roi.clip(depth.width, depth.height) else {
            return Ok(None);
        };

        let samples = (roi.y..roi.y + roi.height)
            .flat_map(|y| (roi.x..roi.x + roi.width).map(move |x| (x, y)))
            .filter_map(|(x, y)| depth.depth_at(x, y))
            .filter(|&raw| raw != 0);

        Ok(self.summarize(samples))
    }

    /// Statistics for a region found on a color frame of size `color_dims`.
    pub fn fuse_region(
        &self,
        depth: &Frame,
        region: &Region,
        color_dims: (u32, u32),
    ) -> Result<Option<DistanceStats>, FrameError> {
        let roi = region.bbox.rescale(color_dims, (depth.width, depth.height));
        self.fuse(depth, roi)
    }

    /// Mean, min and max of raw nonzero readings after scaling to meters.
    pub fn summarize(&self, raw: impl IntoIterator<Item = u16>) -> Option<DistanceStats> {
        let mut count = 0usize;
        let mut sum = 0u64;
        let mut min = u16::MAX;
        let mut max = 0u16;

        for value in raw.into_iter().filter(|&v| v != 0) {
            count += 1;
            sum += value as u64;
            min = min.min(value);
            max = max.max(value);
        }

        if count == 0 {
            return None;
        }

        Some(DistanceStats {
            mean: sum as f64 / count as f64 * self.scale,
            min: min as f64 * self.scale,
            max: max as f64 * self.scale,
            samples: count,
        })
    }
}
