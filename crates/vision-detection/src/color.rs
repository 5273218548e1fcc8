use crate::frame::{Frame, FrameError, PixelFormat};
use crate::mask::Mask;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exclusive end of the 8-bit hue circle. Accepted as an inclusive upper bound.
pub const HUE_LIMIT: u8 = 180;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("hue bound {0} is outside 0..=180")]
    HueOutOfRange(u8),

    #[error("{channel} lower bound {lower} exceeds upper bound {upper}")]
    InvertedBounds {
        channel: &'static str,
        lower: u8,
        upper: u8,
    },

    #[error("color needs at least one range")]
    NoRanges,
}

/// One inclusive, non-wrapping box in HSV space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvBounds {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvBounds {
    pub fn in_range(&self, h: u8, s: u8, v: u8) -> bool {
        h >= self.lower[0]
            && h <= self.upper[0]
            && s >= self.lower[1]
            && s <= self.upper[1]
            && v >= self.lower[2]
            && v <= self.upper[2]
    }

    /// Marks every pixel of an HSV frame that lies inside these bounds.
    pub fn mask(&self, hsv: &Frame) -> Result<Mask, FrameError> {
        check_hsv(hsv)?;
        Ok(self.mask_checked(hsv))
    }

    // `hsv` must already have passed `check_hsv`.
    fn mask_checked(&self, hsv: &Frame) -> Mask {
        let mut mask = Mask::zeros(hsv.width as usize, hsv.height as usize);
        let width = hsv.width as usize;
        for (i, px) in hsv.data.chunks_exact(3).enumerate() {
            if self.in_range(px[0], px[1], px[2]) {
                mask.set(i % width, i / width);
            }
        }
        mask
    }
}

/// A configured `(lower, upper)` pair, split when it crosses the hue seam.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HueRange {
    Single(HsvBounds),
    /// `[lower_hue, 180]` and `[0, upper_hue]` with shared S/V bounds.
    Wrapping([HsvBounds; 2]),
}

impl HueRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Result<Self, RangeError> {
        for hue in [lower[0], upper[0]] {
            if hue > HUE_LIMIT {
                return Err(RangeError::HueOutOfRange(hue));
            }
        }
        for (idx, channel) in [(1, "saturation"), (2, "value")] {
            if lower[idx] > upper[idx] {
                return Err(RangeError::InvertedBounds {
                    channel,
                    lower: lower[idx],
                    upper: upper[idx],
                });
            }
        }

        if lower[0] <= upper[0] {
            return Ok(HueRange::Single(HsvBounds { lower, upper }));
        }

        let high = HsvBounds {
            lower,
            upper: [HUE_LIMIT, upper[1], upper[2]],
        };
        let low = HsvBounds {
            lower: [0, lower[1], lower[2]],
            upper,
        };
        Ok(HueRange::Wrapping([high, low]))
    }

    pub fn sub_ranges(&self) -> &[HsvBounds] {
        match self {
            HueRange::Single(bounds) => std::slice::from_ref(bounds),
            HueRange::Wrapping(parts) => parts,
        }
    }

    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        self.sub_ranges().iter().any(|b| b.in_range(h, s, v))
    }
}

/// A labeled palette entry: the union of one or more HSV ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorRange {
    label: String,
    ranges: Vec<HueRange>,
}

impl ColorRange {
    pub fn new(label: impl Into<String>, ranges: Vec<HueRange>) -> Result<Self, RangeError> {
        if ranges.is_empty() {
            return Err(RangeError::NoRanges);
        }
        Ok(Self {
            label: label.into(),
            ranges,
        })
    }

    /// Validates raw `(lower, upper)` pairs as they appear in configuration.
    pub fn from_bounds(
        label: impl Into<String>,
        bounds: &[HsvBounds],
    ) -> Result<Self, RangeError> {
        let ranges = bounds
            .iter()
            .map(|b| HueRange::new(b.lower, b.upper))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(label, ranges)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ranges(&self) -> &[HueRange] {
        &self.ranges
    }

    pub fn sub_ranges(&self) -> impl Iterator<Item = &HsvBounds> {
        self.ranges.iter().flat_map(HueRange::sub_ranges)
    }

    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        self.ranges.iter().any(|r| r.contains(h, s, v))
    }

    /// Thresholds an HSV frame: OR of the masks of every sub-range.
    pub fn threshold(&self, hsv: &Frame) -> Result<Mask, FrameError> {
        check_hsv(hsv)?;
        let mut combined = Mask::zeros(hsv.width as usize, hsv.height as usize);
        for bounds in self.sub_ranges() {
            combined.union_with(&bounds.mask_checked(hsv));
        }
        Ok(combined)
    }
}

fn check_hsv(frame: &Frame) -> Result<(), FrameError> {
    frame.validate()?;
    if frame.format != PixelFormat::HSV {
        return Err(FrameError::InvalidFormat {
            expected: "HSV frame",
            actual: frame.format,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameConfig;

    fn hsv_row(pixels: &[[u8; 3]]) -> Frame {
        Frame::new(FrameConfig {
            data: pixels.iter().flatten().copied().collect(),
            width: pixels.len() as u32,
            height: 1,
            format: PixelFormat::HSV,
        })
        .unwrap()
    }

    fn red() -> ColorRange {
        ColorRange::from_bounds(
            "red",
            &[
                HsvBounds {
                    lower: [170, 100, 140],
                    upper: [180, 255, 200],
                },
                HsvBounds {
                    lower: [0, 180, 100],
                    upper: [5, 255, 160],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn in_range_is_inclusive_on_every_channel() {
        let bounds = HsvBounds {
            lower: [10, 20, 30],
            upper: [40, 50, 60],
        };
        assert!(bounds.in_range(10, 20, 30));
        assert!(bounds.in_range(40, 50, 60));
        assert!(!bounds.in_range(41, 50, 60));
        assert!(!bounds.in_range(40, 19, 60));
    }

    #[test]
    fn red_matches_both_sides_of_the_hue_seam() {
        let hsv = hsv_row(&[[175, 200, 150], [2, 200, 150], [90, 200, 150]]);
        let mask = red().threshold(&hsv).unwrap();
        assert!(mask.is_set(0, 0));
        assert!(mask.is_set(1, 0));
        assert!(!mask.is_set(2, 0));
    }

    #[test]
    fn inverted_hue_pair_becomes_wrapping_range() {
        let range = HueRange::new([170, 100, 100], [5, 255, 255]).unwrap();
        match range {
            HueRange::Wrapping([high, low]) => {
                assert_eq!(high.lower[0], 170);
                assert_eq!(high.upper[0], HUE_LIMIT);
                assert_eq!(low.lower[0], 0);
                assert_eq!(low.upper[0], 5);
            }
            HueRange::Single(_) => panic!("expected a wrapping range"),
        }
        assert!(range.contains(175, 200, 200));
        assert!(range.contains(3, 200, 200));
        assert!(!range.contains(90, 200, 200));
        assert!(!range.contains(3, 50, 200));
    }

    #[test]
    fn rejects_hue_past_limit() {
        assert_eq!(
            HueRange::new([0, 0, 0], [181, 255, 255]),
            Err(RangeError::HueOutOfRange(181))
        );
    }

    #[test]
    fn rejects_inverted_saturation() {
        assert!(matches!(
            HueRange::new([0, 200, 0], [10, 100, 255]),
            Err(RangeError::InvertedBounds {
                channel: "saturation",
                ..
            })
        ));
    }

    #[test]
    fn rejects_empty_range_set() {
        assert_eq!(
            ColorRange::new("nothing", vec![]),
            Err(RangeError::NoRanges)
        );
    }

    #[test]
    fn threshold_requires_hsv_input() {
        let rgb = Frame::new(FrameConfig {
            data: vec![0; 3],
            width: 1,
            height: 1,
            format: PixelFormat::RGB8,
        })
        .unwrap();
        assert!(matches!(
            red().threshold(&rgb),
            Err(FrameError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn threshold_is_the_union_of_sub_range_masks() {
        let hsv = hsv_row(&[[175, 200, 150], [2, 200, 150], [90, 200, 150], [180, 255, 200]]);
        let range = red();
        let mut expected = Mask::zeros(4, 1);
        for bounds in range.sub_ranges() {
            expected.union_with(&bounds.mask(&hsv).unwrap());
        }
        assert_eq!(range.threshold(&hsv).unwrap(), expected);
        assert_eq!(expected.count(), 3);
    }

    #[test]
    fn sub_range_mask_requires_hsv_input() {
        let rgb = Frame::new(FrameConfig {
            data: vec![0; 3],
            width: 1,
            height: 1,
            format: PixelFormat::RGB8,
        })
        .unwrap();
        let bounds = red().sub_ranges().next().copied().unwrap();
        assert!(matches!(
            bounds.mask(&rgb),
            Err(FrameError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn threshold_is_deterministic() {
        let hsv = hsv_row(&[[1, 250, 120], [178, 120, 190], [60, 60, 60]]);
        let range = red();
        assert_eq!(range.threshold(&hsv).unwrap(), range.threshold(&hsv).unwrap());
    }
}
