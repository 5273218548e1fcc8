use crate::color::{ColorRange, HsvBounds, RangeError};
use crate::frame::{Frame, FrameError};
use crate::morphology::Refinement;
use crate::region::{extract_regions, Region};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("palette has no colors")]
    Empty,

    #[error("color label is empty")]
    EmptyLabel,

    #[error("color `{0}` is defined more than once")]
    DuplicateLabel(String),

    #[error("kernel size must be odd and at least 1, got {0}")]
    InvalidKernel(usize),

    #[error("invalid range for color `{label}`: {source}")]
    Range {
        label: String,
        #[source]
        source: RangeError,
    },
}

/// Palette entry as it appears in configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSpec {
    pub label: String,
    pub ranges: Vec<HsvBounds>,
}

impl ColorSpec {
    pub fn new(label: &str, ranges: &[([u8; 3], [u8; 3])]) -> Self {
        Self {
            label: label.to_string(),
            ranges: ranges
                .iter()
                .map(|&(lower, upper)| HsvBounds { lower, upper })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub region: Region,
}

/// Runs threshold, refine and extract for every palette color on one frame.
#[derive(Clone, Debug)]
pub struct PaletteDetector {
    colors: Vec<ColorRange>,
    refinement: Refinement,
    min_area: usize,
}

impl PaletteDetector {
    pub fn new(
        colors: Vec<ColorRange>,
        refinement: Refinement,
        min_area: usize,
    ) -> Result<Self, PaletteError> {
        if colors.is_empty() {
            return Err(PaletteError::Empty);
        }
        if !refinement.is_valid() {
            return Err(PaletteError::InvalidKernel(refinement.kernel_size));
        }

        {
            let mut seen = HashSet::new();
            for color in &colors {
                if color.label().trim().is_empty() {
                    return Err(PaletteError::EmptyLabel);
                }
                if !seen.insert(color.label()) {
                    return Err(PaletteError::DuplicateLabel(color.label().to_string()));
                }
            }
        }

        Ok(Self {
            colors,
            refinement,
            min_area,
        })
    }

    /// Validates configured specs into ranges and builds the detector.
    pub fn from_specs(
        specs: &[ColorSpec],
        refinement: Refinement,
        min_area: usize,
    ) -> Result<Self, PaletteError> {
        let colors = specs
            .iter()
            .map(|spec| {
                ColorRange::from_bounds(spec.label.clone(), &spec.ranges).map_err(|source| {
                    PaletteError::Range {
                        label: spec.label.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(colors, refinement, min_area)
    }

    pub fn colors(&self) -> &[ColorRange] {
        &self.colors
    }

    pub fn refinement(&self) -> Refinement {
        self.refinement
    }

    pub fn min_area(&self) -> usize {
        self.min_area
    }

    /// Detects every palette color in a color frame.
    ///
    /// Colors run in parallel over the shared HSV frame. Results are ordered by
    /// palette position, then by region discovery order. Overlapping ranges may
    /// report the same object under several labels.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, FrameError> {
        let hsv = frame.to_hsv()?;

        let per_color = self
            .colors
            .par_iter()
            .map(|color| self.detect_color(&hsv, color))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(per_color.into_iter().flatten().collect())
    }

    /// Threshold, refine and extract for a single color on an HSV frame.
    pub fn detect_color(&self, hsv: &Frame, color: &ColorRange) -> Result<Vec<Detection>, FrameError> {
        let mask = color.threshold(hsv)?;
        let refined = self.refinement.apply(&mask);
        let detections = extract_regions(&refined, self.min_area)
            .into_iter()
            .map(|region| Detection {
                label: color.label().to_string(),
                region,
            })
            .collect::<Vec<_>>();

        tracing::trace!(
            label = color.label(),
            mask_pixels = mask.count(),
            regions = detections.len(),
            "color pass"
        );
        Ok(detections)
    }
}

/// Competition palette the detector ships with. Tune per venue.
pub fn default_palette() -> Vec<ColorSpec> {
    vec![
        ColorSpec::new("Black", &[([0, 0, 0], [180, 255, 100])]),
        ColorSpec::new(
            "Red",
            &[
                ([0, 180, 100], [5, 255, 160]),
                ([170, 100, 140], [180, 255, 200]),
            ],
        ),
        ColorSpec::new("Green", &[([75, 100, 90], [95, 255, 180])]),
        ColorSpec::new("Blue", &[([95, 200, 90], [105, 255, 255])]),
        ColorSpec::new("Yellow", &[([23, 90, 150], [25, 255, 255])]),
        ColorSpec::new("Orange", &[([10, 80, 150], [18, 255, 255])]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameConfig, PixelFormat};

    #[test]
    fn default_palette_is_valid() {
        let detector =
            PaletteDetector::from_specs(&default_palette(), Refinement::default(), 300).unwrap();
        assert_eq!(detector.colors().len(), 6);
        assert_eq!(detector.colors()[1].label(), "Red");
    }

    #[test]
    fn rejects_empty_palette() {
        assert_eq!(
            PaletteDetector::from_specs(&[], Refinement::default(), 300).unwrap_err(),
            PaletteError::Empty
        );
    }

    #[test]
    fn rejects_duplicate_labels() {
        let specs = vec![
            ColorSpec::new("green", &[([75, 100, 90], [95, 255, 180])]),
            ColorSpec::new("green", &[([60, 100, 90], [70, 255, 180])]),
        ];
        assert_eq!(
            PaletteDetector::from_specs(&specs, Refinement::default(), 300).unwrap_err(),
            PaletteError::DuplicateLabel("green".to_string())
        );
    }

    #[test]
    fn rejects_blank_label() {
        let specs = vec![ColorSpec::new("  ", &[([0, 0, 0], [10, 255, 255])])];
        assert_eq!(
            PaletteDetector::from_specs(&specs, Refinement::default(), 300).unwrap_err(),
            PaletteError::EmptyLabel
        );
    }

    #[test]
    fn range_errors_carry_the_label() {
        let specs = vec![ColorSpec::new("violet", &[([0, 0, 0], [200, 255, 255])])];
        match PaletteDetector::from_specs(&specs, Refinement::default(), 300).unwrap_err() {
            PaletteError::Range { label, source } => {
                assert_eq!(label, "violet");
                assert_eq!(source, RangeError::HueOutOfRange(200));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_even_kernel() {
        let refinement = Refinement {
            kernel_size: 4,
            erode: false,
        };
        assert_eq!(
            PaletteDetector::from_specs(&default_palette(), refinement, 300).unwrap_err(),
            PaletteError::InvalidKernel(4)
        );
    }

    #[test]
    fn detect_fails_on_non_color_frame() {
        let detector =
            PaletteDetector::from_specs(&default_palette(), Refinement::default(), 300).unwrap();
        let depth = Frame::from_depth(&[0; 4], 2, 2).unwrap();
        assert!(matches!(
            detector.detect(&depth),
            Err(FrameError::InvalidFormat {
                actual: PixelFormat::DEPTH16,
                ..
            })
        ));
    }

    #[test]
    fn detect_color_labels_every_region() {
        let specs = vec![ColorSpec::new("bright", &[([0, 0, 200], [180, 255, 255])])];
        let detector = PaletteDetector::from_specs(&specs, Refinement::default(), 10).unwrap();
        let mut data = vec![0u8; 30 * 10 * 3];
        for y in 2..6 {
            for x in 2..6 {
                data[(y * 30 + x) * 3 + 2] = 255;
            }
        }
        let hsv = Frame::new(FrameConfig {
            data,
            width: 30,
            height: 10,
            format: PixelFormat::HSV,
        })
        .unwrap();
        let detections = detector.detect_color(&hsv, &detector.colors()[0]).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "bright");
        // 4x4 dilated by a 5x5 kernel
        assert_eq!(detections[0].region.area, 64);
    }
}
