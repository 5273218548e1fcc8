//! Multi-color segmentation: HSV thresholding, mask refinement, blob
//! extraction and depth fusion over single frames.

pub mod color;
pub mod depth;
pub mod frame;
pub mod mask;
pub mod morphology;
pub mod palette;
pub mod region;

pub use color::{ColorRange, HsvBounds, HueRange, RangeError};
pub use depth::{DepthFuser, DistanceStats};
pub use frame::{Frame, FrameConfig, FrameError, PixelFormat};
pub use mask::Mask;
pub use morphology::Refinement;
pub use palette::{default_palette, ColorSpec, Detection, PaletteDetector, PaletteError};
pub use region::{extract_regions, BoundingBox, Region};
