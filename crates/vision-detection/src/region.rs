use crate::mask::Mask;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_AREA: usize = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A `width` x `height` box centered in a `frame_w` x `frame_h` frame.
    pub fn centered(frame_w: u32, frame_h: u32, width: u32, height: u32) -> Self {
        let width = width.min(frame_w);
        let height = height.min(frame_h);
        Self::new((frame_w - width) / 2, (frame_h - height) / 2, width, height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersection with a `frame_w` x `frame_h` frame, `None` if disjoint.
    pub fn clip(&self, frame_w: u32, frame_h: u32) -> Option<Self> {
        let x_end = self.x.saturating_add(self.width).min(frame_w);
        let y_end = self.y.saturating_add(self.height).min(frame_h);
        if self.x >= x_end || self.y >= y_end {
            return None;
        }
        Some(Self::new(self.x, self.y, x_end - self.x, y_end - self.y))
    }

    /// Maps a box between frames of different resolution, rounding outward.
    pub fn rescale(&self, from: (u32, u32), to: (u32, u32)) -> Self {
        if from == to || from.0 == 0 || from.1 == 0 {
            return *self;
        }
        let sx = to.0 as f64 / from.0 as f64;
        let sy = to.1 as f64 / from.1 as f64;
        let x0 = (self.x as f64 * sx).floor() as u32;
        let y0 = (self.y as f64 * sy).floor() as u32;
        let x1 = ((self.x + self.width) as f64 * sx).ceil() as u32;
        let y1 = ((self.y + self.height) as f64 * sy).ceil() as u32;
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

/// One 8-connected blob of set mask pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Number of pixels in the blob, not the bounding box area.
    pub area: usize,
    pub bbox: BoundingBox,
}

const NEIGHBORS: [(isize, isize); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Labels 8-connected blobs in row-major discovery order and keeps those
/// with at least `min_area` pixels.
pub fn extract_regions(mask: &Mask, min_area: usize) -> Vec<Region> {
    let view = mask.view();
    let (height, width) = view.dim();
    let mut visited: Array2<bool> = Array2::from_elem((height, width), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut regions = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if view[(y, x)] == 0 || visited[(y, x)] {
                continue;
            }

            visited[(y, x)] = true;
            stack.push((y, x));
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
            let mut area = 0usize;

            while let Some((cy, cx)) = stack.pop() {
                area += 1;
                min_x = min_x.min(cx);
                max_x = max_x.max(cx);
                min_y = min_y.min(cy);
                max_y = max_y.max(cy);

                for &(dx, dy) in &NEIGHBORS {
                    let (Some(nx), Some(ny)) =
                        (cx.checked_add_signed(dx), cy.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= width || ny >= height {
                        continue;
                    }
                    if view[(ny, nx)] != 0 && !visited[(ny, nx)] {
                        visited[(ny, nx)] = true;
                        stack.push((ny, nx));
                    }
                }
            }

            if area >= min_area {
                regions.push(Region {
                    area,
                    bbox: BoundingBox::new(
                        min_x as u32,
                        min_y as u32,
                        (max_x - min_x + 1) as u32,
                        (max_y - min_y + 1) as u32,
                    ),
                });
            }
        }
    }
    regions
}
