use crate::mask::Mask;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

pub const DEFAULT_KERNEL_SIZE: usize = 5;

/// Square structuring element refinement: optional erosion, then dilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refinement {
    pub kernel_size: usize,
    pub erode: bool,
}

impl Default for Refinement {
    fn default() -> Self {
        Self {
            kernel_size: DEFAULT_KERNEL_SIZE,
            erode: false,
        }
    }
}

impl Refinement {
    pub fn is_valid(&self) -> bool {
        self.kernel_size >= 1 && self.kernel_size % 2 == 1
    }

    pub fn radius(&self) -> usize {
        self.kernel_size / 2
    }

    pub fn apply(&self, mask: &Mask) -> Mask {
        let radius = self.radius();
        if radius == 0 {
            return mask.clone();
        }
        let base = if self.erode {
            erode(mask, radius)
        } else {
            mask.clone()
        };
        dilate(&base, radius)
    }
}

/// Max filter over a `(2r+1)` square. Out-of-bounds pixels count as unset.
pub fn dilate(mask: &Mask, radius: usize) -> Mask {
    let rows = sweep(mask.view(), radius, Axis(1), Sweep::Any);
    Mask::from_array(sweep(rows.view(), radius, Axis(0), Sweep::Any))
}

/// Min filter over a `(2r+1)` square. Out-of-bounds pixels count as set.
pub fn erode(mask: &Mask, radius: usize) -> Mask {
    let rows = sweep(mask.view(), radius, Axis(1), Sweep::All);
    Mask::from_array(sweep(rows.view(), radius, Axis(0), Sweep::All))
}

#[derive(Clone, Copy)]
enum Sweep {
    Any,
    All,
}

// The square kernel is separable: one 1-D pass per axis.
fn sweep(src: ArrayView2<'_, u8>, radius: usize, axis: Axis, mode: Sweep) -> Array2<u8> {
    let mut out = Array2::zeros(src.raw_dim());
    for (src_lane, mut dst_lane) in src.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let len = src_lane.len();
        for i in 0..len {
            let start = i.saturating_sub(radius);
            let end = (i + radius + 1).min(len);
            let window = src_lane.slice(ndarray::s![start..end]);
            let hit = match mode {
                Sweep::Any => window.iter().any(|&v| v != 0),
                Sweep::All => window.iter().all(|&v| v != 0),
            };
            if hit {
                dst_lane[i] = Mask::SET;
            }
        }
    }
    out
}
