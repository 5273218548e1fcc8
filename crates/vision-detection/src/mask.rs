use ndarray::{s, Array2, ArrayView2, Zip};

/// Binary per-pixel match grid, stored `(y, x)` with 255 for set pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    data: Array2<u8>,
}

impl Mask {
    pub const SET: u8 = 255;

    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    /// Wraps an existing grid; any nonzero cell counts as set.
    pub fn from_array(mut data: Array2<u8>) -> Self {
        data.mapv_inplace(|v| if v != 0 { Self::SET } else { 0 });
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data.get((y, x)).is_some_and(|&v| v != 0)
    }

    pub fn set(&mut self, x: usize, y: usize) {
        if let Some(v) = self.data.get_mut((y, x)) {
            *v = Self::SET;
        }
    }

    // Sets every pixel of the rectangle, clipped to the mask.
    pub fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize) {
        let x_end = (x + width).min(self.width());
        let y_end = (y + height).min(self.height());
        if x >= x_end || y >= y_end {
            return;
        }
        self.data.slice_mut(s![y..y_end, x..x_end]).fill(Self::SET);
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Bitwise OR of `other` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the two masks differ in size.
    pub fn union_with(&mut self, other: &Mask) {
        assert_eq!(
            self.data.dim(),
            other.data.dim(),
            "mask union needs equal sizes"
        );
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|dst, &src| *dst |= src);
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    pub fn into_array(self) -> Array2<u8> {
        self.data
    }
}
