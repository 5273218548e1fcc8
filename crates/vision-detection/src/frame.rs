use thiserror::Error;

#[derive(Clone, Debug)]
// Represents an image frame with raw pixel data and dimensions.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
// Describes how pixels are laid out and how many bytes each uses.
pub enum PixelFormat {
    RGB8,    // 3 bytes per pixel (R, G, B)
    BGR8,    // 3 bytes per pixel (B, G, R)
    HSV,     // 3 bytes per pixel (H 0..180, S, V)
    GRAY8,   // 1 byte per pixel (grayscale)
    DEPTH16, // 2 bytes per pixel, little-endian millimeters
}

impl PixelFormat {
    // Returns how many bytes each pixel uses for this format.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::GRAY8 => 1,
            PixelFormat::DEPTH16 => 2,
            PixelFormat::RGB8 | PixelFormat::BGR8 | PixelFormat::HSV => 3,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("buffer size doesn't match: expected {expected} bytes, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("provided dimensions are zero")]
    ZeroDimensions,

    #[error("invalid frame format: expected {expected}, got {actual:?}")]
    InvalidFormat {
        expected: &'static str,
        actual: PixelFormat,
    },
}

pub struct FrameConfig {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl Frame {
    // Validates buffer size against dimensions and constructs a frame.
    pub fn new(config: FrameConfig) -> Result<Self, FrameError> {
        let frame = Self {
            data: config.data,
            width: config.width,
            height: config.height,
            format: config.format,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Builds a depth frame from raw millimeter samples in row-major order.
    pub fn from_depth(samples: &[u16], width: u32, height: u32) -> Result<Self, FrameError> {
        let data = samples.iter().flat_map(|d| d.to_le_bytes()).collect();
        Self::new(FrameConfig {
            data,
            width,
            height,
            format: PixelFormat::DEPTH16,
        })
    }

    /// Checks that the dimensions are nonzero and the buffer matches them.
    ///
    /// Fields are public, so every consumer re-checks before indexing.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroDimensions);
        }

        let expected = self.pixel_count() * self.format.bytes_per_pixel() as usize;
        if self.data.len() != expected {
            return Err(FrameError::InvalidDimensions {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    // Returns the pixel bytes at (x, y) if inside bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bytes_per_pixel = self.format.bytes_per_pixel() as usize;
        let index = (y as usize * self.width as usize + x as usize) * bytes_per_pixel;
        self.data.get(index..index + bytes_per_pixel)
    }

    // Returns the raw depth reading at (x, y) for DEPTH16 frames.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<u16> {
        if self.format != PixelFormat::DEPTH16 {
            return None;
        }
        self.get_pixel(x, y).map(|p| u16::from_le_bytes([p[0], p[1]]))
    }

    /// Converts a 3-channel color frame into HSV.
    ///
    /// Hue follows the 8-bit OpenCV convention (degrees / 2, so `0..180`).
    /// HSV input is returned as-is; any other encoding is rejected.
    pub fn to_hsv(&self) -> Result<Frame, FrameError> {
        self.validate()?;

        match self.format {
            PixelFormat::HSV => return Ok(self.clone()),
            PixelFormat::RGB8 | PixelFormat::BGR8 => {}
            other => {
                return Err(FrameError::InvalidFormat {
                    expected: "3-channel color frame",
                    actual: other,
                })
            }
        }

        let mut new_data = Vec::with_capacity(self.data.len());
        for pixel in self.data.chunks_exact(3) {
            let (r, g, b) = self.extract_rgb(pixel);
            let (h, s, v) = rgb_to_hsv(r, g, b);
            new_data.extend([h, s, v]);
        }

        Ok(Frame {
            data: new_data,
            width: self.width,
            height: self.height,
            format: PixelFormat::HSV,
        })
    }

    // Normalizes a pixel into (r, g, b) ordering regardless of source format.
    fn extract_rgb(&self, pixel: &[u8]) -> (u8, u8, u8) {
        match self.format {
            PixelFormat::BGR8 => (pixel[2], pixel[1], pixel[0]),
            _ => (pixel[0], pixel[1], pixel[2]),
        }
    }
}

// Converts an RGB triple to 8-bit HSV with hue halved into 0..180.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };

    let h = if h < 0.0 { h + 360.0 } else { h };
    // 359.x degrees rounds up to 180, which is the same point as 0
    let h_byte = ((h / 2.0).round() as u16 % 180) as u8;

    let s = if max == 0.0 { 0.0 } else { delta / max };
    let s_byte = (s * 255.0).round() as u8;
    let v_byte = (max * 255.0).round() as u8;

    (h_byte, s_byte, v_byte)
}
