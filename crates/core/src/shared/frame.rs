use std::time::Instant;

use image::RgbImage;
use ndarray::{s, ArrayView3};

/// A single captured camera frame: contiguous RGB bytes in row-major order.
///
/// Frames are never mutated after capture. Derived images (mirrored copies,
/// annotated previews) are new frames.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
    captured_at: Instant,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        Self::captured(data, width, height, index, Instant::now())
    }

    pub fn captured(
        data: Vec<u8>,
        width: u32,
        height: u32,
        index: usize,
        captured_at: Instant,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
            captured_at,
        }
    }

    /// Wraps an `image` buffer, keeping the supplied index and timestamp.
    pub fn from_rgb_image(image: RgbImage, index: usize, captured_at: Instant) -> Self {
        let (width, height) = image.dimensions();
        Self::captured(image.into_raw(), width, height, index, captured_at)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the frame into an `image` buffer for drawing and resizing.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Frame data length must match dimensions")
    }

    /// Returns a horizontally flipped copy (selfie view).
    pub fn mirrored(&self) -> Frame {
        let data: Vec<u8> = self
            .as_ndarray()
            .slice(s![.., ..;-1, ..])
            .iter()
            .copied()
            .collect();
        Frame::captured(data, self.width, self.height, self.index, self.captured_at)
    }

    /// Returns a copy of the pixels in `[x0, x1) × [y0, y1)`.
    ///
    /// The bounds are clamped to the frame.
    pub fn crop(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        let data: Vec<u8> = self
            .as_ndarray()
            .slice(s![y0 as usize..y1 as usize, x0 as usize..x1 as usize, ..])
            .iter()
            .copied()
            .collect();
        RgbImage::from_raw(x1 - x0, y1 - y0, data).unwrap_or_default()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}
