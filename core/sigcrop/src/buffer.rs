use image::GrayImage;

use crate::error::SigCropError;
use crate::geometry::Dimensions;

/// Borrowed, row-major 8-bit intensity image (0 = ink, 255 = paper).
///
/// The view is validated on construction: both dimensions are non-zero and
/// the slice holds exactly `width × height` bytes.
#[derive(Debug, Clone, Copy)]
pub struct IntensityBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> IntensityBuffer<'a> {
    /// Wrap a tightly packed grayscale buffer.
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self, SigCropError> {
        if width == 0 || height == 0 {
            return Err(SigCropError::ZeroDimensions);
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(SigCropError::BufferSizeMismatch {
                expected,
                actual: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Borrow the pixels of an already decoded grayscale image.
    pub fn from_gray(image: &'a GrayImage) -> Result<Self, SigCropError> {
        Self::new(image.as_raw(), image.width(), image.height())
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image dimensions.
    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// One row of pixels.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }
}
