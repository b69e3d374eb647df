use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageEncoder, Luma};

use crate::buffer::IntensityBuffer;
use crate::error::SigCropError;
use crate::geometry::{validate_crop, BoundingBox, Dimensions};
use crate::OutputFormat;

/// Exact output size for a resized crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize {
    width: u32,
    height: u32,
}

impl TargetSize {
    /// Both sides must be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, SigCropError> {
        if width == 0 || height == 0 {
            return Err(SigCropError::InvalidTargetSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// Target width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Target height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The target as [`Dimensions`].
    pub fn dimensions(self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Pixel extraction backend.
///
/// The detection engine only computes geometry; turning a region into
/// pixels is delegated here so callers can substitute their own resampler.
pub trait RegionExtractor: Send + Sync {
    /// Copy `region` out of `buffer`, optionally fitting it into `target`.
    fn extract(
        &self,
        buffer: &IntensityBuffer<'_>,
        region: &BoundingBox,
        target: Option<TargetSize>,
    ) -> Result<GrayImage, SigCropError>;
}

/// [`RegionExtractor`] backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct ImageExtractor {
    filter: FilterType,
    background: u8,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            background: 255,
        }
    }
}

impl ImageExtractor {
    /// Lanczos3 resampling on a white background.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resampling filter.
    pub fn filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Set the intensity used to pad contain-fit output.
    pub fn background(mut self, background: u8) -> Self {
        self.background = background;
        self
    }
}

impl RegionExtractor for ImageExtractor {
    fn extract(
        &self,
        buffer: &IntensityBuffer<'_>,
        region: &BoundingBox,
        target: Option<TargetSize>,
    ) -> Result<GrayImage, SigCropError> {
        let cropped = copy_region(buffer, *region)?;
        Ok(match target {
            Some(target) => contain_fit(&cropped, target, self.background, self.filter),
            None => cropped,
        })
    }
}

/// Copy the pixels of `region` into a new image.
pub(crate) fn copy_region(
    buffer: &IntensityBuffer<'_>,
    region: BoundingBox,
) -> Result<GrayImage, SigCropError> {
    let region = validate_crop(region, buffer.dimensions())?;
    let (left, right) = (region.left as usize, region.right() as usize);

    let mut pixels = Vec::with_capacity(region.area() as usize);
    for y in region.top..region.bottom() {
        pixels.extend_from_slice(&buffer.row(y)[left..right]);
    }

    GrayImage::from_raw(region.width, region.height, pixels).ok_or(SigCropError::InvalidGeometry {
        region,
        width: buffer.width(),
        height: buffer.height(),
    })
}

/// Scale `image` to fit inside `target` keeping its aspect ratio, centred
/// on a canvas of exactly `target` filled with `background`.
pub fn contain_fit(
    image: &GrayImage,
    target: TargetSize,
    background: u8,
    filter: FilterType,
) -> GrayImage {
    let (src_w, src_h) = image.dimensions();
    let scale = f64::min(
        f64::from(target.width) / f64::from(src_w),
        f64::from(target.height) / f64::from(src_h),
    );
    let fit_w = ((f64::from(src_w) * scale).round() as u32).clamp(1, target.width);
    let fit_h = ((f64::from(src_h) * scale).round() as u32).clamp(1, target.height);

    let resized = imageops::resize(image, fit_w, fit_h, filter);
    let mut canvas = GrayImage::from_pixel(target.width, target.height, Luma([background]));
    let x = (target.width - fit_w) / 2;
    let y = (target.height - fit_h) / 2;
    imageops::overlay(&mut canvas, &resized, i64::from(x), i64::from(y));
    canvas
}

/// Shrink `image` so its larger side is at most `max_dimension`. Never
/// enlarges.
pub(crate) fn fit_within(image: &GrayImage, max_dimension: u32, filter: FilterType) -> GrayImage {
    let (src_w, src_h) = image.dimensions();
    if src_w.max(src_h) <= max_dimension {
        return image.clone();
    }

    let (new_w, new_h) = if src_w >= src_h {
        let h = ((f64::from(src_h) / f64::from(src_w)) * f64::from(max_dimension)).round() as u32;
        (max_dimension, h.max(1))
    } else {
        let w = ((f64::from(src_w) / f64::from(src_h)) * f64::from(max_dimension)).round() as u32;
        (w.max(1), max_dimension)
    };

    imageops::resize(image, new_w, new_h, filter)
}

/// Encode a grayscale image. `quality` (0.0 to 1.0) only affects JPEG.
pub fn encode_gray(
    image: &GrayImage,
    format: OutputFormat,
    quality: f32,
) -> Result<Vec<u8>, SigCropError> {
    if !(0.0..=1.0).contains(&quality) {
        return Err(SigCropError::InvalidQuality(quality));
    }

    let mut buffer = Vec::new();
    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    image::ExtendedColorType::L8,
                )
                .map_err(|e| SigCropError::EncodeError(e.to_string()))?;
        }
        OutputFormat::Jpeg => {
            let quality_percent = ((quality * 100.0).round() as u8).max(1);
            JpegEncoder::new_with_quality(&mut buffer, quality_percent)
                .write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    image::ExtendedColorType::L8,
                )
                .map_err(|e| SigCropError::EncodeError(e.to_string()))?;
        }
    }
    Ok(buffer)
}

/// Decode PNG or JPEG bytes and convert to 8-bit grayscale.
pub fn decode_grayscale(input: &[u8]) -> Result<GrayImage, SigCropError> {
    let decoded =
        image::load_from_memory(input).map_err(|e| SigCropError::DecodeError(e.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(SigCropError::ZeroDimensions);
    }
    Ok(decoded.to_luma8())
}
