//! Signature localization: find the handwritten signature on a scanned page,
//! crop it, and say how far the automatic crop can be trusted.
//!
//! Detection is an escalation chain over a grayscale intensity buffer:
//! a single-threshold scan, then a multi-threshold scan for faint ink, then a
//! coarse cell-density sampler, and finally the whole image. Every result
//! carries a confidence score and a structured trace of the stages that ran.
//!
//! # Example
//!
//! ```no_run
//! use sigcrop::SignatureCropper;
//!
//! let raw_bytes = std::fs::read("contract.png").unwrap();
//! let cropped = SignatureCropper::new().crop_image(&raw_bytes).unwrap();
//! if cropped.result.needs_manual_adjustment {
//!     println!("review: {}", cropped.result.message);
//! }
//! std::fs::write("signature.png", &cropped.data).unwrap();
//! ```
#![warn(missing_docs)]

mod advanced;
mod buffer;
mod cancel;
/// Confidence scoring and bands.
pub mod confidence;
/// Engine configuration.
pub mod config;
mod error;
mod extract;
mod geometry;
mod grid;
mod orchestrator;
mod pool;
mod primary;
mod result;
mod scan;
mod strategy;
#[cfg(test)]
mod test_utils;
mod trace;

use std::time::Duration;

use image::imageops::FilterType;
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Multi-threshold stage.
pub use advanced::AdvancedStrategy;
/// Borrowed grayscale input.
pub use buffer::IntensityBuffer;
/// Cooperative cancellation.
pub use cancel::CancelToken;
/// Score bands.
pub use confidence::{ConfidenceBand, ConfidenceBreakdown};
/// Top-level configuration and loader.
pub use config::{load_config, DetectorConfig};
/// Error type returned by sigcrop operations.
pub use error::SigCropError;
/// Pixel extraction, resizing and codecs.
pub use extract::{
    contain_fit, decode_grayscale, encode_gray, ImageExtractor, RegionExtractor, TargetSize,
};
/// Geometry types.
pub use geometry::{BoundingBox, Dimensions, ManualBox};
/// Grid density stage.
pub use grid::{DensityStats, GridCell, GridStrategy};
/// Bounded worker pool.
pub use pool::DetectionPool;
/// Single-threshold stage.
pub use primary::PrimaryStrategy;
/// Per-call result.
pub use result::CropResult;
/// Strategy trait and verdicts.
pub use strategy::{Detection, DetectionStrategy, Verdict};
/// Structured trace.
pub use trace::{Attempt, CropSource, DetectionTrace, StageRecord, StageVerdict};

/// Encoding for extracted crops and previews.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG; what the forensic pipeline expects.
    #[default]
    Png,

    /// JPEG, smaller and lossy.
    Jpeg,
}

/// A crop together with its encoded pixels.
#[derive(Debug, Clone)]
pub struct CroppedSignature {
    /// Geometry, confidence and trace.
    pub result: CropResult,

    /// Encoded image bytes.
    pub data: Vec<u8>,

    /// Encoding of `data`.
    pub format: OutputFormat,

    /// Width of the encoded image.
    pub width: u32,

    /// Height of the encoded image.
    pub height: u32,

    /// Size of the input in bytes.
    pub original_size: usize,
}

/// A low-resolution rendering of a crop for on-screen confirmation.
#[derive(Debug, Clone)]
pub struct Preview {
    /// Geometry, confidence and trace of the previewed crop.
    pub result: CropResult,

    /// Encoded preview bytes.
    pub data: Vec<u8>,

    /// Encoding of `data`.
    pub format: OutputFormat,

    /// Preview width.
    pub width: u32,

    /// Preview height.
    pub height: u32,
}

/// Builder and entry point for signature detection.
///
/// Holds the configuration, the detection chain and the pixel extractor.
/// A cropper is immutable once built and can be shared across threads.
pub struct SignatureCropper {
    config: DetectorConfig,
    /// Detection chain, rebuilt from `config` unless replaced by the caller.
    strategies: Vec<Box<dyn DetectionStrategy>>,
    custom_chain: bool,
    extractor: Box<dyn RegionExtractor>,
    format: OutputFormat,
    quality: f32,
    target_size: Option<TargetSize>,
}

impl Default for SignatureCropper {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureCropper {
    /// A cropper with the default configuration, PNG output and no resize.
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    /// A cropper using `config` for every stage.
    ///
    /// The configuration is checked with [`DetectorConfig::validate`] on
    /// every detection call; an invalid one fails the call instead of
    /// reaching the stages.
    pub fn with_config(config: DetectorConfig) -> Self {
        Self {
            strategies: orchestrator::default_chain(&config),
            config,
            custom_chain: false,
            extractor: Box::new(ImageExtractor::default()),
            format: OutputFormat::default(),
            quality: 0.9,
            target_size: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self.rebuild_chain();
        self
    }

    /// Set the margin added around detections, as a fraction of the shorter
    /// box side (default: 0.05).
    pub fn margin_ratio(mut self, ratio: f64) -> Self {
        self.config.crop.margin_ratio = ratio;
        self
    }

    /// Abort any single call that runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.runtime.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the encoding for [`SignatureCropper::crop_image`] (default: PNG).
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the JPEG quality from 0.0 to 1.0 (default: 0.9).
    pub fn quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    /// Resize extracted crops to exactly `target`, contain-fit on a white
    /// background.
    pub fn target_size(mut self, target: TargetSize) -> Self {
        self.target_size = Some(target);
        self
    }

    /// Replace the detection chain. Strategies run in the given order.
    ///
    /// ```no_run
    /// use sigcrop::{GridStrategy, PrimaryStrategy, SignatureCropper};
    ///
    /// // Skip the multi-threshold stage entirely.
    /// let cropper = SignatureCropper::new().strategies(vec![
    ///     Box::new(PrimaryStrategy::default()),
    ///     Box::new(GridStrategy::default()),
    /// ]);
    /// ```
    pub fn strategies(mut self, strategies: Vec<Box<dyn DetectionStrategy>>) -> Self {
        self.strategies = strategies;
        self.custom_chain = true;
        self
    }

    /// Provide a custom pixel extraction backend.
    pub fn region_extractor(mut self, extractor: Box<dyn RegionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// The active configuration.
    pub fn detector_config(&self) -> &DetectorConfig {
        &self.config
    }

    fn rebuild_chain(&mut self) {
        if !self.custom_chain {
            self.strategies = orchestrator::default_chain(&self.config);
        }
    }

    /// A fresh token honouring the configured timeout.
    fn call_token(&self) -> CancelToken {
        match self.config.runtime.timeout() {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        }
    }

    /// Locate the signature automatically.
    ///
    /// Hard failures (missing dimensions, a buffer of the wrong size,
    /// invalid geometry, timeout) come back as `success == false`.
    pub fn detect_auto(&self, buffer: &[u8], width: u32, height: u32) -> CropResult {
        self.detect_auto_with(buffer, width, height, &self.call_token())
    }

    /// [`SignatureCropper::detect_auto`] with a caller-owned cancel token.
    pub fn detect_auto_with(
        &self,
        buffer: &[u8],
        width: u32,
        height: u32,
        cancel: &CancelToken,
    ) -> CropResult {
        match self.try_detect_auto(buffer, width, height, cancel) {
            Ok(result) => result,
            Err(e) => {
                debug!("auto detection failed: {e}");
                CropResult::failure(known_dimensions(buffer, width, height), &e)
            }
        }
    }

    /// Run automatic detection on a decoded grayscale image.
    pub fn detect_image(&self, image: &GrayImage) -> CropResult {
        self.detect_auto(image.as_raw(), image.width(), image.height())
    }

    fn try_detect_auto(
        &self,
        buffer: &[u8],
        width: u32,
        height: u32,
        cancel: &CancelToken,
    ) -> Result<CropResult, SigCropError> {
        self.config.validate()?;
        let buffer = IntensityBuffer::new(buffer, width, height)?;
        orchestrator::auto_crop(&self.strategies, &self.config, &buffer, cancel)
    }

    /// Use a caller-supplied crop box.
    ///
    /// Out-of-range coordinates are clamped into the image rather than
    /// rejected, and the result is always fully trusted (`confidence` 1.0).
    /// Fails only when the image itself is unreadable.
    pub fn crop_manual(
        &self,
        buffer: &[u8],
        width: u32,
        height: u32,
        manual: ManualBox,
        target: Option<TargetSize>,
    ) -> CropResult {
        match IntensityBuffer::new(buffer, width, height) {
            Ok(buffer) => orchestrator::manual_crop(buffer.dimensions(), manual, target),
            Err(e) => CropResult::failure(Dimensions::default(), &e),
        }
    }

    /// Render a small preview of the crop that `detect_auto` (or, with a
    /// box, `crop_manual`) would produce.
    pub fn preview(
        &self,
        buffer: &[u8],
        width: u32,
        height: u32,
        manual: Option<ManualBox>,
    ) -> Result<Preview, SigCropError> {
        self.config.validate()?;
        let intensity = IntensityBuffer::new(buffer, width, height)?;
        let result = match manual {
            Some(manual) => orchestrator::manual_crop(intensity.dimensions(), manual, None),
            None => orchestrator::auto_crop(
                &self.strategies,
                &self.config,
                &intensity,
                &self.call_token(),
            )?,
        };

        let options = &self.config.preview;
        let cropped = self.extractor.extract(&intensity, &result.crop_box, None)?;
        let small = extract::fit_within(&cropped, options.max_dimension, FilterType::Triangle);
        let data = encode_gray(&small, options.format, options.quality)?;

        Ok(Preview {
            result,
            data,
            format: options.format,
            width: small.width(),
            height: small.height(),
        })
    }

    /// Decode `input`, detect the signature, extract and encode the crop.
    pub fn crop_image(&self, input: &[u8]) -> Result<CroppedSignature, SigCropError> {
        self.config.validate()?;
        let gray = decode_grayscale(input)?;
        let intensity = IntensityBuffer::from_gray(&gray)?;
        let mut result = orchestrator::auto_crop(
            &self.strategies,
            &self.config,
            &intensity,
            &self.call_token(),
        )?;
        if let Some(target) = self.target_size {
            result.cropped_dimensions = target.dimensions();
        }
        self.render(input.len(), &intensity, result)
    }

    /// Decode `input` and extract a caller-supplied box.
    pub fn crop_image_manual(
        &self,
        input: &[u8],
        manual: ManualBox,
    ) -> Result<CroppedSignature, SigCropError> {
        let gray = decode_grayscale(input)?;
        let intensity = IntensityBuffer::from_gray(&gray)?;
        let result = orchestrator::manual_crop(intensity.dimensions(), manual, self.target_size);
        self.render(input.len(), &intensity, result)
    }

    fn render(
        &self,
        original_size: usize,
        intensity: &IntensityBuffer<'_>,
        result: CropResult,
    ) -> Result<CroppedSignature, SigCropError> {
        let pixels = self
            .extractor
            .extract(intensity, &result.crop_box, self.target_size)?;
        let data = encode_gray(&pixels, self.format, self.quality)?;

        Ok(CroppedSignature {
            result,
            data,
            format: self.format,
            width: pixels.width(),
            height: pixels.height(),
            original_size,
        })
    }
}

/// Dimensions to report on failure: zero when the metadata itself is bad.
fn known_dimensions(buffer: &[u8], width: u32, height: u32) -> Dimensions {
    if width > 0 && height > 0 && buffer.len() == width as usize * height as usize {
        Dimensions::new(width, height)
    } else {
        Dimensions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill, page};
    use image::{ImageEncoder, Luma};

    fn make_test_png(width: u32, height: u32, ink: BoundingBox) -> Vec<u8> {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for y in ink.top..ink.bottom() {
            for x in ink.left..ink.right() {
                img.put_pixel(x, y, Luma([10]));
            }
        }
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::L8)
            .unwrap();
        buffer
    }

    #[test]
    fn detect_auto_finds_block() {
        let mut data = page(600, 400, 255);
        fill(&mut data, 600, BoundingBox::new(100, 250, 200, 60), 30);
        let result = SignatureCropper::new().detect_auto(&data, 600, 400);
        assert!(result.success);
        assert_eq!(result.crop_box, BoundingBox::new(97, 247, 206, 66));
        assert_eq!(result.trace.source, CropSource::Detected);
    }

    #[test]
    fn zero_dimensions_fail_softly() {
        let result = SignatureCropper::new().detect_auto(&[], 0, 0);
        assert!(!result.success);
        assert_eq!(result.original_dimensions, Dimensions::default());
        assert_eq!(result.band, ConfidenceBand::Low);
        assert!(result.message.contains("dimensions"));
    }

    #[test]
    fn mismatched_buffer_fails_with_zeroed_dimensions() {
        let result = SignatureCropper::new().detect_auto(&[255; 10], 5, 5);
        assert!(!result.success);
        assert_eq!(result.original_dimensions, Dimensions::default());
    }

    #[test]
    fn expired_timeout_fails() {
        let data = page(300, 300, 255);
        let token = CancelToken::new().deadline(std::time::Instant::now());
        let result = SignatureCropper::new().detect_auto_with(&data, 300, 300, &token);
        assert!(!result.success);
        assert_eq!(result.original_dimensions, Dimensions::new(300, 300));
        assert!(result.message.contains("deadline"));
    }

    #[test]
    fn config_setter_rebuilds_default_chain() {
        let mut config = DetectorConfig::default();
        config.primary.threshold = 50;
        let mut data = page(400, 400, 255);
        // Ink at 100 is invisible to a threshold of 50.
        fill(&mut data, 400, BoundingBox::new(10, 10, 100, 50), 100);
        let result = SignatureCropper::new().config(config).detect_auto(&data, 400, 400);
        assert_eq!(result.trace.source, CropSource::WholeImage);
    }

    #[test]
    fn invalid_config_fails_the_call_instead_of_panicking() {
        let mut config = DetectorConfig::default();
        config.grid.cell_size = 0;
        let cropper = SignatureCropper::with_config(config);
        let data = page(3000, 3000, 255);

        let result = cropper.detect_auto(&data, 3000, 3000);
        assert!(!result.success);
        assert!(result.message.contains("cell_size"), "{}", result.message);
        assert_eq!(result.original_dimensions, Dimensions::new(3000, 3000));

        assert!(matches!(
            cropper.preview(&data, 3000, 3000, None),
            Err(SigCropError::Config(_))
        ));
    }

    #[test]
    fn negative_margin_set_through_builder_is_rejected() {
        let data = page(100, 100, 255);
        let result = SignatureCropper::new()
            .margin_ratio(-1.0)
            .detect_auto(&data, 100, 100);
        assert!(!result.success);
        assert!(result.message.contains("margin_ratio"));
    }

    #[test]
    fn crop_manual_on_bad_metadata_fails() {
        let result = SignatureCropper::new().crop_manual(&[], 0, 10, ManualBox::default(), None);
        assert!(!result.success);
    }

    #[test]
    fn preview_is_small() {
        let mut data = page(1200, 900, 255);
        fill(&mut data, 1200, BoundingBox::new(100, 600, 900, 200), 0);
        let preview = SignatureCropper::new().preview(&data, 1200, 900, None).unwrap();
        assert!(preview.width <= 300 && preview.height <= 300);
        assert_eq!(preview.format, OutputFormat::Jpeg);
        assert_eq!(preview.data[0], 0xFF);
        assert!(preview.result.success);
    }

    #[test]
    fn preview_with_manual_box_skips_detection() {
        let data = page(500, 500, 255);
        let preview = SignatureCropper::new()
            .preview(&data, 500, 500, Some(ManualBox::new(10, 10, 100, 50)))
            .unwrap();
        assert_eq!(preview.result.trace.source, CropSource::Manual);
        assert_eq!((preview.width, preview.height), (100, 50));
    }

    #[test]
    fn crop_image_png_round_trip() {
        let png = make_test_png(400, 300, BoundingBox::new(50, 200, 200, 40));
        let cropped = SignatureCropper::new().crop_image(&png).unwrap();
        assert_eq!(&cropped.data[1..4], b"PNG");
        assert_eq!(cropped.original_size, png.len());
        assert_eq!(
            (cropped.width, cropped.height),
            (cropped.result.crop_box.width, cropped.result.crop_box.height)
        );
    }

    #[test]
    fn crop_image_with_target_size() {
        let png = make_test_png(400, 300, BoundingBox::new(50, 200, 200, 40));
        let cropped = SignatureCropper::new()
            .target_size(TargetSize::new(128, 64).unwrap())
            .format(OutputFormat::Jpeg)
            .crop_image(&png)
            .unwrap();
        assert_eq!((cropped.width, cropped.height), (128, 64));
        assert_eq!(cropped.result.cropped_dimensions, Dimensions::new(128, 64));
        assert_eq!(cropped.data[0], 0xFF);
    }

    #[test]
    fn crop_image_rejects_invalid_input() {
        assert!(SignatureCropper::new().crop_image(b"not an image").is_err());
    }

    #[test]
    fn crop_image_manual_clamps() {
        let png = make_test_png(400, 300, BoundingBox::new(50, 200, 200, 40));
        let cropped = SignatureCropper::new()
            .crop_image_manual(&png, ManualBox::new(-10, -10, 5000, 100))
            .unwrap();
        assert_eq!((cropped.width, cropped.height), (400, 100));
        assert_eq!(cropped.result.confidence, 1.0);
    }
}
