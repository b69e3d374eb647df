use serde::Serialize;

use crate::confidence::ConfidenceBand;
use crate::error::SigCropError;
use crate::geometry::{BoundingBox, Dimensions};
use crate::trace::DetectionTrace;

/// Outcome of one detection or manual crop call.
///
/// `success == false` only for hard failures (unreadable dimensions, invalid
/// geometry, cancellation). A page with no detectable ink still succeeds
/// with the whole image and a low confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropResult {
    /// Whether a crop region was produced.
    pub success: bool,
    /// Size of the input image; zero when it could not be read.
    pub original_dimensions: Dimensions,
    /// Size of the output image (the target size when one was requested).
    pub cropped_dimensions: Dimensions,
    /// Region of the input to extract.
    pub crop_box: BoundingBox,
    /// Reliability score in `[0, 1]`.
    pub confidence: f64,
    /// Trust band of `confidence`.
    pub band: ConfidenceBand,
    /// Whether a human should adjust the crop.
    pub needs_manual_adjustment: bool,
    /// Summary of the outcome or the failure.
    pub message: String,
    /// Which stages ran and why the box was chosen.
    pub trace: DetectionTrace,
}

impl CropResult {
    /// A failed result carrying the error's message.
    pub fn failure(original_dimensions: Dimensions, error: &SigCropError) -> Self {
        Self {
            success: false,
            original_dimensions,
            cropped_dimensions: Dimensions::default(),
            crop_box: BoundingBox::default(),
            confidence: 0.0,
            band: ConfidenceBand::Low,
            needs_manual_adjustment: true,
            message: error.to_string(),
            trace: DetectionTrace::default(),
        }
    }
}
