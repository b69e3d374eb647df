//! Geometry-based reliability score for an automatic crop.
//!
//! The score rewards boxes that remove most of the page, have a plausible
//! signature elongation and are not vanishingly small.

use serde::Serialize;

use crate::config::ConfidenceOptions;
use crate::geometry::{BoundingBox, Dimensions};

const AREA_WEIGHT: f64 = 0.6;
const ASPECT_WEIGHT: f64 = 0.3;
const SIZE_WEIGHT: f64 = 0.1;

/// Bonus added once the box removes more than half of the page.
const REDUCTION_BONUS: f64 = 0.2;
const REDUCTION_BONUS_ABOVE: f64 = 0.5;

const MIN_ASPECT: f64 = 0.3;
const MAX_ASPECT: f64 = 10.0;

/// Boxes at or below this fraction of the page get the reduced size score.
const MIN_AREA_FRACTION: f64 = 0.01;

const PENALTY_SCORE: f64 = 0.5;

/// Individual terms of a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceBreakdown {
    /// `1 − boxArea / imageArea`.
    pub area_reduction: f64,
    /// 1.0 for a plausible aspect ratio, 0.5 otherwise.
    pub aspect_score: f64,
    /// 1.0 unless the box is tiny relative to the page.
    pub size_score: f64,
    /// Final clamped score.
    pub score: f64,
}

/// Trust level derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// Crop can be used as is.
    High,
    /// Crop is probably right; a human should glance at it.
    Medium,
    /// Crop needs manual adjustment.
    Low,
}

impl ConfidenceBand {
    /// Band of `score` under the given boundaries.
    pub fn classify(score: f64, options: &ConfidenceOptions) -> Self {
        if score >= options.high {
            Self::High
        } else if score >= options.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Whether a result in this band should be flagged for manual adjustment.
    pub fn needs_manual_adjustment(self) -> bool {
        self == Self::Low
    }

    /// Short description used in result messages.
    pub fn describe(self) -> &'static str {
        match self {
            Self::High => "high precision",
            Self::Medium => "verification recommended",
            Self::Low => "manual adjustment recommended",
        }
    }
}

/// Weighted combination of the three terms, clamped to `[0, 1]`.
pub fn combine(area_reduction: f64, aspect_score: f64, size_score: f64) -> f64 {
    let mut score =
        AREA_WEIGHT * area_reduction + ASPECT_WEIGHT * aspect_score + SIZE_WEIGHT * size_score;
    if area_reduction > REDUCTION_BONUS_ABOVE {
        score += REDUCTION_BONUS;
    }
    score.clamp(0.0, 1.0)
}

/// Score the accepted detection box against the full image.
pub fn score(bbox: &BoundingBox, image: Dimensions) -> ConfidenceBreakdown {
    let image_area = image.area().max(1) as f64;
    let box_area = bbox.area() as f64;

    let area_reduction = 1.0 - box_area / image_area;

    let aspect = bbox.aspect_ratio();
    let aspect_score = if aspect > MIN_ASPECT && aspect < MAX_ASPECT {
        1.0
    } else {
        PENALTY_SCORE
    };

    let size_score = if box_area > MIN_AREA_FRACTION * image_area {
        1.0
    } else {
        PENALTY_SCORE
    };

    ConfidenceBreakdown {
        area_reduction,
        aspect_score,
        size_score,
        score: combine(area_reduction, aspect_score, size_score),
    }
}
