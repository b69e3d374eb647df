//! Tunable parameters for every detection stage.
//!
//! The defaults reproduce the behaviour the engine was calibrated with on
//! A4/letter document scans. They are empirical; inputs far from that
//! domain (phone photos, receipts) may need different values.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SigCropError;
use crate::OutputFormat;

/// Single-threshold full scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryOptions {
    /// Pixels strictly darker than this are ink.
    pub threshold: u8,
    /// Images wider than this skip straight to the multi-threshold stage.
    pub large_width: u32,
    /// Images taller than this skip straight to the multi-threshold stage.
    pub large_height: u32,
    /// A box covering more than this fraction of the image is treated as
    /// page noise and discarded.
    pub max_coverage: f64,
}

impl Default for PrimaryOptions {
    fn default() -> Self {
        Self {
            threshold: 240,
            large_width: 2000,
            large_height: 2500,
            max_coverage: 0.8,
        }
    }
}

/// Multi-threshold scan for faint or small signatures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedOptions {
    /// Thresholds tried in order; the first acceptable one wins.
    pub thresholds: Vec<u8>,
    /// The box must cover strictly less than this fraction of the image.
    pub max_area_ratio: f64,
    /// Dark pixels per box pixel must exceed this.
    pub min_density: f64,
    /// Dark pixel count must exceed this.
    pub min_dark_pixels: u64,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            thresholds: vec![245, 240, 235, 230],
            max_area_ratio: 0.9,
            min_density: 0.02,
            min_dark_pixels: 500,
        }
    }
}

/// Coarse cell-density sampler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Edge length of a square cell. Partial cells at the right and bottom
    /// edges are ignored. The envelope is widened by half a cell per side.
    pub cell_size: u32,
    /// Sampling step inside a cell, both axes.
    pub stride: u32,
    /// Samples strictly darker than this count as ink.
    pub threshold: u8,
    /// Minimum number of qualifying cells.
    pub min_cells: usize,
    /// Envelopes covering this fraction of the image or more are rejected.
    pub max_coverage: f64,
    /// Average density is multiplied by this to get the cell threshold.
    pub density_multiplier: f64,
    /// Lower bound for the cell threshold.
    pub density_floor: f64,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            cell_size: 100,
            stride: 5,
            threshold: 210,
            min_cells: 3,
            max_coverage: 0.8,
            density_multiplier: 3.0,
            density_floor: 0.15,
        }
    }
}

/// Geometry applied to an accepted detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    /// Margin per side as a fraction of the shorter box side.
    pub margin_ratio: f64,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self { margin_ratio: 0.05 }
    }
}

/// Score boundaries for the confidence bands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceOptions {
    /// Scores at or above this are high precision.
    pub high: f64,
    /// Scores below this need manual adjustment.
    pub medium: f64,
}

impl Default for ConfidenceOptions {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.6,
        }
    }
}

/// Low-resolution preview rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewOptions {
    /// The longer preview side never exceeds this.
    pub max_dimension: u32,
    /// Encoder quality, 0.0 to 1.0 (JPEG only).
    pub quality: f32,
    /// Encoding of the preview bytes.
    pub format: OutputFormat,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            max_dimension: 300,
            quality: 0.7,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Execution limits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Per-call deadline in milliseconds; `None` disables it.
    pub timeout_ms: Option<u64>,
    /// Worker threads for [`crate::DetectionPool`]; `0` lets rayon decide.
    pub worker_threads: usize,
}

impl RuntimeOptions {
    /// The configured deadline as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Single-threshold stage.
    pub primary: PrimaryOptions,
    /// Multi-threshold stage.
    pub advanced: AdvancedOptions,
    /// Grid density stage.
    pub grid: GridOptions,
    /// Margin applied to detections.
    pub crop: CropOptions,
    /// Confidence bands.
    pub confidence: ConfidenceOptions,
    /// Preview rendering.
    pub preview: PreviewOptions,
    /// Deadlines and worker threads.
    pub runtime: RuntimeOptions,
}

impl DetectorConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(contents: &str) -> Result<Self, SigCropError> {
        let config: DetectorConfig = serde_json::from_str(contents)
            .map_err(|e| SigCropError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parameters that would otherwise make a stage loop forever
    /// or divide by zero.
    pub fn validate(&self) -> Result<(), SigCropError> {
        if self.advanced.thresholds.is_empty() {
            return Err(SigCropError::Config(
                "advanced.thresholds must not be empty".into(),
            ));
        }
        if self.grid.cell_size == 0 {
            return Err(SigCropError::Config("grid.cell_size must be > 0".into()));
        }
        if self.grid.stride == 0 || self.grid.stride > self.grid.cell_size {
            return Err(SigCropError::Config(format!(
                "grid.stride must be in 1..={}, got {}",
                self.grid.cell_size, self.grid.stride
            )));
        }
        if !self.crop.margin_ratio.is_finite() || self.crop.margin_ratio < 0.0 {
            return Err(SigCropError::Config(format!(
                "crop.margin_ratio must be a non-negative number, got {}",
                self.crop.margin_ratio
            )));
        }
        if self.confidence.medium > self.confidence.high {
            return Err(SigCropError::Config(
                "confidence.medium must not exceed confidence.high".into(),
            ));
        }
        if self.preview.max_dimension == 0 {
            return Err(SigCropError::Config(
                "preview.max_dimension must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.preview.quality) {
            return Err(SigCropError::InvalidQuality(self.preview.quality));
        }
        Ok(())
    }
}

/// Load a JSON configuration file.
pub fn load_config(path: &Path) -> Result<DetectorConfig, SigCropError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| SigCropError::Config(format!("failed to read {}: {e}", path.display())))?;
    DetectorConfig::from_json_str(&contents)
}
