//! Escalation chain and crop geometry.
//!
//! Strategies run in list order; the first one that accepts a box ends the
//! chain, and a stage may also end it early with the whole-image fallback.
//! Nothing is retried and no state survives the call.

use log::{debug, warn};

use crate::advanced::AdvancedStrategy;
use crate::buffer::IntensityBuffer;
use crate::cancel::CancelToken;
use crate::confidence::{self, ConfidenceBand};
use crate::config::DetectorConfig;
use crate::error::SigCropError;
use crate::extract::TargetSize;
use crate::geometry::{
    clamp_manual, expand_with_margin, validate_crop, BoundingBox, Dimensions, ManualBox,
};
use crate::grid::GridStrategy;
use crate::primary::PrimaryStrategy;
use crate::result::CropResult;
use crate::strategy::{DetectionStrategy, Verdict};
use crate::trace::{CropSource, DetectionTrace, StageRecord, StageVerdict};

/// Primary → Advanced → Grid, parameterised by `config`.
pub(crate) fn default_chain(config: &DetectorConfig) -> Vec<Box<dyn DetectionStrategy>> {
    vec![
        Box::new(PrimaryStrategy::new(config.primary.clone())),
        Box::new(AdvancedStrategy::new(config.advanced.clone())),
        Box::new(GridStrategy::new(config.grid.clone())),
    ]
}

/// Run the chain and return the accepted box, or the whole image.
pub(crate) fn locate(
    strategies: &[Box<dyn DetectionStrategy>],
    buffer: &IntensityBuffer<'_>,
    cancel: &CancelToken,
) -> Result<(BoundingBox, DetectionTrace), SigCropError> {
    let dims = buffer.dimensions();
    let mut trace = DetectionTrace::default();

    for strategy in strategies {
        cancel.check()?;
        let detection = strategy.detect(buffer, cancel)?;

        let verdict = match detection.verdict {
            Verdict::Accept { .. } => StageVerdict::Accepted,
            Verdict::Escalate => StageVerdict::Escalated,
            Verdict::WholeImage => StageVerdict::WholeImage,
        };
        trace.stages.push(StageRecord {
            stage: strategy.name().to_string(),
            verdict,
            attempts: detection.attempts,
        });

        match detection.verdict {
            Verdict::Accept { bounds, threshold } => {
                let bounds = validate_crop(bounds, dims)?;
                trace.source = CropSource::Detected;
                trace.accepted_by = Some(strategy.name().to_string());
                trace.accepted_threshold = threshold;
                return Ok((bounds, trace));
            }
            Verdict::Escalate => continue,
            Verdict::WholeImage => break,
        }
    }

    debug!("no stage isolated a region in {}x{}", dims.width, dims.height);
    trace.source = CropSource::WholeImage;
    Ok((BoundingBox::whole(dims), trace))
}

/// Automatic path: locate, add the margin, validate, score.
pub(crate) fn auto_crop(
    strategies: &[Box<dyn DetectionStrategy>],
    config: &DetectorConfig,
    buffer: &IntensityBuffer<'_>,
    cancel: &CancelToken,
) -> Result<CropResult, SigCropError> {
    let dims = buffer.dimensions();
    let (bounds, trace) = locate(strategies, buffer, cancel)?;

    let expanded = expand_with_margin(bounds, dims, config.crop.margin_ratio);
    let crop_box = validate_crop(expanded, dims).inspect_err(|_| {
        warn!("margin expansion of {bounds:?} produced {expanded:?} outside {dims:?}");
    })?;

    let breakdown = confidence::score(&bounds, dims);
    let band = ConfidenceBand::classify(breakdown.score, &config.confidence);

    let message = match trace.accepted_by.as_deref() {
        Some(stage) => format!("signature located by {stage} stage ({})", band.describe()),
        None => format!(
            "no signature region isolated, using whole image ({})",
            band.describe()
        ),
    };
    debug!(
        "auto crop {crop_box:?} from {bounds:?}, confidence {:.3} ({band:?})",
        breakdown.score
    );

    Ok(CropResult {
        success: true,
        original_dimensions: dims,
        cropped_dimensions: crop_box.dimensions(),
        crop_box,
        confidence: breakdown.score,
        band,
        needs_manual_adjustment: band.needs_manual_adjustment(),
        message,
        trace,
    })
}

/// Manual path: clamp the caller's box and trust it.
pub(crate) fn manual_crop(
    dims: Dimensions,
    manual: ManualBox,
    target: Option<TargetSize>,
) -> CropResult {
    let crop_box = clamp_manual(manual, dims);
    debug!("manual box {manual:?} -> {crop_box:?}");

    let cropped_dimensions = target
        .map(TargetSize::dimensions)
        .unwrap_or_else(|| crop_box.dimensions());

    CropResult {
        success: true,
        original_dimensions: dims,
        cropped_dimensions,
        crop_box,
        confidence: 1.0,
        band: ConfidenceBand::High,
        needs_manual_adjustment: false,
        message: "manual crop applied".into(),
        trace: DetectionTrace::manual(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill, page};

    struct Fixed(Verdict);

    impl DetectionStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(
            &self,
            _buffer: &IntensityBuffer<'_>,
            _cancel: &CancelToken,
        ) -> Result<crate::strategy::Detection, SigCropError> {
            Ok(crate::strategy::Detection::new(self.0, Vec::new()))
        }
    }

    struct Panics;

    impl DetectionStrategy for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        fn detect(
            &self,
            _buffer: &IntensityBuffer<'_>,
            _cancel: &CancelToken,
        ) -> Result<crate::strategy::Detection, SigCropError> {
            panic!("stage after an accepting stage must not run");
        }
    }

    fn blank() -> Vec<u8> {
        page(200, 100, 255)
    }

    #[test]
    fn first_accepting_stage_wins() {
        let data = blank();
        let buffer = IntensityBuffer::new(&data, 200, 100).unwrap();
        let chain: Vec<Box<dyn DetectionStrategy>> = vec![
            Box::new(Fixed(Verdict::Escalate)),
            Box::new(Fixed(Verdict::Accept {
                bounds: BoundingBox::new(10, 10, 50, 20),
                threshold: Some(7),
            })),
            Box::new(Panics),
        ];
        let (bounds, trace) = locate(&chain, &buffer, &CancelToken::new()).unwrap();
        assert_eq!(bounds, BoundingBox::new(10, 10, 50, 20));
        assert_eq!(trace.stages.len(), 2);
        assert_eq!(trace.stages[0].verdict, StageVerdict::Escalated);
        assert_eq!(trace.accepted_threshold, Some(7));
        assert_eq!(trace.source, CropSource::Detected);
    }

    #[test]
    fn whole_image_verdict_stops_the_chain() {
        let data = blank();
        let buffer = IntensityBuffer::new(&data, 200, 100).unwrap();
        let chain: Vec<Box<dyn DetectionStrategy>> =
            vec![Box::new(Fixed(Verdict::WholeImage)), Box::new(Panics)];
        let (bounds, trace) = locate(&chain, &buffer, &CancelToken::new()).unwrap();
        assert_eq!(bounds, BoundingBox::new(0, 0, 200, 100));
        assert_eq!(trace.source, CropSource::WholeImage);
        assert_eq!(trace.accepted_by, None);
    }

    #[test]
    fn exhausted_chain_uses_whole_image() {
        let data = blank();
        let buffer = IntensityBuffer::new(&data, 200, 100).unwrap();
        let chain: Vec<Box<dyn DetectionStrategy>> = vec![Box::new(Fixed(Verdict::Escalate))];
        let (bounds, _) = locate(&chain, &buffer, &CancelToken::new()).unwrap();
        assert_eq!(bounds, BoundingBox::whole(buffer.dimensions()));
    }

    #[test]
    fn out_of_bounds_acceptance_is_a_hard_failure() {
        let data = blank();
        let buffer = IntensityBuffer::new(&data, 200, 100).unwrap();
        let chain: Vec<Box<dyn DetectionStrategy>> = vec![Box::new(Fixed(Verdict::Accept {
            bounds: BoundingBox::new(150, 0, 100, 10),
            threshold: None,
        }))];
        let err = auto_crop(&chain, &DetectorConfig::default(), &buffer, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, SigCropError::InvalidGeometry { .. }));
    }

    #[test]
    fn auto_crop_adds_margin_and_scores_detection() {
        let mut data = page(800, 600, 255);
        fill(&mut data, 800, BoundingBox::new(200, 300, 300, 100), 0);
        let buffer = IntensityBuffer::new(&data, 800, 600).unwrap();
        let config = DetectorConfig::default();
        let result = auto_crop(
            &default_chain(&config),
            &config,
            &buffer,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(result.crop_box, BoundingBox::new(195, 295, 310, 110));
        assert_eq!(result.cropped_dimensions, Dimensions::new(310, 110));
        // 300x100 on 800x600: reduction 0.9375 -> clamped to 1.
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.band, ConfidenceBand::High);
        assert!(!result.needs_manual_adjustment);
        assert_eq!(result.trace.accepted_by.as_deref(), Some("primary"));
    }

    #[test]
    fn medium_band_is_reported_without_manual_flag() {
        let data = blank();
        let buffer = IntensityBuffer::new(&data, 200, 100).unwrap();
        // 120x100 of 200x100: reduction 0.4, no bonus -> 0.24 + 0.3 + 0.1.
        let chain: Vec<Box<dyn DetectionStrategy>> = vec![Box::new(Fixed(Verdict::Accept {
            bounds: BoundingBox::new(40, 0, 120, 100),
            threshold: None,
        }))];
        let result = auto_crop(&chain, &DetectorConfig::default(), &buffer, &CancelToken::new())
            .unwrap();
        assert!((result.confidence - 0.64).abs() < 1e-9);
        assert_eq!(result.band, ConfidenceBand::Medium);
        assert!(!result.needs_manual_adjustment);
        assert!(result.message.contains("verification recommended"));
    }

    #[test]
    fn cancelled_chain_fails() {
        let data = blank();
        let buffer = IntensityBuffer::new(&data, 200, 100).unwrap();
        let token = CancelToken::new();
        token.cancel();
        let config = DetectorConfig::default();
        let err = auto_crop(&default_chain(&config), &config, &buffer, &token).unwrap_err();
        assert!(matches!(err, SigCropError::Cancelled));
    }

    #[test]
    fn manual_crop_reports_target_dimensions() {
        let target = TargetSize::new(120, 60).unwrap();
        let result = manual_crop(
            Dimensions::new(1000, 800),
            ManualBox::new(10, 10, 300, 100),
            Some(target),
        );
        assert_eq!(result.crop_box, BoundingBox::new(10, 10, 300, 100));
        assert_eq!(result.cropped_dimensions, Dimensions::new(120, 60));
        assert_eq!(result.band, ConfidenceBand::High);
        assert_eq!(result.trace.source, CropSource::Manual);
    }
}
