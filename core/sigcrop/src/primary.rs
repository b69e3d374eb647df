use log::debug;

use crate::buffer::IntensityBuffer;
use crate::cancel::CancelToken;
use crate::config::PrimaryOptions;
use crate::error::SigCropError;
use crate::scan::scan_dark;
use crate::strategy::{Detection, DetectionStrategy, Verdict};
use crate::trace::Attempt;

/// Single fixed-threshold scan over the whole image.
///
/// Full-page scans (either side above the large-image limits) are not
/// scanned at all: a signature is a small fraction of such a page and one
/// global threshold is unreliable there, so they escalate immediately.
#[derive(Debug, Clone, Default)]
pub struct PrimaryStrategy {
    options: PrimaryOptions,
}

impl PrimaryStrategy {
    /// Create the stage with the given parameters.
    pub fn new(options: PrimaryOptions) -> Self {
        Self { options }
    }

    /// Whether the image is treated as a full-page scan.
    pub fn is_large(&self, buffer: &IntensityBuffer<'_>) -> bool {
        buffer.width() > self.options.large_width || buffer.height() > self.options.large_height
    }
}

impl DetectionStrategy for PrimaryStrategy {
    fn name(&self) -> &'static str {
        "primary"
    }

    fn detect(
        &self,
        buffer: &IntensityBuffer<'_>,
        cancel: &CancelToken,
    ) -> Result<Detection, SigCropError> {
        let threshold = self.options.threshold;

        if self.is_large(buffer) {
            debug!(
                "primary: {}x{} is a full-page scan, escalating",
                buffer.width(),
                buffer.height()
            );
            return Ok(Detection::new(
                Verdict::Escalate,
                vec![Attempt::rejected(
                    None,
                    format!(
                        "image {}x{} exceeds {}x{}, full-page scan",
                        buffer.width(),
                        buffer.height(),
                        self.options.large_width,
                        self.options.large_height
                    ),
                )],
            ));
        }

        let scan = scan_dark(buffer, threshold, cancel)?;

        let Some(bounds) = scan.bounds else {
            // Small image with no ink at all: nothing more expensive is worth trying.
            debug!("primary: no pixel below {threshold}, using whole image");
            return Ok(Detection::new(
                Verdict::WholeImage,
                vec![Attempt::rejected(
                    Some(threshold),
                    format!("no pixel below {threshold}"),
                )],
            ));
        };

        let coverage = bounds.coverage(buffer.dimensions());
        if coverage > self.options.max_coverage {
            debug!("primary: box {bounds:?} covers {coverage:.3} of the image, escalating");
            return Ok(Detection::new(
                Verdict::Escalate,
                vec![Attempt::rejected(
                    Some(threshold),
                    format!(
                        "coverage {coverage:.3} > {:.2}, likely background noise or page border",
                        self.options.max_coverage
                    ),
                )],
            ));
        }

        debug!("primary: accepted {bounds:?} at threshold {threshold} (coverage {coverage:.3})");
        Ok(Detection::new(
            Verdict::Accept {
                bounds,
                threshold: Some(threshold),
            },
            vec![Attempt::accepted(
                Some(threshold),
                format!(
                    "{} dark pixels, coverage {coverage:.3}",
                    scan.dark_pixels
                ),
            )],
        ))
    }
}
