use log::{debug, trace};

use crate::buffer::IntensityBuffer;
use crate::cancel::CancelToken;
use crate::config::AdvancedOptions;
use crate::error::SigCropError;
use crate::scan::{scan_dark, DarkScan};
use crate::strategy::{Detection, DetectionStrategy, Verdict};
use crate::trace::Attempt;

/// Multi-threshold scan for faint or small signatures on large canvases.
///
/// Thresholds are tried in configuration order and the first one passing
/// every check is taken, even if a later threshold would give a tighter box.
/// The order is part of the behaviour.
#[derive(Debug, Clone, Default)]
pub struct AdvancedStrategy {
    options: AdvancedOptions,
}

impl AdvancedStrategy {
    /// Create the stage with the given parameters.
    pub fn new(options: AdvancedOptions) -> Self {
        Self { options }
    }

    /// Why `scan` fails the acceptance test, or `None` if it passes.
    fn rejection(&self, scan: &DarkScan, image_area: u64) -> Option<String> {
        let Some(bounds) = scan.bounds else {
            return Some("no dark pixels".into());
        };

        let area_ratio = bounds.area() as f64 / image_area as f64;
        if area_ratio >= self.options.max_area_ratio {
            return Some(format!(
                "area ratio {area_ratio:.3} >= {:.2}",
                self.options.max_area_ratio
            ));
        }

        let density = scan.density();
        if density <= self.options.min_density {
            return Some(format!(
                "density {density:.4} <= {:.3}",
                self.options.min_density
            ));
        }

        if scan.dark_pixels <= self.options.min_dark_pixels {
            return Some(format!(
                "{} dark pixels <= {}",
                scan.dark_pixels, self.options.min_dark_pixels
            ));
        }

        None
    }
}

impl DetectionStrategy for AdvancedStrategy {
    fn name(&self) -> &'static str {
        "advanced"
    }

    fn detect(
        &self,
        buffer: &IntensityBuffer<'_>,
        cancel: &CancelToken,
    ) -> Result<Detection, SigCropError> {
        let image_area = buffer.dimensions().area();
        let mut attempts = Vec::with_capacity(self.options.thresholds.len());

        for &threshold in &self.options.thresholds {
            let scan = scan_dark(buffer, threshold, cancel)?;
            trace!(
                "advanced: threshold {threshold} -> {:?}, {} dark",
                scan.bounds,
                scan.dark_pixels
            );

            match (self.rejection(&scan, image_area), scan.bounds) {
                (None, Some(bounds)) => {
                    debug!("advanced: accepted {bounds:?} at threshold {threshold}");
                    attempts.push(Attempt::accepted(
                        Some(threshold),
                        format!(
                            "{} dark pixels, density {:.4}, area ratio {:.3}",
                            scan.dark_pixels,
                            scan.density(),
                            bounds.area() as f64 / image_area as f64
                        ),
                    ));
                    return Ok(Detection::new(
                        Verdict::Accept {
                            bounds,
                            threshold: Some(threshold),
                        },
                        attempts,
                    ));
                }
                (reason, _) => {
                    let reason = reason.unwrap_or_else(|| "no dark pixels".into());
                    debug!("advanced: threshold {threshold} rejected: {reason}");
                    attempts.push(Attempt::rejected(Some(threshold), reason));
                }
            }
        }

        debug!("advanced: no threshold qualified, escalating");
        Ok(Detection::new(Verdict::Escalate, attempts))
    }
}
