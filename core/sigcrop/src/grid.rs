use log::debug;

use crate::buffer::IntensityBuffer;
use crate::cancel::CancelToken;
use crate::config::GridOptions;
use crate::error::SigCropError;
use crate::geometry::BoundingBox;
use crate::strategy::{Detection, DetectionStrategy, Verdict};
use crate::trace::Attempt;

/// Ink density of one sampled cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    /// Cell row index.
    pub row: u32,
    /// Cell column index.
    pub col: u32,
    /// Dark samples over total samples.
    pub density: f64,
}

/// Summary of cell densities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DensityStats {
    /// Mean cell density.
    pub avg: f64,
    /// Highest cell density.
    pub max: f64,
}

impl DensityStats {
    /// Mean and maximum over `cells`; zero for an empty grid.
    pub fn of(cells: &[GridCell]) -> Self {
        if cells.is_empty() {
            return Self::default();
        }
        let sum: f64 = cells.iter().map(|c| c.density).sum();
        let max = cells.iter().map(|c| c.density).fold(0.0, f64::max);
        Self {
            avg: sum / cells.len() as f64,
            max,
        }
    }
}

/// Coarse fallback that looks for cells noticeably denser than the page's
/// own noise floor.
///
/// The result is the envelope of every qualifying cell, not a connected
/// region: two distant dense cells produce one box spanning both.
#[derive(Debug, Clone, Default)]
pub struct GridStrategy {
    options: GridOptions,
}

impl GridStrategy {
    /// Create the stage with the given parameters.
    pub fn new(options: GridOptions) -> Self {
        Self { options }
    }

    /// Sample every complete cell on the configured stride.
    pub fn sample_cells(
        &self,
        buffer: &IntensityBuffer<'_>,
        cancel: &CancelToken,
    ) -> Result<Vec<GridCell>, SigCropError> {
        let GridOptions {
            cell_size,
            stride,
            threshold,
            ..
        } = self.options;
        if cell_size == 0 {
            return Err(SigCropError::Config("grid.cell_size must be > 0".into()));
        }
        let step = stride.max(1) as usize;
        let rows = buffer.height() / cell_size;
        let cols = buffer.width() / cell_size;
        let mut cells = Vec::with_capacity((rows * cols) as usize);

        for row in 0..rows {
            cancel.check()?;
            let top = row * cell_size;
            for col in 0..cols {
                let left = (col * cell_size) as usize;
                let mut dark = 0u32;
                let mut total = 0u32;
                for y in (top..top + cell_size).step_by(step) {
                    let line = &buffer.row(y)[left..left + cell_size as usize];
                    for &v in line.iter().step_by(step) {
                        total += 1;
                        if v < threshold {
                            dark += 1;
                        }
                    }
                }
                cells.push(GridCell {
                    row,
                    col,
                    density: f64::from(dark) / f64::from(total.max(1)),
                });
            }
        }

        Ok(cells)
    }

    /// Cell density a cell must exceed to count as ink.
    pub fn dynamic_threshold(&self, stats: DensityStats) -> f64 {
        (stats.avg * self.options.density_multiplier).max(self.options.density_floor)
    }
}

impl DetectionStrategy for GridStrategy {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn detect(
        &self,
        buffer: &IntensityBuffer<'_>,
        cancel: &CancelToken,
    ) -> Result<Detection, SigCropError> {
        let threshold = Some(self.options.threshold);
        let cell_size = self.options.cell_size;

        let cells = self.sample_cells(buffer, cancel)?;
        if cells.is_empty() {
            debug!("grid: image smaller than one {cell_size}px cell");
            return Ok(Detection::new(
                Verdict::WholeImage,
                vec![Attempt::rejected(
                    threshold,
                    format!("image smaller than one {cell_size}px cell"),
                )],
            ));
        }

        let stats = DensityStats::of(&cells);
        let cutoff = self.dynamic_threshold(stats);
        let dense: Vec<&GridCell> = cells.iter().filter(|c| c.density > cutoff).collect();
        debug!(
            "grid: {} cells, avg {:.4}, max {:.4}, cutoff {cutoff:.4}, {} qualifying",
            cells.len(),
            stats.avg,
            stats.max,
            dense.len()
        );

        if dense.len() < self.options.min_cells {
            return Ok(Detection::new(
                Verdict::WholeImage,
                vec![Attempt::rejected(
                    threshold,
                    format!(
                        "{} cells above {cutoff:.4}, need {}",
                        dense.len(),
                        self.options.min_cells
                    ),
                )],
            ));
        }

        let min_row = dense.iter().map(|c| c.row).min().unwrap_or(0);
        let max_row = dense.iter().map(|c| c.row).max().unwrap_or(0);
        let min_col = dense.iter().map(|c| c.col).min().unwrap_or(0);
        let max_col = dense.iter().map(|c| c.col).max().unwrap_or(0);

        let half = cell_size / 2;
        let left = (min_col * cell_size).saturating_sub(half);
        let top = (min_row * cell_size).saturating_sub(half);
        let right = ((max_col + 1) * cell_size + half).min(buffer.width());
        let bottom = ((max_row + 1) * cell_size + half).min(buffer.height());
        let bounds = BoundingBox::new(left, top, right - left, bottom - top);

        let coverage = bounds.coverage(buffer.dimensions());
        if coverage >= self.options.max_coverage {
            debug!("grid: envelope {bounds:?} covers {coverage:.3}, too coarse");
            return Ok(Detection::new(
                Verdict::WholeImage,
                vec![Attempt::rejected(
                    threshold,
                    format!(
                        "envelope coverage {coverage:.3} >= {:.2}",
                        self.options.max_coverage
                    ),
                )],
            ));
        }

        debug!("grid: accepted {bounds:?} from {} cells", dense.len());
        Ok(Detection::new(
            Verdict::Accept { bounds, threshold },
            vec![Attempt::accepted(
                threshold,
                format!(
                    "{} cells above {cutoff:.4} (avg {:.4}, max {:.4}), coverage {coverage:.3}",
                    dense.len(),
                    stats.avg,
                    stats.max
                ),
            )],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fill, page, speckle};

    fn run(data: &[u8], width: u32, height: u32) -> Detection {
        let buffer = IntensityBuffer::new(data, width, height).unwrap();
        GridStrategy::default()
            .detect(&buffer, &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn partial_cells_are_dropped() {
        let data = page(250, 130, 255);
        let buffer = IntensityBuffer::new(&data, 250, 130).unwrap();
        let cells = GridStrategy::default()
            .sample_cells(&buffer, &CancelToken::new())
            .unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.row == 0));
    }

    #[test]
    fn stride_samples_twenty_by_twenty() {
        let mut data = page(100, 100, 255);
        // Darken every sampled column position in the first sampled row only.
        fill(&mut data, 100, BoundingBox::new(0, 0, 100, 1), 0);
        let buffer = IntensityBuffer::new(&data, 100, 100).unwrap();
        let cells = GridStrategy::default()
            .sample_cells(&buffer, &CancelToken::new())
            .unwrap();
        // 20 of 400 samples are dark.
        assert!((cells[0].density - 0.05).abs() < 1e-9);
    }

    #[test]
    fn dynamic_threshold_has_floor() {
        let grid = GridStrategy::default();
        assert_eq!(
            grid.dynamic_threshold(DensityStats { avg: 0.01, max: 0.5 }),
            0.15
        );
        assert!((grid.dynamic_threshold(DensityStats { avg: 0.1, max: 0.5 }) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn dense_region_in_noise_is_isolated() {
        let mut data = page(1000, 1000, 255);
        speckle(&mut data, 1000, BoundingBox::new(0, 0, 1000, 1000), 0.05, 100, 7);
        speckle(&mut data, 1000, BoundingBox::new(400, 300, 300, 300), 0.4, 100, 11);
        let detection = run(&data, 1000, 1000);
        assert_eq!(
            detection.bounds(),
            Some(BoundingBox::new(350, 250, 400, 400))
        );
    }

    #[test]
    fn separated_cells_produce_one_envelope() {
        let mut data = page(1000, 1000, 255);
        fill(&mut data, 1000, BoundingBox::new(100, 100, 100, 100), 0);
        fill(&mut data, 1000, BoundingBox::new(200, 100, 100, 100), 0);
        fill(&mut data, 1000, BoundingBox::new(600, 500, 100, 100), 0);
        let detection = run(&data, 1000, 1000);
        assert_eq!(
            detection.bounds(),
            Some(BoundingBox::new(50, 50, 700, 600))
        );
    }

    #[test]
    fn fewer_than_three_cells_falls_back() {
        let mut data = page(1000, 1000, 255);
        fill(&mut data, 1000, BoundingBox::new(100, 100, 200, 100), 0);
        let detection = run(&data, 1000, 1000);
        assert_eq!(detection.verdict, Verdict::WholeImage);
        assert!(detection.attempts[0].reason.contains("need 3"));
    }

    #[test]
    fn coarse_envelope_falls_back() {
        let mut data = page(500, 500, 255);
        fill(&mut data, 500, BoundingBox::new(0, 0, 100, 100), 0);
        fill(&mut data, 500, BoundingBox::new(400, 0, 100, 100), 0);
        fill(&mut data, 500, BoundingBox::new(0, 400, 100, 100), 0);
        let detection = run(&data, 500, 500);
        assert_eq!(detection.verdict, Verdict::WholeImage);
        assert!(detection.attempts[0].reason.contains("coverage"));
    }

    #[test]
    fn envelope_at_exactly_max_coverage_is_rejected() {
        let cell = |row: u32, col: u32| BoundingBox::new(col * 100, row * 100, 100, 100);

        // Cells (1,0), (1,9), (7,9): envelope x 0..1000, y 50..850 -> 0.8.
        let mut data = page(1000, 1000, 255);
        for rect in [cell(1, 0), cell(1, 9), cell(7, 9)] {
            fill(&mut data, 1000, rect, 0);
        }
        let detection = run(&data, 1000, 1000);
        assert_eq!(detection.verdict, Verdict::WholeImage);
        assert!(detection.attempts[0].reason.contains("coverage 0.800"));

        // One row shorter: y 50..750 -> 0.7, accepted.
        let mut data = page(1000, 1000, 255);
        for rect in [cell(1, 0), cell(1, 9), cell(6, 9)] {
            fill(&mut data, 1000, rect, 0);
        }
        assert_eq!(
            run(&data, 1000, 1000).bounds(),
            Some(BoundingBox::new(0, 50, 1000, 700))
        );
    }

    #[test]
    fn zero_cell_size_is_an_error() {
        let data = page(300, 300, 255);
        let buffer = IntensityBuffer::new(&data, 300, 300).unwrap();
        let grid = GridStrategy::new(GridOptions {
            cell_size: 0,
            ..GridOptions::default()
        });
        assert!(matches!(
            grid.detect(&buffer, &CancelToken::new()),
            Err(SigCropError::Config(_))
        ));
    }

    #[test]
    fn tiny_image_falls_back() {
        let data = page(80, 80, 0);
        assert_eq!(run(&data, 80, 80).verdict, Verdict::WholeImage);
    }
}
