use crate::buffer::IntensityBuffer;
use crate::cancel::CancelToken;
use crate::error::SigCropError;
use crate::geometry::BoundingBox;

/// Outcome of one full-resolution threshold pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DarkScan {
    /// Tightest box around every dark pixel, `None` when there are none.
    pub bounds: Option<BoundingBox>,
    pub dark_pixels: u64,
}

impl DarkScan {
    /// Dark pixels per pixel of the bounding box.
    pub fn density(&self) -> f64 {
        match self.bounds {
            Some(bounds) if bounds.area() > 0 => self.dark_pixels as f64 / bounds.area() as f64,
            _ => 0.0,
        }
    }
}

/// Visit every pixel once, classifying `value < threshold` as ink.
pub(crate) fn scan_dark(
    buffer: &IntensityBuffer<'_>,
    threshold: u8,
    cancel: &CancelToken,
) -> Result<DarkScan, SigCropError> {
    let is_dark = |v: &u8| *v < threshold;

    let mut min_x = u32::MAX;
    let mut max_x = 0u32;
    let mut min_y = u32::MAX;
    let mut max_y = 0u32;
    let mut dark_pixels = 0u64;

    for y in 0..buffer.height() {
        cancel.check()?;
        let row = buffer.row(y);

        let Some(first) = row.iter().position(is_dark) else {
            continue;
        };
        let last = row.iter().rposition(is_dark).unwrap_or(first);
        let hits = row[first..=last].iter().filter(|&v| is_dark(v)).count();

        min_x = min_x.min(first as u32);
        max_x = max_x.max(last as u32);
        min_y = min_y.min(y);
        max_y = y;
        dark_pixels += hits as u64;
    }

    let bounds = (dark_pixels > 0).then(|| BoundingBox::from_extents(min_x, min_y, max_x, max_y));
    Ok(DarkScan {
        bounds,
        dark_pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(width: u32, height: u32, ink: &[(u32, u32, u8)]) -> Vec<u8> {
        let mut data = vec![255u8; (width * height) as usize];
        for &(x, y, v) in ink {
            data[(y * width + x) as usize] = v;
        }
        data
    }

    #[test]
    fn blank_page_has_no_bounds() {
        let data = page(20, 10, &[]);
        let buffer = IntensityBuffer::new(&data, 20, 10).unwrap();
        let scan = scan_dark(&buffer, 240, &CancelToken::new()).unwrap();
        assert_eq!(scan.bounds, None);
        assert_eq!(scan.dark_pixels, 0);
        assert_eq!(scan.density(), 0.0);
    }

    #[test]
    fn bounds_enclose_all_dark_pixels() {
        let data = page(20, 10, &[(3, 2, 0), (15, 2, 100), (7, 8, 239)]);
        let buffer = IntensityBuffer::new(&data, 20, 10).unwrap();
        let scan = scan_dark(&buffer, 240, &CancelToken::new()).unwrap();
        assert_eq!(scan.bounds, Some(BoundingBox::new(3, 2, 13, 7)));
        assert_eq!(scan.dark_pixels, 3);
    }

    #[test]
    fn threshold_is_strict() {
        let data = page(4, 4, &[(1, 1, 240)]);
        let buffer = IntensityBuffer::new(&data, 4, 4).unwrap();
        let scan = scan_dark(&buffer, 240, &CancelToken::new()).unwrap();
        assert_eq!(scan.bounds, None);
    }

    #[test]
    fn cancelled_scan_stops() {
        let data = page(4, 4, &[]);
        let buffer = IntensityBuffer::new(&data, 4, 4).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            scan_dark(&buffer, 240, &token),
            Err(SigCropError::Cancelled)
        ));
    }
}
