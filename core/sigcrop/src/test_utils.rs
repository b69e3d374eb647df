//! Synthetic page fixtures shared by unit tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::BoundingBox;

/// A `width × height` page filled with `background`.
pub(crate) fn page(width: u32, height: u32, background: u8) -> Vec<u8> {
    vec![background; width as usize * height as usize]
}

/// Paint a solid rectangle onto a page.
pub(crate) fn fill(data: &mut [u8], width: u32, rect: BoundingBox, value: u8) {
    for y in rect.top..rect.bottom() {
        let start = (y * width + rect.left) as usize;
        data[start..start + rect.width as usize].fill(value);
    }
}

/// Darken each pixel of `rect` with probability `density`. Seeded, so the
/// same call always paints the same pixels.
pub(crate) fn speckle(
    data: &mut [u8],
    width: u32,
    rect: BoundingBox,
    density: f64,
    value: u8,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    for y in rect.top..rect.bottom() {
        for x in rect.left..rect.right() {
            if rng.gen_bool(density) {
                data[(y * width + x) as usize] = value;
            }
        }
    }
}
