use serde::{Deserialize, Serialize};

use crate::error::SigCropError;

/// Width and height of an image or region, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions from a width and height.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate of the left edge.
    pub left: u32,
    /// Y coordinate of the top edge.
    pub top: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Create a box from its top-left corner and size.
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// The box covering the entire image.
    pub const fn whole(dims: Dimensions) -> Self {
        Self::new(0, 0, dims.width, dims.height)
    }

    /// Box spanning inclusive pixel extents `[min_x, max_x] × [min_y, max_y]`.
    pub fn from_extents(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// Pixel count.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Size of the box.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Box area divided by the image area.
    pub fn coverage(&self, image: Dimensions) -> f64 {
        let image_area = image.area();
        if image_area == 0 {
            return 0.0;
        }
        self.area() as f64 / image_area as f64
    }

    /// Width divided by height; zero for a degenerate box.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }

    /// Non-empty and fully inside an image of the given size.
    pub fn is_valid_within(&self, image: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.left) + u64::from(self.width) <= u64::from(image.width)
            && u64::from(self.top) + u64::from(self.height) <= u64::from(image.height)
    }
}

/// A caller-supplied crop box. Coordinates may be negative or oversized;
/// they are clamped into the image by [`clamp_manual`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualBox {
    /// X coordinate of the left edge.
    pub left: i64,
    /// Y coordinate of the top edge.
    pub top: i64,
    /// Requested width.
    pub width: i64,
    /// Requested height.
    pub height: i64,
}

impl ManualBox {
    /// Create a manual box from raw, unchecked coordinates.
    pub const fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Grow `bbox` by `ratio × min(width, height)` on every side, clipped to the image.
pub(crate) fn expand_with_margin(bbox: BoundingBox, image: Dimensions, ratio: f64) -> BoundingBox {
    let margin = (f64::from(bbox.width.min(bbox.height)) * ratio).floor() as u32;

    let left = bbox.left.saturating_sub(margin);
    let top = bbox.top.saturating_sub(margin);
    let right = bbox.right().saturating_add(margin).min(image.width);
    let bottom = bbox.bottom().saturating_add(margin).min(image.height);

    BoundingBox {
        left,
        top,
        width: right.saturating_sub(left),
        height: bottom.saturating_sub(top),
    }
}

/// Reject a computed crop that is empty or leaves the image.
///
/// Automatic crops are never corrected here: a failure means the geometry
/// upstream is wrong.
pub(crate) fn validate_crop(
    bbox: BoundingBox,
    image: Dimensions,
) -> Result<BoundingBox, SigCropError> {
    if bbox.is_valid_within(image) {
        Ok(bbox)
    } else {
        Err(SigCropError::InvalidGeometry {
            region: bbox,
            width: image.width,
            height: image.height,
        })
    }
}

/// Clamp a manual box into `[0, width) × [0, height)` with at least one pixel
/// in each axis.
pub(crate) fn clamp_manual(manual: ManualBox, image: Dimensions) -> BoundingBox {
    let max_w = i64::from(image.width);
    let max_h = i64::from(image.height);

    let left = manual.left.clamp(0, max_w - 1);
    let top = manual.top.clamp(0, max_h - 1);
    let width = manual.width.clamp(1, max_w - left);
    let height = manual.height.clamp(1, max_h - top);

    // All four values are within [0, u32::MAX] after clamping against u32 extents.
    BoundingBox::new(left as u32, top as u32, width as u32, height as u32)
}
