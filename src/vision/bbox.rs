use crate::constants::BBOX_MARGIN_PX;

use super::error::VisionError;
use super::features::{select_landmarks, Extents};
use super::types::{BoundingBox, Landmark, LandmarkSet};

/// Pixel-space box around the selected landmarks, padded by the fixed margin.
///
/// Edges are truncated to whole pixels before padding and are not clamped,
/// so faces near the frame border produce negative or out-of-range values.
pub fn derive_bbox(
    landmarks: &LandmarkSet,
    indices: &[usize],
    width: u32,
    height: u32,
) -> Result<BoundingBox, VisionError> {
    let selected = select_landmarks(landmarks, indices)?;
    bbox_from_selection(&selected, width, height).ok_or(VisionError::EmptySelection)
}

pub(crate) fn bbox_from_selection(
    selected: &[Landmark],
    width: u32,
    height: u32,
) -> Option<BoundingBox> {
    let e = Extents::of(selected)?;
    let (w, h) = (f64::from(width), f64::from(height));

    Some(BoundingBox::new(
        to_pixel(e.min_x, w) - BBOX_MARGIN_PX,
        to_pixel(e.min_y, h) - BBOX_MARGIN_PX,
        to_pixel(e.max_x, w) + BBOX_MARGIN_PX,
        to_pixel(e.max_y, h) + BBOX_MARGIN_PX,
    ))
}

fn to_pixel(normalized: f64, extent: f64) -> i32 {
    (normalized * extent).floor() as i32
}
