//! Run-length encoding of polygon sets over a bounding-box grid.
//!
//! Crowd annotations (more than one ring) export their segmentation as a
//! run-length mask instead of vertex lists. The mask covers only the
//! annotation's bounding box, rasterized pixel by pixel against the union
//! of its rings.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point, Polygon};

/// COCO-style run-length counts over a box-local pixel grid.
///
/// Counts alternate between background and foreground runs, always
/// starting with a background run; a mask whose first pixel is foreground
/// starts with an explicit zero. The grid is walked row-major: pixels of
/// row 0 left to right, then row 1, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleMask {
    /// Alternating run lengths, background first.
    pub counts: Vec<u32>,
    /// Grid size as `[width, height]`.
    pub size: [u32; 2],
}

impl RleMask {
    /// Sum of all run lengths. Equals `width * height` for a well-formed
    /// mask.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&count| u64::from(count)).sum()
    }

    /// Number of foreground pixels.
    pub fn foreground(&self) -> u64 {
        self.counts
            .iter()
            .skip(1)
            .step_by(2)
            .map(|&count| u64::from(count))
            .sum()
    }
}

/// Rasterize the union of `rings` over the pixel grid of `bbox`.
///
/// Pixel `(col, row)` of the grid covers the image-space square starting
/// at `(bbox.x() + col, bbox.y() + row)`; its centre is sampled against
/// every ring. Rows map to y offsets and columns to x offsets, matching
/// the row-major order of the counts.
pub fn encode_region(bbox: &BoundingBox, rings: &[Polygon]) -> RleMask {
    let grid_width = bbox.width().max(0.0) as u32;
    let grid_height = bbox.height().max(0.0) as u32;
    // Strictly right of every clamped vertex, so the cast ray always
    // leaves the ring
    let right_bound = bbox.x() + bbox.width() + 1.0;

    let mut counts = vec![0u32];
    let mut foreground = false;

    for row in 0..grid_height {
        for col in 0..grid_width {
            let centre = Point::new(
                bbox.x() + col as f32 + 0.5,
                bbox.y() + row as f32 + 0.5,
            );
            let inside = rings.iter().any(|ring| ring.contains(centre, right_bound));

            if inside == foreground {
                if let Some(last) = counts.last_mut() {
                    *last += 1;
                }
            } else {
                counts.push(1);
                foreground = inside;
            }
        }
    }

    RleMask {
        counts,
        size: [grid_width, grid_height],
    }
}
