//! Derived detection output. Holds boxes and areas, never pixels.

use serde::Serialize;

/// Bounding box of one changed region, with the polygon area of its contour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CandidateRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: f64,
}

impl CandidateRegion {
    /// True when the given rectangle lies inside this region's box.
    pub fn encloses(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        x >= self.x
            && y >= self.y
            && x + width <= self.x + self.width
            && y + height <= self.y + self.height
    }
}

/// Outcome of segmenting one frame against the baseline.
#[derive(Clone, Debug, Default)]
pub struct MotionResult {
    /// At least one region survived the area filter.
    pub motion: bool,
    pub regions: Vec<CandidateRegion>,
    /// Pixels over the difference threshold before dilation.
    pub changed_pixels: u64,
}

impl MotionResult {
    pub fn from_regions(regions: Vec<CandidateRegion>, changed_pixels: u64) -> Self {
        Self {
            motion: !regions.is_empty(),
            regions,
            changed_pixels,
        }
    }

    pub fn largest(&self) -> Option<&CandidateRegion> {
        self.regions
            .iter()
            .max_by(|a, b| a.area.total_cmp(&b.area))
    }
}
