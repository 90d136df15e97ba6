//! Frame differencing against the reference baseline.
//!
//! Steps, all on 8-bit grayscale:
//! 1. per-pixel absolute difference
//! 2. binary threshold (`>= diff_threshold` becomes 255)
//! 3. dilation with a 3x3 square element, repeated `dilation_iterations` times
//! 4. outer contours of the dilated mask, traced on a copy with a 1 px
//!    background border so blobs touching the frame edge stay `Outer`
//! 5. bounding box and polygon area per contour, small regions dropped

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::point::Point;

use crate::detect::result::{CandidateRegion, MotionResult};
use crate::error::MonitorError;

pub const DEFAULT_DIFF_THRESHOLD: u8 = 60;
pub const DEFAULT_DILATION_ITERATIONS: u32 = 2;
pub const DEFAULT_MIN_AREA: f64 = 5000.0;

const MASK_ON: u8 = 255;

/// Minimum contour area, either in pixels or as a share of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AreaThreshold {
    Absolute(f64),
    FractionOfFrame(f64),
}

impl AreaThreshold {
    pub fn resolve(&self, width: u32, height: u32) -> f64 {
        match *self {
            AreaThreshold::Absolute(pixels) => pixels,
            AreaThreshold::FractionOfFrame(fraction) => {
                fraction * f64::from(width) * f64::from(height)
            }
        }
    }
}

impl Default for AreaThreshold {
    fn default() -> Self {
        AreaThreshold::Absolute(DEFAULT_MIN_AREA)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmenterParams {
    pub diff_threshold: u8,
    pub dilation_iterations: u32,
    pub min_area: AreaThreshold,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            dilation_iterations: DEFAULT_DILATION_ITERATIONS,
            min_area: AreaThreshold::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MotionSegmenter {
    params: SegmenterParams,
}

impl MotionSegmenter {
    pub fn new(params: SegmenterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SegmenterParams {
        &self.params
    }

    /// Compare `current` with `baseline` and report the surviving regions.
    ///
    /// Identical frames give an empty result. Frames of different geometry are
    /// rejected with `DimensionMismatch`.
    pub fn segment(
        &self,
        baseline: &GrayImage,
        current: &GrayImage,
    ) -> Result<MotionResult, MonitorError> {
        let (mask, changed_pixels) = self.change_mask(baseline, current)?;
        if changed_pixels == 0 {
            return Ok(MotionResult::default());
        }

        let mut dilated = mask;
        for _ in 0..self.params.dilation_iterations {
            dilated = dilate(&dilated, Norm::LInf, 1);
        }

        let (width, height) = baseline.dimensions();
        let min_area = self.params.min_area.resolve(width, height);
        let regions = find_contours::<i32>(&with_background_border(&dilated))
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .filter_map(|contour| {
                let points: Vec<Point<i32>> = contour
                    .points
                    .iter()
                    .map(|p| Point::new(p.x - 1, p.y - 1))
                    .collect();
                let area = polygon_area(&points);
                if area < min_area {
                    return None;
                }
                let (x, y, w, h) = bounding_box(&points)?;
                Some(CandidateRegion {
                    x,
                    y,
                    width: w,
                    height: h,
                    area,
                })
            })
            .collect();

        Ok(MotionResult::from_regions(regions, changed_pixels))
    }

    /// Thresholded absolute difference, plus the count of pixels set.
    pub fn change_mask(
        &self,
        baseline: &GrayImage,
        current: &GrayImage,
    ) -> Result<(GrayImage, u64), MonitorError> {
        if baseline.dimensions() != current.dimensions() {
            return Err(MonitorError::DimensionMismatch {
                expected: baseline.dimensions(),
                actual: current.dimensions(),
            });
        }
        let (width, height) = baseline.dimensions();
        let threshold = self.params.diff_threshold;
        let mut mask = GrayImage::new(width, height);
        let mut changed = 0u64;
        for ((out, a), b) in mask
            .iter_mut()
            .zip(baseline.as_raw())
            .zip(current.as_raw())
        {
            if a.abs_diff(*b) >= threshold {
                *out = MASK_ON;
                changed += 1;
            }
        }
        Ok((mask, changed))
    }
}

/// `find_contours` labels a blob that touches column 0 as a hole with no
/// parent. Tracing on a zero-padded copy keeps every blob an outer border.
fn with_background_border(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    image::imageops::replace(&mut padded, mask, 1, 1);
    padded
}

fn bounding_box(points: &[Point<i32>]) -> Option<(u32, u32, u32, u32)> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

/// Shoelace area of the closed polygon through the contour points.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    twice_area.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn block(width: u32, height: u32, x: u32, y: u32, side: u32, value: u8) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([20]));
        for yy in y..y + side {
            for xx in x..x + side {
                img.put_pixel(xx, yy, Luma([value]));
            }
        }
        img
    }

    #[test]
    fn polygon_area_of_square_outline() {
        let pts = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(polygon_area(&pts), 100.0);
        assert_eq!(bounding_box(&pts), Some((0, 0, 11, 11)));
    }

    #[test]
    fn threshold_is_inclusive() {
        let segmenter = MotionSegmenter::default();
        let base = GrayImage::from_pixel(4, 4, Luma([0]));
        let mut cur = base.clone();
        cur.put_pixel(0, 0, Luma([60]));
        cur.put_pixel(1, 0, Luma([59]));
        let (mask, changed) = segmenter.change_mask(&base, &cur).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn dilated_block_area_exceeds_raw_block() {
        let base = GrayImage::from_pixel(320, 240, Luma([20]));
        let cur = block(320, 240, 100, 60, 100, 220);
        let result = MotionSegmenter::default().segment(&base, &cur).unwrap();
        assert_eq!(result.regions.len(), 1);
        let region = result.regions[0];
        // 100x100 block grown by two 3x3 dilations is 104x104.
        assert_eq!((region.x, region.y, region.width, region.height), (98, 58, 104, 104));
        assert_eq!(region.area, 103.0 * 103.0);
        assert_eq!(result.changed_pixels, 100 * 100);
    }

    #[test]
    fn fraction_threshold_scales_with_frame() {
        let params = SegmenterParams {
            min_area: AreaThreshold::FractionOfFrame(0.5),
            ..SegmenterParams::default()
        };
        let base = GrayImage::from_pixel(320, 240, Luma([20]));
        let cur = block(320, 240, 100, 60, 100, 220);
        let result = MotionSegmenter::new(params).segment(&base, &cur).unwrap();
        assert!(!result.motion);
    }

    #[test]
    fn zero_dilation_keeps_raw_outline() {
        let params = SegmenterParams {
            dilation_iterations: 0,
            min_area: AreaThreshold::Absolute(1.0),
            ..SegmenterParams::default()
        };
        let base = GrayImage::from_pixel(64, 64, Luma([0]));
        let cur = block(64, 64, 10, 10, 20, 200);
        let result = MotionSegmenter::new(params).segment(&base, &cur).unwrap();
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].width, 20);
        assert_eq!(result.regions[0].area, 19.0 * 19.0);
    }

    #[test]
    fn blobs_on_every_frame_edge_are_outer_regions() {
        let base = GrayImage::from_pixel(320, 240, Luma([20]));
        let segmenter = MotionSegmenter::default();
        for (x, y) in [(0, 60), (1, 60), (2, 60), (220, 60), (100, 0), (100, 140), (0, 0)] {
            let cur = block(320, 240, x, y, 100, 220);
            let result = segmenter.segment(&base, &cur).unwrap();
            assert_eq!(result.regions.len(), 1, "block at ({}, {})", x, y);
            assert!(result.regions[0].encloses(x, y, 100, 100), "block at ({}, {})", x, y);
        }
    }

    #[test]
    fn left_edge_region_is_clipped_to_frame() {
        let base = GrayImage::from_pixel(320, 240, Luma([20]));
        let cur = block(320, 240, 0, 60, 100, 220);
        let result = MotionSegmenter::default().segment(&base, &cur).unwrap();
        let region = result.regions[0];
        // Dilation grows the block right, up and down but not past column 0.
        assert_eq!((region.x, region.y, region.width, region.height), (0, 58, 102, 104));
        assert_eq!(region.area, 101.0 * 103.0);
    }
}
