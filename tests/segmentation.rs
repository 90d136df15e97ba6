use image::{GrayImage, Luma};

use presence_watch::detect::{AreaThreshold, MotionSegmenter, SegmenterParams};
use presence_watch::MonitorError;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn scene(level: u8) -> GrayImage {
    GrayImage::from_pixel(WIDTH, HEIGHT, Luma([level]))
}

fn with_block(base: &GrayImage, x: u32, y: u32, size: u32, level: u8) -> GrayImage {
    let mut img = base.clone();
    for yy in y..y + size {
        for xx in x..x + size {
            img.put_pixel(xx, yy, Luma([level]));
        }
    }
    img
}

#[test]
fn large_block_yields_one_enclosing_region() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(20);
    let current = with_block(&baseline, 100, 60, 100, 220);

    let result = segmenter.segment(&baseline, &current).expect("segment");
    assert!(result.motion);
    assert_eq!(result.regions.len(), 1);
    assert_eq!(result.changed_pixels, 100 * 100);

    let region = &result.regions[0];
    assert!(region.encloses(100, 60, 100, 100));
    // Two dilation passes grow the block by at most two pixels per side.
    assert!(region.x >= 98 && region.y >= 58);
    assert!(region.width <= 104 && region.height <= 104);
    assert!(region.area >= 5000.0);
}

#[test]
fn small_block_is_filtered_by_area() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(20);
    let current = with_block(&baseline, 10, 10, 50, 220);

    let result = segmenter.segment(&baseline, &current).expect("segment");
    assert!(!result.motion);
    assert!(result.regions.is_empty());
    assert!(result.changed_pixels > 0);
}

#[test]
fn fractional_threshold_scales_with_frame() {
    let segmenter = MotionSegmenter::new(SegmenterParams {
        min_area: AreaThreshold::FractionOfFrame(0.01),
        ..SegmenterParams::default()
    });
    let baseline = scene(20);
    // 1% of 320x240 is 768 px; a 50x50 block clears it.
    let current = with_block(&baseline, 10, 10, 50, 220);

    let result = segmenter.segment(&baseline, &current).expect("segment");
    assert!(result.motion);
    assert_eq!(result.regions.len(), 1);
}

#[test]
fn small_difference_stays_below_threshold() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(100);
    let current = with_block(&baseline, 50, 50, 150, 140);

    let result = segmenter.segment(&baseline, &current).expect("segment");
    assert!(!result.motion);
    assert_eq!(result.changed_pixels, 0);
}

#[test]
fn identical_frames_have_no_motion() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(77);

    let result = segmenter.segment(&baseline, &baseline.clone()).expect("segment");
    assert!(!result.motion);
    assert!(result.regions.is_empty());
    assert!(result.largest().is_none());
}

#[test]
fn separated_blocks_are_reported_separately() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(20);
    let current = with_block(&baseline, 10, 10, 80, 220);
    let current = with_block(&current, 200, 120, 90, 220);

    let result = segmenter.segment(&baseline, &current).expect("segment");
    assert_eq!(result.regions.len(), 2);
    let largest = result.largest().expect("largest region");
    assert!(largest.encloses(200, 120, 90, 90));
}

#[test]
fn mismatched_geometry_is_rejected() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(20);
    let current = GrayImage::new(160, 120);

    let err = segmenter.segment(&baseline, &current).unwrap_err();
    match err {
        MonitorError::DimensionMismatch { expected, actual } => {
            assert_eq!(expected, (WIDTH, HEIGHT));
            assert_eq!(actual, (160, 120));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn subject_against_left_edge_is_detected() {
    let segmenter = MotionSegmenter::default();
    let baseline = scene(20);

    for x in 0..4 {
        let current = with_block(&baseline, x, 60, 100, 220);
        let result = segmenter.segment(&baseline, &current).expect("segment");
        assert!(result.motion, "block at x={}", x);
        assert_eq!(result.regions.len(), 1);
        assert!(result.regions[0].encloses(x, 60, 100, 100));
    }

    // Wide subject spanning the left three quarters of the frame.
    let mut current = baseline.clone();
    for y in 60..180 {
        for x in 0..240 {
            current.put_pixel(x, y, Luma([220]));
        }
    }
    let result = segmenter.segment(&baseline, &current).expect("segment");
    assert!(result.motion);
    assert_eq!(result.regions[0].x, 0);
}
