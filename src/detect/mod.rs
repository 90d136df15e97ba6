//! Motion detection by frame differencing.
//!
//! - `preprocess`: grayscale + Gaussian blur
//! - `baseline`: the reference frame and its refresh policy
//! - `segmenter`: difference mask, dilation, contours, area filter
//! - `detector`: the three wired together, one call per frame
//!
//! Detection is stateless apart from the baseline. Deciding what a motion
//! signal *means* over time belongs to `presence`.

pub mod baseline;
pub mod detector;
pub mod preprocess;
pub mod result;
pub mod segmenter;

pub use baseline::{BaselinePolicy, ReferenceBaseline};
pub use detector::{MotionDetector, Observation};
pub use preprocess::Preprocessor;
pub use result::{CandidateRegion, MotionResult};
pub use segmenter::{AreaThreshold, MotionSegmenter, SegmenterParams};
