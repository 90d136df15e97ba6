use anyhow::Result;
use image::{GrayImage, RgbImage};

use crate::error::MonitorError;
use crate::frame::{Frame, PixelFormat};

/// Largest blur kernel accepted by configuration.
pub const MAX_BLUR_KERNEL: u32 = 99;

/// Sigma used for a Gaussian kernel of side `kernel` when no explicit sigma
/// is given. Matches the usual `0.3 * ((k - 1) * 0.5 - 1) + 0.8` rule, so a
/// 21x21 kernel blurs with sigma 3.5.
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Grayscale conversion followed by Gaussian smoothing.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    kernel: u32,
    sigma: Option<f32>,
}

impl Preprocessor {
    /// `blur_kernel` must be odd and positive. A kernel of 1 disables blurring.
    pub fn new(blur_kernel: u32) -> Result<Self> {
        if blur_kernel == 0 || blur_kernel % 2 == 0 || blur_kernel > MAX_BLUR_KERNEL {
            return Err(MonitorError::configuration(format!(
                "blur kernel must be an odd number in 1..={}, got {}",
                MAX_BLUR_KERNEL, blur_kernel
            ))
            .into());
        }
        let sigma = (blur_kernel > 1).then(|| sigma_for_kernel(blur_kernel));
        Ok(Self {
            kernel: blur_kernel,
            sigma,
        })
    }

    pub fn kernel(&self) -> u32 {
        self.kernel
    }

    pub fn sigma(&self) -> Option<f32> {
        self.sigma
    }

    pub fn apply(&self, frame: &Frame) -> Result<GrayImage> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(MonitorError::InvalidFrame("zero-sized frame".into()).into());
        }
        let gray = match frame.format {
            PixelFormat::Gray8 => GrayImage::from_raw(width, height, frame.pixels().to_vec()),
            PixelFormat::Rgb24 => RgbImage::from_raw(width, height, frame.pixels().to_vec())
                .map(|rgb| image::imageops::grayscale(&rgb)),
        }
        .ok_or_else(|| MonitorError::InvalidFrame("pixel buffer does not match geometry".into()))?;

        Ok(match self.sigma {
            Some(sigma) => imageproc::filter::gaussian_blur_f32(&gray, sigma),
            None => gray,
        })
    }
}
