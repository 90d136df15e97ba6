use anyhow::{anyhow, Context, Result};

use crate::frame::PixelFormat;

/// Pixel layouts a capture device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CaptureFormat {
    Rgb24,
    Yuyv,
    Nv12,
    Mjpeg,
}

impl CaptureFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            b"NV12" => Some(Self::Nv12),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }
}

/// Convert a captured buffer into something a `Frame` can hold.
///
/// YUV layouts keep only the luma plane; motion detection works on grayscale
/// anyway and it avoids a colour conversion per frame.
pub(crate) fn normalize_capture(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: CaptureFormat,
) -> Result<(PixelFormat, u32, u32, Vec<u8>)> {
    let plane = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    match format {
        CaptureFormat::Rgb24 => {
            let expected = plane * 3;
            if pixels.len() < expected {
                return Err(anyhow!(
                    "RGB frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok((PixelFormat::Rgb24, width, height, pixels[..expected].to_vec()))
        }
        CaptureFormat::Yuyv => {
            let expected = plane * 2;
            if pixels.len() < expected {
                return Err(anyhow!(
                    "YUYV frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            let luma = pixels[..expected].iter().step_by(2).copied().collect();
            Ok((PixelFormat::Gray8, width, height, luma))
        }
        CaptureFormat::Nv12 => {
            let expected = plane + plane / 2;
            if pixels.len() < expected {
                return Err(anyhow!(
                    "NV12 frame length mismatch: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok((PixelFormat::Gray8, width, height, pixels[..plane].to_vec()))
        }
        CaptureFormat::Mjpeg => {
            let decoded = image::load_from_memory_with_format(pixels, image::ImageFormat::Jpeg)
                .context("decode mjpeg frame")?
                .to_rgb8();
            let (w, h) = decoded.dimensions();
            Ok((PixelFormat::Rgb24, w, h, decoded.into_raw()))
        }
    }
}
