//! Frame container and evidence snapshots.
//!
//! - `Frame`: one decoded video frame as delivered by a source. Geometry is
//!   validated at construction; there is no `Clone`.
//! - `EvidenceFrame`: an owned, byte-exact copy of a `Frame`, taken only when a
//!   presence is confirmed. It is what travels to notification sinks, so the
//!   source buffer can be reused or dropped as soon as the loop moves on.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::Arc;

use crate::detect::CandidateRegion;
use crate::error::MonitorError;

const BOX_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Interleaved 8-bit RGB.
    Rgb24,
    /// Single 8-bit luma channel.
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// A single frame from a video source.
pub struct Frame {
    data: Vec<u8>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Capture time as reported by the source.
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MonitorError::InvalidFrame(format!(
                "zero-sized frame {}x{}",
                width, height
            ))
            .into());
        }
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(MonitorError::InvalidFrame(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            ))
            .into());
        }
        Ok(Self {
            data,
            format,
            width,
            height,
            captured_at,
        })
    }

    pub fn from_rgb(image: RgbImage, captured_at: DateTime<Utc>) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(
            PixelFormat::Rgb24,
            width,
            height,
            image.into_raw(),
            captured_at,
        )
    }

    pub fn from_gray(image: GrayImage, captured_at: DateTime<Utc>) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(
            PixelFormat::Gray8,
            width,
            height,
            image.into_raw(),
            captured_at,
        )
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copy this frame into an owned evidence snapshot.
    pub fn snapshot(&self) -> EvidenceFrame {
        let sha256 = hex::encode(Sha256::digest(&self.data));
        EvidenceFrame {
            data: Arc::from(self.data.as_slice()),
            format: self.format,
            width: self.width,
            height: self.height,
            captured_at: self.captured_at,
            sha256,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// EvidenceFrame
// ----------------------------------------------------------------------------

/// Owned copy of the frame on which a presence was confirmed.
///
/// Pixel bytes sit behind an `Arc` so several sinks can share one snapshot.
/// Serialization carries geometry and digest only.
#[derive(Clone, Debug, Serialize)]
pub struct EvidenceFrame {
    #[serde(skip)]
    data: Arc<[u8]>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    /// Hex SHA-256 of the pixel bytes.
    pub sha256: String,
}

impl EvidenceFrame {
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn to_image(&self) -> Result<DynamicImage> {
        let bytes = self.data.to_vec();
        let image = match self.format {
            PixelFormat::Rgb24 => RgbImage::from_raw(self.width, self.height, bytes)
                .map(DynamicImage::ImageRgb8),
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, bytes)
                .map(DynamicImage::ImageLuma8),
        };
        image
            .ok_or_else(|| MonitorError::InvalidFrame("evidence buffer size mismatch".into()).into())
    }

    /// Evidence as RGB with a green box around each region.
    pub fn annotated(&self, regions: &[CandidateRegion]) -> Result<RgbImage> {
        let mut canvas = self.to_image()?.to_rgb8();
        for region in regions {
            for inset in 0..BOX_THICKNESS {
                let rect = Rect::at(region.x as i32 - inset, region.y as i32 - inset).of_size(
                    region.width + 2 * inset as u32,
                    region.height + 2 * inset as u32,
                );
                draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOUR);
            }
        }
        Ok(canvas)
    }

    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        encode_jpeg(&self.to_image()?)
    }

    pub fn encode_annotated_jpeg(&self, regions: &[CandidateRegion]) -> Result<Vec<u8>> {
        encode_jpeg(&DynamicImage::ImageRgb8(self.annotated(regions)?))
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Jpeg)
        .context("encode evidence jpeg")?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame::new(
            PixelFormat::Gray8,
            width,
            height,
            vec![value; (width * height) as usize],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let err = Frame::new(PixelFormat::Rgb24, 4, 4, vec![0; 16], Utc::now()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MonitorError>(),
            Some(MonitorError::InvalidFrame(_))
        ));
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(Frame::new(PixelFormat::Gray8, 0, 4, vec![], Utc::now()).is_err());
    }

    #[test]
    fn snapshot_is_byte_exact() {
        let mut data = vec![0u8; 8 * 8 * 3];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let frame = Frame::new(PixelFormat::Rgb24, 8, 8, data, Utc::now()).unwrap();
        let evidence = frame.snapshot();
        assert_eq!(evidence.pixels(), frame.pixels());
        assert_eq!(
            evidence.sha256,
            hex::encode(Sha256::digest(frame.pixels()))
        );
        assert_eq!(evidence.captured_at, frame.captured_at);
    }

    #[test]
    fn evidence_encodes_as_jpeg() {
        let evidence = gray_frame(32, 24, 128).snapshot();
        let jpeg = evidence.encode_jpeg().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn annotation_draws_green_box() {
        let evidence = gray_frame(40, 40, 0).snapshot();
        let region = CandidateRegion {
            x: 10,
            y: 10,
            width: 10,
            height: 10,
            area: 81.0,
        };
        let canvas = evidence.annotated(&[region]).unwrap();
        assert_eq!(*canvas.get_pixel(10, 10), BOX_COLOUR);
        assert_eq!(*canvas.get_pixel(8, 15), BOX_COLOUR);
        assert_eq!(*canvas.get_pixel(15, 15), Rgb([0, 0, 0]));
    }
}
