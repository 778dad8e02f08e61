//! JPEG still encoder for outbound frames.
//!
//! Encoding only happens when a connected transport exists to receive the
//! result; the sampler enforces that, this module just does the work.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

use crate::pipeline::types::RawFrame;

pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a frame as base64 JPEG, flipping it horizontally first when
    /// `mirror` is set (live camera frames only).
    pub fn encode(&self, frame: &RawFrame, mirror: bool) -> Result<String> {
        let mut image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .context("frame buffer does not match its dimensions")?;

        if mirror {
            image::imageops::flip_horizontal_in_place(&mut image);
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(
                image.as_raw(),
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            )
            .context("jpeg encoding failed")?;

        Ok(STANDARD.encode(jpeg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{SourceKind, Timestamp};
    use bytes::Bytes;

    /// 16x8 frame, left half red, right half blue
    fn half_and_half(source: SourceKind) -> RawFrame {
        let (width, height) = (16u32, 8u32);
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _y in 0..height {
            for x in 0..width {
                if x < width / 2 {
                    data.extend_from_slice(&[255, 0, 0]);
                } else {
                    data.extend_from_slice(&[0, 0, 255]);
                }
            }
        }
        RawFrame {
            data: Bytes::from(data),
            width,
            height,
            captured_at: Timestamp::from_millis(0),
            source,
        }
    }

    fn decode(b64: &str) -> image::RgbImage {
        let jpeg = STANDARD.decode(b64).unwrap();
        image::load_from_memory(&jpeg).unwrap().to_rgb8()
    }

    #[test]
    fn test_encode_produces_nonempty_jpeg() {
        let encoder = FrameEncoder::new(80);
        let b64 = encoder.encode(&half_and_half(SourceKind::File), false).unwrap();
        assert!(!b64.is_empty());

        let decoded = decode(&b64);
        assert_eq!(decoded.dimensions(), (16, 8));
        // left half stays red-dominated
        let px = decoded.get_pixel(2, 4);
        assert!(px[0] > px[2]);
    }

    #[test]
    fn test_mirror_flips_horizontally() {
        let encoder = FrameEncoder::new(80);
        let b64 = encoder.encode(&half_and_half(SourceKind::Camera), true).unwrap();

        // after mirroring the left half is blue-dominated
        let decoded = decode(&b64);
        let left = decoded.get_pixel(2, 4);
        let right = decoded.get_pixel(13, 4);
        assert!(left[2] > left[0]);
        assert!(right[0] > right[2]);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let encoder = FrameEncoder::new(80);
        let mut frame = half_and_half(SourceKind::File);
        frame.width = 64; // buffer no longer matches
        assert!(encoder.encode(&frame, false).is_err());
    }
}
