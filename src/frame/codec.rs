use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::error::CodecError;
use crate::frame::{PixelLayout, RawFrame};

/// PNG encoding for decoded frames.
///
/// The decoder hands out blue-first buffers; PNG consumers expect red-first,
/// so channels are swapped on the way in and swapped back on the way out.
pub struct FrameCodec;

impl FrameCodec {
    pub fn encode(frame: &RawFrame) -> Result<Vec<u8>, CodecError> {
        let image = to_image(frame)?;

        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        log::debug!(
            "Encoded {}x{} {:?} frame to {} PNG bytes",
            frame.width,
            frame.height,
            frame.layout,
            buffer.get_ref().len()
        );

        Ok(buffer.into_inner())
    }

    pub fn decode(bytes: &[u8]) -> Result<RawFrame, CodecError> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        let (width, height) = (image.width(), image.height());
        let frame = match image {
            DynamicImage::ImageLuma8(gray) => {
                RawFrame::new(width, height, PixelLayout::Gray, gray.into_raw())
            }
            DynamicImage::ImageRgba8(rgba) => RawFrame::new(
                width,
                height,
                PixelLayout::Bgra,
                swap_red_blue(rgba.into_raw(), 4),
            ),
            other => RawFrame::new(
                width,
                height,
                PixelLayout::Bgr,
                swap_red_blue(other.to_rgb8().into_raw(), 3),
            ),
        };

        Ok(frame)
    }

    pub fn save(frame: &RawFrame, path: &Path) -> Result<(), CodecError> {
        let bytes = Self::encode(frame)?;
        std::fs::write(path, bytes).map_err(|e| {
            log::error!("Failed to write {}: {}", path.display(), e);
            CodecError::Encode(format!("{}: {}", path.display(), e))
        })?;

        log::info!("Saved frame to {}", path.display());
        Ok(())
    }
}

fn to_image(frame: &RawFrame) -> Result<DynamicImage, CodecError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(CodecError::Encode(format!(
            "empty frame ({}x{})",
            frame.width, frame.height
        )));
    }

    if frame.data.len() != frame.expected_len() {
        return Err(CodecError::Encode(format!(
            "buffer holds {} bytes, {}x{} {:?} needs {}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.layout,
            frame.expected_len()
        )));
    }

    let malformed = || CodecError::Encode("buffer does not match dimensions".to_string());
    let (w, h) = (frame.width, frame.height);

    let image = match frame.layout {
        PixelLayout::Gray => {
            DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, frame.data.clone()).ok_or_else(malformed)?)
        }
        PixelLayout::Bgr => DynamicImage::ImageRgb8(
            RgbImage::from_raw(w, h, swap_red_blue(frame.data.clone(), 3)).ok_or_else(malformed)?,
        ),
        PixelLayout::Bgra => DynamicImage::ImageRgba8(
            RgbaImage::from_raw(w, h, swap_red_blue(frame.data.clone(), 4)).ok_or_else(malformed)?,
        ),
    };

    Ok(image)
}

/// Swaps the first and third channel of every pixel. Self-inverse.
fn swap_red_blue(mut data: Vec<u8>, channels: usize) -> Vec<u8> {
    for pixel in data.chunks_exact_mut(channels) {
        pixel.swap(0, 2);
    }
    data
}
