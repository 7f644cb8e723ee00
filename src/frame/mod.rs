use serde::Serialize;

pub mod codec;

pub use codec::FrameCodec;

/// Channel order of a decoded buffer, as handed out by the video decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    Gray,
    Bgr,
    Bgra,
}

impl PixelLayout {
    pub fn channels(&self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Bgr => 3,
            PixelLayout::Bgra => 4,
        }
    }

    pub(crate) fn from_channels(channels: i32) -> Option<Self> {
        match channels {
            1 => Some(PixelLayout::Gray),
            3 => Some(PixelLayout::Bgr),
            4 => Some(PixelLayout::Bgra),
            _ => None,
        }
    }
}

/// A decoded frame, copied out of the decoder.
///
/// Owns its buffer, so it stays valid after the [`VideoHandle`] it came from
/// has been released.
///
/// [`VideoHandle`]: crate::video::VideoHandle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    /// Tightly packed rows, `width * height * layout.channels()` bytes
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.channels()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    Png,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
        }
    }
}

/// A single frame pulled from a video, with its PNG encoding.
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub frame_index: i64,
    pub pixels: RawFrame,
    pub encoded: Vec<u8>,
    pub format: ImageFormat,
}
