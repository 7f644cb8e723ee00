use std::fmt;
use std::path::{Path, PathBuf};

use opencv::prelude::*;
use opencv::{core, videoio};
use serde::Serialize;

use crate::error::VideoError;
use crate::frame::{PixelLayout, RawFrame};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: i64,
    pub duration_seconds: f64,
}

/// An open video file.
///
/// Owns the decoder exclusively and is not meant to be shared between
/// readers. The decoder is released by [`VideoHandle::release`] or on drop,
/// whichever comes first.
pub struct VideoHandle {
    path: PathBuf,
    capture: Option<videoio::VideoCapture>,
    fps: f64,
    frame_count: i64,
}

impl VideoHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        let path = path.as_ref();

        if !path.is_file() {
            log::error!("Video file not found: {}", path.display());
            return Err(VideoError::NotFound(path.to_path_buf()));
        }
        if let Err(e) = std::fs::File::open(path) {
            log::error!("Video file not readable {}: {}", path.display(), e);
            return Err(VideoError::NotFound(path.to_path_buf()));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| unopenable(path, "path is not valid UTF-8"))?;

        let capture = match videoio::VideoCapture::from_file_def(path_str) {
            Ok(v) => v,
            Err(e) => {
                log::error!("Failed to open video {}: {}", path.display(), e);
                return Err(unopenable(path, e));
            }
        };

        // Owned from here on, so every early return below releases the capture.
        let mut handle = Self {
            path: path.to_path_buf(),
            capture: Some(capture),
            fps: 0.0,
            frame_count: 0,
        };
        handle.probe()?;

        log::info!("Opened {}: {}", handle.path.display(), handle);
        Ok(handle)
    }

    fn probe(&mut self) -> Result<(), VideoError> {
        let path = self.path.clone();
        let capture = self.capture.as_ref().ok_or(VideoError::Released)?;

        if !capture.is_opened().map_err(|e| unopenable(&path, e))? {
            return Err(unopenable(&path, "decoder could not initialise the stream"));
        }

        let fps = capture
            .get(videoio::CAP_PROP_FPS)
            .map_err(|e| unopenable(&path, e))?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(unopenable(&path, format!("invalid frame rate {fps}")));
        }

        let frame_count = capture
            .get(videoio::CAP_PROP_FRAME_COUNT)
            .map_err(|e| unopenable(&path, e))?;
        if !frame_count.is_finite() || frame_count < 0.0 {
            return Err(unopenable(&path, format!("invalid frame count {frame_count}")));
        }

        self.fps = fps;
        self.frame_count = frame_count as i64;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_count(&self) -> i64 {
        self.frame_count
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            fps: self.fps,
            frame_count: self.frame_count,
            duration_seconds: self.duration_seconds(),
        }
    }

    /// Zero-based index of the frame shown at `seconds`. Truncates.
    pub fn frame_index_for_time(&self, seconds: f64) -> i64 {
        frame_index_for_time(seconds, self.fps)
    }

    pub fn read_frame(&mut self, index: i64) -> Result<RawFrame, VideoError> {
        let capture = self.capture.as_mut().ok_or(VideoError::Released)?;

        if index < 0 || index >= self.frame_count {
            log::warn!(
                "Frame {} requested from {} ({} frames)",
                index,
                self.path.display(),
                self.frame_count
            );
            return Err(VideoError::OutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }

        let decode_error = |reason: String| VideoError::Decode { index, reason };

        capture
            .set(videoio::CAP_PROP_POS_FRAMES, index as f64)
            .map_err(|e| decode_error(e.to_string()))?;

        let mut frame = core::Mat::default();
        let ok = capture
            .read(&mut frame)
            .map_err(|e| decode_error(e.to_string()))?;
        if !ok || frame.rows() <= 0 || frame.cols() <= 0 {
            log::error!("No data for frame {} in {}", index, self.path.display());
            return Err(decode_error("decoder returned no data".to_string()));
        }

        log::debug!(
            "Read frame {} ({}x{}) from {}",
            index,
            frame.cols(),
            frame.rows(),
            self.path.display()
        );

        mat_to_frame(&frame).map_err(decode_error)
    }

    pub fn read_frame_at(&mut self, seconds: f64) -> Result<RawFrame, VideoError> {
        let index = self.frame_index_for_time(seconds);
        self.read_frame(index)
    }

    pub fn is_released(&self) -> bool {
        self.capture.is_none()
    }

    /// Releases the decoder. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                log::warn!("Failed to release {}: {}", self.path.display(), e);
            }
            log::debug!("Released {}", self.path.display());
        }
    }
}

impl Drop for VideoHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Display for VideoMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FPS: {:.2}. Frame Count: {}. Duration: {:.2} minutes",
            self.fps,
            self.frame_count,
            self.duration_seconds / 60.0
        )
    }
}

impl fmt::Display for VideoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.metadata(), f)
    }
}

pub fn frame_index_for_time(seconds: f64, fps: f64) -> i64 {
    (seconds * fps).floor() as i64
}

fn unopenable(path: &Path, reason: impl ToString) -> VideoError {
    VideoError::Unopenable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn mat_to_frame(mat: &core::Mat) -> Result<RawFrame, String> {
    let layout = match mat.typ() {
        t if t == core::CV_8UC1 => PixelLayout::Gray,
        t if t == core::CV_8UC3 => PixelLayout::Bgr,
        t if t == core::CV_8UC4 => PixelLayout::Bgra,
        t => {
            return Err(format!(
                "unsupported pixel type {} ({} channels)",
                t,
                mat.channels()
            ));
        }
    };
    debug_assert_eq!(PixelLayout::from_channels(mat.channels()), Some(layout));

    let continuous;
    let mat = if mat.is_continuous() {
        mat
    } else {
        continuous = mat.try_clone().map_err(|e| e.to_string())?;
        &continuous
    };

    let data = mat.data_bytes().map_err(|e| e.to_string())?.to_vec();
    let frame = RawFrame::new(mat.cols() as u32, mat.rows() as u32, layout, data);

    if frame.data.len() != frame.expected_len() {
        return Err(format!(
            "decoded {} bytes, expected {}",
            frame.data.len(),
            frame.expected_len()
        ));
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::test_support::{temp_path, write_solid_video};

    #[test]
    fn test_frame_index_truncates() {
        assert_eq!(frame_index_for_time(1.999, 1.0), 1);
        assert_eq!(frame_index_for_time(0.0, 30.0), 0);
        assert_eq!(frame_index_for_time(2.5, 29.97), 74);
        assert_eq!(frame_index_for_time(1.0, 24.0), 24);
    }

    #[test]
    fn test_frame_index_matches_floor() {
        for fps in [1.0, 12.5, 23.976, 25.0, 29.97, 60.0] {
            for step in 0..500 {
                let seconds = step as f64 * 0.037;
                assert_eq!(
                    frame_index_for_time(seconds, fps),
                    (seconds * fps).floor() as i64
                );
            }
        }
    }

    #[test]
    fn test_open_missing_file() {
        let result = VideoHandle::open("/definitely/not/here.mp4");
        assert!(matches!(result, Err(VideoError::NotFound(_))));
    }

    #[test]
    fn test_open_directory_is_not_found() {
        let result = VideoHandle::open(std::env::temp_dir());
        assert!(matches!(result, Err(VideoError::NotFound(_))));
    }

    #[test]
    fn test_open_empty_file() {
        let path = temp_path("empty", "mp4");
        std::fs::write(&path, b"").unwrap();

        let result = VideoHandle::open(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(VideoError::Unopenable { .. })));
    }

    #[test]
    fn test_open_garbage_file() {
        let path = temp_path("garbage", "mp4");
        std::fs::write(&path, b"this is not a video container at all").unwrap();

        let result = VideoHandle::open(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(VideoError::Unopenable { .. })));
    }

    #[test]
    fn test_metadata() {
        let path = temp_path("metadata", "avi");
        write_solid_video(&path, 10.0, &[10, 60, 110, 160, 210]);

        let handle = VideoHandle::open(&path).unwrap();
        assert_eq!(handle.frame_count(), 5);
        assert!((handle.fps() - 10.0).abs() < 1e-6);
        assert!((handle.duration_seconds() - 0.5).abs() < 1e-6);
        assert_eq!(
            handle.to_string(),
            "FPS: 10.00. Frame Count: 5. Duration: 0.01 minutes"
        );

        drop(handle);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_frame_by_time() {
        let path = temp_path("by-time", "avi");
        write_solid_video(&path, 2.0, &[20, 120, 220]);

        let mut handle = VideoHandle::open(&path).unwrap();
        // 1.4s at 2 fps is frame 2
        assert_eq!(handle.frame_index_for_time(1.4), 2);
        let frame = handle.read_frame_at(1.4).unwrap();
        handle.release();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(frame.layout, PixelLayout::Bgr);
        assert_eq!((frame.width, frame.height), (64, 48));
        let center = frame.expected_len() / 2;
        assert!((frame.data[center] as i32 - 220).abs() < 12);
    }

    #[test]
    fn test_read_frame_out_of_range() {
        let path = temp_path("out-of-range", "avi");
        write_solid_video(&path, 1.0, &[50, 100]);

        let mut handle = VideoHandle::open(&path).unwrap();
        let past_end = handle.frame_index_for_time(2.0);
        assert!(matches!(
            handle.read_frame(past_end),
            Err(VideoError::OutOfRange { index: 2, frame_count: 2 })
        ));
        assert!(matches!(
            handle.read_frame(-1),
            Err(VideoError::OutOfRange { .. })
        ));
        assert!(handle.read_frame(1).is_ok());

        drop(handle);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_release_is_idempotent() {
        let path = temp_path("release", "avi");
        write_solid_video(&path, 5.0, &[90]);

        let mut handle = VideoHandle::open(&path).unwrap();
        handle.release();
        handle.release();
        assert!(handle.is_released());
        assert!(matches!(handle.read_frame(0), Err(VideoError::Released)));

        drop(handle);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_frame_outlives_handle() {
        let path = temp_path("outlives", "avi");
        write_solid_video(&path, 5.0, &[30, 180]);

        let frame = {
            let mut handle = VideoHandle::open(&path).unwrap();
            handle.read_frame(1).unwrap()
        };
        std::fs::remove_file(&path).unwrap();

        assert_eq!(frame.data.len(), frame.expected_len());
    }
}
