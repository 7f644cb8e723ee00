use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    /// The path does not reference a readable file
    #[error("Video file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The decoder could not initialise the stream
    #[error("Cannot open video {}: {reason}", .path.display())]
    Unopenable { path: PathBuf, reason: String },

    #[error("Frame {index} is out of range (video has {frame_count} frames)")]
    OutOfRange { index: i64, frame_count: i64 },

    /// The decoder returned no data at a valid index
    #[error("Failed to decode frame {index}: {reason}")]
    Decode { index: i64, reason: String },

    #[error("Video handle used after release")]
    Released,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode frame: {0}")]
    Encode(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum OcrError {
    /// The recognition backend could not be initialised (missing binary,
    /// language data or model files)
    #[error("OCR backend unavailable: {0}")]
    Unavailable(String),

    #[error("OCR failed: {0}")]
    Recognition(String),

    #[error("OCR input is not a valid image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown video: {0}")]
    NotFound(String),

    /// File type is not the accepted container
    #[error("Unsupported video file {} (expected {expected})", .path.display())]
    Unsupported { path: PathBuf, expected: String },

    #[error("Registry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Registry(RegistryError),

    /// The blocking decode task panicked or was cancelled
    #[error("Frame worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => PipelineError::NotFound(id),
            other => PipelineError::Registry(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_errors_keep_their_kind() {
        let err = PipelineError::from(RegistryError::NotFound("demo".to_string()));
        assert!(matches!(err, PipelineError::NotFound(id) if id == "demo"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = PipelineError::from(RegistryError::Io(io));
        assert!(matches!(err, PipelineError::Registry(RegistryError::Io(_))));

        let err = PipelineError::from(RegistryError::Unsupported {
            path: PathBuf::from("/videos/clip.mkv"),
            expected: "video/mp4".to_string(),
        });
        assert!(matches!(
            err,
            PipelineError::Registry(RegistryError::Unsupported { .. })
        ));
    }
}
