use crate::config::Config;
use crate::error::{OcrError, PipelineError};
use crate::extract::{CodeExtractionResult, CodeExtractor};
use crate::frame::{ExtractedFrame, FrameCodec, ImageFormat};
use crate::ocr::{BoxedOcrEngine, OcrResult, build_engine};
use crate::registry::VideoRegistry;
use crate::video::{VideoHandle, VideoMetadata};

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub video_id: String,
    pub timestamp_seconds: f64,
}

impl FrameRequest {
    pub fn new(video_id: impl Into<String>, timestamp_seconds: f64) -> Self {
        Self {
            video_id: video_id.into(),
            timestamp_seconds,
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let t = self.timestamp_seconds;
        if t.is_finite() && t >= 0.0 {
            Ok(())
        } else {
            Err(PipelineError::InvalidTimestamp(t))
        }
    }
}

/// Everything one pipeline run produced.
///
/// The frame is always there; OCR and code extraction report their own
/// failures so earlier artifacts survive a later stage going wrong.
#[derive(Debug)]
pub struct PipelineOutput {
    pub frame: ExtractedFrame,
    pub ocr: Result<OcrResult, OcrError>,
    /// None when refinement is disabled or OCR failed
    pub code: Option<CodeExtractionResult>,
}

impl PipelineOutput {
    pub fn ocr_text(&self) -> Option<&str> {
        self.ocr.as_ref().ok().map(|result| result.text.as_str())
    }

    pub fn code_text(&self) -> Option<&str> {
        self.code
            .as_ref()
            .filter(|code| code.is_success())
            .map(|code| code.text.as_str())
    }
}

pub struct Pipeline {
    ocr: BoxedOcrEngine,
    extractor: Option<CodeExtractor>,
}

impl Pipeline {
    pub fn new(ocr: BoxedOcrEngine, extractor: Option<CodeExtractor>) -> Self {
        Self { ocr, extractor }
    }

    pub fn from_config(config: &Config) -> Result<Self, OcrError> {
        let ocr = build_engine(&config.ocr)?;
        let extractor = config.llm.enabled.then(|| CodeExtractor::new(&config.llm));
        Ok(Self::new(ocr, extractor))
    }

    pub async fn run(
        &self,
        registry: &VideoRegistry,
        request: FrameRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let frame = extract_frame(registry, &request).await?;

        let ocr = self.ocr.extract(&frame.encoded).await;
        let code = match (&ocr, &self.extractor) {
            (Ok(result), Some(extractor)) => Some(extractor.refine(&result.text).await),
            (Err(e), _) => {
                log::warn!(
                    "OCR failed for {} at {}s: {}",
                    request.video_id,
                    request.timestamp_seconds,
                    e
                );
                None
            }
            (Ok(_), None) => None,
        };

        Ok(PipelineOutput { frame, ocr, code })
    }
}

/// Opens the video, reads the frame at the requested time and encodes it.
///
/// The handle is opened and dropped inside one blocking task, so it is
/// released before this returns, whatever the outcome.
pub async fn extract_frame(
    registry: &VideoRegistry,
    request: &FrameRequest,
) -> Result<ExtractedFrame, PipelineError> {
    request.validate()?;
    let path = registry.resolve(&request.video_id)?.to_path_buf();
    let seconds = request.timestamp_seconds;

    log::info!("Extracting frame at {}s from {}", seconds, request.video_id);

    tokio::task::spawn_blocking(move || -> Result<ExtractedFrame, PipelineError> {
        let mut handle = VideoHandle::open(&path)?;
        let frame_index = handle.frame_index_for_time(seconds);
        let pixels = handle.read_frame(frame_index)?;
        handle.release();

        let encoded = FrameCodec::encode(&pixels)?;
        Ok(ExtractedFrame {
            frame_index,
            pixels,
            encoded,
            format: ImageFormat::Png,
        })
    })
    .await?
}

pub async fn video_metadata(
    registry: &VideoRegistry,
    video_id: &str,
) -> Result<VideoMetadata, PipelineError> {
    let path = registry.resolve(video_id)?.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<VideoMetadata, PipelineError> {
        let handle = VideoHandle::open(&path)?;
        log::info!("{}: {}", path.display(), handle);
        Ok(handle.metadata())
    })
    .await?
}
