use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams, TextItem};

use crate::error::OcrError;
use crate::ocr::{BoundingBox, EngineKind, OcrEngine, OcrResult, TextSpan};

/// Finds text regions in an image and recognises each one independently.
///
/// Spans may come back in any order.
pub trait RegionDetector: Send + Sync + 'static {
    fn detect(&self, image: &RgbImage) -> Result<Vec<TextSpan>, OcrError>;
}

/// Detection-plus-recognition OCR.
///
/// Detector output is put in reading order (top to bottom, then left to
/// right) before the span texts are joined with single spaces.
pub struct DetectionOcr<D> {
    detector: Arc<D>,
}

impl<D: RegionDetector> DetectionOcr<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector: Arc::new(detector),
        }
    }
}

#[async_trait]
impl<D: RegionDetector> OcrEngine for DetectionOcr<D> {
    fn kind(&self) -> EngineKind {
        EngineKind::Detection
    }

    async fn extract(&self, image: &[u8]) -> Result<OcrResult, OcrError> {
        let rgb = image::load_from_memory(image)?.to_rgb8();
        let detector = Arc::clone(&self.detector);

        let spans = tokio::task::spawn_blocking(move || detector.detect(&rgb))
            .await
            .map_err(|e| OcrError::Recognition(format!("detector task failed: {e}")))??;

        log::info!("Detected {} text regions", spans.len());

        let spans = reading_order(spans);
        let text = join_spans(&spans);

        Ok(OcrResult {
            text,
            engine: EngineKind::Detection,
            spans,
        })
    }
}

pub fn reading_order(mut spans: Vec<TextSpan>) -> Vec<TextSpan> {
    spans.retain(|span| !span.text.trim().is_empty());
    spans.sort_by(|a, b| {
        a.bbox
            .y
            .total_cmp(&b.bbox.y)
            .then(a.bbox.x.total_cmp(&b.bbox.x))
    });
    spans
}

fn join_spans(spans: &[TextSpan]) -> String {
    spans
        .iter()
        .map(|span| span.text.trim())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// [`RegionDetector`] backed by the ocrs neural models.
pub struct OcrsDetector {
    engine: OcrsEngine,
}

impl OcrsDetector {
    pub fn load(detection_model: &Path, recognition_model: &Path) -> Result<Self, OcrError> {
        let detection = load_model(detection_model)?;
        let recognition = load_model(recognition_model)?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection),
            recognition_model: Some(recognition),
            ..Default::default()
        })
        .map_err(|e| OcrError::Unavailable(format!("Failed to create engine: {e}")))?;

        Ok(Self { engine })
    }
}

fn load_model(path: &Path) -> Result<rten::Model, OcrError> {
    log::debug!("Loading OCR model {}", path.display());
    rten::Model::load_file(path).map_err(|e| {
        log::error!("Failed to load OCR model {}: {}", path.display(), e);
        OcrError::Unavailable(format!("{}: {}", path.display(), e))
    })
}

impl RegionDetector for OcrsDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<TextSpan>, OcrError> {
        let recognition = |e: &dyn std::fmt::Display| OcrError::Recognition(e.to_string());

        let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| recognition(&e))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| recognition(&e))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|e| recognition(&e))?;
        let lines = self.engine.find_text_lines(&input, &words);
        let texts = self
            .engine
            .recognize_text(&input, &lines)
            .map_err(|e| recognition(&e))?;

        Ok(texts
            .into_iter()
            .flatten()
            .map(|line| {
                let rect = line.bounding_rect();
                TextSpan {
                    bbox: BoundingBox {
                        x: rect.left() as f32,
                        y: rect.top() as f32,
                        width: rect.width() as f32,
                        height: rect.height() as f32,
                    },
                    text: line.to_string(),
                    confidence: None,
                }
            })
            .collect())
    }
}
