use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OcrConfig;
use crate::error::OcrError;

pub mod detection;
pub mod line;

pub use detection::{DetectionOcr, OcrsDetector, RegionDetector};
pub use line::LineOcr;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum_macros::Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineKind {
    /// Single recognition pass over the whole image (tesseract)
    #[default]
    Line,
    /// Text region detection followed by per-region recognition (ocrs)
    Detection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpan {
    pub bbox: BoundingBox,
    pub text: String,
    /// None when the detector does not score regions
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrResult {
    /// Recognised text in reading order, empty when nothing was found
    pub text: String,
    pub engine: EngineKind,
    /// Per-region output, only filled by detection engines
    pub spans: Vec<TextSpan>,
}

#[async_trait]
pub trait OcrEngine {
    fn kind(&self) -> EngineKind;

    async fn extract(&self, image: &[u8]) -> Result<OcrResult, OcrError>;
}

pub type BoxedOcrEngine = Box<dyn OcrEngine + Send + Sync>;

pub fn build_engine(config: &OcrConfig) -> Result<BoxedOcrEngine, OcrError> {
    log::info!("Building {} OCR engine", config.engine);

    match config.engine {
        EngineKind::Line => Ok(Box::new(LineOcr::new(config))),
        EngineKind::Detection => {
            let detector =
                OcrsDetector::load(&config.detection_model, &config.recognition_model)?;
            Ok(Box::new(DetectionOcr::new(detector)))
        }
    }
}
