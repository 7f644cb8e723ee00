pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod frame;
pub mod ocr;
pub mod pipeline;
pub mod registry;
pub mod video;

pub use error::{CodecError, OcrError, PipelineError, RegistryError, VideoError};
pub use extract::{CodeExtractionResult, CodeExtractor, ExtractionStatus};
pub use frame::{ExtractedFrame, FrameCodec, RawFrame};
pub use ocr::{EngineKind, OcrEngine, OcrResult};
pub use pipeline::{FrameRequest, Pipeline, PipelineOutput};
pub use registry::VideoRegistry;
pub use video::VideoHandle;
