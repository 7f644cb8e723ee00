use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::ocr::{EngineKind, OcrEngine, OcrResult};

/// Messages tesseract prints when it cannot load its language data.
const INIT_FAILURES: [&str; 3] = [
    "Failed loading language",
    "Error opening data file",
    "Could not initialize tesseract",
];

/// Whole-image recognition through the tesseract executable.
#[derive(Clone, Debug)]
pub struct LineOcr {
    program: String,
    language: String,
    psm: Option<u8>,
}

impl LineOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            program: config.tesseract.clone(),
            language: config.language.clone(),
            psm: config.psm,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];
        if let Some(psm) = self.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args
    }
}

#[async_trait]
impl OcrEngine for LineOcr {
    fn kind(&self) -> EngineKind {
        EngineKind::Line
    }

    async fn extract(&self, image: &[u8]) -> Result<OcrResult, OcrError> {
        image::guess_format(image)?;

        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                log::error!("Failed to start {}: {}", self.program, e);
                OcrError::Unavailable(format!("{}: {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // tesseract exits before reading when its language data is missing
            match stdin.write_all(image).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    log::debug!("{} closed stdin early", self.program);
                }
                Err(e) => return Err(OcrError::Recognition(e.to_string())),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OcrError::Recognition(e.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            log::error!("{} failed ({}): {}", self.program, output.status, stderr);
            if INIT_FAILURES.iter().any(|msg| stderr.contains(msg)) {
                return Err(OcrError::Unavailable(stderr));
            }
            return Err(OcrError::Recognition(stderr));
        }

        if !stderr.is_empty() {
            log::debug!("{}: {}", self.program, stderr);
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log::info!("Line OCR recognised {} characters", text.chars().count());

        Ok(OcrResult {
            text,
            engine: EngineKind::Line,
            spans: Vec::new(),
        })
    }
}
