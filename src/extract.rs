use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::config::LlmConfig;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

const PROMPT_TEMPLATE: &str = "You are a code extraction engine.
Given OCR text, return ONLY the code blocks found.
Do NOT rewrite, fix, explain, or comment.
If no code exists, return an empty string.

OCR TEXT:
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionStatus {
    Success,
    Timeout,
    ProcessError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeExtractionResult {
    /// Extracted code on success, the process's stderr on `ProcessError`
    pub text: String,
    pub status: ExtractionStatus,
}

impl CodeExtractionResult {
    fn success(text: String) -> Self {
        Self {
            text,
            status: ExtractionStatus::Success,
        }
    }

    fn timeout() -> Self {
        Self {
            text: String::new(),
            status: ExtractionStatus::Timeout,
        }
    }

    fn process_error(stderr: String) -> Self {
        Self {
            text: stderr,
            status: ExtractionStatus::ProcessError,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExtractionStatus::Success
    }
}

pub fn build_prompt(ocr_text: &str) -> String {
    format!("{PROMPT_TEMPLATE}{ocr_text}\n")
}

/// Filters OCR text down to code by running a local text generation model.
///
/// Each call spawns one process, `[program, subcommand, model, (prompt_flag),
/// prompt]`, with the prompt as a single argument. At most `max_concurrent`
/// processes run at once.
#[derive(Clone, Debug)]
pub struct CodeExtractor {
    program: String,
    subcommand: String,
    model: String,
    prompt_flag: Option<String>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl CodeExtractor {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            program: config.program.clone(),
            subcommand: config.subcommand.clone(),
            model: config.model.clone(),
            prompt_flag: config.prompt_flag.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, prompt: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.arg(&self.subcommand).arg(&self.model);
        if let Some(flag) = &self.prompt_flag {
            command.arg(flag);
        }
        command
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }

    pub async fn refine(&self, ocr_text: &str) -> CodeExtractionResult {
        if ocr_text.trim().is_empty() {
            log::debug!("Nothing to refine, skipping {}", self.program);
            return CodeExtractionResult::success(String::new());
        }

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => return CodeExtractionResult::process_error(e.to_string()),
        };

        let prompt = build_prompt(ocr_text);
        log::info!(
            "Running {} {} {} ({} prompt bytes, timeout {:?})",
            self.program,
            self.subcommand,
            self.model,
            prompt.len(),
            self.timeout
        );

        let mut child = match self.command(&prompt).spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start {}: {}", self.program, e);
                return CodeExtractionResult::process_error(format!("{}: {}", self.program, e));
            }
        };
        let pid = child.id();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        // Exit and output share one deadline; descendants may hold the pipes
        let finished = tokio::time::timeout(self.timeout, async {
            tokio::join!(child.wait(), read_to_string(stdout), read_to_string(stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok((Ok(status), stdout, stderr)) => (status, stdout, stderr),
            Ok((Err(e), _, _)) => {
                log::error!("Failed to wait for {}: {}", self.program, e);
                return CodeExtractionResult::process_error(e.to_string());
            }
            Err(_) => {
                log::warn!("{} timed out after {:?}, killing it", self.program, self.timeout);
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                // kill() also reaps the child
                if let Err(e) = child.kill().await {
                    log::debug!("Failed to kill {}: {}", self.program, e);
                }
                return CodeExtractionResult::timeout();
            }
        };

        if !status.success() {
            log::error!("{} failed ({}): {}", self.program, status, stderr.trim());
            return CodeExtractionResult::process_error(stderr.trim().to_string());
        }

        let text = stdout.trim().to_string();
        log::info!("{} returned {} bytes of code", self.program, text.len());
        CodeExtractionResult::success(text)
    }
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new(&LlmConfig::default())
    }
}

/// Kills everything the generation process started, not just the process.
#[cfg(unix)]
async fn kill_process_group(pgid: u32) {
    let result = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pgid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if !status.success() => {
            log::debug!("kill for process group {} exited with {}", pgid, status)
        }
        Ok(_) => {}
        Err(e) => log::warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pgid: u32) {}

async fn read_to_string<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buffer).await {
            log::warn!("Failed to read process output: {}", e);
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
