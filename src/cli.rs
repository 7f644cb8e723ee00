use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::ocr::EngineKind;

#[derive(Parser, Debug)]
#[command(name = "codeframe", version, about = "Recover code samples shown in tutorial videos")]
pub struct CliArgs {
    /// Config file path (default: "config.toml")
    #[arg(short, long, env = "CODEFRAME_CONFIG", global = true)]
    pub config: Option<String>,

    /// Directory holding the videos (default: "./resources")
    #[arg(long, global = true)]
    pub videos_dir: Option<PathBuf>,

    /// OCR engine (default: line)
    #[arg(short, long, value_enum, global = true)]
    pub engine: Option<EngineKind>,

    /// tesseract language code (default: eng)
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Model passed to the code extraction process (default: codellama)
    #[arg(long, global = true)]
    pub llm_model: Option<String>,

    /// Skip the code extraction step
    #[arg(long, global = true)]
    pub no_refine: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List registered videos
    List,
    /// Show frame rate, frame count and duration of a video
    Info {
        /// Video id (file stem)
        video: String,
    },
    /// Save the frame shown at a timestamp as PNG
    Frame {
        video: String,
        /// Timestamp in seconds
        seconds: f64,
        /// Output file (default: "<video>_<seconds>.png")
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read the text, and the code in it, from the frame at a timestamp
    Ocr {
        video: String,
        /// Timestamp in seconds
        seconds: f64,
        /// Also save the frame as PNG
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Serialize, Debug, Default)]
pub(crate) struct OcrOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<EngineKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

#[derive(Serialize, Debug, Default)]
pub(crate) struct LlmOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

/// The subset of the config the command line can set.
#[derive(Serialize, Debug, Default)]
pub(crate) struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    videos_dir: Option<PathBuf>,
    ocr: OcrOverrides,
    llm: LlmOverrides,
}

impl CliArgs {
    pub(crate) fn overrides(&self) -> Overrides {
        Overrides {
            videos_dir: self.videos_dir.clone(),
            ocr: OcrOverrides {
                engine: self.engine,
                language: self.language.clone(),
            },
            llm: LlmOverrides {
                enabled: self.no_refine.then_some(false),
                model: self.llm_model.clone(),
            },
        }
    }
}
