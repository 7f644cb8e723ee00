use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
};
use normalize_path::NormalizePath;
use resolve_path::PathResolveExt;
use serde::{Deserialize, Serialize};

use crate::cli::CliArgs;
use crate::ocr::EngineKind;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "CODEFRAME_";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OcrConfig {
    /// Which OCR engine to run
    pub engine: EngineKind,
    /// tesseract executable used by the line engine
    pub tesseract: String,
    /// tesseract language code
    pub language: String,
    /// tesseract page segmentation mode
    pub psm: Option<u8>,
    /// ocrs text detection model (.rten)
    pub detection_model: PathBuf,
    /// ocrs text recognition model (.rten)
    pub recognition_model: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Line,
            tesseract: "tesseract".to_string(),
            language: "eng".to_string(),
            psm: None,
            detection_model: PathBuf::from("models/text-detection.rten"),
            recognition_model: PathBuf::from("models/text-recognition.rten"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Run the code extraction step after OCR
    pub enabled: bool,
    /// Text generation executable
    pub program: String,
    pub subcommand: String,
    pub model: String,
    /// Flag placed before the prompt, if the program wants one
    pub prompt_flag: Option<String>,
    pub timeout_secs: u64,
    /// Upper bound on concurrently running generation processes
    pub max_concurrent: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "ollama".to_string(),
            subcommand: "run".to_string(),
            model: "codellama".to_string(),
            prompt_flag: None,
            timeout_secs: 45,
            max_concurrent: 2,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory the video registry is built from
    pub videos_dir: PathBuf,
    /// MIME type of the only accepted video container
    pub accepted_mime: String,
    pub ocr: OcrConfig,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from("./resources"),
            accepted_mime: "video/mp4".to_string(),
            ocr: OcrConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

fn file_provider(figment: Figment, config_path: &Path) -> Result<Figment> {
    match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(figment.merge(Toml::file(config_path))),
        Some("json") => Ok(figment.merge(Json::file(config_path))),
        Some("yaml") | Some("yml") => Ok(figment.merge(Yaml::file(config_path))),
        _ => {
            log::error!("Cannot identify config file type. Must be .toml, .json or .yaml");
            bail!(
                "unsupported config file type: {} (must be .toml, .json or .yaml)",
                config_path.display()
            )
        }
    }
}

/// Defaults, then the config file, then `CODEFRAME_*` variables, then CLI flags.
pub fn load_config(args: &CliArgs) -> Result<Config> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    let config_path = PathBuf::from(
        args.config
            .clone()
            .unwrap_or(DEFAULT_CONFIG_PATH.to_string()),
    );

    if config_path.exists() {
        log::info!("Config file found: {}", config_path.display());
        figment = file_provider(figment, &config_path)?;
    } else if config_path.to_str() != Some(DEFAULT_CONFIG_PATH) {
        log::warn!("Config file not found: {}", config_path.display());
        bail!("config file not found: {}", config_path.display());
    }

    let mut config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .merge(Serialized::defaults(args.overrides()))
        .extract()?;

    let videos_dir = config.videos_dir.resolve().normalize();
    config.videos_dir = videos_dir;

    log::debug!("Loaded config: {:#?}", config);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["codeframe"];
        argv.extend_from_slice(extra);
        argv.push("list");
        CliArgs::parse_from(argv)
    }

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("codeframe-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = load_config(&args(&["--config", "config.toml"])).unwrap();
        let defaults = Config::default();

        assert_eq!(config.ocr, defaults.ocr);
        assert_eq!(config.llm.timeout_secs, 45);
        assert_eq!(config.llm.program, "ollama");
        assert_eq!(config.accepted_mime, "video/mp4");
        assert!(config.videos_dir.is_absolute());
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let path = write_temp(
            "override.toml",
            r#"
accepted_mime = "video/x-msvideo"

[ocr]
engine = "detection"
language = "deu"

[llm]
model = "qwen2.5-coder"
timeout_secs = 10
"#,
        );
        let config = load_config(&args(&["--config", path.to_str().unwrap()])).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.accepted_mime, "video/x-msvideo");
        assert_eq!(config.ocr.engine, EngineKind::Detection);
        assert_eq!(config.ocr.language, "deu");
        assert_eq!(config.ocr.tesseract, "tesseract");
        assert_eq!(config.llm.model, "qwen2.5-coder");
        assert_eq!(config.llm.timeout_secs, 10);
        assert!(config.llm.enabled);
    }

    #[test]
    fn test_cli_overrides_file() {
        let path = write_temp("cli.json", r#"{ "ocr": { "engine": "detection" }, "llm": { "model": "a" } }"#);
        let config = load_config(&args(&[
            "--config",
            path.to_str().unwrap(),
            "--engine",
            "line",
            "--llm-model",
            "b",
            "--no-refine",
        ]))
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.ocr.engine, EngineKind::Line);
        assert_eq!(config.llm.model, "b");
        assert!(!config.llm.enabled);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = load_config(&args(&["--config", "/missing/codeframe.toml"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_extension_is_error() {
        let path = write_temp("config.ini", "engine = line");
        let result = load_config(&args(&["--config", path.to_str().unwrap()]));
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }
}
