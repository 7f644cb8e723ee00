use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::Command;
use crate::config::Config;
use crate::extract::CodeExtractionResult;
use crate::frame::ImageFormat;
use crate::ocr::OcrResult;
use crate::pipeline::{FrameRequest, Pipeline, extract_frame, video_metadata};
use crate::registry::VideoRegistry;
use crate::video::VideoMetadata;

#[derive(Serialize, Debug, PartialEq)]
struct Link {
    rel: &'static str,
    command: String,
}

#[derive(Serialize, Debug)]
struct VideoEntry<'a> {
    id: &'a str,
    path: &'a Path,
    links: Vec<Link>,
}

#[derive(Serialize, Debug)]
struct InfoReport<'a> {
    id: &'a str,
    path: &'a Path,
    #[serde(flatten)]
    metadata: VideoMetadata,
    summary: String,
}

#[derive(Serialize, Debug)]
struct FrameReport<'a> {
    id: &'a str,
    timestamp_seconds: f64,
    frame_index: i64,
    width: u32,
    height: u32,
    format: ImageFormat,
    mime: &'static str,
    output: &'a Path,
}

#[derive(Serialize, Debug)]
struct OcrReport<'a> {
    id: &'a str,
    timestamp_seconds: f64,
    frame_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<&'a Path>,
    ocr: Option<&'a OcrResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocr_error: Option<String>,
    code: Option<&'a CodeExtractionResult>,
}

fn links(id: &str) -> Vec<Link> {
    vec![
        Link {
            rel: "info",
            command: format!("codeframe info {id}"),
        },
        Link {
            rel: "frame",
            command: format!("codeframe frame {id} <SECONDS>"),
        },
        Link {
            rel: "ocr",
            command: format!("codeframe ocr {id} <SECONDS>"),
        },
    ]
}

fn default_frame_path(id: &str, seconds: f64) -> PathBuf {
    PathBuf::from(format!("{id}_{seconds}.png"))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_png(path: &Path, encoded: &[u8]) -> Result<()> {
    std::fs::write(path, encoded).with_context(|| format!("writing {}", path.display()))?;
    log::info!("Saved frame to {}", path.display());
    Ok(())
}

fn list(registry: &VideoRegistry) -> Result<()> {
    let entries: Vec<VideoEntry> = registry
        .iter()
        .map(|(id, path)| VideoEntry {
            id,
            path,
            links: links(id),
        })
        .collect();

    print_json(&entries)
}

async fn info(registry: &VideoRegistry, id: &str) -> Result<()> {
    let metadata = video_metadata(registry, id).await?;
    let path = registry.resolve(id)?;

    print_json(&InfoReport {
        id,
        path,
        metadata,
        summary: metadata.to_string(),
    })
}

async fn frame(
    registry: &VideoRegistry,
    id: &str,
    seconds: f64,
    output: Option<&Path>,
) -> Result<()> {
    let request = FrameRequest::new(id, seconds);
    let frame = extract_frame(registry, &request).await?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_frame_path(id, seconds));
    write_png(&output, &frame.encoded)?;

    print_json(&FrameReport {
        id,
        timestamp_seconds: seconds,
        frame_index: frame.frame_index,
        width: frame.pixels.width,
        height: frame.pixels.height,
        format: frame.format,
        mime: frame.format.mime(),
        output: &output,
    })
}

async fn ocr(
    config: &Config,
    registry: &VideoRegistry,
    id: &str,
    seconds: f64,
    save: Option<&Path>,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let output = pipeline.run(registry, FrameRequest::new(id, seconds)).await?;

    if let Some(path) = save {
        write_png(path, &output.frame.encoded)?;
    }

    print_json(&OcrReport {
        id,
        timestamp_seconds: seconds,
        frame_index: output.frame.frame_index,
        saved: save,
        ocr: output.ocr.as_ref().ok(),
        ocr_error: output.ocr.as_ref().err().map(ToString::to_string),
        code: output.code.as_ref(),
    })
}

pub async fn run(command: &Command, config: &Config, registry: &VideoRegistry) -> Result<()> {
    match command {
        Command::List => list(registry),
        Command::Info { video } => info(registry, video).await,
        Command::Frame {
            video,
            seconds,
            output,
        } => frame(registry, video, *seconds, output.as_deref()).await,
        Command::Ocr {
            video,
            seconds,
            save,
        } => ocr(config, registry, video, *seconds, save.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_point_at_commands() {
        let links = links("oop");
        let rels: Vec<&str> = links.iter().map(|link| link.rel).collect();

        assert_eq!(rels, vec!["info", "frame", "ocr"]);
        assert_eq!(links[0].command, "codeframe info oop");
        assert_eq!(links[2].command, "codeframe ocr oop <SECONDS>");
    }

    #[test]
    fn test_default_frame_path() {
        assert_eq!(default_frame_path("oop", 12.5), PathBuf::from("oop_12.5.png"));
        assert_eq!(default_frame_path("oop", 3.0), PathBuf::from("oop_3.png"));
    }

    #[test]
    fn test_info_report_is_flat() {
        let metadata = VideoMetadata {
            fps: 30.0,
            frame_count: 300,
            duration_seconds: 10.0,
        };
        let report = InfoReport {
            id: "oop",
            path: Path::new("/videos/oop.mp4"),
            metadata,
            summary: metadata.to_string(),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["frame_count"], serde_json::json!(300));
        assert_eq!(
            value["summary"],
            serde_json::json!("FPS: 30.00. Frame Count: 300. Duration: 0.17 minutes")
        );
    }
}
