use std::path::{Path, PathBuf};
use std::time::Duration;

use codeframe::config::{LlmConfig, OcrConfig};
use codeframe::ocr::build_engine;
use codeframe::{CodeExtractor, ExtractionStatus, FrameRequest, Pipeline, VideoRegistry};
use opencv::prelude::*;
use opencv::{core, imgproc, videoio};

fn temp_video(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("codeframe-it-{}-{}.avi", name, std::process::id()))
}

/// One second of video at 1 fps: a single white frame with `text` in black.
fn write_text_video(path: &Path, text: &str) {
    let size = core::Size::new(640, 160);
    let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
    let mut writer =
        videoio::VideoWriter::new(path.to_str().unwrap(), fourcc, 1.0, size, true).unwrap();
    assert!(writer.is_opened().unwrap());

    let mut frame = core::Mat::new_rows_cols_with_default(
        size.height,
        size.width,
        core::CV_8UC3,
        core::Scalar::all(255.0),
    )
    .unwrap();
    imgproc::put_text(
        &mut frame,
        text,
        core::Point::new(40, 100),
        imgproc::FONT_HERSHEY_SIMPLEX,
        2.0,
        core::Scalar::all(0.0),
        3,
        imgproc::LINE_8,
        false,
    )
    .unwrap();

    writer.write(&frame).unwrap();
    writer.release().unwrap();
}

#[cfg(unix)]
#[tokio::test]
#[ignore = "needs the tesseract executable with English language data"]
async fn test_print_statement_survives_the_pipeline() {
    let path = temp_video("print");
    write_text_video(&path, "print(1)");

    let mut registry = VideoRegistry::new("video/x-msvideo");
    registry.insert("print", &path);

    let ocr = build_engine(&OcrConfig {
        psm: Some(7),
        ..OcrConfig::default()
    })
    .unwrap();
    let extractor = CodeExtractor::new(&LlmConfig {
        program: "sh".to_string(),
        subcommand: "-c".to_string(),
        model: "printf 'print(1)'".to_string(),
        ..LlmConfig::default()
    })
    .with_timeout(Duration::from_secs(10));
    let pipeline = Pipeline::new(ocr, Some(extractor));

    let output = pipeline
        .run(&registry, FrameRequest::new("print", 0.0))
        .await
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(output.frame.frame_index, 0);
    assert!(output.ocr_text().unwrap().contains("print(1)"));
    let code = output.code.unwrap();
    assert_eq!(code.status, ExtractionStatus::Success);
    assert_eq!(code.text, "print(1)");
}

#[tokio::test]
async fn test_frame_at_end_of_video_is_out_of_range() {
    let path = temp_video("end");
    write_text_video(&path, "x = 1");

    let mut registry = VideoRegistry::new("video/x-msvideo");
    registry.insert("end", &path);

    let result = codeframe::pipeline::extract_frame(&registry, &FrameRequest::new("end", 1.0)).await;
    std::fs::remove_file(&path).unwrap();

    assert!(matches!(
        result,
        Err(codeframe::PipelineError::Video(codeframe::VideoError::OutOfRange { .. }))
    ));
}
