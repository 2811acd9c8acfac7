//! DOCX → PDF conversion through a scripted office binary.

mod common;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Behaviour, FakeRunner};
use research_fund_server::config::ConverterConfig;
use research_fund_server::conversion::DocumentConverter;
use research_fund_server::error::PipelineError;

fn converter(runner: Arc<FakeRunner>) -> DocumentConverter {
    DocumentConverter::new(ConverterConfig::default(), runner)
}

#[tokio::test]
async fn test_convert_bytes_names_scratch_file_after_stem() {
    let runner = Arc::new(FakeRunner::new().with_tool("soffice", Behaviour::Succeed));

    let pdf = converter(runner.clone())
        .convert_bytes(b"PK fake docx", "preview_PR-2568-0001")
        .await
        .unwrap();

    let text = String::from_utf8(pdf).unwrap();
    assert!(text.starts_with("%PDF-fake "), "{}", text);
    assert!(text.ends_with("preview_PR-2568-0001.docx"), "{}", text);
}

#[tokio::test]
async fn test_prefers_soffice_then_libreoffice() {
    let runner = Arc::new(FakeRunner::new().with_tool("libreoffice", Behaviour::Succeed));

    converter(runner.clone())
        .convert_bytes(b"docx", "form")
        .await
        .unwrap();

    assert_eq!(runner.programs_run(), vec!["libreoffice".to_string()]);
}

#[tokio::test]
async fn test_concurrent_conversions_use_isolated_workspaces() {
    let runner = Arc::new(FakeRunner::new().with_tool("soffice", Behaviour::Succeed));
    let converter = Arc::new(converter(runner.clone()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let converter = converter.clone();
        handles.push(tokio::spawn(async move {
            converter.convert_bytes(b"docx", &format!("form{}", i)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let calls = runner.calls();
    assert_eq!(calls.len(), 4);

    let profiles: HashSet<String> = calls.iter().map(|c| c.display_args()[0].clone()).collect();
    assert_eq!(profiles.len(), 4);

    for call in &calls {
        let out_dir = PathBuf::from(&call.display_args()[5]);
        let fonts_conf = call
            .envs
            .iter()
            .find(|(key, _)| key == "FONTCONFIG_FILE")
            .map(|(_, value)| PathBuf::from(value))
            .unwrap();
        assert_eq!(fonts_conf.parent(), out_dir.parent());
        assert!(!out_dir.exists(), "work dir left behind: {}", out_dir.display());
    }
}

#[tokio::test]
async fn test_missing_input_is_not_found() {
    let runner = Arc::new(FakeRunner::new().with_tool("soffice", Behaviour::Succeed));
    let err = converter(runner)
        .convert_to_pdf(Path::new("/nonexistent/form.docx"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)), "{:?}", err);
}

#[tokio::test]
async fn test_no_converter_installed() {
    let err = converter(Arc::new(FakeRunner::new()))
        .convert_bytes(b"docx", "form")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ToolUnavailable { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_converter_failure_carries_stderr() {
    let runner = Arc::new(
        FakeRunner::new().with_tool("soffice", Behaviour::Fail("Error: source file could not be loaded".into())),
    );
    let err = converter(runner)
        .convert_bytes(b"docx", "form")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ToolFailed { .. }), "{:?}", err);
    assert!(err.to_string().contains("source file could not be loaded"));
}
