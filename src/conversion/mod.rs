//! DOCX → PDF conversion through a headless office suite.

pub mod fonts;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::config::ConverterConfig;
use crate::error::PipelineError;
use crate::process::{Invocation, ProcessError, ProcessRunner};

pub use fonts::{fontconfig_document, write_fontconfig, FONT_ALIASES};

const TOOL: &str = "libreoffice";

/// Names searched on `PATH` when no explicit binary is configured.
pub const CONVERTER_CANDIDATES: &[&str] = &["soffice", "libreoffice"];

/// Filter passed to `--convert-to`, with fonts embedded.
pub const PDF_EXPORT_FILTER: &str = "pdf:writer_pdf_Export:EmbedStandardFonts=true;EmbedFonts=true";

pub struct DocumentConverter {
    config: ConverterConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl DocumentConverter {
    pub fn new(config: ConverterConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Locate the converter binary.
    ///
    /// A configured path must exist and must not be a directory; it is never silently
    /// replaced by a `PATH` lookup.
    pub async fn resolve_binary(&self) -> Result<PathBuf, PipelineError> {
        if let Some(configured) = &self.config.binary {
            return match tokio::fs::metadata(configured).await {
                Ok(meta) if meta.is_dir() => Err(PipelineError::validation(format!(
                    "configured converter {} is a directory",
                    configured.display()
                ))),
                Ok(_) => Ok(configured.clone()),
                Err(_) => Err(PipelineError::ToolUnavailable {
                    tool: TOOL.to_string(),
                    tried: vec![configured.display().to_string()],
                }),
            };
        }

        CONVERTER_CANDIDATES
            .iter()
            .find_map(|name| self.runner.find(name))
            .ok_or_else(|| PipelineError::ToolUnavailable {
                tool: TOOL.to_string(),
                tried: CONVERTER_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            })
    }

    /// Convert the document at `input` and return the PDF bytes.
    ///
    /// Every call works in its own temporary directory, which is removed on return.
    pub async fn convert_to_pdf(&self, input: &Path) -> Result<Vec<u8>, PipelineError> {
        let input = std::path::absolute(input)?;
        let is_file = tokio::fs::metadata(&input)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(PipelineError::not_found(format!(
                "document to convert not found: {}",
                input.display()
            )));
        }
        let stem = input
            .file_stem()
            .map(|s| s.to_os_string())
            .ok_or_else(|| PipelineError::validation("document path has no file name"))?;

        let binary = self.resolve_binary().await?;

        let work_dir = tempfile::Builder::new().prefix("docx-convert-").tempdir()?;
        let profile_dir = work_dir.path().join("lo-profile");
        let out_dir = work_dir.path().join("out");
        tokio::fs::create_dir_all(&profile_dir).await?;
        tokio::fs::create_dir_all(&out_dir).await?;

        let profile_url = Url::from_directory_path(&profile_dir).map_err(|_| {
            PipelineError::validation(format!(
                "cannot express {} as a file URL",
                profile_dir.display()
            ))
        })?;
        let fonts_conf = write_fontconfig(work_dir.path(), &self.config.font_dirs).await?;

        let invocation = Invocation::new(&binary)
            .arg(format!("-env:UserInstallation={}", profile_url))
            .arg("--headless")
            .arg("--convert-to")
            .arg(PDF_EXPORT_FILTER)
            .arg("--outdir")
            .arg(out_dir.as_os_str())
            .arg(input.as_os_str())
            .env(fonts::FONTCONFIG_FILE_VAR, fonts_conf.as_os_str())
            .current_dir(work_dir.path());

        log::info!("converting {} with {}", input.display(), binary.display());
        let output = self
            .runner
            .run(invocation)
            .await
            .map_err(|e| process_failure(&e))?;

        if !output.success {
            return Err(PipelineError::tool_failed(
                TOOL,
                format!("exit {:?}: {}", output.code, output.combined()),
            ));
        }

        let mut pdf_name = OsString::from(stem);
        pdf_name.push(".pdf");
        let pdf_path = out_dir.join(pdf_name);
        match tokio::fs::read(&pdf_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PipelineError::tool_failed(
                TOOL,
                format!(
                    "expected output {} was not produced: {}",
                    pdf_path.display(),
                    output.combined()
                ),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Convert in-memory DOCX bytes. `file_stem` names the scratch file.
    pub async fn convert_bytes(&self, docx: &[u8], file_stem: &str) -> Result<Vec<u8>, PipelineError> {
        let scratch = tempfile::Builder::new().prefix("docx-source-").tempdir()?;
        let input = scratch.path().join(format!("{}.docx", file_stem));
        tokio::fs::write(&input, docx).await?;
        self.convert_to_pdf(&input).await
    }
}

fn process_failure(err: &ProcessError) -> PipelineError {
    PipelineError::tool_failed(TOOL, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;

    /// Writes `<stem>.pdf` into `--outdir` unless told to fail.
    struct OfficeStub {
        found: Option<PathBuf>,
        exit_ok: bool,
        write_output: bool,
        calls: Mutex<Vec<Invocation>>,
    }

    impl OfficeStub {
        fn new(found: Option<&str>) -> Self {
            Self {
                found: found.map(PathBuf::from),
                exit_ok: true,
                write_output: true,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for OfficeStub {
        fn find(&self, name: &str) -> Option<PathBuf> {
            self.found
                .as_ref()
                .filter(|p| p.file_name().map(|f| f == name).unwrap_or(false))
                .cloned()
        }

        async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, ProcessError> {
            let args = invocation.display_args();
            self.calls.lock().unwrap().push(invocation);
            if self.write_output {
                let out_dir = args
                    .iter()
                    .position(|a| a == "--outdir")
                    .map(|i| PathBuf::from(&args[i + 1]))
                    .unwrap();
                let input = PathBuf::from(args.last().unwrap());
                let name = format!("{}.pdf", input.file_stem().unwrap().to_string_lossy());
                fs::write(out_dir.join(name), b"%PDF-1.7 converted").unwrap();
            }
            Ok(ProcessOutput {
                success: self.exit_ok,
                code: Some(if self.exit_ok { 0 } else { 81 }),
                stdout: Vec::new(),
                stderr: if self.exit_ok { Vec::new() } else { b"source file could not be loaded".to_vec() },
            })
        }
    }

    fn converter(runner: Arc<OfficeStub>) -> DocumentConverter {
        DocumentConverter::new(ConverterConfig::default(), runner)
    }

    #[tokio::test]
    async fn test_converts_with_contract_arguments() {
        let runner = Arc::new(OfficeStub::new(Some("/usr/bin/libreoffice")));
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("reward form.docx");
        fs::write(&input, b"docx").unwrap();

        let pdf = converter(runner.clone()).convert_to_pdf(&input).await.unwrap();
        assert_eq!(pdf, b"%PDF-1.7 converted");

        let calls = runner.calls.lock().unwrap();
        let call = &calls[0];
        assert_eq!(call.program, PathBuf::from("/usr/bin/libreoffice"));
        let args = call.display_args();
        assert!(args[0].starts_with("-env:UserInstallation=file://"));
        assert_eq!(&args[1..4], &["--headless", "--convert-to", PDF_EXPORT_FILTER]);
        assert_eq!(args[4], "--outdir");
        assert_eq!(args[6], input.to_string_lossy());
        assert!(call
            .envs
            .iter()
            .any(|(k, _)| k == fonts::FONTCONFIG_FILE_VAR));
    }

    #[tokio::test]
    async fn test_temp_dir_removed_after_conversion() {
        let runner = Arc::new(OfficeStub::new(Some("/usr/bin/soffice")));
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.docx");
        fs::write(&input, b"docx").unwrap();

        converter(runner.clone()).convert_to_pdf(&input).await.unwrap();
        let args = runner.calls.lock().unwrap()[0].display_args();
        assert!(!Path::new(&args[5]).exists());
    }

    #[tokio::test]
    async fn test_non_zero_exit_surfaces_output() {
        let mut stub = OfficeStub::new(Some("/usr/bin/soffice"));
        stub.exit_ok = false;
        stub.write_output = false;
        let runner = Arc::new(stub);
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.docx");
        fs::write(&input, b"docx").unwrap();

        let err = converter(runner.clone()).convert_to_pdf(&input).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("source file could not be loaded"), "{}", message);

        let args = runner.calls.lock().unwrap()[0].display_args();
        assert!(!Path::new(&args[5]).exists());
    }

    #[tokio::test]
    async fn test_missing_output_is_failure() {
        let mut stub = OfficeStub::new(Some("/usr/bin/soffice"));
        stub.write_output = false;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.docx");
        fs::write(&input, b"docx").unwrap();

        let err = converter(Arc::new(stub)).convert_to_pdf(&input).await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { .. }));
        assert!(err.to_string().contains("was not produced"));
    }

    #[tokio::test]
    async fn test_no_binary_lists_candidates() {
        let err = converter(Arc::new(OfficeStub::new(None)))
            .resolve_binary()
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "libreoffice binary not found (tried: soffice; libreoffice)"
        );
    }

    #[tokio::test]
    async fn test_configured_binary_must_exist_and_be_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner: Arc<dyn ProcessRunner> = Arc::new(OfficeStub::new(Some("/usr/bin/soffice")));

        let as_dir = DocumentConverter::new(
            ConverterConfig {
                binary: Some(dir.path().to_path_buf()),
                font_dirs: Vec::new(),
            },
            runner.clone(),
        );
        assert!(matches!(as_dir.resolve_binary().await, Err(PipelineError::Validation(_))));

        let missing = DocumentConverter::new(
            ConverterConfig {
                binary: Some(dir.path().join("soffice")),
                font_dirs: Vec::new(),
            },
            runner.clone(),
        );
        assert!(matches!(
            missing.resolve_binary().await,
            Err(PipelineError::ToolUnavailable { .. })
        ));

        let file = dir.path().join("lo");
        fs::write(&file, b"").unwrap();
        let present = DocumentConverter::new(
            ConverterConfig {
                binary: Some(file.clone()),
                font_dirs: Vec::new(),
            },
            runner,
        );
        assert_eq!(present.resolve_binary().await.unwrap(), file);
    }
}
