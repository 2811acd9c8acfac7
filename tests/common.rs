//! Shared fakes for the integration tests: a scripted process runner, an in-memory
//! sequence store and a tiny DOCX builder.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use research_fund_server::config::{AppConfig, ConverterConfig, MergeConfig};
use research_fund_server::error::PipelineError;
use research_fund_server::numbering::SequenceStore;
use research_fund_server::process::{Invocation, ProcessError, ProcessOutput, ProcessRunner};

/// What a fake binary does when it is run.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Exit 0 and write the output file the tool is expected to produce.
    Succeed,
    /// Exit 1 with `stderr`.
    Fail(String),
    /// Exit 0 without writing anything.
    SucceedWithoutOutput,
}

/// Process runner whose binaries only exist in memory.
///
/// Merge tools write the concatenated inputs to their output, the office converter
/// writes `%PDF-fake <input name>` into `--outdir`.
#[derive(Default)]
pub struct FakeRunner {
    tools: HashMap<String, Behaviour>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: &str, behaviour: Behaviour) -> Self {
        self.tools.insert(name.to_string(), behaviour);
        self
    }

    /// Names of the programs run so far, in order.
    pub fn programs_run(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| program_name(&call.program))
            .collect()
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Where the tool behind `invocation` is expected to write its result.
fn expected_output(name: &str, args: &[OsString]) -> Option<PathBuf> {
    let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
    if let Some(flag) = args.iter().find(|a| a.starts_with("-sOutputFile=")) {
        return Some(PathBuf::from(flag.trim_start_matches("-sOutputFile=")));
    }
    if let Some(pos) = args.iter().position(|a| a == "--outdir") {
        let dir = PathBuf::from(args.get(pos + 1)?);
        let input = PathBuf::from(args.last()?);
        let stem = input.file_stem()?.to_string_lossy().into_owned();
        return Some(dir.join(format!("{}.pdf", stem)));
    }
    match name {
        "node" | "nodejs" => args.get(1).map(PathBuf::from),
        _ => args.last().map(PathBuf::from),
    }
}

fn merge_inputs(name: &str, args: &[OsString]) -> Vec<PathBuf> {
    let args: Vec<PathBuf> = args.iter().map(PathBuf::from).collect();
    match name {
        "node" | "nodejs" => args.iter().skip(2).cloned().collect(),
        "gs" => args.iter().skip(5).cloned().collect(),
        _ => args[..args.len().saturating_sub(1)].to_vec(),
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    fn find(&self, name: &str) -> Option<PathBuf> {
        self.tools
            .contains_key(name)
            .then(|| PathBuf::from("/fake/bin").join(name))
    }

    async fn run(&self, invocation: Invocation) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let name = program_name(&invocation.program);
        let behaviour = self.tools.get(&name).cloned().ok_or_else(|| ProcessError::Spawn {
            program: name.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such fake tool"),
        })?;

        match behaviour {
            Behaviour::Fail(stderr) => Ok(ProcessOutput {
                success: false,
                code: Some(1),
                stdout: Vec::new(),
                stderr: stderr.into_bytes(),
            }),
            Behaviour::SucceedWithoutOutput => Ok(ProcessOutput {
                success: true,
                code: Some(0),
                ..ProcessOutput::default()
            }),
            Behaviour::Succeed => {
                let output = expected_output(&name, &invocation.args).expect("fake tool needs an output path");
                let contents = if invocation.args.iter().any(|a| a == "--outdir") {
                    let input = invocation.args.last().expect("converter input");
                    format!("%PDF-fake {}", Path::new(input).display()).into_bytes()
                } else {
                    let mut merged = Vec::new();
                    for input in merge_inputs(&name, &invocation.args) {
                        merged.extend(std::fs::read(&input).expect("merge input readable"));
                    }
                    merged
                };
                std::fs::write(&output, contents).expect("fake output written");
                Ok(ProcessOutput {
                    success: true,
                    code: Some(0),
                    ..ProcessOutput::default()
                })
            }
        }
    }
}

/// Sequence store kept in memory; `persist` simulates the insert that follows generation.
#[derive(Default)]
pub struct MemoryStore {
    pub year_label: Option<String>,
    numbers: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn with_year(label: &str) -> Self {
        Self {
            year_label: Some(label.to_string()),
            numbers: Mutex::new(HashSet::new()),
        }
    }

    pub fn persist(&self, number: &str) {
        self.numbers.lock().unwrap().insert(number.to_string());
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn current_year_label(&self) -> Result<Option<String>, PipelineError> {
        Ok(self.year_label.clone())
    }

    async fn count_numbers_with_prefix(&self, prefix: &str) -> Result<i64, PipelineError> {
        let numbers = self.numbers.lock().unwrap();
        Ok(numbers.iter().filter(|n| n.starts_with(prefix)).count() as i64)
    }

    async fn number_exists(&self, number: &str) -> Result<bool, PipelineError> {
        Ok(self.numbers.lock().unwrap().contains(number))
    }
}

/// A minimal `.docx` package with `document_xml` as `word/document.xml`.
pub fn build_docx(document_xml: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document_xml.as_bytes()).unwrap();
    writer.start_file("word/media/image1.png", options).unwrap();
    writer.write_all(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]).unwrap();

    writer.finish().unwrap().into_inner()
}

/// Contents of `name` inside a zip package.
pub fn read_part(package: &[u8], name: &str) -> Vec<u8> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(package)).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    data
}

pub fn wrap_body(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// Configuration rooted in `root`: uploads under `root/uploads`, the template at
/// `root/template.docx` and no merge script.
pub fn test_config(root: &Path) -> AppConfig {
    AppConfig {
        database_url: String::new(),
        upload_root: root.join("uploads"),
        template_path: root.join("template.docx"),
        converter: ConverterConfig::default(),
        merge: MergeConfig {
            node_binary: None,
            script_path: root.join("missing/merge_pdf.js"),
            node_modules: None,
        },
        tool_timeout: None,
        max_upload_bytes: 64 << 20,
        bind_address: "127.0.0.1".to_string(),
        port: 0,
    }
}
