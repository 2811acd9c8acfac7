//! The external tools a merge can be delegated to, each with its own calling convention.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::MergeConfig;
use crate::process::{Invocation, ProcessRunner};

/// One way of concatenating PDFs with an external tool.
pub trait MergeStrategy: Send + Sync {
    /// Short tool name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Locate the binary, or explain why it is unusable.
    fn resolve(&self, runner: &dyn ProcessRunner) -> Result<PathBuf, String>;

    /// Build the command merging `inputs` into `output`. Paths are already absolute.
    fn invocation(&self, binary: &Path, inputs: &[PathBuf], output: &Path) -> Result<Invocation, String>;
}

/// `node <script> <output> <input>...` with pdf-lib on `NODE_PATH`.
#[derive(Debug, Clone)]
pub struct NodeScriptStrategy {
    config: MergeConfig,
}

impl NodeScriptStrategy {
    pub const CANDIDATES: &'static [&'static str] = &["node", "nodejs"];

    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    fn script_path(&self) -> Result<PathBuf, String> {
        let script = std::path::absolute(&self.config.script_path)
            .map_err(|e| format!("failed to resolve merge script path: {}", e))?;
        if !script.is_file() {
            return Err(format!("merge script not found at {}", script.display()));
        }
        Ok(script)
    }

    /// Configured `node_modules`, else the one beside the script's parent directory.
    fn node_modules(&self, script: &Path) -> Result<PathBuf, String> {
        let candidate = match &self.config.node_modules {
            Some(dir) => std::path::absolute(dir)
                .map_err(|e| format!("failed to resolve node_modules path: {}", e))?,
            None => script
                .parent()
                .and_then(Path::parent)
                .map(|root| root.join("node_modules"))
                .ok_or_else(|| "cannot derive node_modules location from script path".to_string())?,
        };
        if !candidate.is_dir() {
            return Err(format!("pdf-lib dependency not found at {}", candidate.display()));
        }
        Ok(candidate)
    }
}

impl MergeStrategy for NodeScriptStrategy {
    fn name(&self) -> &'static str {
        "node"
    }

    fn resolve(&self, runner: &dyn ProcessRunner) -> Result<PathBuf, String> {
        if let Some(configured) = self.config.node_binary.as_deref() {
            let path = Path::new(configured);
            if path.is_absolute() {
                return match std::fs::metadata(path) {
                    Ok(meta) if meta.is_dir() => {
                        Err(format!("configured node binary {} is a directory", configured))
                    }
                    Ok(_) => Ok(path.to_path_buf()),
                    Err(_) => Err(format!("configured node binary {} is not accessible", configured)),
                };
            }
            if let Some(found) = runner.find(configured) {
                return Ok(found);
            }
        }

        Self::CANDIDATES
            .iter()
            .find_map(|name| runner.find(name))
            .ok_or_else(|| format!("node binary not found (tried: {})", Self::CANDIDATES.join(", ")))
    }

    fn invocation(&self, binary: &Path, inputs: &[PathBuf], output: &Path) -> Result<Invocation, String> {
        let script = self.script_path()?;
        let node_modules = self.node_modules(&script)?;
        Ok(Invocation::new(binary)
            .arg(script.as_os_str())
            .arg(output.as_os_str())
            .args(inputs.iter().map(|p| p.as_os_str()))
            .env("NODE_PATH", node_modules.as_os_str()))
    }
}

/// `gs -q -dNOPAUSE -dBATCH -sDEVICE=pdfwrite -sOutputFile=<output> <input>...`
#[derive(Debug, Clone, Default)]
pub struct GhostscriptStrategy;

impl MergeStrategy for GhostscriptStrategy {
    fn name(&self) -> &'static str {
        "gs"
    }

    fn resolve(&self, runner: &dyn ProcessRunner) -> Result<PathBuf, String> {
        runner
            .find("gs")
            .ok_or_else(|| "gs not found on PATH".to_string())
    }

    fn invocation(&self, binary: &Path, inputs: &[PathBuf], output: &Path) -> Result<Invocation, String> {
        let mut output_flag = OsString::from("-sOutputFile=");
        output_flag.push(output);
        Ok(Invocation::new(binary)
            .args(["-q", "-dNOPAUSE", "-dBATCH", "-sDEVICE=pdfwrite"])
            .arg(output_flag)
            .args(inputs.iter().map(|p| p.as_os_str())))
    }
}

/// `pdfunite <input>... <output>`
#[derive(Debug, Clone, Default)]
pub struct PdfuniteStrategy;

impl MergeStrategy for PdfuniteStrategy {
    fn name(&self) -> &'static str {
        "pdfunite"
    }

    fn resolve(&self, runner: &dyn ProcessRunner) -> Result<PathBuf, String> {
        runner
            .find("pdfunite")
            .ok_or_else(|| "pdfunite not found on PATH".to_string())
    }

    fn invocation(&self, binary: &Path, inputs: &[PathBuf], output: &Path) -> Result<Invocation, String> {
        Ok(Invocation::new(binary)
            .args(inputs.iter().map(|p| p.as_os_str()))
            .arg(output.as_os_str()))
    }
}
