//! PDF merge orchestration.
//!
//! Strategies are tried in order; the first whose binary resolves and exits cleanly wins.
//! Failures are only reported when every strategy has failed.

pub mod strategy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::MergeConfig;
use crate::error::PipelineError;
use crate::process::ProcessRunner;

pub use strategy::{GhostscriptStrategy, MergeStrategy, NodeScriptStrategy, PdfuniteStrategy};

const TOOL: &str = "pdf merge";
const PDF_MAGIC: &[u8] = b"%PDF";

pub struct PdfMerger {
    strategies: Vec<Box<dyn MergeStrategy>>,
    runner: Arc<dyn ProcessRunner>,
}

impl PdfMerger {
    /// node → gs → pdfunite.
    pub fn new(config: MergeConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let strategies: Vec<Box<dyn MergeStrategy>> = vec![
            Box::new(NodeScriptStrategy::new(config)),
            Box::new(GhostscriptStrategy),
            Box::new(PdfuniteStrategy),
        ];
        Self::with_strategies(strategies, runner)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MergeStrategy>>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { strategies, runner }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Merge `inputs` in order into `output` and return the absolute output path.
    pub async fn merge_pdfs(&self, inputs: &[PathBuf], output: &Path) -> Result<PathBuf, PipelineError> {
        if inputs.is_empty() {
            return Err(PipelineError::validation("no pdf files provided for merging"));
        }

        let output = std::path::absolute(output)?;
        let inputs = inputs
            .iter()
            .map(std::path::absolute)
            .collect::<Result<Vec<_>, _>>()?;

        let mut attempts: Vec<String> = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match self.attempt(strategy.as_ref(), &inputs, &output).await {
                Ok(()) => {
                    log::info!(
                        "[merge] merged {} file(s) into {} with {}",
                        inputs.len(),
                        output.display(),
                        strategy.name()
                    );
                    return Ok(output);
                }
                Err(reason) => {
                    log::warn!("[merge] {} strategy failed: {}", strategy.name(), reason);
                    attempts.push(format!("{} ({})", strategy.name(), reason));
                }
            }
        }

        if attempts.is_empty() {
            return Err(PipelineError::tool_failed(TOOL, "no merge strategy available"));
        }
        Err(PipelineError::tool_failed(TOOL, attempts.join("; ")))
    }

    async fn attempt(&self, strategy: &dyn MergeStrategy, inputs: &[PathBuf], output: &Path) -> Result<(), String> {
        let binary = strategy.resolve(self.runner.as_ref())?;
        let invocation = strategy.invocation(&binary, inputs, output)?;
        let result = self.runner.run(invocation).await.map_err(|e| e.to_string())?;
        if !result.success {
            return Err(result.failure_message());
        }
        let written = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !written {
            return Err(format!("exited cleanly but {} was not written", output.display()));
        }
        Ok(())
    }

    /// Append `attachments` to the `base` PDF.
    ///
    /// Blank attachments are skipped; anything else must start with `%PDF`. When nothing
    /// is left to append, `base` comes back unchanged.
    pub async fn merge_with_attachments(
        &self,
        base: &[u8],
        attachments: &[(String, Vec<u8>)],
    ) -> Result<Vec<u8>, PipelineError> {
        if attachments.is_empty() {
            return Ok(base.to_vec());
        }

        let work_dir = tempfile::Builder::new().prefix("pdf-merge-").tempdir()?;
        let base_path = work_dir.path().join("base.pdf");
        tokio::fs::write(&base_path, base).await?;
        let mut inputs = vec![base_path];

        for (index, (name, data)) in attachments.iter().enumerate() {
            if data.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if !looks_like_pdf(data) {
                return Err(PipelineError::validation(format!(
                    "attachment {} is not a PDF file",
                    name
                )));
            }
            let path = work_dir.path().join(format!("attachment-{}.pdf", index + 1));
            tokio::fs::write(&path, data).await?;
            inputs.push(path);
        }

        if inputs.len() == 1 {
            return Ok(base.to_vec());
        }

        let merged = self
            .merge_pdfs(&inputs, &work_dir.path().join("merged.pdf"))
            .await?;
        Ok(tokio::fs::read(merged).await?)
    }
}

/// True when `data` carries the PDF header.
pub fn looks_like_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}
