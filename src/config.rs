//! Deployment configuration.
//!
//! Everything the pipeline needs from the environment is read once here and then
//! handed to the components when they are built.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_UPLOAD_PATH: &str = "./uploads";
const DEFAULT_TEMPLATE_PATH: &str = "templates/publication_reward_template.docx";
const DEFAULT_MERGE_SCRIPT: &str = "scripts/merge_pdf.js";
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;
/// Cap on a preview request body, multipart or JSON.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 << 20;

/// Settings for the DOCX → PDF converter.
#[derive(Debug, Clone, Default)]
pub struct ConverterConfig {
    /// Explicit converter binary; when unset the search path is consulted.
    pub binary: Option<PathBuf>,
    /// Bundled font directories registered with fontconfig for every conversion.
    pub font_dirs: Vec<PathBuf>,
}

/// Settings for the PDF merge strategies.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub node_binary: Option<String>,
    pub script_path: PathBuf,
    pub node_modules: Option<PathBuf>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            node_binary: None,
            script_path: PathBuf::from(DEFAULT_MERGE_SCRIPT),
            node_modules: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub upload_root: PathBuf,
    pub template_path: PathBuf,
    pub converter: ConverterConfig,
    pub merge: MergeConfig,
    /// `None` disables the timeout on external tools.
    pub tool_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
    pub bind_address: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let timeout_secs = match non_empty_var("EXTERNAL_TOOL_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("invalid EXTERNAL_TOOL_TIMEOUT_SECS '{}': {}", raw, e))?,
            None => DEFAULT_TOOL_TIMEOUT_SECS,
        };

        let port = match non_empty_var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| format!("invalid PORT '{}': {}", raw, e))?,
            None => 8080,
        };

        let max_upload_bytes = match non_empty_var("MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| format!("invalid MAX_UPLOAD_BYTES '{}': {}", raw, e))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let font_dirs = env::var_os("DOCUMENT_FONT_DIRS")
            .map(|raw| env::split_paths(&raw).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default();

        Ok(Self {
            database_url,
            upload_root: non_empty_var("UPLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_PATH)),
            template_path: non_empty_var("REWARD_TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
            converter: ConverterConfig {
                binary: non_empty_var("LIBREOFFICE").map(PathBuf::from),
                font_dirs,
            },
            merge: MergeConfig {
                node_binary: non_empty_var("PDF_MERGE_NODE_BINARY"),
                script_path: non_empty_var("PDF_MERGE_SCRIPT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MERGE_SCRIPT)),
                node_modules: non_empty_var("PDF_MERGE_NODE_MODULES").map(PathBuf::from),
            },
            tool_timeout: timeout_from_secs(timeout_secs),
            max_upload_bytes,
            bind_address: non_empty_var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_disables() {
        assert_eq!(timeout_from_secs(0), None);
        assert_eq!(timeout_from_secs(30), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_merge_config_default_script() {
        let config = MergeConfig::default();
        assert_eq!(config.script_path, PathBuf::from("scripts/merge_pdf.js"));
        assert!(config.node_binary.is_none());
    }
}
