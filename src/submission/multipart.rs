use actix_multipart::Multipart;
use futures_util::StreamExt;

use crate::error::PipelineError;

/// Preview form: either `submission_id` of a stored request or a `data` JSON payload for
/// an unsaved one, plus any number of `attachments*` files.
#[derive(Debug, Default)]
pub struct PreviewUpload {
    pub submission_id: Option<i32>,
    pub data: Option<String>,
    pub attachments: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("Invalid field value: {0}")]
    ValueError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
    #[error("Form data exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
}

impl From<MultipartParseError> for PipelineError {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::IoError(_) => {
                PipelineError::Io(std::io::Error::other(error.to_string()))
            }
            MultipartParseError::TooLarge { .. } => PipelineError::PayloadTooLarge(error.to_string()),
            other => PipelineError::validation(other.to_string()),
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Parse the preview form, rejecting it once the fields together pass `limit` bytes.
    pub async fn parse_preview_multipart(
        mut multipart: Multipart,
        limit: usize,
    ) -> Result<PreviewUpload, MultipartParseError> {
        let mut upload = PreviewUpload::default();
        let mut total = 0usize;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field
                .content_disposition()
                .ok_or_else(|| MultipartParseError::FieldError("Content disposition not found".to_string()))?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            let maybe_filename = content_disposition.get_filename().map(|s| s.to_string());

            let mut buffer = Vec::new();
            while let Some(chunk) = field.next().await {
                let data_chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                total += data_chunk.len();
                if total > limit {
                    return Err(MultipartParseError::TooLarge { limit });
                }
                buffer.extend_from_slice(&data_chunk);
            }

            if name == "submission_id" {
                let raw = String::from_utf8(buffer)
                    .map_err(|e| MultipartParseError::Utf8Error(e.to_string()))?;
                let id = raw.trim().parse::<i32>().map_err(|_| {
                    MultipartParseError::ValueError(format!("submission_id '{}' is not a number", raw.trim()))
                })?;
                upload.submission_id = Some(id);
            } else if name == "data" {
                let raw = String::from_utf8(buffer)
                    .map_err(|e| MultipartParseError::Utf8Error(e.to_string()))?;
                upload.data = Some(raw);
            } else if name.starts_with("attachments") {
                let original_filename = match maybe_filename {
                    Some(fname) => fname,
                    None => format!("attachment_{}.pdf", upload.attachments.len() + 1),
                };
                upload.attachments.push((original_filename, buffer));
            } else {
                log::debug!("ignoring preview form field {}", name);
            }
        }

        Ok(upload)
    }
}
