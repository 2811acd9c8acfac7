use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `status_id` of a draft.
pub const STATUS_DRAFT: i32 = 1;

pub const PUBLICATION_REWARD: &str = "publication_reward";

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Document-type codes of the generated reward form.
pub const REWARD_FORM_DOCX_CODE: &str = "publication_reward_form_docx";
pub const REWARD_FORM_PDF_CODE: &str = "publication_reward_form_pdf";

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema, sqlx::FromRow)]
pub struct Submission {
    #[schema(example = 42)]
    pub submission_id: i32,
    #[schema(example = "publication_reward")]
    pub submission_type: String,
    #[schema(example = "PR-2568-0007")]
    pub submission_number: String,
    pub user_id: i32,
    pub year_id: i32,
    pub status_id: i32,
    pub submitted_at: Option<DateTime<Utc>>,
    /// Snapshot taken once at submit time.
    pub installment_number_at_submit: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn can_be_submitted(&self) -> bool {
        self.status_id == STATUS_DRAFT && self.submitted_at.is_none()
    }

    pub fn is_publication_reward(&self) -> bool {
        self.submission_type == PUBLICATION_REWARD
    }
}

/// The applicant with the bits of their profile the reward form prints.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema, sqlx::FromRow)]
pub struct Applicant {
    pub user_id: i32,
    pub user_fname: Option<String>,
    pub user_lname: Option<String>,
    pub position_name: Option<String>,
    pub date_of_employment: Option<NaiveDate>,
}

impl Applicant {
    pub fn display_name(&self) -> String {
        let first = self.user_fname.as_deref().unwrap_or("").trim();
        let last = self.user_lname.as_deref().unwrap_or("").trim();
        format!("{} {}", first, last).trim().to_string()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema, sqlx::FromRow)]
pub struct PublicationRewardDetail {
    pub detail_id: i32,
    pub submission_id: i32,
    pub paper_title: Option<String>,
    pub journal_name: Option<String>,
    pub publication_date: Option<NaiveDate>,
    /// T5, T10, Q1..Q4 or TCI.
    pub quartile: Option<String>,
    pub volume_issue: Option<String>,
    pub page_numbers: Option<String>,
    pub author_name_list: Option<String>,
    /// `first_author`, `corresponding_author` or `coauthor`.
    pub author_status: Option<String>,
    pub total_amount: f64,
    pub signature: Option<String>,
}

/// Per-year settings read from the latest `system_config` row.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema, sqlx::FromRow)]
pub struct SystemConfigSnapshot {
    pub current_year: Option<String>,
    pub installment: Option<i64>,
    pub kku_report_year: Option<String>,
}

/// A `submission_documents` row joined with its file and document type.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema, sqlx::FromRow)]
pub struct SubmissionDocument {
    pub document_id: i32,
    pub submission_id: i32,
    pub file_id: i32,
    pub document_type_id: i32,
    pub display_order: i32,
    pub document_type_name: Option<String>,
    pub original_name: Option<String>,
    pub stored_path: Option<String>,
    pub mime_type: Option<String>,
}

impl SubmissionDocument {
    /// By mime type, stored extension or original extension.
    pub fn is_pdf(&self) -> bool {
        let mime = self.mime_type.as_deref().unwrap_or("").trim();
        if mime.eq_ignore_ascii_case(MIME_PDF) {
            return true;
        }
        [self.stored_path.as_deref(), self.original_name.as_deref()]
            .into_iter()
            .flatten()
            .any(|name| name.trim().to_ascii_lowercase().ends_with(".pdf"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema, sqlx::FromRow)]
pub struct FileUpload {
    pub file_id: i32,
    pub original_name: String,
    pub stored_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: i32,
    pub uploaded_at: DateTime<Utc>,
}

/// Values for a new `file_uploads` row.
#[derive(Debug, Clone)]
pub struct NewFileUpload {
    pub original_name: String,
    pub stored_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: i32,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema, sqlx::FromRow)]
pub struct DocumentType {
    pub document_type_id: i32,
    pub document_type_name: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSubmissionRequest {
    #[schema(example = "publication_reward")]
    pub submission_type: String,
    #[schema(example = 3)]
    pub year_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    #[schema(example = 42)]
    pub submission_id: i32,
}

/// The `data` field of a form-based preview: a reward request that has not been saved.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct PreviewFormPayload {
    #[serde(rename = "formData")]
    pub form_data: PreviewFormData,
    pub applicant: PreviewApplicant,
    /// Metadata for the uploaded `attachments` files, in any order.
    pub attachments: Vec<PreviewAttachmentMeta>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct PreviewFormData {
    pub author_status: String,
    pub article_title: String,
    pub journal_name: String,
    pub journal_issue: String,
    pub journal_pages: String,
    /// `1`-`12`; anything else means January.
    pub journal_month: String,
    pub journal_year: String,
    pub journal_quartile: String,
    /// May carry thousands separators.
    pub total_amount: String,
    pub author_name_list: String,
    pub signature: String,
    /// `YYYY-MM-DD`; wins over `journal_year`/`journal_month`.
    pub publication_date: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct PreviewApplicant {
    pub prefix_name: String,
    pub user_fname: String,
    pub user_lname: String,
    pub position_name: String,
    /// `YYYY-MM-DD`.
    pub date_of_employment: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct PreviewAttachmentMeta {
    pub filename: String,
    pub document_type_id: Option<i32>,
    pub document_type_name: String,
    pub display_order: i32,
}

/// A document produced while submitting.
#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct GeneratedDocument {
    pub file_id: i32,
    pub document_id: i32,
    pub filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub display_order: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub submission: Submission,
    pub generated_documents: Vec<GeneratedDocument>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct MergedFile {
    pub file_id: i32,
    pub filename: String,
    pub stored_path: String,
    pub relative_path: String,
    pub size: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MergeDocumentsResponse {
    pub success: bool,
    pub merged_file: Option<MergedFile>,
    pub pdf_documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
