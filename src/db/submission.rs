//! Submission, document and file database operations
//!
//! Everything takes a `&mut PgConnection` so the same queries run inside the submit
//! transaction and on a plain pooled connection.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::submission::model::{
    Applicant, DocumentType, FileUpload, NewFileUpload, PublicationRewardDetail, Submission,
    SubmissionDocument, SystemConfigSnapshot, STATUS_DRAFT,
};

const SUBMISSION_COLUMNS: &str = "submission_id, submission_type, submission_number, user_id, year_id, \
     status_id, submitted_at, installment_number_at_submit, created_at, updated_at, deleted_at";

pub async fn find_submission(
    conn: &mut PgConnection,
    submission_id: i32,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {} FROM submissions WHERE submission_id = $1 AND deleted_at IS NULL",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .fetch_optional(conn)
    .await
}

/// The caller's submission, row-locked until the surrounding transaction ends.
pub async fn lock_owned_submission(
    conn: &mut PgConnection,
    submission_id: i32,
    user_id: i32,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {} FROM submissions \
         WHERE submission_id = $1 AND user_id = $2 AND deleted_at IS NULL \
         FOR UPDATE",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn find_owned_submission(
    conn: &mut PgConnection,
    submission_id: i32,
    user_id: i32,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {} FROM submissions \
         WHERE submission_id = $1 AND user_id = $2 AND deleted_at IS NULL",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn insert_submission(
    conn: &mut PgConnection,
    submission_type: &str,
    submission_number: &str,
    user_id: i32,
    year_id: i32,
    now: DateTime<Utc>,
) -> Result<Submission, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "INSERT INTO submissions \
         (submission_type, submission_number, user_id, year_id, status_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $6) \
         RETURNING {}",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_type)
    .bind(submission_number)
    .bind(user_id)
    .bind(year_id)
    .bind(STATUS_DRAFT)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Stamp `submitted_at`; the installment snapshot is only written when still empty.
pub async fn mark_submitted(
    conn: &mut PgConnection,
    submission_id: i32,
    submitted_at: DateTime<Utc>,
    installment_number: Option<i32>,
) -> Result<Submission, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "UPDATE submissions \
         SET submitted_at = $2, updated_at = $2, \
             installment_number_at_submit = COALESCE(installment_number_at_submit, $3) \
         WHERE submission_id = $1 \
         RETURNING {}",
        SUBMISSION_COLUMNS
    ))
    .bind(submission_id)
    .bind(submitted_at)
    .bind(installment_number)
    .fetch_one(conn)
    .await
}

pub async fn fetch_applicant(
    conn: &mut PgConnection,
    user_id: i32,
) -> Result<Option<Applicant>, sqlx::Error> {
    sqlx::query_as::<_, Applicant>(
        r#"
        SELECT u.user_id, u.user_fname, u.user_lname, p.position_name, u.date_of_employment
        FROM users u
        LEFT JOIN positions p ON p.position_id = u.position_id
        WHERE u.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_reward_detail(
    conn: &mut PgConnection,
    submission_id: i32,
) -> Result<Option<PublicationRewardDetail>, sqlx::Error> {
    sqlx::query_as::<_, PublicationRewardDetail>(
        r#"
        SELECT detail_id, submission_id, paper_title, journal_name, publication_date, quartile,
               volume_issue, page_numbers, author_name_list, author_status,
               COALESCE(total_amount, 0)::float8 AS total_amount, signature
        FROM publication_reward_details
        WHERE submission_id = $1 AND delete_at IS NULL
        ORDER BY detail_id DESC
        LIMIT 1
        "#,
    )
    .bind(submission_id)
    .fetch_optional(conn)
    .await
}

/// Latest `system_config` row; every field is optional and a missing row is all-empty.
pub async fn latest_system_config(conn: &mut PgConnection) -> Result<SystemConfigSnapshot, sqlx::Error> {
    let snapshot = sqlx::query_as::<_, SystemConfigSnapshot>(
        r#"
        SELECT current_year, installment::int8 AS installment, kku_report_year
        FROM system_config
        ORDER BY config_id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(conn)
    .await?;
    Ok(snapshot.unwrap_or_default())
}

pub async fn fetch_submission_documents(
    conn: &mut PgConnection,
    submission_id: i32,
) -> Result<Vec<SubmissionDocument>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionDocument>(
        r#"
        SELECT sd.document_id, sd.submission_id, sd.file_id, sd.document_type_id,
               COALESCE(sd.display_order, 0) AS display_order,
               dt.document_type_name, f.original_name, f.stored_path, f.mime_type
        FROM submission_documents sd
        LEFT JOIN file_uploads f ON f.file_id = sd.file_id AND f.delete_at IS NULL
        LEFT JOIN document_types dt ON dt.document_type_id = sd.document_type_id
        WHERE sd.submission_id = $1
        ORDER BY display_order ASC, sd.document_id ASC
        "#,
    )
    .bind(submission_id)
    .fetch_all(conn)
    .await
}

pub async fn insert_file_upload(
    conn: &mut PgConnection,
    file: &NewFileUpload,
) -> Result<FileUpload, sqlx::Error> {
    sqlx::query_as::<_, FileUpload>(
        r#"
        INSERT INTO file_uploads
            (original_name, stored_path, file_size, mime_type, is_public, uploaded_by,
             uploaded_at, create_at, update_at)
        VALUES ($1, $2, $3, $4, FALSE, $5, $6, $6, $6)
        RETURNING file_id, original_name, stored_path, file_size, mime_type, uploaded_by, uploaded_at
        "#,
    )
    .bind(&file.original_name)
    .bind(&file.stored_path)
    .bind(file.file_size)
    .bind(&file.mime_type)
    .bind(file.uploaded_by)
    .bind(file.uploaded_at)
    .fetch_one(conn)
    .await
}

/// Link a file to a submission and return the new `document_id`.
pub async fn insert_submission_document(
    conn: &mut PgConnection,
    submission_id: i32,
    file_id: i32,
    document_type_id: i32,
    display_order: i32,
    now: DateTime<Utc>,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO submission_documents
            (submission_id, file_id, document_type_id, display_order, is_required, is_verified, created_at)
        VALUES ($1, $2, $3, $4, FALSE, FALSE, $5)
        RETURNING document_id
        "#,
    )
    .bind(submission_id)
    .bind(file_id)
    .bind(document_type_id)
    .bind(display_order)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Document type by `code`, created with `name` when missing.
pub async fn ensure_document_type(
    conn: &mut PgConnection,
    code: &str,
    name: &str,
) -> Result<DocumentType, sqlx::Error> {
    let existing = sqlx::query_as::<_, DocumentType>(
        r#"
        SELECT document_type_id, document_type_name, code
        FROM document_types
        WHERE code = $1 AND delete_at IS NULL
        LIMIT 1
        "#,
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(doc_type) = existing {
        return Ok(doc_type);
    }

    log::info!("creating missing document type {}", code);
    sqlx::query_as::<_, DocumentType>(
        r#"
        INSERT INTO document_types
            (document_type_name, code, required, multiple, document_order, fund_types, create_at, update_at)
        VALUES ($1, $2, FALSE, FALSE, 0, '["publication_reward"]', NOW(), NOW())
        RETURNING document_type_id, document_type_name, code
        "#,
    )
    .bind(name)
    .bind(code)
    .fetch_one(conn)
    .await
}

/// Renumber `display_order` 1..n grouped by document type.
///
/// Types follow their configured `document_order`; within a type the previous order and
/// then insertion order are kept. Returns the number of rows that moved.
pub async fn resequence_documents_by_type(
    conn: &mut PgConnection,
    submission_id: i32,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        WITH ordered AS (
            SELECT sd.document_id,
                   (ROW_NUMBER() OVER (
                       ORDER BY COALESCE(dt.document_order, 2147483647) ASC,
                                sd.document_type_id ASC,
                                COALESCE(sd.display_order, 0) ASC,
                                sd.document_id ASC
                   ))::int4 AS position
            FROM submission_documents sd
            LEFT JOIN document_types dt ON dt.document_type_id = sd.document_type_id
            WHERE sd.submission_id = $1
        )
        UPDATE submission_documents sd
        SET display_order = ordered.position
        FROM ordered
        WHERE sd.document_id = ordered.document_id
          AND sd.display_order IS DISTINCT FROM ordered.position
        "#,
    )
    .bind(submission_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
