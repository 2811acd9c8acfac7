//! Submission workflows: create, submit, preview and merge.

use std::path::{Path, PathBuf};

use actix_web::web;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::files::{
    merge_folder, next_display_order, relative_to_upload_root, resolve_stored_file_path,
    safe_filename, submission_folder, unique_filename, GeneratedFiles,
};
use super::model::{
    CreateSubmissionRequest, GeneratedDocument, MergeDocumentsResponse, MergedFile, NewFileUpload,
    PreviewFormPayload, Submission, SubmitResponse, MIME_DOCX, MIME_PDF, REWARD_FORM_DOCX_CODE,
    REWARD_FORM_PDF_CODE,
};
use super::replacements::{build_form_preview_replacements, build_reward_form_replacements};
use super::thai::current_thai_year;
use crate::conversion::DocumentConverter;
use crate::db::{self, AppState};
use crate::error::PipelineError;
use crate::merge::PdfMerger;
use crate::template::{render_docx, render_docx_file, Replacements};

/// Insert attempts before a duplicate submission number is reported.
const MAX_NUMBER_ATTEMPTS: u32 = 3;

const REWARD_FORM_DOCX_NAME: &str = "แบบฟอร์มคำขอรับเงินรางวัล (DOCX)";
const REWARD_FORM_PDF_NAME: &str = "แบบฟอร์มคำขอรับเงินรางวัล (PDF)";

pub async fn create_submission(
    state: &AppState,
    user_id: i32,
    request: &CreateSubmissionRequest,
) -> Result<Submission, PipelineError> {
    let submission_type = request.submission_type.trim();
    if submission_type.is_empty() {
        return Err(PipelineError::validation("submission_type is required"));
    }
    if request.year_id <= 0 {
        return Err(PipelineError::validation("year_id must be a positive id"));
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        // The generator reads the store on its own; no connection is held meanwhile.
        let number = state.numbers.generate(submission_type).await;
        let mut conn = state.pool.acquire().await?;
        let inserted = db::insert_submission(
            &mut conn,
            submission_type,
            &number,
            user_id,
            request.year_id,
            Utc::now(),
        )
        .await
        .map_err(PipelineError::from);

        match inserted {
            Ok(submission) => {
                log::info!(
                    "[submit] created {} submission {} ({})",
                    submission.submission_type,
                    submission.submission_id,
                    submission.submission_number
                );
                return Ok(submission);
            }
            Err(e) if e.is_unique_violation() && attempt < MAX_NUMBER_ATTEMPTS => {
                log::warn!("submission number {} already taken, retrying", number);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Finalise a draft owned by `user_id`.
///
/// The submission row stays locked for the whole transaction. Publication rewards also
/// get their request form rendered, converted and attached; files written on the way are
/// removed again unless the transaction commits.
pub async fn submit_submission(
    state: &AppState,
    submission_id: i32,
    user_id: i32,
) -> Result<SubmitResponse, PipelineError> {
    let mut tx = state.pool.begin().await?;

    let submission = db::lock_owned_submission(&mut tx, submission_id, user_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("submission not found"))?;

    if !submission.can_be_submitted() {
        return Err(PipelineError::validation(
            "submission cannot be submitted in its current status",
        ));
    }

    let now = Utc::now();
    let installment = db::resolve_installment_for(&mut tx, submission.year_id, now).await;

    let submission = db::mark_submitted(&mut tx, submission_id, now, installment).await?;

    let mut files = GeneratedFiles::new();
    let generated_documents = if submission.is_publication_reward() {
        generate_reward_form(state, &mut tx, &submission, now, &mut files).await?
    } else {
        Vec::new()
    };

    tx.commit().await?;
    files.keep();

    log::info!(
        "[submit] submission {} ({}) submitted, installment {:?}, {} generated document(s)",
        submission.submission_id,
        submission.submission_number,
        submission.installment_number_at_submit,
        generated_documents.len()
    );

    Ok(SubmitResponse {
        success: true,
        message: "Submission submitted successfully".to_string(),
        submission,
        generated_documents,
    })
}

/// Replacement set for the reward form of `submission`.
async fn reward_form_replacements(
    state: &AppState,
    conn: &mut PgConnection,
    submission: &Submission,
) -> Result<Replacements, PipelineError> {
    let applicant = db::fetch_applicant(&mut *conn, submission.user_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("applicant not found"))?;
    let detail = db::fetch_reward_detail(&mut *conn, submission.submission_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("publication reward detail not found"))?;
    let config = state.system_config(&mut *conn).await?;
    let documents = db::fetch_submission_documents(&mut *conn, submission.submission_id).await?;

    build_reward_form_replacements(submission, &applicant, &detail, &config, &documents)
}

async fn generate_reward_form(
    state: &AppState,
    conn: &mut PgConnection,
    submission: &Submission,
    now: DateTime<Utc>,
    files: &mut GeneratedFiles,
) -> Result<Vec<GeneratedDocument>, PipelineError> {
    let moved = db::resequence_documents_by_type(&mut *conn, submission.submission_id).await?;
    if moved > 0 {
        log::debug!(
            "[submit] resequenced {} document(s) of submission {}",
            moved,
            submission.submission_id
        );
    }

    let replacements = reward_form_replacements(state, &mut *conn, submission).await?;
    let existing = db::fetch_submission_documents(&mut *conn, submission.submission_id).await?;
    let docx_type =
        db::ensure_document_type(&mut *conn, REWARD_FORM_DOCX_CODE, REWARD_FORM_DOCX_NAME).await?;
    let pdf_type =
        db::ensure_document_type(&mut *conn, REWARD_FORM_PDF_CODE, REWARD_FORM_PDF_NAME).await?;

    let folder = submission_folder(
        &state.config.upload_root,
        submission.user_id,
        &submission.submission_type,
        submission.submission_id,
        &submission.submission_number,
    );
    tokio::fs::create_dir_all(&folder).await?;

    let stem = safe_filename(
        &format!("{}_publication_reward_form", submission.submission_number.trim()),
        &format!("submission_{}_publication_reward_form", submission.submission_id),
    );
    let docx_name = unique_filename(&folder, &format!("{}.docx", stem));
    let docx_path = folder.join(&docx_name);
    files.track(&docx_path);

    let template_path = state.config.template_path.clone();
    let output_path = docx_path.clone();
    web::block(move || render_docx_file(&template_path, &output_path, &replacements)).await??;

    let mut display_order = next_display_order(&existing);
    let docx_document = record_generated_file(
        &mut *conn,
        submission,
        &docx_path,
        MIME_DOCX,
        docx_type.document_type_id,
        display_order,
        now,
    )
    .await?;
    display_order += 1;

    let pdf_bytes = state.converter.convert_to_pdf(&docx_path).await?;
    let pdf_stem = Path::new(&docx_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(stem);
    let pdf_name = unique_filename(&folder, &format!("{}.pdf", pdf_stem));
    let pdf_path = folder.join(&pdf_name);
    files.track(&pdf_path);
    tokio::fs::write(&pdf_path, &pdf_bytes).await?;

    let pdf_document = record_generated_file(
        &mut *conn,
        submission,
        &pdf_path,
        MIME_PDF,
        pdf_type.document_type_id,
        display_order,
        now,
    )
    .await?;

    log::info!(
        "[submit] generated {} and {} for submission {}",
        docx_document.filename,
        pdf_document.filename,
        submission.submission_id
    );

    Ok(vec![docx_document, pdf_document])
}

/// `file_uploads` + `submission_documents` rows for a file written into the submission folder.
async fn record_generated_file(
    conn: &mut PgConnection,
    submission: &Submission,
    path: &Path,
    fallback_mime: &str,
    document_type_id: i32,
    display_order: i32,
    now: DateTime<Utc>,
) -> Result<GeneratedDocument, PipelineError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let metadata = tokio::fs::metadata(path).await?;
    let stored_path = path.to_string_lossy().replace('\\', "/");

    let upload = db::insert_file_upload(
        &mut *conn,
        &NewFileUpload {
            original_name: filename.clone(),
            stored_path: stored_path.clone(),
            file_size: metadata.len() as i64,
            mime_type: mime_for(path, fallback_mime),
            uploaded_by: submission.user_id,
            uploaded_at: now,
        },
    )
    .await?;

    let document_id = db::insert_submission_document(
        &mut *conn,
        submission.submission_id,
        upload.file_id,
        document_type_id,
        display_order,
        now,
    )
    .await?;

    Ok(GeneratedDocument {
        file_id: upload.file_id,
        document_id,
        filename,
        stored_path,
        mime_type: upload.mime_type,
        display_order,
    })
}

fn mime_for(path: &Path, fallback: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(fallback)
        .to_string()
}

/// Render and convert the reward form of a stored submission without persisting
/// anything; PDF `attachments` are appended after the form.
pub async fn preview_reward_form(
    state: &AppState,
    submission_id: i32,
    user_id: i32,
    attachments: &[(String, Vec<u8>)],
) -> Result<Vec<u8>, PipelineError> {
    let mut conn = state.pool.acquire().await?;
    let submission = db::find_owned_submission(&mut conn, submission_id, user_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("submission not found"))?;

    if !submission.is_publication_reward() {
        return Err(PipelineError::validation(
            "preview is only available for publication reward submissions",
        ));
    }

    let replacements = reward_form_replacements(state, &mut conn, &submission).await?;
    drop(conn);

    let stem = safe_filename(
        &format!("preview_{}", submission.submission_number.trim()),
        "preview",
    );
    let merged = render_preview(state, replacements, &stem, attachments).await?;

    log::info!(
        "[submit] previewed reward form for submission {} with {} attachment(s)",
        submission.submission_id,
        attachments.len()
    );
    Ok(merged)
}

/// Preview a reward request that has not been saved, built from the submitted form data.
pub async fn preview_reward_form_from_form(
    state: &AppState,
    payload: &PreviewFormPayload,
    attachments: &[(String, Vec<u8>)],
) -> Result<Vec<u8>, PipelineError> {
    let config = {
        let mut conn = state.pool.acquire().await?;
        state.system_config(&mut conn).await?
    };

    let uploaded: Vec<String> = attachments.iter().map(|(name, _)| name.clone()).collect();
    let replacements = build_form_preview_replacements(payload, &config, &uploaded, Utc::now())?;
    let merged = render_preview(state, replacements, "preview_form", attachments).await?;

    log::info!(
        "[submit] previewed unsaved reward form with {} attachment(s)",
        attachments.len()
    );
    Ok(merged)
}

async fn render_preview(
    state: &AppState,
    replacements: Replacements,
    stem: &str,
    attachments: &[(String, Vec<u8>)],
) -> Result<Vec<u8>, PipelineError> {
    render_preview_pdf(
        &state.config.template_path,
        &state.converter,
        &state.merger,
        replacements,
        stem,
        attachments,
    )
    .await
}

/// Template → DOCX → PDF, then `attachments` appended. Nothing touches the upload root.
pub async fn render_preview_pdf(
    template_path: &Path,
    converter: &DocumentConverter,
    merger: &PdfMerger,
    replacements: Replacements,
    stem: &str,
    attachments: &[(String, Vec<u8>)],
) -> Result<Vec<u8>, PipelineError> {
    let template = match tokio::fs::read(template_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::not_found(format!(
                "template file not found: {}",
                template_path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    let docx = web::block(move || render_docx(&template, &replacements)).await??;

    let pdf = converter.convert_bytes(&docx, stem).await?;
    merger.merge_with_attachments(&pdf, attachments).await
}

/// Merge every PDF attached to a submitted submission into one file under
/// `merge_submissions/{BE year}` and record it as an upload.
pub async fn merge_submission_documents(
    state: &AppState,
    submission_id: i32,
    user_id: i32,
) -> Result<MergeDocumentsResponse, PipelineError> {
    let mut conn = state.pool.acquire().await?;
    let submission = db::find_owned_submission(&mut conn, submission_id, user_id)
        .await?
        .ok_or_else(|| PipelineError::not_found("submission not found"))?;

    if submission.submitted_at.is_none() {
        return Err(PipelineError::validation(
            "submission must be submitted before its documents can be merged",
        ));
    }

    let upload_root = &state.config.upload_root;
    let documents = db::fetch_submission_documents(&mut conn, submission_id).await?;
    let mut inputs: Vec<PathBuf> = Vec::new();
    for document in documents.iter().filter(|d| d.is_pdf()) {
        let stored = document.stored_path.as_deref().unwrap_or("");
        let path = resolve_stored_file_path(stored, upload_root).ok_or_else(|| {
            PipelineError::not_found(format!(
                "file for document {} not found: {}",
                document.document_id, stored
            ))
        })?;
        inputs.push(path);
    }

    if inputs.is_empty() {
        log::info!("[merge] submission {} has no PDF documents", submission_id);
        return Ok(MergeDocumentsResponse {
            success: true,
            merged_file: None,
            pdf_documents: 0,
            message: Some("No PDF documents available to merge".to_string()),
        });
    }

    let folder = merge_folder(upload_root, &current_thai_year().to_string());
    tokio::fs::create_dir_all(&folder).await?;

    let base = safe_filename(
        submission.submission_number.trim(),
        &format!(
            "{}-{}",
            submission.submission_type.to_ascii_uppercase(),
            submission.submission_id
        ),
    );
    let filename = unique_filename(&folder, &format!("{}_merged_document.pdf", base));
    let output = folder.join(&filename);

    let mut files = GeneratedFiles::new();
    files.track(&output);

    state.merger.merge_pdfs(&inputs, &output).await?;
    let size = tokio::fs::metadata(&output).await?.len() as i64;
    let stored_path = output.to_string_lossy().replace('\\', "/");

    let upload = db::insert_file_upload(
        &mut conn,
        &NewFileUpload {
            original_name: filename.clone(),
            stored_path: stored_path.clone(),
            file_size: size,
            mime_type: MIME_PDF.to_string(),
            uploaded_by: user_id,
            uploaded_at: Utc::now(),
        },
    )
    .await?;
    files.keep();

    log::info!(
        "[merge] merged {} PDF(s) of submission {} into {}",
        inputs.len(),
        submission_id,
        stored_path
    );

    Ok(MergeDocumentsResponse {
        success: true,
        merged_file: Some(MergedFile {
            file_id: upload.file_id,
            filename,
            stored_path,
            relative_path: relative_to_upload_root(&output, upload_root),
            size,
        }),
        pdf_documents: inputs.len(),
        message: None,
    })
}
